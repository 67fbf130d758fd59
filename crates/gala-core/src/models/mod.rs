mod event;
mod upload;

pub use event::{Event, EventResponse, Prompt, PromptResponse};
pub use upload::{Upload, UploadResponse};
