pub mod events;
pub mod export;
