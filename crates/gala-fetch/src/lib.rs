//! Origin fetch abstraction
//!
//! The export pipeline's only requirement of object storage is "given a URL,
//! fetch the byte stream of that object, honoring a deadline and external
//! cancellation". This crate defines that capability as the [`ObjectFetcher`]
//! trait and provides the HTTP implementation used in production.

mod http;
mod traits;

pub use http::HttpObjectFetcher;
pub use traits::{ByteStream, FetchError, FetchResult, FetchedObject, ObjectFetcher};
