//! Data model flowing through the crawl pipeline
//!
//! - `Request`: one unit of work to fetch, tagged with its derivation depth
//! - `Response`: the result of one fetch, inheriting the request depth
//! - `Item`: caller-defined payload extracted from a response
//! - `Parsed`: what a parse function yields (a derived request or an item)

mod item;
mod request;
mod response;

pub use item::{Item, Parsed};
pub use request::Request;
pub use response::Response;
