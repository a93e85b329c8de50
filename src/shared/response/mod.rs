pub mod json;
pub mod list;
pub mod types;

pub use json::JsonRenderer;
pub use list::DbListResponse;
pub use types::{Response, StatusCode};

#[cfg(test)]
mod list_test;
