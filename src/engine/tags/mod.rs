pub mod service;

pub use service::{TagItemType, TagService};
