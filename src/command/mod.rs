pub mod dispatcher;
pub mod handlers;
pub mod types;

pub use dispatcher::dispatch;
pub use types::{Command, Entity, QueryAction};
