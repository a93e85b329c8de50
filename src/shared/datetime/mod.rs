pub mod bucketer;
pub mod interval;
pub mod time;

pub use bucketer::CalendarBucketer;
pub use interval::AggInterval;
pub use time::{TimeConfig, now_epoch_seconds};

#[cfg(test)]
mod interval_test;
