pub mod dispatcher;
pub mod handler;
pub mod listener;

#[cfg(test)]
mod dispatcher_test;
