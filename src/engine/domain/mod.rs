pub mod builds;
pub mod cicd;
pub mod common;
pub mod jira;
pub mod scm;
pub mod zendesk;
