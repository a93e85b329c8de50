pub mod model;
pub mod service;

pub use model::{JiraAcross, JiraCalculation, JiraFilter, JiraIssue};
pub use service::JiraIssueService;
