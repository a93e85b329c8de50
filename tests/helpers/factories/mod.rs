pub mod build_factory;
pub mod identity_resolver_factory;
pub mod jira_issue_factory;
pub mod scm_factory;
pub mod timestamp_factory;
pub mod zendesk_ticket_factory;

pub use build_factory::BuildFactory;
pub use identity_resolver_factory::RecordingResolver;
pub use jira_issue_factory::JiraIssueFactory;
pub use scm_factory::{CommitFactory, PullRequestFactory};
pub use timestamp_factory::TimestampFactory;
pub use zendesk_ticket_factory::ZendeskTicketFactory;
