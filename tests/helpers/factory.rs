pub use super::factories::{
    BuildFactory, CommitFactory, JiraIssueFactory, PullRequestFactory, RecordingResolver,
    ZendeskTicketFactory,
};

pub struct Factory;

impl Factory {
    pub fn build(integration_id: &str) -> BuildFactory {
        BuildFactory::new(integration_id)
    }

    pub fn jira_issue(integration_id: &str, ingested_at: i64) -> JiraIssueFactory {
        JiraIssueFactory::new(integration_id, ingested_at)
    }

    pub fn zendesk_ticket(integration_id: &str, ingested_at: i64) -> ZendeskTicketFactory {
        ZendeskTicketFactory::new(integration_id, ingested_at)
    }

    pub fn pull_request(integration_id: &str, repo_id: &str) -> PullRequestFactory {
        PullRequestFactory::new(integration_id, repo_id)
    }

    pub fn commit(integration_id: &str, repo_id: &str) -> CommitFactory {
        CommitFactory::new(integration_id, repo_id)
    }

    pub fn resolver() -> RecordingResolver {
        RecordingResolver::new()
    }
}
