//! Vendor payload to entity row mappers.
//!
//! Mapping is pure apart from identity resolution: the same payload always
//! produces the same row, and row ids are only assigned when the row is
//! written.

pub mod codebuild;
pub mod github;
pub mod jira;
pub mod zendesk;

use chrono::{DateTime, Utc};

use crate::engine::errors::EngineResult;
use crate::engine::identity::IdentityResolver;

pub use codebuild::{
    CodeBuildBuild, CodeBuildBuildBatch, CodeBuildProject, map_build, map_build_batch, map_project,
};
pub use github::{GithubCommit, GithubPullRequest, GithubReview, map_commit, map_pull_request};
pub use jira::{JiraIssuePayload, map_issue};
pub use zendesk::{ZendeskTicketPayload, map_ticket};

#[cfg(test)]
mod jira_test;

pub(crate) fn epoch(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|ts| ts.timestamp())
}

/// Resolves an optional vendor user to an internal identity id.
pub(crate) fn resolve_identity(
    resolver: &dyn IdentityResolver,
    integration_id: &str,
    handle: Option<(&str, &str)>,
) -> EngineResult<Option<String>> {
    handle
        .map(|(cloud_id, display_name)| resolver.resolve(integration_id, cloud_id, display_name))
        .transpose()
}
