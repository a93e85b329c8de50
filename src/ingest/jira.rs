use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::engine::domain::jira::JiraIssue;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::identity::IdentityResolver;
use crate::ingest::resolve_identity;

/// Jira REST v2/v3 issue as returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraIssuePayload {
    pub key: String,
    pub fields: JiraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraFields {
    pub summary: Option<String>,
    pub project: Option<JiraNamed>,
    pub issuetype: Option<JiraNamed>,
    pub priority: Option<JiraNamed>,
    pub status: Option<JiraNamed>,
    pub assignee: Option<JiraUser>,
    pub reporter: Option<JiraUser>,
    /// Story points custom field
    #[serde(rename = "customfield_10016")]
    pub story_points: Option<f64>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub resolutiondate: Option<String>,
    pub comment: Option<JiraComments>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraNamed {
    pub key: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    pub account_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraComments {
    pub comments: Vec<JiraComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraComment {
    pub created: String,
}

/// Maps one issue into the snapshot taken at `ingested_at`. Assignee and
/// reporter are registered as identities of the integration.
pub fn map_issue(
    payload: &JiraIssuePayload,
    integration_id: &str,
    ingested_at: i64,
    resolver: &dyn IdentityResolver,
) -> EngineResult<JiraIssue> {
    let fields = &payload.fields;
    let user = |u: &Option<JiraUser>| {
        u.as_ref()
            .map(|u| (u.account_id.clone(), u.display_name.clone()))
    };
    let assignee = user(&fields.assignee);
    let reporter = user(&fields.reporter);

    let first_comment_at = match &fields.comment {
        Some(c) => c
            .comments
            .iter()
            .map(|c| parse_timestamp(&c.created))
            .collect::<EngineResult<Vec<_>>>()?
            .into_iter()
            .min(),
        None => None,
    };

    let mut issue = JiraIssue::new(&payload.key, integration_id, ingested_at);
    issue.summary = fields.summary.clone();
    issue.project = fields
        .project
        .as_ref()
        .and_then(|p| p.key.clone().or_else(|| p.name.clone()));
    issue.issue_type = name_of(&fields.issuetype);
    issue.priority = name_of(&fields.priority);
    issue.status = name_of(&fields.status);
    issue.assignee_id = resolve_identity(
        resolver,
        integration_id,
        assignee.as_ref().map(|(id, name)| (id.as_str(), name.as_str())),
    )?;
    issue.assignee = assignee.map(|(_, name)| name);
    issue.reporter_id = resolve_identity(
        resolver,
        integration_id,
        reporter.as_ref().map(|(id, name)| (id.as_str(), name.as_str())),
    )?;
    issue.reporter = reporter.map(|(_, name)| name);
    issue.story_points = fields.story_points;
    issue.issue_created_at = fields.created.as_deref().map(parse_timestamp).transpose()?;
    issue.issue_updated_at = fields.updated.as_deref().map(parse_timestamp).transpose()?;
    issue.issue_resolved_at = fields
        .resolutiondate
        .as_deref()
        .map(parse_timestamp)
        .transpose()?;
    issue.first_comment_at = first_comment_at;
    Ok(issue)
}

fn name_of(named: &Option<JiraNamed>) -> Option<String> {
    named.as_ref().and_then(|n| n.name.clone())
}

/// Jira timestamps look like `2024-01-08T10:15:30.000+0000`; RFC 3339 is
/// accepted as well.
pub fn parse_timestamp(raw: &str) -> EngineResult<i64> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.timestamp())
        .map_err(|_| EngineError::validation(format!("Invalid Jira timestamp: {raw}")))
}
