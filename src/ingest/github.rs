use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::domain::scm::{ScmCommit, ScmPullRequest, ScmReview};
use crate::engine::errors::EngineResult;
use crate::engine::identity::IdentityResolver;
use crate::ingest::{epoch, resolve_identity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubRef {
    #[serde(rename = "ref")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubPullRequest {
    pub number: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub state: String,
    #[serde(default)]
    pub user: Option<GithubUser>,
    #[serde(default)]
    pub head: Option<GithubRef>,
    #[serde(default)]
    pub base: Option<GithubRef>,
    #[serde(default)]
    pub additions: Option<i64>,
    #[serde(default)]
    pub deletions: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviews: Vec<GithubReview>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubReview {
    pub id: i64,
    #[serde(default)]
    pub user: Option<GithubUser>,
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubCommit {
    pub sha: String,
    pub commit: GithubCommitDetail,
    /// Linked GitHub accounts; absent when the email matches no account.
    #[serde(default)]
    pub author: Option<GithubUser>,
    #[serde(default)]
    pub committer: Option<GithubUser>,
    #[serde(default)]
    pub stats: Option<GithubCommitStats>,
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubCommitDetail {
    #[serde(default)]
    pub message: Option<String>,
    pub author: GithubSignature,
    pub committer: GithubSignature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubSignature {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubCommitStats {
    pub additions: i64,
    pub deletions: i64,
}

fn login(user: &Option<GithubUser>) -> Option<(&str, &str)> {
    user.as_ref().map(|u| (u.login.as_str(), u.login.as_str()))
}

/// PR state as stored: GitHub reports merged PRs as `closed`.
fn pr_state(pr: &GithubPullRequest) -> String {
    if pr.merged_at.is_some() {
        "merged".to_string()
    } else {
        pr.state.to_lowercase()
    }
}

pub fn map_pull_request(
    pr: &GithubPullRequest,
    repo_id: &str,
    integration_id: &str,
    resolver: &dyn IdentityResolver,
) -> EngineResult<ScmPullRequest> {
    let mut row = ScmPullRequest::new(integration_id, repo_id, pr.number);
    row.title = pr.title.clone();
    row.state = Some(pr_state(pr));
    row.creator = pr.user.as_ref().map(|u| u.login.clone());
    row.creator_id = resolve_identity(resolver, integration_id, login(&pr.user))?;
    row.source_branch = pr.head.as_ref().map(|r| r.name.clone());
    row.target_branch = pr.base.as_ref().map(|r| r.name.clone());
    row.additions = pr.additions;
    row.deletions = pr.deletions;
    row.pr_created_at = Some(pr.created_at.timestamp());
    row.pr_updated_at = epoch(pr.updated_at);
    row.pr_merged_at = epoch(pr.merged_at);
    row.pr_closed_at = epoch(pr.closed_at);
    row.reviews = pr
        .reviews
        .iter()
        .map(|review| {
            Ok(ScmReview {
                review_id: review.id.to_string(),
                reviewer: review.user.as_ref().map(|u| u.login.clone()),
                reviewer_id: resolve_identity(resolver, integration_id, login(&review.user))?,
                state: Some(review.state.to_lowercase()),
                submitted_at: epoch(review.submitted_at),
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(row)
}

/// Author and committer resolve through their GitHub login, falling back to
/// the git signature name.
pub fn map_commit(
    commit: &GithubCommit,
    repo_id: &str,
    integration_id: &str,
    resolver: &dyn IdentityResolver,
) -> EngineResult<ScmCommit> {
    let handle = |user: &Option<GithubUser>, signature: &GithubSignature| {
        user.as_ref()
            .map(|u| u.login.clone())
            .unwrap_or_else(|| signature.name.clone())
    };
    let author = handle(&commit.author, &commit.commit.author);
    let committer = handle(&commit.committer, &commit.commit.committer);

    let mut row = ScmCommit::new(integration_id, repo_id, &commit.sha);
    row.message = commit.commit.message.clone();
    row.author_id = Some(resolver.resolve(integration_id, &author, &author)?);
    row.committer_id = Some(resolver.resolve(integration_id, &committer, &committer)?);
    row.author = Some(author);
    row.committer = Some(committer);
    row.additions = commit.stats.as_ref().map(|s| s.additions);
    row.deletions = commit.stats.as_ref().map(|s| s.deletions);
    row.files_changed = if commit.files.is_empty() {
        None
    } else {
        Some(commit.files.len() as i64)
    };
    row.committed_at = Some(commit.commit.committer.date.timestamp());
    Ok(row)
}
