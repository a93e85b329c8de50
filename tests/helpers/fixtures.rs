use serde::Deserialize;

use crate::ingest::{CodeBuildBuild, JiraIssuePayload};

const BUILDS_JSON: &str = include_str!("../fixtures/awsdevtools/builds.json");
const JIRA_ISSUES_JSON: &str = include_str!("../fixtures/jira/issues.json");

/// 22 CodeBuild builds over 12 projects, 20 of them FAILED.
pub fn codebuild_builds() -> Vec<CodeBuildBuild> {
    serde_json::from_str(BUILDS_JSON).unwrap()
}

/// One Jira ingestion run.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraSnapshot {
    pub ingested_at: i64,
    pub issues: Vec<JiraIssuePayload>,
}

/// 5 issues captured daily from 2024-01-08 to 2024-01-18 (11 snapshots,
/// two ISO weeks).
pub fn jira_snapshots() -> Vec<JiraSnapshot> {
    serde_json::from_str(JIRA_ISSUES_JSON).unwrap()
}
