use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::engine::domain::common::{Calculation, Dimension};
use crate::engine::query::aggregation::{UNASSIGNED, UNKNOWN, UNKNOWN_USER};
use crate::engine::query::sort::SortMap;
use crate::engine::query::{GroupKey, Measure, NumericRange, TimeRange, ValueFilter};
use crate::shared::datetime::AggInterval;

/// One daily snapshot of a Jira issue.
///
/// Natural key: (issue_key, integration_id, ingested_at). Every ingestion run
/// writes a fresh snapshot so trends can be rebuilt from history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraIssue {
    #[serde(default)]
    pub id: Option<String>,
    pub issue_key: String,
    pub integration_id: String,
    pub ingested_at: i64,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    /// Resolved user identity of the assignee
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub reporter: Option<String>,
    #[serde(default)]
    pub reporter_id: Option<String>,
    #[serde(default)]
    pub story_points: Option<f64>,
    #[serde(default)]
    pub issue_created_at: Option<i64>,
    #[serde(default)]
    pub issue_updated_at: Option<i64>,
    #[serde(default)]
    pub issue_resolved_at: Option<i64>,
    #[serde(default)]
    pub first_comment_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl JiraIssue {
    pub fn new(issue_key: &str, integration_id: &str, ingested_at: i64) -> Self {
        Self {
            id: None,
            issue_key: issue_key.to_string(),
            integration_id: integration_id.to_string(),
            ingested_at,
            project: None,
            summary: None,
            issue_type: None,
            priority: None,
            status: None,
            assignee: None,
            assignee_id: None,
            reporter: None,
            reporter_id: None,
            story_points: None,
            issue_created_at: None,
            issue_updated_at: None,
            issue_resolved_at: None,
            first_comment_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            issue_key: row.get("issue_key")?,
            integration_id: row.get::<_, i64>("integration_id")?.to_string(),
            ingested_at: row.get("ingested_at")?,
            project: row.get("project")?,
            summary: row.get("summary")?,
            issue_type: row.get("issue_type")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            assignee: row.get("assignee")?,
            assignee_id: row.get("assignee_id")?,
            reporter: row.get("reporter")?,
            reporter_id: row.get("reporter_id")?,
            story_points: row.get("story_points")?,
            issue_created_at: row.get("issue_created_at")?,
            issue_updated_at: row.get("issue_updated_at")?,
            issue_resolved_at: row.get("issue_resolved_at")?,
            first_comment_at: row.get("first_comment_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JiraAcross {
    Status,
    Assignee,
    Reporter,
    Priority,
    IssueType,
    Project,
    /// Snapshot history bucketed by ingestion time
    Trend,
    IssueCreated,
    IssueResolved,
}

impl Dimension for JiraAcross {
    fn name(&self) -> &'static str {
        match self {
            JiraAcross::Status => "status",
            JiraAcross::Assignee => "assignee",
            JiraAcross::Reporter => "reporter",
            JiraAcross::Priority => "priority",
            JiraAcross::IssueType => "issue_type",
            JiraAcross::Project => "project",
            JiraAcross::Trend => "trend",
            JiraAcross::IssueCreated => "issue_created",
            JiraAcross::IssueResolved => "issue_resolved",
        }
    }

    fn group_key(&self, interval: AggInterval) -> GroupKey {
        match self {
            JiraAcross::Status => GroupKey::column("t.status", UNKNOWN),
            JiraAcross::Assignee => GroupKey::column("t.assignee_id", UNASSIGNED),
            JiraAcross::Reporter => GroupKey::column("t.reporter_id", UNKNOWN_USER),
            JiraAcross::Priority => GroupKey::column("t.priority", UNKNOWN),
            JiraAcross::IssueType => GroupKey::column("t.issue_type", UNKNOWN),
            JiraAcross::Project => GroupKey::column("t.project", UNKNOWN),
            JiraAcross::Trend => GroupKey::interval("t.ingested_at", interval),
            JiraAcross::IssueCreated => GroupKey::interval("t.issue_created_at", interval),
            JiraAcross::IssueResolved => GroupKey::interval("t.issue_resolved_at", interval),
        }
    }

    fn is_trend(&self) -> bool {
        matches!(self, JiraAcross::Trend)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JiraCalculation {
    #[default]
    TicketCount,
    StoryPoints,
    ResolutionTime,
    ResponseTime,
    /// Seconds between creation and the snapshot; trend only.
    Age,
}

impl Calculation for JiraCalculation {
    fn name(&self) -> &'static str {
        match self {
            JiraCalculation::TicketCount => "ticket_count",
            JiraCalculation::StoryPoints => "story_points",
            JiraCalculation::ResolutionTime => "resolution_time",
            JiraCalculation::ResponseTime => "response_time",
            JiraCalculation::Age => "age",
        }
    }

    fn measure(&self) -> Measure {
        match self {
            JiraCalculation::TicketCount => Measure::Tickets,
            JiraCalculation::StoryPoints => Measure::sum("t.story_points"),
            JiraCalculation::ResolutionTime => Measure::stats("t.issue_resolved_at - t.issue_created_at"),
            JiraCalculation::ResponseTime => Measure::stats("t.first_comment_at - t.issue_created_at"),
            JiraCalculation::Age => Measure::stats("t.ingested_at - t.issue_created_at"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraFilter {
    pub keys: ValueFilter<String>,
    pub projects: ValueFilter<String>,
    pub statuses: ValueFilter<String>,
    pub issue_types: ValueFilter<String>,
    pub priorities: ValueFilter<String>,
    pub assignees: ValueFilter<String>,
    pub reporters: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    /// Pins one snapshot; otherwise the latest snapshot per integration is used.
    pub ingested_at: Option<i64>,
    pub issue_created_at: Option<TimeRange>,
    pub story_points: Option<NumericRange>,
    pub tag_ids: ValueFilter<i64>,
    pub across: Option<JiraAcross>,
    pub stacks: Vec<JiraAcross>,
    pub calculation: Option<JiraCalculation>,
    pub agg_interval: Option<AggInterval>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
