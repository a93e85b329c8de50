use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::engine::domain::builds::reports::AwsReport;
use crate::engine::domain::common::{Calculation, Dimension};
use crate::engine::query::aggregation::UNKNOWN;
use crate::engine::query::sort::SortMap;
use crate::engine::query::{GroupKey, Measure, TimeRange, ValueFilter};
use crate::shared::datetime::AggInterval;

/// One AWS CodeBuild build. Natural key: (build_id, integration_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsBuild {
    #[serde(default)]
    pub id: Option<String>,
    pub build_id: String,
    pub integration_id: String,
    pub arn: String,
    pub build_number: i64,
    pub project_name: String,
    pub project_arn: String,
    pub initiator: String,
    pub source_type: String,
    pub region: String,
    pub status: String,
    #[serde(default)]
    pub last_phase: Option<String>,
    #[serde(default)]
    pub last_phase_status: Option<String>,
    #[serde(default)]
    pub build_complete: Option<bool>,
    #[serde(default)]
    pub build_batch_arn: Option<String>,
    #[serde(default)]
    pub source_location: Option<String>,
    #[serde(default)]
    pub resolved_source_version: Option<String>,
    #[serde(default)]
    pub build_started_at: Option<i64>,
    #[serde(default)]
    pub build_ended_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    /// Test reports written with the build; loaded by `get` only.
    #[serde(default)]
    pub reports: Vec<AwsReport>,
}

impl AwsBuild {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            build_id: row.get("build_id")?,
            integration_id: row.get::<_, i64>("integration_id")?.to_string(),
            arn: row.get("arn")?,
            build_number: row.get("build_number")?,
            project_name: row.get("project_name")?,
            project_arn: row.get("project_arn")?,
            initiator: row.get("initiator")?,
            source_type: row.get("source_type")?,
            region: row.get("region")?,
            status: row.get("status")?,
            last_phase: row.get("last_phase")?,
            last_phase_status: row.get("last_phase_status")?,
            build_complete: row.get("build_complete")?,
            build_batch_arn: row.get("build_batch_arn")?,
            source_location: row.get("source_location")?,
            resolved_source_version: row.get("resolved_source_version")?,
            build_started_at: row.get("build_started_at")?,
            build_ended_at: row.get("build_ended_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            reports: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildsAcross {
    ProjectName,
    LastPhase,
    LastPhaseStatus,
    Status,
    SourceType,
    Initiator,
    Region,
    BuildBatchArn,
    Trend,
}

impl Dimension for BuildsAcross {
    fn name(&self) -> &'static str {
        match self {
            BuildsAcross::ProjectName => "project_name",
            BuildsAcross::LastPhase => "last_phase",
            BuildsAcross::LastPhaseStatus => "last_phase_status",
            BuildsAcross::Status => "status",
            BuildsAcross::SourceType => "source_type",
            BuildsAcross::Initiator => "initiator",
            BuildsAcross::Region => "region",
            BuildsAcross::BuildBatchArn => "build_batch_arn",
            BuildsAcross::Trend => "trend",
        }
    }

    fn group_key(&self, interval: AggInterval) -> GroupKey {
        match self {
            BuildsAcross::Trend => GroupKey::interval("t.build_started_at", interval),
            other => GroupKey::column(format!("t.{}", other.name()), UNKNOWN),
        }
    }

    fn is_trend(&self) -> bool {
        matches!(self, BuildsAcross::Trend)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildsCalculation {
    #[default]
    BuildCount,
    /// Seconds from start to end, or to now for running builds.
    Duration,
}

impl Calculation for BuildsCalculation {
    fn name(&self) -> &'static str {
        match self {
            BuildsCalculation::BuildCount => "build_count",
            BuildsCalculation::Duration => "duration",
        }
    }

    fn measure(&self) -> Measure {
        match self {
            BuildsCalculation::BuildCount => Measure::Count,
            BuildsCalculation::Duration => Measure::stats(
                "COALESCE(t.build_ended_at, CAST(strftime('%s', 'now') AS INTEGER)) - t.build_started_at",
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildsFilter {
    pub project_names: ValueFilter<String>,
    pub last_phases: ValueFilter<String>,
    pub last_phase_statuses: ValueFilter<String>,
    pub statuses: ValueFilter<String>,
    pub source_types: ValueFilter<String>,
    pub initiators: ValueFilter<String>,
    pub build_batch_arns: ValueFilter<String>,
    pub regions: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    pub build_started_at: Option<TimeRange>,
    pub tag_ids: ValueFilter<i64>,
    pub across: Option<BuildsAcross>,
    pub stacks: Vec<BuildsAcross>,
    pub calculation: Option<BuildsCalculation>,
    pub agg_interval: Option<AggInterval>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
