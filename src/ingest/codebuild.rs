use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::domain::builds::{AwsBuild, AwsBuildBatch, AwsProject, AwsReport, AwsTestcase};
use crate::engine::errors::{EngineError, EngineResult};
use crate::ingest::epoch;

/// `BatchGetBuilds` entry as returned by the CodeBuild API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBuildBuild {
    pub id: String,
    pub arn: String,
    pub build_number: i64,
    pub project_name: String,
    pub build_status: String,
    #[serde(default)]
    pub initiator: Option<String>,
    #[serde(default)]
    pub build_complete: Option<bool>,
    #[serde(default)]
    pub build_batch_arn: Option<String>,
    #[serde(default)]
    pub resolved_source_version: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<CodeBuildSource>,
    #[serde(default)]
    pub phases: Vec<CodeBuildPhase>,
    /// Reports from `BatchGetReports` joined with their `DescribeTestCases`
    /// pages.
    #[serde(default)]
    pub reports: Vec<CodeBuildReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBuildReport {
    pub arn: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub execution_id: String,
    #[serde(default)]
    pub report_group_arn: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired: Option<DateTime<Utc>>,
    #[serde(default)]
    pub test_summary: Option<CodeBuildTestSummary>,
    #[serde(default)]
    pub test_cases: Vec<CodeBuildTestCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBuildTestSummary {
    #[serde(default)]
    pub duration_in_nano_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBuildTestCase {
    pub report_arn: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub duration_in_nano_seconds: Option<i64>,
    #[serde(default)]
    pub expired: Option<DateTime<Utc>>,
}

/// `BatchGetBuildBatches` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBuildBuildBatch {
    pub id: String,
    pub arn: String,
    pub project_name: String,
    pub build_batch_status: String,
    #[serde(default)]
    pub build_batch_number: Option<i64>,
    #[serde(default)]
    pub initiator: Option<String>,
    #[serde(default)]
    pub complete: Option<bool>,
    #[serde(default)]
    pub source_version: Option<String>,
    #[serde(default)]
    pub resolved_source_version: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<CodeBuildSource>,
    #[serde(default)]
    pub phases: Vec<CodeBuildPhase>,
}

/// `BatchGetProjects` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBuildProject {
    pub name: String,
    pub arn: String,
    #[serde(default)]
    pub source: Option<CodeBuildSource>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBuildSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBuildPhase {
    pub phase_type: String,
    #[serde(default)]
    pub phase_status: Option<String>,
}

/// Maps a CodeBuild build onto a row of `integration_id`.
///
/// Region and account come from the build ARN
/// (`arn:aws:codebuild:<region>:<account>:build/<id>`); the last phase is the
/// final entry of the phase list.
pub fn map_build(build: &CodeBuildBuild, integration_id: &str) -> EngineResult<AwsBuild> {
    let (region, account) = region_and_account(&build.arn)?;
    let last_phase = build.phases.last();

    Ok(AwsBuild {
        id: None,
        build_id: build.id.clone(),
        integration_id: integration_id.to_string(),
        arn: build.arn.clone(),
        build_number: build.build_number,
        project_name: build.project_name.clone(),
        project_arn: format!(
            "arn:aws:codebuild:{region}:{account}:project/{}",
            build.project_name
        ),
        initiator: build.initiator.clone().unwrap_or_default(),
        source_type: build
            .source
            .as_ref()
            .map(|s| s.source_type.clone())
            .unwrap_or_default(),
        region: region.to_string(),
        status: build.build_status.clone(),
        last_phase: last_phase.map(|p| p.phase_type.clone()),
        last_phase_status: last_phase.and_then(|p| p.phase_status.clone()),
        build_complete: build.build_complete,
        build_batch_arn: build.build_batch_arn.clone(),
        source_location: build.source.as_ref().and_then(|s| s.location.clone()),
        resolved_source_version: build.resolved_source_version.clone(),
        build_started_at: epoch(build.start_time),
        build_ended_at: epoch(build.end_time),
        created_at: None,
        updated_at: None,
        reports: build.reports.iter().map(map_report).collect(),
    })
}

fn map_report(report: &CodeBuildReport) -> AwsReport {
    AwsReport {
        id: None,
        arn: report.arn.clone(),
        execution_id: report.execution_id.clone(),
        report_type: report.report_type.clone(),
        report_group_arn: report.report_group_arn.clone(),
        report_group_name: report
            .report_group_arn
            .as_deref()
            .and_then(|arn| arn.rsplit_once(":report-group/"))
            .map(|(_, name)| name.to_string()),
        status: report.status.clone(),
        duration: report
            .test_summary
            .as_ref()
            .and_then(|s| s.duration_in_nano_seconds)
            .map(nanos_to_millis),
        report_created_at: epoch(report.created),
        report_expired_at: epoch(report.expired),
        testcases: report
            .test_cases
            .iter()
            .map(|case| AwsTestcase {
                id: None,
                name: case.name.clone(),
                report_arn: case.report_arn.clone(),
                prefix: case.prefix.clone(),
                status: case.status.clone(),
                duration: case.duration_in_nano_seconds.map(nanos_to_millis),
                expired: epoch(case.expired),
                project_name: None,
                region: None,
            })
            .collect(),
    }
}

/// Maps a batch build; region and project arn come from the batch ARN like
/// for single builds.
pub fn map_build_batch(batch: &CodeBuildBuildBatch, integration_id: &str) -> EngineResult<AwsBuildBatch> {
    let (region, account) = region_and_account(&batch.arn)?;
    let last_phase = batch.phases.last();

    Ok(AwsBuildBatch {
        id: None,
        build_batch_id: batch.id.clone(),
        integration_id: integration_id.to_string(),
        arn: batch.arn.clone(),
        build_batch_number: batch.build_batch_number,
        project_name: batch.project_name.clone(),
        project_arn: format!(
            "arn:aws:codebuild:{region}:{account}:project/{}",
            batch.project_name
        ),
        initiator: batch.initiator.clone(),
        source_type: batch.source.as_ref().map(|s| s.source_type.clone()),
        region: region.to_string(),
        status: batch.build_batch_status.clone(),
        last_phase: last_phase.map(|p| p.phase_type.clone()),
        last_phase_status: last_phase.and_then(|p| p.phase_status.clone()),
        build_batch_complete: batch.complete,
        source_version: batch.source_version.clone(),
        resolved_source_version: batch.resolved_source_version.clone(),
        source_location: batch.source.as_ref().and_then(|s| s.location.clone()),
        build_batch_started_at: epoch(batch.start_time),
        build_batch_ended_at: epoch(batch.end_time),
        created_at: None,
        updated_at: None,
    })
}

pub fn map_project(project: &CodeBuildProject, integration_id: &str) -> EngineResult<AwsProject> {
    let (region, _) = region_and_account(&project.arn)?;
    Ok(AwsProject {
        id: None,
        arn: project.arn.clone(),
        integration_id: integration_id.to_string(),
        name: project.name.clone(),
        source_type: project.source.as_ref().map(|s| s.source_type.clone()),
        source_location: project.source.as_ref().and_then(|s| s.location.clone()),
        region: region.to_string(),
        project_created_at: epoch(project.created),
        project_modified_at: epoch(project.last_modified),
        created_at: None,
        updated_at: None,
    })
}

/// `arn:aws:codebuild:<region>:<account>:<resource>`
fn region_and_account(arn: &str) -> EngineResult<(&str, &str)> {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    match parts.as_slice() {
        ["arn", _, "codebuild", region, account, _] if !region.is_empty() => Ok((*region, *account)),
        _ => Err(EngineError::validation(format!("Malformed CodeBuild ARN: {arn}"))),
    }
}

fn nanos_to_millis(nanos: i64) -> i64 {
    nanos / 1_000_000
}
