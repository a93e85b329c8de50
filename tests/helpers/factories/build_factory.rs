use crate::engine::domain::builds::{AwsBuild, AwsReport, AwsTestcase};
use crate::test_helpers::factories::TimestampFactory;

pub struct BuildFactory {
    build: AwsBuild,
}

impl BuildFactory {
    pub fn new(integration_id: &str) -> Self {
        let build_id = format!("lens-api:{:08x}", rand::random::<u32>());
        let started = TimestampFactory::utc_datetime(2024, 1, 8, 9, 0, 0);
        Self {
            build: AwsBuild {
                id: None,
                arn: format!("arn:aws:codebuild:us-east-1:123456789012:build/{build_id}"),
                build_id,
                integration_id: integration_id.to_string(),
                build_number: 1,
                project_name: "lens-api".into(),
                project_arn: "arn:aws:codebuild:us-east-1:123456789012:project/lens-api".into(),
                initiator: "GitHub-Hookshot/0c4f2b1".into(),
                source_type: "GITHUB".into(),
                region: "us-east-1".into(),
                status: "SUCCEEDED".into(),
                last_phase: Some("COMPLETED".into()),
                last_phase_status: None,
                build_complete: Some(true),
                build_batch_arn: None,
                source_location: Some("https://github.com/lens/lens-api.git".into()),
                resolved_source_version: None,
                build_started_at: Some(started),
                build_ended_at: Some(TimestampFactory::plus_minutes(started, 5)),
                created_at: None,
                updated_at: None,
                reports: Vec::new(),
            },
        }
    }

    pub fn with_build_id(mut self, build_id: &str) -> Self {
        self.build.build_id = build_id.to_string();
        self
    }

    pub fn with_project(mut self, project: &str) -> Self {
        self.build.project_name = project.to_string();
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.build.status = status.to_string();
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.build.region = region.to_string();
        self
    }

    pub fn with_number(mut self, number: i64) -> Self {
        self.build.build_number = number;
        self
    }

    pub fn started_at(mut self, ts: i64) -> Self {
        self.build.build_started_at = Some(ts);
        self
    }

    pub fn ended_at(mut self, ts: Option<i64>) -> Self {
        self.build.build_ended_at = ts;
        self
    }

    /// Attaches a unit test report named `<project>-unit` holding the given
    /// (name, status, duration ms) testcases.
    pub fn with_report(mut self, testcases: &[(&str, &str, i64)]) -> Self {
        let arn = format!(
            "arn:aws:codebuild:{}:123456789012:report/{}-unit:{}",
            self.build.region, self.build.project_name, self.build.build_id
        );
        self.build.reports.push(AwsReport {
            id: None,
            arn: arn.clone(),
            execution_id: self.build.arn.clone(),
            report_type: "TEST".into(),
            report_group_arn: None,
            report_group_name: Some(format!("{}-unit", self.build.project_name)),
            status: Some("SUCCEEDED".into()),
            duration: Some(testcases.iter().map(|(_, _, ms)| ms).sum()),
            report_created_at: self.build.build_ended_at,
            report_expired_at: None,
            testcases: testcases
                .iter()
                .map(|(name, status, ms)| AwsTestcase {
                    id: None,
                    name: name.to_string(),
                    report_arn: arn.clone(),
                    prefix: None,
                    status: status.to_string(),
                    duration: Some(*ms),
                    expired: None,
                    project_name: None,
                    region: None,
                })
                .collect(),
        });
        self
    }

    pub fn create(self) -> AwsBuild {
        self.build
    }

    /// Distinct builds numbered from 1, one hour apart.
    pub fn create_list(self, count: usize) -> Vec<AwsBuild> {
        (0..count)
            .map(|i| {
                let mut build = self.build.clone();
                build.build_id = format!("{}:{i}", build.project_name);
                build.build_number = i as i64 + 1;
                build.build_started_at = build
                    .build_started_at
                    .map(|ts| TimestampFactory::plus_hours(ts, i as i64));
                build.build_ended_at = build
                    .build_ended_at
                    .map(|ts| TimestampFactory::plus_hours(ts, i as i64));
                build
            })
            .collect()
    }
}
