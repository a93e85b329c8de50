use crate::engine::domain::jira::JiraIssue;
use crate::test_helpers::factories::TimestampFactory;

pub struct JiraIssueFactory {
    issue: JiraIssue,
}

impl JiraIssueFactory {
    pub fn new(integration_id: &str, ingested_at: i64) -> Self {
        let created = TimestampFactory::utc_datetime(2024, 1, 2, 9, 0, 0);
        let mut issue = JiraIssue::new(
            &format!("LENS-{}", rand::random::<u16>()),
            integration_id,
            ingested_at,
        );
        issue.project = Some("LENS".into());
        issue.summary = Some("Fix the flaky importer".into());
        issue.issue_type = Some("Bug".into());
        issue.priority = Some("Medium".into());
        issue.status = Some("To Do".into());
        issue.story_points = Some(2.0);
        issue.issue_created_at = Some(created);
        Self { issue }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.issue.issue_key = key.to_string();
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.issue.status = Some(status.to_string());
        self
    }

    pub fn with_priority(mut self, priority: &str) -> Self {
        self.issue.priority = Some(priority.to_string());
        self
    }

    pub fn with_assignee(mut self, name: &str, identity_id: &str) -> Self {
        self.issue.assignee = Some(name.to_string());
        self.issue.assignee_id = Some(identity_id.to_string());
        self
    }

    pub fn with_story_points(mut self, points: Option<f64>) -> Self {
        self.issue.story_points = points;
        self
    }

    pub fn created_at(mut self, ts: i64) -> Self {
        self.issue.issue_created_at = Some(ts);
        self
    }

    pub fn resolved_at(mut self, ts: i64) -> Self {
        self.issue.issue_resolved_at = Some(ts);
        self
    }

    pub fn create(self) -> JiraIssue {
        self.issue
    }

    /// Issues `LENS-1..=count` of the same snapshot.
    pub fn create_list(self, count: usize) -> Vec<JiraIssue> {
        (1..=count)
            .map(|n| {
                let mut issue = self.issue.clone();
                issue.issue_key = format!("LENS-{n}");
                issue
            })
            .collect()
    }
}
