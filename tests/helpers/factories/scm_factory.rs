use crate::engine::domain::scm::{ScmCommit, ScmPullRequest, ScmReview};
use crate::test_helpers::factories::TimestampFactory;

pub struct PullRequestFactory {
    pr: ScmPullRequest,
}

impl PullRequestFactory {
    pub fn new(integration_id: &str, repo_id: &str) -> Self {
        let mut pr = ScmPullRequest::new(integration_id, repo_id, rand::random::<u16>() as i64 + 1);
        pr.title = Some("Add stacked group-by".into());
        pr.state = Some("open".into());
        pr.source_branch = Some("feature/stacks".into());
        pr.target_branch = Some("main".into());
        pr.additions = Some(120);
        pr.deletions = Some(14);
        pr.pr_created_at = Some(TimestampFactory::utc_datetime(2024, 3, 4, 10, 0, 0));
        Self { pr }
    }

    pub fn with_number(mut self, number: i64) -> Self {
        self.pr.number = number;
        self
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.pr.state = Some(state.to_string());
        self
    }

    pub fn with_creator(mut self, login: &str, identity_id: &str) -> Self {
        self.pr.creator = Some(login.to_string());
        self.pr.creator_id = Some(identity_id.to_string());
        self
    }

    pub fn created_at(mut self, ts: i64) -> Self {
        self.pr.pr_created_at = Some(ts);
        self
    }

    pub fn merged_at(mut self, ts: i64) -> Self {
        self.pr.state = Some("merged".into());
        self.pr.pr_merged_at = Some(ts);
        self
    }

    pub fn with_review(mut self, review_id: &str, reviewer_id: &str, state: &str) -> Self {
        self.pr.reviews.push(ScmReview {
            review_id: review_id.to_string(),
            reviewer: Some(format!("login-{reviewer_id}")),
            reviewer_id: Some(reviewer_id.to_string()),
            state: Some(state.to_string()),
            submitted_at: self.pr.pr_created_at.map(|ts| TimestampFactory::plus_hours(ts, 2)),
        });
        self
    }

    pub fn create(self) -> ScmPullRequest {
        self.pr
    }
}

pub struct CommitFactory {
    commit: ScmCommit,
}

impl CommitFactory {
    pub fn new(integration_id: &str, repo_id: &str) -> Self {
        let sha = format!("{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>());
        let mut commit = ScmCommit::new(integration_id, repo_id, &sha);
        commit.message = Some("Tighten tenant validation".into());
        commit.additions = Some(10);
        commit.deletions = Some(2);
        commit.files_changed = Some(1);
        commit.committed_at = Some(TimestampFactory::utc_datetime(2024, 3, 4, 12, 0, 0));
        Self { commit }
    }

    pub fn with_sha(mut self, sha: &str) -> Self {
        self.commit.commit_sha = sha.to_string();
        self
    }

    pub fn with_author(mut self, login: &str, identity_id: &str) -> Self {
        self.commit.author = Some(login.to_string());
        self.commit.author_id = Some(identity_id.to_string());
        self
    }

    pub fn with_lines(mut self, additions: i64, deletions: i64) -> Self {
        self.commit.additions = Some(additions);
        self.commit.deletions = Some(deletions);
        self
    }

    pub fn committed_at(mut self, ts: i64) -> Self {
        self.commit.committed_at = Some(ts);
        self
    }

    pub fn create(self) -> ScmCommit {
        self.commit
    }
}
