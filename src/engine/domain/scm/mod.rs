pub mod commits;
pub mod pull_requests;

pub use commits::{CommitsAcross, CommitsCalculation, CommitsFilter, ScmCommit, ScmCommitService};
pub use pull_requests::{
    PullRequestsAcross, PullRequestsCalculation, PullRequestsFilter, ScmPullRequest, ScmPullRequestService,
    ScmReview,
};
