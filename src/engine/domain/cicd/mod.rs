pub mod instances;
pub mod job_runs;
pub mod jobs;

pub use instances::{CiCdInstance, CiCdInstanceService};
pub use job_runs::{CiCdJobRun, CiCdJobRunService, JobRunsAcross, JobRunsCalculation, JobRunsFilter};
pub use jobs::{CiCdJob, CiCdJobService};

#[cfg(test)]
mod instances_test;
