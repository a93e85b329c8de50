pub mod batches;
pub mod model;
pub mod projects;
pub mod reports;
pub mod service;

pub use batches::{AwsBuildBatch, BuildBatchService, BuildBatchesAcross, BuildBatchesCalculation, BuildBatchesFilter};
pub use model::{AwsBuild, BuildsAcross, BuildsCalculation, BuildsFilter};
pub use projects::{AwsProject, ProjectService, ProjectsFilter};
pub use reports::{AwsReport, AwsTestcase, TestcaseService, TestcasesAcross, TestcasesCalculation, TestcasesFilter};
pub use service::BuildService;
