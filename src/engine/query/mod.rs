pub mod aggregation;
pub mod conditions;
pub mod executor;
pub mod filter;
pub mod page;
pub mod sort;

pub use aggregation::{
    AggregationQuery, AggregationResult, GroupKey, GroupSort, Measure, SnapshotDedup, SortTarget,
};
pub use conditions::Conditions;
pub use filter::{NumericRange, TimeRange, ValueFilter};
pub use page::{Page, QueryLimits};
pub use sort::SortingOrder;

#[cfg(test)]
mod aggregation_test;
#[cfg(test)]
mod executor_test;
