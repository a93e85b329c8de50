use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortingOrder {
    #[serde(alias = "ASC", alias = "Asc")]
    Asc,
    #[serde(alias = "DESC", alias = "Desc")]
    Desc,
}

impl SortingOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortingOrder::Asc => "ASC",
            SortingOrder::Desc => "DESC",
        }
    }
}

/// Ordered `field -> direction` map; only the first entry is honoured.
pub type SortMap = IndexMap<String, SortingOrder>;

pub fn first_sort(sort: &SortMap) -> Option<(&str, SortingOrder)> {
    sort.first().map(|(field, order)| (field.as_str(), *order))
}
