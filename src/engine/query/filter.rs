use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An optional inclusion (or exclusion) list.
///
/// `Unfiltered` imposes no restriction. `OneOf(vec![])` is a real filter that
/// matches nothing, so "no filter" and "filter to the empty set" can never be
/// confused. On the wire `null`/absent maps to `Unfiltered` and `[]` to an
/// empty `OneOf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFilter<T> {
    Unfiltered,
    OneOf(Vec<T>),
}

impl<T> ValueFilter<T> {
    pub fn one_of(values: impl IntoIterator<Item = impl Into<T>>) -> Self {
        ValueFilter::OneOf(values.into_iter().map(Into::into).collect())
    }

    pub fn is_unfiltered(&self) -> bool {
        matches!(self, ValueFilter::Unfiltered)
    }

    pub fn values(&self) -> Option<&[T]> {
        match self {
            ValueFilter::Unfiltered => None,
            ValueFilter::OneOf(values) => Some(values),
        }
    }
}

impl<T: PartialEq> ValueFilter<T> {
    pub fn admits(&self, value: &T) -> bool {
        match self {
            ValueFilter::Unfiltered => true,
            ValueFilter::OneOf(values) => values.contains(value),
        }
    }
}

impl<T> Default for ValueFilter<T> {
    fn default() -> Self {
        ValueFilter::Unfiltered
    }
}

impl<T> From<Option<Vec<T>>> for ValueFilter<T> {
    fn from(value: Option<Vec<T>>) -> Self {
        match value {
            None => ValueFilter::Unfiltered,
            Some(values) => ValueFilter::OneOf(values),
        }
    }
}

impl<T> From<ValueFilter<T>> for Option<Vec<T>> {
    fn from(value: ValueFilter<T>) -> Self {
        match value {
            ValueFilter::Unfiltered => None,
            ValueFilter::OneOf(values) => Some(values),
        }
    }
}

impl<T: Serialize> Serialize for ValueFilter<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for ValueFilter<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Vec<T>>::deserialize(deserializer).map(Into::into)
    }
}

/// Epoch-seconds window: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeRange {
    pub fn between(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: i64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start.is_none_or(|s| ts >= s) && self.end.is_none_or(|e| ts < e)
    }
}

/// Operator map for numeric columns. `$gt`/`$lt` are strict; only the
/// `$gte`/`$lte` keys include the bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(rename = "$gt", default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(rename = "$gte", default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(rename = "$lt", default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(rename = "$lte", default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl NumericRange {
    pub fn gt(value: f64) -> Self {
        Self {
            gt: Some(value),
            ..Self::default()
        }
    }

    pub fn lt(value: f64) -> Self {
        Self {
            lt: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }
}
