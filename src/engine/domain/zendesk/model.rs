use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::engine::domain::common::{Calculation, Dimension};
use crate::engine::query::aggregation::{UNASSIGNED, UNKNOWN, UNKNOWN_USER};
use crate::engine::query::sort::SortMap;
use crate::engine::query::{GroupKey, Measure, NumericRange, TimeRange, ValueFilter};
use crate::shared::datetime::AggInterval;

/// Snapshot of a Zendesk ticket. Natural key: (ticket_id, integration_id, ingested_at).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZendeskTicket {
    #[serde(default)]
    pub id: Option<String>,
    pub ticket_id: i64,
    pub integration_id: String,
    pub ingested_at: i64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default, rename = "type")]
    pub ticket_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default)]
    pub requester_id: Option<String>,
    #[serde(default)]
    pub hops: Option<i64>,
    #[serde(default)]
    pub reopens: Option<i64>,
    #[serde(default)]
    pub ticket_created_at: Option<i64>,
    #[serde(default)]
    pub ticket_updated_at: Option<i64>,
    #[serde(default)]
    pub first_response_at: Option<i64>,
    #[serde(default)]
    pub solved_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl ZendeskTicket {
    pub fn new(ticket_id: i64, integration_id: &str, ingested_at: i64) -> Self {
        Self {
            id: None,
            ticket_id,
            integration_id: integration_id.to_string(),
            ingested_at,
            subject: None,
            brand: None,
            ticket_type: None,
            priority: None,
            status: None,
            organization: None,
            assignee: None,
            assignee_id: None,
            requester: None,
            requester_id: None,
            hops: None,
            reopens: None,
            ticket_created_at: None,
            ticket_updated_at: None,
            first_response_at: None,
            solved_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            ticket_id: row.get("ticket_id")?,
            integration_id: row.get::<_, i64>("integration_id")?.to_string(),
            ingested_at: row.get("ingested_at")?,
            subject: row.get("subject")?,
            brand: row.get("brand")?,
            ticket_type: row.get("ticket_type")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            organization: row.get("organization")?,
            assignee: row.get("assignee")?,
            assignee_id: row.get("assignee_id")?,
            requester: row.get("requester")?,
            requester_id: row.get("requester_id")?,
            hops: row.get("hops")?,
            reopens: row.get("reopens")?,
            ticket_created_at: row.get("ticket_created_at")?,
            ticket_updated_at: row.get("ticket_updated_at")?,
            first_response_at: row.get("first_response_at")?,
            solved_at: row.get("solved_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields an update may change. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZendeskTicketUpdate {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub assignee_id: Option<String>,
    pub hops: Option<i64>,
    pub reopens: Option<i64>,
    pub ticket_updated_at: Option<i64>,
    pub first_response_at: Option<i64>,
    pub solved_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZendeskAcross {
    Brand,
    Type,
    Priority,
    Status,
    Organization,
    Assignee,
    Requester,
    Trend,
}

impl Dimension for ZendeskAcross {
    fn name(&self) -> &'static str {
        match self {
            ZendeskAcross::Brand => "brand",
            ZendeskAcross::Type => "type",
            ZendeskAcross::Priority => "priority",
            ZendeskAcross::Status => "status",
            ZendeskAcross::Organization => "organization",
            ZendeskAcross::Assignee => "assignee",
            ZendeskAcross::Requester => "requester",
            ZendeskAcross::Trend => "trend",
        }
    }

    fn group_key(&self, interval: AggInterval) -> GroupKey {
        match self {
            ZendeskAcross::Brand => GroupKey::column("t.brand", UNKNOWN),
            ZendeskAcross::Type => GroupKey::column("t.ticket_type", UNKNOWN),
            ZendeskAcross::Priority => GroupKey::column("t.priority", UNKNOWN),
            ZendeskAcross::Status => GroupKey::column("t.status", UNKNOWN),
            ZendeskAcross::Organization => GroupKey::column("t.organization", UNKNOWN),
            ZendeskAcross::Assignee => GroupKey::column("t.assignee_id", UNASSIGNED),
            ZendeskAcross::Requester => GroupKey::column("t.requester_id", UNKNOWN_USER),
            ZendeskAcross::Trend => GroupKey::interval("t.ticket_created_at", interval),
        }
    }

    fn is_trend(&self) -> bool {
        matches!(self, ZendeskAcross::Trend)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZendeskCalculation {
    #[default]
    TicketCount,
    Hops,
    Reopens,
    ResponseTime,
    ResolutionTime,
}

impl Calculation for ZendeskCalculation {
    fn name(&self) -> &'static str {
        match self {
            ZendeskCalculation::TicketCount => "ticket_count",
            ZendeskCalculation::Hops => "hops",
            ZendeskCalculation::Reopens => "reopens",
            ZendeskCalculation::ResponseTime => "response_time",
            ZendeskCalculation::ResolutionTime => "resolution_time",
        }
    }

    fn measure(&self) -> Measure {
        match self {
            ZendeskCalculation::TicketCount => Measure::Count,
            ZendeskCalculation::Hops => Measure::stats("t.hops"),
            ZendeskCalculation::Reopens => Measure::stats("t.reopens"),
            ZendeskCalculation::ResponseTime => Measure::stats("t.first_response_at - t.ticket_created_at"),
            ZendeskCalculation::ResolutionTime => Measure::stats("t.solved_at - t.ticket_created_at"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZendeskFilter {
    pub ticket_ids: ValueFilter<i64>,
    pub brands: ValueFilter<String>,
    pub types: ValueFilter<String>,
    pub priorities: ValueFilter<String>,
    pub statuses: ValueFilter<String>,
    pub organizations: ValueFilter<String>,
    pub assignees: ValueFilter<String>,
    pub requesters: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    pub ingested_at: Option<i64>,
    pub ticket_created_at: Option<TimeRange>,
    pub hops: Option<NumericRange>,
    pub tag_ids: ValueFilter<i64>,
    pub across: Option<ZendeskAcross>,
    pub stacks: Vec<ZendeskAcross>,
    pub calculation: Option<ZendeskCalculation>,
    pub agg_interval: Option<AggInterval>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
