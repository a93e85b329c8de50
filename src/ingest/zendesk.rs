use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::domain::zendesk::ZendeskTicket;
use crate::engine::errors::EngineResult;
use crate::engine::identity::IdentityResolver;
use crate::ingest::{epoch, resolve_identity};

/// Ticket enriched with its brand, organization, users and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZendeskTicketPayload {
    pub id: i64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, rename = "type")]
    pub ticket_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub brand: Option<ZendeskNamed>,
    #[serde(default)]
    pub organization: Option<ZendeskNamed>,
    #[serde(default)]
    pub assignee: Option<ZendeskUser>,
    #[serde(default)]
    pub requester: Option<ZendeskUser>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ticket_metric: Option<ZendeskTicketMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZendeskNamed {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZendeskUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZendeskTicketMetric {
    pub assignee_stations: Option<i64>,
    pub reopens: Option<i64>,
    pub solved_at: Option<DateTime<Utc>>,
    pub reply_time_in_minutes: Option<ZendeskMinutes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZendeskMinutes {
    pub calendar: Option<i64>,
}

/// Maps a ticket into the snapshot taken at `ingested_at`.
///
/// Hops are the number of assignee stations; the first response time is the
/// creation time plus the calendar reply time.
pub fn map_ticket(
    payload: &ZendeskTicketPayload,
    integration_id: &str,
    ingested_at: i64,
    resolver: &dyn IdentityResolver,
) -> EngineResult<ZendeskTicket> {
    let handle = |u: &Option<ZendeskUser>| u.as_ref().map(|u| (u.id.to_string(), u.name.clone()));
    let assignee = handle(&payload.assignee);
    let requester = handle(&payload.requester);
    let metric = payload.ticket_metric.clone().unwrap_or_default();

    let mut ticket = ZendeskTicket::new(payload.id, integration_id, ingested_at);
    ticket.subject = payload.subject.clone();
    ticket.ticket_type = payload.ticket_type.clone();
    ticket.priority = payload.priority.clone();
    ticket.status = payload.status.clone();
    ticket.brand = payload.brand.as_ref().map(|b| b.name.clone());
    ticket.organization = payload.organization.as_ref().map(|o| o.name.clone());
    ticket.assignee_id = resolve_identity(
        resolver,
        integration_id,
        assignee.as_ref().map(|(id, name)| (id.as_str(), name.as_str())),
    )?;
    ticket.assignee = assignee.map(|(_, name)| name);
    ticket.requester_id = resolve_identity(
        resolver,
        integration_id,
        requester.as_ref().map(|(id, name)| (id.as_str(), name.as_str())),
    )?;
    ticket.requester = requester.map(|(_, name)| name);
    ticket.hops = metric.assignee_stations;
    ticket.reopens = metric.reopens;
    ticket.ticket_created_at = Some(payload.created_at.timestamp());
    ticket.ticket_updated_at = epoch(payload.updated_at);
    ticket.first_response_at = metric
        .reply_time_in_minutes
        .and_then(|m| m.calendar)
        .map(|minutes| (payload.created_at + Duration::minutes(minutes)).timestamp());
    ticket.solved_at = epoch(metric.solved_at);
    Ok(ticket)
}
