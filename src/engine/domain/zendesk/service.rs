use rusqlite::{OptionalExtension, named_params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::domain::common::{self, GroupRequest};
use crate::engine::domain::zendesk::model::{ZendeskFilter, ZendeskTicket, ZendeskTicketUpdate};
use crate::engine::errors::EngineResult;
use crate::engine::integrations::{parse_integration_id, parse_integration_ids};
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::{AggregationQuery, AggregationResult, Conditions, GroupKey, Page, SortingOrder};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::engine::tags::TagItemType;
use crate::shared::datetime::now_epoch_seconds;
use crate::shared::response::DbListResponse;

pub const ZENDESK_TICKETS_TABLE: &str = "zendesk_tickets";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("ticket_created_at", "t.ticket_created_at"),
    ("ticket_updated_at", "t.ticket_updated_at"),
    ("ticket_id", "t.ticket_id"),
    ("hops", "t.hops"),
    ("priority", "t.priority"),
    ("status", "t.status"),
];

pub struct ZendeskTicketService {
    db: Database,
}

impl ZendeskTicketService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, tenant: &Tenant, ticket: &ZendeskTicket) -> EngineResult<String> {
        let integration_id = parse_integration_id(&ticket.integration_id)?;
        let table = tenant.table(ZENDESK_TICKETS_TABLE);
        let now = now_epoch_seconds();
        let sql = format!(
            "INSERT INTO {table} (id, ticket_id, integration_id, ingested_at, subject, brand, ticket_type, priority, \
                status, organization, assignee, assignee_id, requester, requester_id, hops, reopens, \
                ticket_created_at, ticket_updated_at, first_response_at, solved_at, created_at, updated_at) \
             VALUES (:id, :ticket_id, :integration_id, :ingested_at, :subject, :brand, :ticket_type, :priority, \
                :status, :organization, :assignee, :assignee_id, :requester, :requester_id, :hops, :reopens, \
                :created, :updated, :first_response, :solved, :created_at, :now) \
             ON CONFLICT (ticket_id, integration_id, ingested_at) DO UPDATE SET \
                subject = COALESCE(excluded.subject, subject), \
                brand = COALESCE(excluded.brand, brand), \
                ticket_type = COALESCE(excluded.ticket_type, ticket_type), \
                priority = COALESCE(excluded.priority, priority), \
                status = COALESCE(excluded.status, status), \
                organization = COALESCE(excluded.organization, organization), \
                assignee = COALESCE(excluded.assignee, assignee), \
                assignee_id = COALESCE(excluded.assignee_id, assignee_id), \
                requester_id = COALESCE(excluded.requester_id, requester_id), \
                hops = COALESCE(excluded.hops, hops), \
                reopens = COALESCE(excluded.reopens, reopens), \
                ticket_updated_at = COALESCE(excluded.ticket_updated_at, ticket_updated_at), \
                first_response_at = COALESCE(excluded.first_response_at, first_response_at), \
                solved_at = COALESCE(excluded.solved_at, solved_at), \
                updated_at = excluded.updated_at \
             RETURNING id"
        );
        let id: String = self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &sql,
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":ticket_id": ticket.ticket_id,
                    ":integration_id": integration_id,
                    ":ingested_at": ticket.ingested_at,
                    ":subject": ticket.subject,
                    ":brand": ticket.brand,
                    ":ticket_type": ticket.ticket_type,
                    ":priority": ticket.priority,
                    ":status": ticket.status,
                    ":organization": ticket.organization,
                    ":assignee": ticket.assignee,
                    ":assignee_id": ticket.assignee_id,
                    ":requester": ticket.requester,
                    ":requester_id": ticket.requester_id,
                    ":hops": ticket.hops,
                    ":reopens": ticket.reopens,
                    ":created": ticket.ticket_created_at,
                    ":updated": ticket.ticket_updated_at,
                    ":first_response": ticket.first_response_at,
                    ":solved": ticket.solved_at,
                    ":created_at": ticket.created_at.unwrap_or(now),
                    ":now": now,
                },
                |row| row.get(0),
            )?)
        })?;
        debug!(target: "lens_db::zendesk", tenant = %tenant, ticket_id = ticket.ticket_id, "Stored ticket snapshot");
        Ok(id)
    }

    /// Applies the mutable fields present in `update`. Returns false when no
    /// ticket has that id.
    pub fn update(&self, tenant: &Tenant, id: &str, update: &ZendeskTicketUpdate) -> EngineResult<bool> {
        let table = tenant.table(ZENDESK_TICKETS_TABLE);
        let updated = self.db.with_tenant(tenant, |conn| {
            Ok(conn.execute(
                &format!(
                    "UPDATE {table} SET \
                        status = COALESCE(:status, status), \
                        priority = COALESCE(:priority, priority), \
                        assignee = COALESCE(:assignee, assignee), \
                        assignee_id = COALESCE(:assignee_id, assignee_id), \
                        hops = COALESCE(:hops, hops), \
                        reopens = COALESCE(:reopens, reopens), \
                        ticket_updated_at = COALESCE(:ticket_updated_at, ticket_updated_at), \
                        first_response_at = COALESCE(:first_response_at, first_response_at), \
                        solved_at = COALESCE(:solved_at, solved_at), \
                        updated_at = :now \
                     WHERE id = :id"
                ),
                named_params! {
                    ":status": update.status,
                    ":priority": update.priority,
                    ":assignee": update.assignee,
                    ":assignee_id": update.assignee_id,
                    ":hops": update.hops,
                    ":reopens": update.reopens,
                    ":ticket_updated_at": update.ticket_updated_at,
                    ":first_response_at": update.first_response_at,
                    ":solved_at": update.solved_at,
                    ":now": now_epoch_seconds(),
                    ":id": id,
                },
            )?)
        })?;
        Ok(updated > 0)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<ZendeskTicket>> {
        let table = tenant.table(ZENDESK_TICKETS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    ZendeskTicket::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_by_ticket_id(
        &self,
        tenant: &Tenant,
        ticket_id: i64,
        integration_id: &str,
        ingested_at: i64,
    ) -> EngineResult<Option<ZendeskTicket>> {
        let integration_id = parse_integration_id(integration_id)?;
        let table = tenant.table(ZENDESK_TICKETS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT * FROM {table} WHERE ticket_id = ?1 AND integration_id = ?2 AND ingested_at = ?3"
                    ),
                    rusqlite::params![ticket_id, integration_id, ingested_at],
                    ZendeskTicket::from_row,
                )
                .optional()?)
        })
    }

    pub fn list(&self, tenant: &Tenant, page: Option<u32>, page_size: Option<u32>) -> EngineResult<DbListResponse<ZendeskTicket>> {
        self.list_by_filter(
            tenant,
            &ZendeskFilter {
                page,
                page_size,
                ..ZendeskFilter::default()
            },
        )
    }

    pub fn list_by_filter(&self, tenant: &Tenant, filter: &ZendeskFilter) -> EngineResult<DbListResponse<ZendeskTicket>> {
        let conditions = self.conditions(tenant, filter)?;
        let (order_by, order) = common::list_sort(
            &filter.sort,
            LIST_SORT_COLUMNS,
            ("t.ticket_created_at", SortingOrder::Desc),
        );
        let query = ListQuery {
            from: self.from(tenant),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, ZendeskTicket::from_row))
    }

    pub fn group_by_and_calculate(
        &self,
        tenant: &Tenant,
        filter: &ZendeskFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, _) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::group_by_and_calculate(conn, &query))
    }

    pub fn stacked_group_by(
        &self,
        tenant: &Tenant,
        filter: &ZendeskFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, stacks) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, ZENDESK_TICKETS_TABLE, id)
    }

    pub fn bulk_delete(&self, tenant: &Tenant, ids: &[String]) -> EngineResult<usize> {
        let deleted = common::bulk_delete(&self.db, tenant, ZENDESK_TICKETS_TABLE, ids)?;
        info!(target: "lens_db::zendesk", tenant = %tenant, requested = ids.len(), deleted, "Bulk deleted tickets");
        Ok(deleted)
    }

    fn from(&self, tenant: &Tenant) -> String {
        format!("{} AS t", tenant.table(ZENDESK_TICKETS_TABLE))
    }

    fn aggregation(&self, tenant: &Tenant, filter: &ZendeskFilter) -> EngineResult<(AggregationQuery, Vec<GroupKey>)> {
        let request = GroupRequest {
            across: filter.across,
            stacks: &filter.stacks,
            calculation: filter.calculation.unwrap_or_default(),
            interval: filter.agg_interval,
            sort: &filter.sort,
            page: filter.page,
            page_size: filter.page_size,
        };
        let conditions = self.conditions(tenant, filter)?;
        let query = request.build(self.from(tenant), conditions, self.db.limits())?;
        Ok((query, request.stack_keys()?))
    }

    /// Every read is pinned to a single snapshot.
    fn conditions(&self, tenant: &Tenant, filter: &ZendeskFilter) -> EngineResult<Conditions> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.ticket_id", &filter.ticket_ids)
            .one_of("t.brand", &filter.brands)
            .one_of("t.ticket_type", &filter.types)
            .one_of("t.priority", &filter.priorities)
            .one_of("t.status", &filter.statuses)
            .one_of("t.organization", &filter.organizations)
            .identity_one_of("t.assignee_id", &filter.assignees)
            .identity_one_of("t.requester_id", &filter.requesters)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?)
            .time_range("t.ticket_created_at", filter.ticket_created_at.as_ref())
            .numeric_range("t.hops", filter.hops.as_ref())
            .tagged("t.id", TagItemType::ZendeskTicket.as_str(), &filter.tag_ids);
        common::snapshot(&mut conditions, ZENDESK_TICKETS_TABLE, filter.ingested_at);
        Ok(conditions)
    }
}

impl DatabaseService for ZendeskTicketService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{ZENDESK_TICKETS_TABLE} (
                id TEXT PRIMARY KEY,
                ticket_id INTEGER NOT NULL,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                ingested_at INTEGER NOT NULL,
                subject TEXT,
                brand TEXT,
                ticket_type TEXT,
                priority TEXT,
                status TEXT,
                organization TEXT,
                assignee TEXT,
                assignee_id TEXT,
                requester TEXT,
                requester_id TEXT,
                hops INTEGER,
                reopens INTEGER,
                ticket_created_at INTEGER,
                ticket_updated_at INTEGER,
                first_response_at INTEGER,
                solved_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CONSTRAINT uniq_zendesk_tickets_snapshot UNIQUE (ticket_id, integration_id, ingested_at)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_zendesk_tickets_ingested
                ON {ZENDESK_TICKETS_TABLE} (integration_id, ingested_at);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
