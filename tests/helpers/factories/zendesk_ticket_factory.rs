use crate::engine::domain::zendesk::ZendeskTicket;
use crate::test_helpers::factories::TimestampFactory;

pub struct ZendeskTicketFactory {
    ticket: ZendeskTicket,
}

impl ZendeskTicketFactory {
    pub fn new(integration_id: &str, ingested_at: i64) -> Self {
        let created = TimestampFactory::utc_datetime(2024, 2, 1, 8, 0, 0);
        let mut ticket = ZendeskTicket::new(rand::random::<u32>() as i64, integration_id, ingested_at);
        ticket.subject = Some("Cannot export report".into());
        ticket.brand = Some("Lens".into());
        ticket.ticket_type = Some("incident".into());
        ticket.priority = Some("normal".into());
        ticket.status = Some("open".into());
        ticket.hops = Some(1);
        ticket.reopens = Some(0);
        ticket.ticket_created_at = Some(created);
        Self { ticket }
    }

    pub fn with_ticket_id(mut self, ticket_id: i64) -> Self {
        self.ticket.ticket_id = ticket_id;
        self
    }

    pub fn with_brand(mut self, brand: &str) -> Self {
        self.ticket.brand = Some(brand.to_string());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.ticket.status = Some(status.to_string());
        self
    }

    pub fn with_assignee(mut self, name: &str, identity_id: &str) -> Self {
        self.ticket.assignee = Some(name.to_string());
        self.ticket.assignee_id = Some(identity_id.to_string());
        self
    }

    pub fn with_hops(mut self, hops: i64) -> Self {
        self.ticket.hops = Some(hops);
        self
    }

    pub fn created_at(mut self, ts: i64) -> Self {
        self.ticket.ticket_created_at = Some(ts);
        self
    }

    pub fn solved_at(mut self, ts: i64) -> Self {
        self.ticket.solved_at = Some(ts);
        self
    }

    pub fn create(self) -> ZendeskTicket {
        self.ticket
    }
}
