pub mod model;
pub mod service;

pub use model::{ZendeskAcross, ZendeskCalculation, ZendeskFilter, ZendeskTicket, ZendeskTicketUpdate};
pub use service::ZendeskTicketService;
