//! Help desk storage - knowledge-base JSON store, ticket CSV store and
//! ticket analytics.
//!
//! Both stores are plain files in the data directory. Every rewrite goes
//! through a temporary file in the same directory followed by an atomic
//! rename, so readers never observe a half-written file.

pub mod analytics;
pub mod knowledge;
pub mod tickets;

mod atomic;

pub use analytics::{DailyCount, TicketAnalytics};
pub use knowledge::KnowledgeStore;
pub use tickets::{NewTicket, TicketStore};
