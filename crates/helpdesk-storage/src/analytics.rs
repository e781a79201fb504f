//! Ticket analytics: counts by status, priority and day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use helpdesk_core::error::Result;
use helpdesk_core::types::{Ticket, TicketPriority};
use serde::{Deserialize, Serialize};

use crate::tickets::TicketStore;

/// Number of tickets created on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Summary of the ticket store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketAnalytics {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    /// Keyed by status label.
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<TicketPriority, usize>,
    /// Tickets with a readable timestamp, oldest day first.
    pub per_day: Vec<DailyCount>,
    pub open_tickets: Vec<Ticket>,
}

impl TicketAnalytics {
    pub fn from_tickets(tickets: &[Ticket]) -> Self {
        let mut by_status = BTreeMap::new();
        let mut by_priority = BTreeMap::new();
        let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();

        for ticket in tickets {
            *by_status.entry(ticket.status.label().to_string()).or_insert(0) += 1;
            *by_priority.entry(ticket.priority).or_insert(0) += 1;
            if let Some(ts) = ticket.timestamp {
                *days.entry(ts.date()).or_insert(0) += 1;
            }
        }

        let open_tickets: Vec<Ticket> = tickets
            .iter()
            .filter(|t| t.status.is_open())
            .cloned()
            .collect();

        Self {
            total: tickets.len(),
            open: open_tickets.len(),
            closed: tickets.iter().filter(|t| t.status.is_closed()).count(),
            by_status,
            by_priority,
            per_day: days
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
            open_tickets,
        }
    }

    pub fn load(store: &TicketStore) -> Result<Self> {
        Ok(Self::from_tickets(&store.list()?))
    }

    /// Plain-text report for the terminal.
    pub fn render_text(&self) -> String {
        if self.total == 0 {
            return "No tickets have been submitted yet.".to_string();
        }

        let mut lines = vec![
            format!("Total tickets:  {}", self.total),
            format!("Open tickets:   {}", self.open),
            format!("Closed tickets: {}", self.closed),
            String::new(),
            "By status:".to_string(),
        ];
        for (status, count) in &self.by_status {
            lines.push(format!("  {:<12} {}", status, count));
        }
        lines.push("By priority:".to_string());
        for (priority, count) in &self.by_priority {
            lines.push(format!("  {:<12} {}", priority.as_str(), count));
        }
        if !self.per_day.is_empty() {
            lines.push("Per day:".to_string());
            for day in &self.per_day {
                lines.push(format!("  {}   {}", day.date, day.count));
            }
        }
        if self.open_tickets.is_empty() {
            lines.push("All tickets are closed.".to_string());
        } else {
            lines.push("Open tickets:".to_string());
            for ticket in &self.open_tickets {
                lines.push(format!(
                    "  [{}] {}: {}",
                    ticket.priority, ticket.name, ticket.issue
                ));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use helpdesk_core::types::TicketStatus;

    fn ticket(ts: Option<&str>, priority: TicketPriority, status: TicketStatus) -> Ticket {
        Ticket {
            timestamp: ts.map(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()),
            name: "alice".to_string(),
            issue: "issue".to_string(),
            priority,
            status,
        }
    }

    fn sample() -> Vec<Ticket> {
        vec![
            ticket(Some("2026-03-02 09:00:00"), TicketPriority::High, TicketStatus::Open),
            ticket(Some("2026-03-01 12:00:00"), TicketPriority::Low, TicketStatus::Closed),
            ticket(Some("2026-03-02 17:30:00"), TicketPriority::Medium, TicketStatus::Other("Waiting".into())),
            ticket(None, TicketPriority::Medium, TicketStatus::Open),
        ]
    }

    #[test]
    fn test_empty_analytics() {
        let analytics = TicketAnalytics::from_tickets(&[]);
        assert_eq!(analytics, TicketAnalytics::default());
        assert_eq!(analytics.render_text(), "No tickets have been submitted yet.");
    }

    #[test]
    fn test_counts() {
        let analytics = TicketAnalytics::from_tickets(&sample());
        assert_eq!(analytics.total, 4);
        assert_eq!(analytics.open, 2);
        assert_eq!(analytics.closed, 1);
        assert_eq!(analytics.by_status["Open"], 2);
        assert_eq!(analytics.by_status["Waiting"], 1);
        assert_eq!(analytics.by_priority[&TicketPriority::Medium], 2);
        assert!(!analytics.by_priority.contains_key(&TicketPriority::Critical));
        assert_eq!(analytics.open_tickets.len(), 2);
    }

    #[test]
    fn test_per_day_ascending_and_skips_undated() {
        let analytics = TicketAnalytics::from_tickets(&sample());
        let days: Vec<(String, usize)> = analytics
            .per_day
            .iter()
            .map(|d| (d.date.to_string(), d.count))
            .collect();
        assert_eq!(
            days,
            vec![("2026-03-01".to_string(), 1), ("2026-03-02".to_string(), 2)]
        );
    }

    #[test]
    fn test_serializes_priority_keys_as_strings() {
        let analytics = TicketAnalytics::from_tickets(&sample());
        let value = serde_json::to_value(&analytics).unwrap();
        assert_eq!(value["by_priority"]["High"], 1);
        assert_eq!(value["per_day"][0]["date"], "2026-03-01");
    }

    #[test]
    fn test_render_text() {
        let text = TicketAnalytics::from_tickets(&sample()).render_text();
        assert!(text.starts_with("Total tickets:  4"));
        assert!(text.contains("Closed tickets: 1"));
        assert!(text.contains("[High] alice: issue"));
    }

    #[test]
    fn test_load_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TicketStore::open(&dir.path().join("tickets.csv"));
        assert_eq!(TicketAnalytics::load(&store).unwrap().total, 0);

        std::fs::write(
            store.path(),
            "2026-03-01 08:00:00,bob,Laptop,Critical,Open\n",
        )
        .unwrap();
        let analytics = TicketAnalytics::load(&store).unwrap();
        assert_eq!(analytics.total, 1);
        assert_eq!(analytics.by_priority[&TicketPriority::Critical], 1);
    }
}
