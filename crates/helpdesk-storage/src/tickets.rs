//! Support ticket store.
//!
//! Tickets are rows of a headerless CSV file:
//! `timestamp,name,issue,priority,status`. Older files may lack the priority
//! or status columns; those rows read as `Medium` and `Open`.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDateTime, Timelike};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::types::{Ticket, TicketPriority, TicketStatus, TICKET_TIMESTAMP_FORMAT};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::atomic::replace_file;

const GUEST_NAME: &str = "Guest";
const STATUS_COLUMN: usize = 4;

/// A ticket as submitted by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
    #[serde(default)]
    pub name: String,
    pub issue: String,
    #[serde(default)]
    pub priority: TicketPriority,
}

/// Append-mostly CSV ticket store.
pub struct TicketStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TicketStore {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &HelpdeskConfig) -> Self {
        Self::open(&config.ticket_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a ticket stamped with the current local time and status `Open`.
    /// A blank name is recorded as `Guest`.
    pub fn append(&self, ticket: NewTicket) -> Result<Ticket> {
        let issue = ticket.issue.trim();
        if issue.is_empty() {
            return Err(HelpdeskError::Validation(
                "ticket issue must not be empty".to_string(),
            ));
        }
        let name = match ticket.name.trim() {
            "" => GUEST_NAME.to_string(),
            name => name.to_string(),
        };
        let now = Local::now().naive_local();
        let stored = Ticket {
            timestamp: Some(now.with_nanosecond(0).unwrap_or(now)),
            name,
            issue: issue.to_string(),
            priority: ticket.priority,
            status: TicketStatus::Open,
        };

        let _guard = self.lock()?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(to_record(&stored)).map_err(csv_error)?;
        writer.flush()?;

        info!(priority = %stored.priority, name = %stored.name, "Ticket submitted");
        Ok(stored)
    }

    /// All tickets in file order. A missing file has no tickets.
    pub fn list(&self) -> Result<Vec<Ticket>> {
        let _guard = self.lock()?;
        Ok(self
            .read_records()?
            .iter()
            .map(from_record)
            .collect())
    }

    /// Change the status of the ticket at `index` (0-based file order).
    pub fn set_status(&self, index: usize, status: TicketStatus) -> Result<Ticket> {
        let _guard = self.lock()?;
        let mut records = self.read_records()?;
        let record = records
            .get_mut(index)
            .ok_or(HelpdeskError::TicketNotFound(index))?;

        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        fields.resize(STATUS_COLUMN + 1, String::new());
        fields[STATUS_COLUMN] = status.label().to_string();
        *record = StringRecord::from(fields);
        let updated = from_record(record);

        replace_file(&self.path, |w| {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(w);
            for record in &records {
                writer.write_record(record).map_err(csv_error)?;
            }
            writer.flush()?;
            Ok(())
        })?;

        info!(index, status = %updated.status, "Ticket status updated");
        Ok(updated)
    }

    fn read_records(&self) -> Result<Vec<StringRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(csv_error)?;

        let mut records = Vec::new();
        for (line, result) in reader.records().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = line + 1, error = %e, "Skipping unreadable ticket row"),
            }
        }
        Ok(records)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| HelpdeskError::Storage(format!("ticket lock poisoned: {}", e)))
    }
}

fn to_record(ticket: &Ticket) -> [String; 5] {
    [
        ticket
            .timestamp
            .map(|ts| ts.format(TICKET_TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
        ticket.name.clone(),
        ticket.issue.clone(),
        ticket.priority.to_string(),
        ticket.status.to_string(),
    ]
}

fn from_record(record: &StringRecord) -> Ticket {
    let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");

    let priority = match field(3) {
        "" => TicketPriority::default(),
        raw => raw.parse().unwrap_or_else(|_| {
            warn!(priority = raw, "Unknown ticket priority, using Medium");
            TicketPriority::default()
        }),
    };

    Ticket {
        timestamp: parse_timestamp(field(0)),
        name: field(1).to_string(),
        issue: field(2).to_string(),
        priority,
        status: TicketStatus::from(field(4)),
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TICKET_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

fn csv_error(err: csv::Error) -> HelpdeskError {
    HelpdeskError::Storage(format!("ticket file: {}", err))
}
