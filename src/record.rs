//! Billing record value object
//!
//! A `Record` is the unit that flows through the whole system: generated by the
//! producer, serialized onto the channel, decoded by the consumer, persisted in
//! the record store and finally folded into word-frequency summaries.
//!
//! Wire format is UTF-8 JSON with case-sensitive keys:
//!
//! ```json
//! {"date":"2024-02-01","service":"Heroku","description":"...","cost":12.5}
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    InvalidDate(String),
    InvalidCost(f64),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "JSON decode error: {}", e),
            DecodeError::InvalidDate(d) => write!(f, "Invalid date (expected YYYY-MM-DD): {}", d),
            DecodeError::InvalidCost(c) => write!(f, "Invalid cost (must be finite and >= 0): {}", c),
        }
    }
}

impl std::error::Error for DecodeError {}

/// One billing event. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    date: String,
    service: String,
    description: String,
    cost: f64,
}

impl Record {
    /// Build a validated record
    pub fn new(
        date: impl Into<String>,
        service: impl Into<String>,
        description: impl Into<String>,
        cost: f64,
    ) -> Result<Self, DecodeError> {
        let record = Self {
            date: date.into(),
            service: service.into(),
            description: description.into(),
            cost,
        };
        record.validate()?;
        Ok(record)
    }

    /// Decode a record from a channel payload
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let record: Record = serde_json::from_slice(payload)?;
        record.validate()?;
        Ok(record)
    }

    /// Serialize for transport
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if NaiveDate::parse_from_str(&self.date, DATE_FORMAT).is_err() {
            return Err(DecodeError::InvalidDate(self.date.clone()));
        }
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(DecodeError::InvalidCost(self.cost));
        }
        Ok(())
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }
}

/// Format a date the way records carry it
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
