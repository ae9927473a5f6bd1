//! Appointment records.
//!
//! Dates and times are kept as the backend sent them and parsed on demand, so
//! an unexpected format never fails a whole list fetch.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    #[serde(default, alias = "paciente")]
    pub patient: Option<Value>,
    #[serde(default, alias = "medico", alias = "doctor_id")]
    pub doctor: Option<Value>,
    #[serde(default, alias = "fecha")]
    pub date: Option<String>,
    #[serde(default, alias = "hora")]
    pub time: Option<String>,
    #[serde(default, alias = "estado")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Appointment {
    /// Calendar day, from either a plain date or a full timestamp
    pub fn day(&self) -> Option<NaiveDate> {
        let raw = self.date.as_deref()?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| parse_timestamp(raw).map(|dt| dt.date()))
    }

    /// Start time; accepts `HH:MM` and `HH:MM:SS`
    pub fn start_time(&self) -> Option<NaiveTime> {
        let raw = self.time.as_deref()?;
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
            .or_else(|| self.date.as_deref().and_then(parse_timestamp).map(|dt| dt.time()))
    }

    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        Some(self.day()?.and_time(self.start_time()?))
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}
