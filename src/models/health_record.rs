//! Pet health record model (vaccinations and deworming)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of health record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthRecordKind {
    Vaccination,
    Deworming,
}

impl fmt::Display for HealthRecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthRecordKind::Vaccination => write!(f, "vaccination"),
            HealthRecordKind::Deworming => write!(f, "deworming"),
        }
    }
}

impl FromStr for HealthRecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vaccination" => Ok(HealthRecordKind::Vaccination),
            "deworming" => Ok(HealthRecordKind::Deworming),
            _ => Err(format!("Invalid health record kind: {}", s)),
        }
    }
}

/// A health record attached to a pet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: i64,
    pub pet_id: String,
    pub kind: HealthRecordKind,
    /// Vaccine or product name
    pub name: String,
    pub administered_on: NaiveDate,
    pub next_due_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HealthRecord {
    /// Whether the next dose is due on or before `today`
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_due_on.is_some_and(|due| due <= today)
    }
}

/// Input for adding a health record
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHealthRecordInput {
    pub kind: HealthRecordKind,
    pub name: String,
    pub administered_on: NaiveDate,
    #[serde(default)]
    pub next_due_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}
