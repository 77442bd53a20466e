use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;

/// Reporting window over the appointment date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Period {
    Month { year: i32, month: u32 },
    Year { year: i32 },
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            Period::Year { year } => date.year() == year,
            Period::Month { year, month } => date.year() == year && date.month() == month,
        }
    }
}

/// `?year=2024&month=5`; a missing month or `ALL` means the whole year.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryQuery {
    pub year: i32,
    pub month: Option<String>,
}

impl SummaryQuery {
    pub fn period(&self) -> Result<Period, ReportingError> {
        let month = match self.month.as_deref().map(str::trim) {
            None | Some("") => return Ok(Period::Year { year: self.year }),
            Some(m) if m.eq_ignore_ascii_case("all") => return Ok(Period::Year { year: self.year }),
            Some(m) => m,
        };

        match month.parse::<u32>() {
            Ok(month) if (1..=12).contains(&month) => Ok(Period::Month { year: self.year, month }),
            _ => Err(ReportingError::ValidationError(format!(
                "Month must be 1-12 or ALL, got '{}'",
                month
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EstablishmentCount {
    pub establishment_id: String,
    pub name: String,
    pub first_visit_count: u32,
    pub second_visit_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub period: Period,
    pub first_visit_count: u32,
    pub second_visit_count: u32,
    pub per_establishment: Vec<EstablishmentCount>,
}

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
