use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};
use thiserror::Error;

use crate::rules;

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ride {
    pub ride_id: i64,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub notes: Option<String>,
    /// Seats offered to passengers, the driver is not counted.
    pub capacity: i64,
    pub num_riders: i64,
    pub driver_id: i64,
}

impl Ride {
    pub fn spots_left(&self) -> i64 {
        rules::spots_left(self.capacity, self.num_riders)
    }

    pub fn is_full(&self) -> bool {
        self.num_riders >= self.capacity
    }
}

/// A ride as handed out to clients, with the driver's username and the
/// seats left at the time it was read.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RideDetails {
    #[serde(flatten)]
    pub ride: Ride,
    pub driver: String,
    pub spots_left: i64,
}

impl RideDetails {
    pub fn new(ride: Ride, driver: String) -> Self {
        let spots_left = ride.spots_left();
        Self {
            ride,
            driver,
            spots_left,
        }
    }
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for RideDetails {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let ride = Ride::from_row(row)?;
        let driver: String = row.try_get("driver")?;
        Ok(Self::new(ride, driver))
    }
}

/// The fields a driver submits when creating or editing a ride.
/// Anything else in the payload (driver, rider count) is dropped on deserialization.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RideForm {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub capacity: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RideFormError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("capacity must be at least 1, got {0}")]
    Capacity(i64),
}

impl RideForm {
    pub fn validate(&self) -> Result<(), RideFormError> {
        if self.origin.trim().is_empty() {
            return Err(RideFormError::Empty("origin"));
        }
        if self.destination.trim().is_empty() {
            return Err(RideFormError::Empty("destination"));
        }
        if self.capacity < 1 {
            return Err(RideFormError::Capacity(self.capacity));
        }
        Ok(())
    }

    /// Blank notes are stored as no notes.
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }
}
