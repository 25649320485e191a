use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub bike_model: String,
    pub service_type: String,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub tracking_code: String,
    pub pickup: Option<Pickup>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Optional pickup group: all fields are set together or not at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pickup {
    pub datetime: NaiveDateTime,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub place_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    WorkStarted,
    WorkCompleted,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::WorkStarted => "work_started",
            BookingStatus::WorkCompleted => "work_completed",
        }
    }

    /// Strict parse; anything outside the three known values is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "work_started" => Some(BookingStatus::WorkStarted),
            "work_completed" => Some(BookingStatus::WorkCompleted),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::WorkStarted => "Work Started",
            BookingStatus::WorkCompleted => "Work Completed",
        }
    }
}
