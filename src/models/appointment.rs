use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentStatus, ConsultType};

/// Half-hour slots the clinic offers, 09:00 through 18:30.
pub const TIME_SLOTS: [&str; 20] = [
    "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "12:00", "12:30", "13:00", "13:30",
    "14:00", "14:30", "15:00", "15:30", "16:00", "16:30", "17:00", "17:30", "18:00", "18:30",
];

/// A scheduled consultation slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    /// One of [`TIME_SLOTS`], e.g. "09:00".
    pub slot: String,
    pub duration_minutes: i32,
    pub consult_type: ConsultType,
    pub status: AppointmentStatus,
    pub payment_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Stamped on every update.
    pub updated_at: DateTime<Utc>,
}

/// Free slots for a date: the fixed grid minus slots booked by
/// non-cancelled appointments. Plain set difference, recomputed per call.
pub fn free_slots(booked: &[String]) -> Vec<&'static str> {
    TIME_SLOTS
        .iter()
        .copied()
        .filter(|slot| !booked.iter().any(|b| b == slot))
        .collect()
}

pub fn is_valid_slot(slot: &str) -> bool {
    TIME_SLOTS.contains(&slot)
}
