use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Core subject entity; owns all clinical, appointment and payment records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    /// National ID. Unique across the clinic.
    pub dni: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub allergies: Option<String>,
    pub sleep_hours: Option<i32>,
    pub insurance: Option<String>,
    pub shampoo_type: Option<String>,
    pub created_at: DateTime<Utc>,
}
