use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AlopeciaType, ScalpType, WashFrequency};

/// Scalp/hair clinical assessment tied to a patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalHistory {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub scalp_type: ScalpType,
    pub wash_frequency: WashFrequency,
    pub trichoscopy: Option<String>,
    pub alopecia_type: AlopeciaType,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
}
