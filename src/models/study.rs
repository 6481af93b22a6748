use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::FileKind;

/// An uploaded file (lab result or clinical photo) linked to a lab request
/// or directly to a patient. Deletion is soft: `visible` flips to false and
/// the stored file stays put.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyFile {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
    pub kind: FileKind,
    pub file_name: String,
    pub url: String,
    pub storage_key: String,
    pub visible: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl StudyFile {
    /// Photos must hang off a patient; lab studies off a request or patient.
    pub fn is_well_linked(&self) -> bool {
        match self.kind {
            FileKind::Estudio => self.patient_id.is_some() || self.request_id.is_some(),
            FileKind::FotoAntes | FileKind::FotoDespues => self.patient_id.is_some(),
        }
    }
}
