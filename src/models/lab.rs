use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::LabRequestStatus;

/// A requested panel of lab analyses with pending/filled values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: LabRequestStatus,
    pub analyses: Vec<Analysis>,
    pub requested_at: DateTime<Utc>,
}

/// One requested analysis. `value` stays empty until a result is entered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub value: Option<String>,
    pub unit: Option<String>,
}

impl LabRequest {
    /// A request is complete when every analysis has a value.
    pub fn all_results_in(&self) -> bool {
        !self.analyses.is_empty() && self.analyses.iter().all(|a| a.value.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(values: &[Option<&str>]) -> LabRequest {
        LabRequest {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            status: LabRequestStatus::Pendiente,
            analyses: values
                .iter()
                .map(|v| Analysis {
                    id: Uuid::new_v4(),
                    name: "Ferritina".into(),
                    value: v.map(String::from),
                    unit: Some("ng/mL".into()),
                })
                .collect(),
            requested_at: Utc::now(),
        }
    }

    #[test]
    fn incomplete_until_all_values_entered() {
        assert!(!request(&[Some("35"), None]).all_results_in());
        assert!(request(&[Some("35"), Some("12")]).all_results_in());
    }

    #[test]
    fn empty_panel_is_not_complete() {
        assert!(!request(&[]).all_results_in());
    }
}
