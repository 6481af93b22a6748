use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-day administration log for one or more named treatments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub history_id: Option<Uuid>,
    #[serde(flatten)]
    pub detail: TreatmentDetail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record tracks either a single treatment or several concurrent ones.
/// Resolved at the type level rather than via a string flag over optional
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "treatments", rename_all = "snake_case")]
pub enum TreatmentDetail {
    Individual(NamedTreatment),
    Multiple(Vec<NamedTreatment>),
}

impl TreatmentDetail {
    /// All named treatments, regardless of shape.
    pub fn treatments(&self) -> Vec<&NamedTreatment> {
        match self {
            TreatmentDetail::Individual(t) => vec![t],
            TreatmentDetail::Multiple(ts) => ts.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedTreatment {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub administrations: Vec<Administration>,
}

/// One per-day administration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Administration {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub day: NaiveDate,
    #[serde(default)]
    pub administered: bool,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_serializes_with_kind_tag() {
        let detail = TreatmentDetail::Individual(NamedTreatment {
            id: Uuid::new_v4(),
            name: "Minoxidil 5%".into(),
            administrations: vec![],
        });
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "individual");
        assert_eq!(json["treatments"]["name"], "Minoxidil 5%");
    }

    #[test]
    fn multiple_holds_several_treatments() {
        let json = serde_json::json!({
            "kind": "multiple",
            "treatments": [
                { "name": "Minoxidil", "administrations": [] },
                { "name": "Finasterida", "administrations": [] }
            ]
        });
        let detail: TreatmentDetail = serde_json::from_value(json).unwrap();
        assert_eq!(detail.treatments().len(), 2);
    }

    #[test]
    fn administration_defaults_to_not_given() {
        let json = serde_json::json!({ "day": "2026-03-01", "note": null });
        let adm: Administration = serde_json::from_value(json).unwrap();
        assert!(!adm.administered);
    }
}
