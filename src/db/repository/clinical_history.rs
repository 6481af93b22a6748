use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{AlopeciaType, ClinicalHistory, ScalpType, WashFrequency};

pub fn insert_history(conn: &Connection, history: &ClinicalHistory) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO clinical_histories (id, patient_id, scalp_type, wash_frequency,
         trichoscopy, alopecia_type, observations, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            history.id.to_string(),
            history.patient_id.to_string(),
            history.scalp_type.as_str(),
            history.wash_frequency.as_str(),
            history.trichoscopy,
            history.alopecia_type.as_str(),
            history.observations,
            history.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_history(conn: &Connection, id: &Uuid) -> Result<ClinicalHistory, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, scalp_type, wash_frequency, trichoscopy, alopecia_type,
             observations, created_at
             FROM clinical_histories WHERE id = ?1",
            params![id.to_string()],
            history_row,
        )
        .optional()?;

    match row {
        Some(row) => history_from_row(row),
        None => Err(DatabaseError::not_found("ClinicalHistory", id)),
    }
}

pub fn list_histories_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ClinicalHistory>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, scalp_type, wash_frequency, trichoscopy, alopecia_type,
         observations, created_at
         FROM clinical_histories WHERE patient_id = ?1 ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| Ok(history_row(row)))?;

    let mut histories = Vec::new();
    for row in rows {
        histories.push(history_from_row(row??)?);
    }
    Ok(histories)
}

pub fn update_history(conn: &Connection, history: &ClinicalHistory) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE clinical_histories SET scalp_type = ?2, wash_frequency = ?3, trichoscopy = ?4,
         alopecia_type = ?5, observations = ?6
         WHERE id = ?1",
        params![
            history.id.to_string(),
            history.scalp_type.as_str(),
            history.wash_frequency.as_str(),
            history.trichoscopy,
            history.alopecia_type.as_str(),
            history.observations,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("ClinicalHistory", history.id));
    }
    Ok(())
}

pub fn delete_history(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM clinical_histories WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("ClinicalHistory", id));
    }
    Ok(())
}

type HistoryRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
);

fn history_row(row: &rusqlite::Row<'_>) -> Result<HistoryRow, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn history_from_row(row: HistoryRow) -> Result<ClinicalHistory, DatabaseError> {
    let (id, patient_id, scalp, wash, trichoscopy, alopecia, observations, created_at) = row;
    Ok(ClinicalHistory {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        scalp_type: ScalpType::from_str(&scalp)?,
        wash_frequency: WashFrequency::from_str(&wash)?,
        trichoscopy,
        alopecia_type: AlopeciaType::from_str(&alopecia)?,
        observations,
        created_at: parse_datetime(&created_at)?,
    })
}
