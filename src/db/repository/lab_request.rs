use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Analysis, LabRequest, LabRequestStatus};

pub fn insert_request(conn: &mut Connection, request: &LabRequest) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    {
        tx.execute(
            "INSERT INTO lab_requests (id, patient_id, status, requested_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                request.id.to_string(),
                request.patient_id.to_string(),
                request.status.as_str(),
                request.requested_at.to_rfc3339(),
            ],
        )?;
        for analysis in &request.analyses {
            tx.execute(
                "INSERT INTO lab_analyses (id, request_id, name, value, unit)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    analysis.id.to_string(),
                    request.id.to_string(),
                    analysis.name,
                    analysis.value,
                    analysis.unit,
                ],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn get_request(conn: &Connection, id: &Uuid) -> Result<LabRequest, DatabaseError> {
    let head = conn
        .query_row(
            "SELECT id, patient_id, status, requested_at FROM lab_requests WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((id_s, patient_id, status, requested_at)) = head else {
        return Err(DatabaseError::not_found("LabRequest", id));
    };

    Ok(LabRequest {
        id: parse_uuid(&id_s)?,
        patient_id: parse_uuid(&patient_id)?,
        status: LabRequestStatus::from_str(&status)?,
        analyses: load_analyses(conn, id)?,
        requested_at: parse_datetime(&requested_at)?,
    })
}

pub fn list_requests_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<LabRequest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM lab_requests WHERE patient_id = ?1 ORDER BY requested_at DESC",
    )?;
    let ids = stmt
        .query_map(params![patient_id.to_string()], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut requests = Vec::with_capacity(ids.len());
    for id in ids {
        requests.push(get_request(conn, &parse_uuid(&id)?)?);
    }
    Ok(requests)
}

pub fn update_request_status(
    conn: &Connection,
    id: &Uuid,
    status: LabRequestStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE lab_requests SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("LabRequest", id));
    }
    Ok(())
}

/// Fill the value of one analysis on a request.
pub fn set_analysis_result(
    conn: &Connection,
    request_id: &Uuid,
    analysis_id: &Uuid,
    value: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE lab_analyses SET value = ?3 WHERE id = ?2 AND request_id = ?1",
        params![request_id.to_string(), analysis_id.to_string(), value],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Analysis", analysis_id));
    }
    Ok(())
}

pub fn delete_request(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM lab_requests WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("LabRequest", id));
    }
    Ok(())
}

fn load_analyses(conn: &Connection, request_id: &Uuid) -> Result<Vec<Analysis>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, value, unit FROM lab_analyses WHERE request_id = ?1 ORDER BY name",
    )?;
    let rows = stmt
        .query_map(params![request_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut analyses = Vec::with_capacity(rows.len());
    for (id, name, value, unit) in rows {
        analyses.push(Analysis {
            id: parse_uuid(&id)?,
            name,
            value,
            unit,
        });
    }
    Ok(analyses)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;

    pub(crate) fn sample_request(patient_id: Uuid) -> LabRequest {
        LabRequest {
            id: Uuid::new_v4(),
            patient_id,
            status: LabRequestStatus::Pendiente,
            analyses: vec![
                Analysis {
                    id: Uuid::new_v4(),
                    name: "Ferritina".into(),
                    value: None,
                    unit: Some("ng/mL".into()),
                },
                Analysis {
                    id: Uuid::new_v4(),
                    name: "TSH".into(),
                    value: None,
                    unit: Some("mUI/L".into()),
                },
            ],
            requested_at: Utc::now(),
        }
    }

    #[test]
    fn request_round_trips_with_analyses() {
        let mut conn = open_memory_database().unwrap();
        let request = sample_request(Uuid::new_v4());
        insert_request(&mut conn, &request).unwrap();

        let found = get_request(&conn, &request.id).unwrap();
        assert_eq!(found.analyses.len(), 2);
        assert!(found.analyses.iter().all(|a| a.value.is_none()));
        assert_eq!(found.status, LabRequestStatus::Pendiente);
    }

    #[test]
    fn result_entry_fills_single_value() {
        let mut conn = open_memory_database().unwrap();
        let request = sample_request(Uuid::new_v4());
        insert_request(&mut conn, &request).unwrap();

        let ferritina = &request.analyses[0];
        set_analysis_result(&conn, &request.id, &ferritina.id, "35").unwrap();

        let found = get_request(&conn, &request.id).unwrap();
        let filled = found.analyses.iter().find(|a| a.id == ferritina.id).unwrap();
        assert_eq!(filled.value.as_deref(), Some("35"));
        assert!(!found.all_results_in());
    }

    #[test]
    fn status_transitions_persist() {
        let mut conn = open_memory_database().unwrap();
        let request = sample_request(Uuid::new_v4());
        insert_request(&mut conn, &request).unwrap();

        update_request_status(&conn, &request.id, LabRequestStatus::EnProceso).unwrap();
        let found = get_request(&conn, &request.id).unwrap();
        assert_eq!(found.status, LabRequestStatus::EnProceso);
    }

    #[test]
    fn delete_cascades_to_analyses() {
        let mut conn = open_memory_database().unwrap();
        let request = sample_request(Uuid::new_v4());
        insert_request(&mut conn, &request).unwrap();
        delete_request(&conn, &request.id).unwrap();

        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM lab_analyses", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn result_for_unknown_analysis_is_not_found() {
        let mut conn = open_memory_database().unwrap();
        let request = sample_request(Uuid::new_v4());
        insert_request(&mut conn, &request).unwrap();

        let err =
            set_analysis_result(&conn, &request.id, &Uuid::new_v4(), "1.2").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
