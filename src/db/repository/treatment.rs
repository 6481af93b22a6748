use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_datetime, parse_opt_uuid, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{
    Administration, NamedTreatment, TreatmentDetail, TreatmentKind, TreatmentRecord,
};

pub fn insert_record(
    conn: &mut Connection,
    record: &TreatmentRecord,
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    {
        let kind = match record.detail {
            TreatmentDetail::Individual(_) => TreatmentKind::Individual,
            TreatmentDetail::Multiple(_) => TreatmentKind::Multiple,
        };
        tx.execute(
            "INSERT INTO treatment_records (id, patient_id, history_id, kind, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.patient_id.to_string(),
                record.history_id.map(|id| id.to_string()),
                kind.as_str(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        insert_items(&tx, &record.id, &record.detail)?;
    }
    tx.commit()?;
    Ok(())
}

fn insert_items(
    conn: &Connection,
    record_id: &Uuid,
    detail: &TreatmentDetail,
) -> Result<(), DatabaseError> {
    for item in detail.treatments() {
        conn.execute(
            "INSERT INTO treatment_items (id, record_id, name) VALUES (?1, ?2, ?3)",
            params![item.id.to_string(), record_id.to_string(), item.name],
        )?;
        for adm in &item.administrations {
            conn.execute(
                "INSERT INTO treatment_administrations (id, item_id, day, administered, note)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    adm.id.to_string(),
                    item.id.to_string(),
                    adm.day.to_string(),
                    adm.administered as i32,
                    adm.note,
                ],
            )?;
        }
    }
    Ok(())
}

pub fn get_record(conn: &Connection, id: &Uuid) -> Result<TreatmentRecord, DatabaseError> {
    let head = conn
        .query_row(
            "SELECT id, patient_id, history_id, kind, created_at, updated_at
             FROM treatment_records WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id_s, patient_id, history_id, kind, created_at, updated_at)) = head else {
        return Err(DatabaseError::not_found("TreatmentRecord", id));
    };

    let items = load_items(conn, id)?;
    let kind = TreatmentKind::from_str(&kind)?;
    let detail = assemble_detail(kind, items, id)?;

    Ok(TreatmentRecord {
        id: parse_uuid(&id_s)?,
        patient_id: parse_uuid(&patient_id)?,
        history_id: parse_opt_uuid(history_id),
        detail,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub fn list_records_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<TreatmentRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM treatment_records WHERE patient_id = ?1 ORDER BY created_at DESC",
    )?;
    let ids = stmt
        .query_map(params![patient_id.to_string()], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        records.push(get_record(conn, &parse_uuid(&id)?)?);
    }
    Ok(records)
}

/// Replace the record's treatments wholesale and stamp `updated_at`.
pub fn update_detail(
    conn: &mut Connection,
    id: &Uuid,
    detail: &TreatmentDetail,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    {
        let kind = match detail {
            TreatmentDetail::Individual(_) => TreatmentKind::Individual,
            TreatmentDetail::Multiple(_) => TreatmentKind::Multiple,
        };
        let changed = tx.execute(
            "UPDATE treatment_records SET kind = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), kind.as_str(), now.to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("TreatmentRecord", id));
        }
        // Cascades to administrations.
        tx.execute(
            "DELETE FROM treatment_items WHERE record_id = ?1",
            params![id.to_string()],
        )?;
        insert_items(&tx, id, detail)?;
    }
    tx.commit()?;
    Ok(())
}

/// Flip one per-day entry and stamp the record, atomically.
pub fn mark_administration(
    conn: &mut Connection,
    record_id: &Uuid,
    item_id: &Uuid,
    day: NaiveDate,
    administered: bool,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    {
        let changed = tx.execute(
            "UPDATE treatment_administrations SET administered = ?3, note = COALESCE(?4, note)
             WHERE item_id = ?2 AND day = ?5
               AND item_id IN (SELECT id FROM treatment_items WHERE record_id = ?1)",
            params![
                record_id.to_string(),
                item_id.to_string(),
                administered as i32,
                note,
                day.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found(
                "Administration",
                format!("{item_id}/{day}"),
            ));
        }
        tx.execute(
            "UPDATE treatment_records SET updated_at = ?2 WHERE id = ?1",
            params![record_id.to_string(), now.to_rfc3339()],
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_record(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM treatment_records WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("TreatmentRecord", id));
    }
    Ok(())
}

fn load_items(conn: &Connection, record_id: &Uuid) -> Result<Vec<NamedTreatment>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT id, name FROM treatment_items WHERE record_id = ?1 ORDER BY name")?;
    let heads = stmt
        .query_map(params![record_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut items = Vec::with_capacity(heads.len());
    for (item_id, name) in heads {
        let mut adm_stmt = conn.prepare(
            "SELECT id, day, administered, note FROM treatment_administrations
             WHERE item_id = ?1 ORDER BY day",
        )?;
        let adm_rows = adm_stmt
            .query_map(params![item_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut administrations = Vec::with_capacity(adm_rows.len());
        for (adm_id, day, administered, note) in adm_rows {
            administrations.push(Administration {
                id: parse_uuid(&adm_id)?,
                day: crate::db::repository::parse_date(&day)?,
                administered: administered != 0,
                note,
            });
        }
        items.push(NamedTreatment {
            id: parse_uuid(&item_id)?,
            name,
            administrations,
        });
    }
    Ok(items)
}

fn assemble_detail(
    kind: TreatmentKind,
    mut items: Vec<NamedTreatment>,
    record_id: &Uuid,
) -> Result<TreatmentDetail, DatabaseError> {
    match kind {
        TreatmentKind::Individual => {
            if items.len() != 1 {
                return Err(DatabaseError::ConstraintViolation(format!(
                    "individual record {record_id} has {} treatments",
                    items.len()
                )));
            }
            Ok(TreatmentDetail::Individual(items.remove(0)))
        }
        TreatmentKind::Multiple => Ok(TreatmentDetail::Multiple(items)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    pub(crate) fn sample_record(patient_id: Uuid, names: &[&str]) -> TreatmentRecord {
        let now = Utc::now();
        let treatments: Vec<NamedTreatment> = names
            .iter()
            .map(|name| NamedTreatment {
                id: Uuid::new_v4(),
                name: (*name).into(),
                administrations: (1..=3)
                    .map(|d| Administration {
                        id: Uuid::new_v4(),
                        day: NaiveDate::from_ymd_opt(2026, 3, d).unwrap(),
                        administered: false,
                        note: None,
                    })
                    .collect(),
            })
            .collect();

        let detail = if treatments.len() == 1 {
            TreatmentDetail::Individual(treatments.into_iter().next().unwrap())
        } else {
            TreatmentDetail::Multiple(treatments)
        };

        TreatmentRecord {
            id: Uuid::new_v4(),
            patient_id,
            history_id: None,
            detail,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn individual_record_round_trips() {
        let mut conn = open_memory_database().unwrap();
        let record = sample_record(Uuid::new_v4(), &["Minoxidil 5%"]);
        insert_record(&mut conn, &record).unwrap();

        let found = get_record(&conn, &record.id).unwrap();
        match found.detail {
            TreatmentDetail::Individual(t) => {
                assert_eq!(t.name, "Minoxidil 5%");
                assert_eq!(t.administrations.len(), 3);
            }
            TreatmentDetail::Multiple(_) => panic!("expected individual"),
        }
    }

    #[test]
    fn multiple_record_keeps_all_treatments() {
        let mut conn = open_memory_database().unwrap();
        let record = sample_record(Uuid::new_v4(), &["Minoxidil", "Finasterida"]);
        insert_record(&mut conn, &record).unwrap();

        let found = get_record(&conn, &record.id).unwrap();
        assert_eq!(found.detail.treatments().len(), 2);
    }

    #[test]
    fn mark_administration_flips_flag_and_stamps_record() {
        let mut conn = open_memory_database().unwrap();
        let record = sample_record(Uuid::new_v4(), &["Minoxidil"]);
        insert_record(&mut conn, &record).unwrap();

        let item_id = record.detail.treatments()[0].id;
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let later = record.updated_at + chrono::Duration::minutes(5);
        mark_administration(&mut conn, &record.id, &item_id, day, true, Some("ok"), later)
            .unwrap();

        let found = get_record(&conn, &record.id).unwrap();
        let adm = found.detail.treatments()[0]
            .administrations
            .iter()
            .find(|a| a.day == day)
            .cloned()
            .unwrap();
        assert!(adm.administered);
        assert_eq!(adm.note.as_deref(), Some("ok"));
        assert!(found.updated_at > found.created_at);
    }

    #[test]
    fn mark_unknown_day_is_not_found() {
        let mut conn = open_memory_database().unwrap();
        let record = sample_record(Uuid::new_v4(), &["Minoxidil"]);
        insert_record(&mut conn, &record).unwrap();

        let item_id = record.detail.treatments()[0].id;
        let day = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let err = mark_administration(
            &mut conn,
            &record.id,
            &item_id,
            day,
            true,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn update_detail_replaces_treatments() {
        let mut conn = open_memory_database().unwrap();
        let record = sample_record(Uuid::new_v4(), &["Minoxidil"]);
        insert_record(&mut conn, &record).unwrap();

        let replacement = sample_record(record.patient_id, &["Dutasterida", "Ketoconazol"]);
        update_detail(&mut conn, &record.id, &replacement.detail, Utc::now()).unwrap();

        let found = get_record(&conn, &record.id).unwrap();
        assert!(matches!(found.detail, TreatmentDetail::Multiple(_)));
        assert_eq!(found.detail.treatments().len(), 2);
    }

    #[test]
    fn delete_cascades_to_items() {
        let mut conn = open_memory_database().unwrap();
        let record = sample_record(Uuid::new_v4(), &["Minoxidil"]);
        insert_record(&mut conn, &record).unwrap();
        delete_record(&conn, &record.id).unwrap();

        let orphan_items: i64 = conn
            .query_row("SELECT COUNT(*) FROM treatment_items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphan_items, 0);
    }
}
