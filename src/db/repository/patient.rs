use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{map_unique, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{ClinicalHistory, Patient};

const PATIENT_COLUMNS: &str = "id, full_name, dni, email, phone, birth_date, address, allergies,
     sleep_hours, insurance, shampoo_type, created_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, full_name, dni, email, phone, birth_date, address, allergies,
         sleep_hours, insurance, shampoo_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.dni,
            patient.email,
            patient.phone,
            patient.birth_date.map(|d| d.to_string()),
            patient.address,
            patient.allergies,
            patient.sleep_hours,
            patient.insurance,
            patient.shampoo_type,
            patient.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| map_unique(e, "dni already registered"))?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Patient, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            patient_row_from_rusqlite,
        )
        .optional()?;

    match row {
        Some(row) => patient_from_row(row),
        None => Err(DatabaseError::not_found("Patient", id)),
    }
}

pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(patient_row_from_rusqlite(row)))?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row??)?);
    }
    Ok(patients)
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE patients SET full_name = ?2, dni = ?3, email = ?4, phone = ?5,
             birth_date = ?6, address = ?7, allergies = ?8, sleep_hours = ?9,
             insurance = ?10, shampoo_type = ?11
             WHERE id = ?1",
            params![
                patient.id.to_string(),
                patient.full_name,
                patient.dni,
                patient.email,
                patient.phone,
                patient.birth_date.map(|d| d.to_string()),
                patient.address,
                patient.allergies,
                patient.sleep_hours,
                patient.insurance,
                patient.shampoo_type,
            ],
        )
        .map_err(|e| map_unique(e, "dni already registered"))?;

    if changed == 0 {
        return Err(DatabaseError::not_found("Patient", patient.id));
    }
    Ok(())
}

/// Hard delete. Child records (histories, treatments, lab requests, studies,
/// appointments, payments) are left in place — orphans are tolerated.
pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM patients WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Patient", id));
    }
    Ok(())
}

pub fn patient_exists(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Intake shortcut: patient plus first clinical history in one transaction.
/// Either both land or neither does.
pub fn insert_patient_with_history(
    conn: &mut Connection,
    patient: &Patient,
    history: &ClinicalHistory,
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    {
        tx.execute(
            "INSERT INTO patients (id, full_name, dni, email, phone, birth_date, address,
             allergies, sleep_hours, insurance, shampoo_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                patient.id.to_string(),
                patient.full_name,
                patient.dni,
                patient.email,
                patient.phone,
                patient.birth_date.map(|d| d.to_string()),
                patient.address,
                patient.allergies,
                patient.sleep_hours,
                patient.insurance,
                patient.shampoo_type,
                patient.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| map_unique(e, "dni already registered"))?;

        crate::db::repository::clinical_history::insert_history(&tx, history)?;
    }
    tx.commit()?;
    Ok(())
}

struct PatientRow {
    id: String,
    full_name: String,
    dni: String,
    email: Option<String>,
    phone: Option<String>,
    birth_date: Option<String>,
    address: Option<String>,
    allergies: Option<String>,
    sleep_hours: Option<i32>,
    insurance: Option<String>,
    shampoo_type: Option<String>,
    created_at: String,
}

fn patient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        dni: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        birth_date: row.get(5)?,
        address: row.get(6)?,
        allergies: row.get(7)?,
        sleep_hours: row.get(8)?,
        insurance: row.get(9)?,
        shampoo_type: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&row.id)?,
        full_name: row.full_name,
        dni: row.dni,
        email: row.email,
        phone: row.phone,
        birth_date: row
            .birth_date
            .and_then(|d| chrono::NaiveDate::from_str(&d).ok()),
        address: row.address,
        allergies: row.allergies,
        sleep_hours: row.sleep_hours,
        insurance: row.insurance,
        shampoo_type: row.shampoo_type,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;

    pub(crate) fn sample_patient(dni: &str) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            full_name: "Ana Duarte".into(),
            dni: dni.into(),
            email: Some("ana@example.com".into()),
            phone: Some("+54 11 5555-0100".into()),
            birth_date: Some(chrono::NaiveDate::from_ymd_opt(1990, 4, 12).unwrap()),
            address: Some("Av. Rivadavia 1200".into()),
            allergies: Some("ninguna".into()),
            sleep_hours: Some(7),
            insurance: Some("OSDE".into()),
            shampoo_type: Some("neutro".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_then_get_returns_same_fields() {
        let conn = open_memory_database().unwrap();
        let patient = sample_patient("30123456");
        insert_patient(&conn, &patient).unwrap();

        let found = get_patient(&conn, &patient.id).unwrap();
        assert_eq!(found.full_name, patient.full_name);
        assert_eq!(found.dni, patient.dni);
        assert_eq!(found.email, patient.email);
        assert_eq!(found.sleep_hours, patient.sleep_hours);
        assert_eq!(found.birth_date, patient.birth_date);
    }

    #[test]
    fn duplicate_dni_is_rejected() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &sample_patient("111")).unwrap();
        let err = insert_patient(&conn, &sample_patient("111")).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = get_patient(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn update_changes_fields() {
        let conn = open_memory_database().unwrap();
        let mut patient = sample_patient("222");
        insert_patient(&conn, &patient).unwrap();

        patient.phone = Some("+54 11 5555-0200".into());
        patient.sleep_hours = Some(6);
        update_patient(&conn, &patient).unwrap();

        let found = get_patient(&conn, &patient.id).unwrap();
        assert_eq!(found.phone.as_deref(), Some("+54 11 5555-0200"));
        assert_eq!(found.sleep_hours, Some(6));
    }

    #[test]
    fn delete_is_hard_and_orphan_tolerant() {
        let mut conn = open_memory_database().unwrap();
        let patient = sample_patient("333");
        let history = crate::db::repository::clinical_history::tests::sample_history(patient.id);
        insert_patient_with_history(&mut conn, &patient, &history).unwrap();

        delete_patient(&conn, &patient.id).unwrap();
        assert!(!patient_exists(&conn, &patient.id).unwrap());

        // The history survives as an orphan.
        let orphan =
            crate::db::repository::clinical_history::get_history(&conn, &history.id).unwrap();
        assert_eq!(orphan.patient_id, patient.id);
    }

    #[test]
    fn combined_create_rolls_back_on_duplicate_dni() {
        let mut conn = open_memory_database().unwrap();
        insert_patient(&conn, &sample_patient("444")).unwrap();

        let patient = sample_patient("444");
        let history = crate::db::repository::clinical_history::tests::sample_history(patient.id);
        let err = insert_patient_with_history(&mut conn, &patient, &history).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));

        let histories =
            crate::db::repository::clinical_history::list_histories_by_patient(&conn, &patient.id)
                .unwrap();
        assert!(histories.is_empty(), "history write must roll back");
    }
}
