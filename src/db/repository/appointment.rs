use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_date, parse_datetime, parse_opt_uuid, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentStatus, ConsultType};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, date, slot, duration_minutes, consult_type,
     status, payment_id, notes, created_at, updated_at";

pub fn insert_appointment(
    conn: &Connection,
    appointment: &Appointment,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, date, slot, duration_minutes, consult_type,
         status, payment_id, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            appointment.id.to_string(),
            appointment.patient_id.to_string(),
            appointment.date.to_string(),
            appointment.slot,
            appointment.duration_minutes,
            appointment.consult_type.as_str(),
            appointment.status.as_str(),
            appointment.payment_id.map(|id| id.to_string()),
            appointment.notes,
            appointment.created_at.to_rfc3339(),
            appointment.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Appointment, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id.to_string()],
            appointment_row,
        )
        .optional()?;

    match row {
        Some(row) => appointment_from_row(row),
        None => Err(DatabaseError::not_found("Appointment", id)),
    }
}

pub fn list_appointments_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE patient_id = ?1 ORDER BY date DESC, slot DESC"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(appointment_row(row))
    })?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(appointment_from_row(row??)?);
    }
    Ok(appointments)
}

/// Slots taken on a date by non-cancelled appointments.
pub fn booked_slots(conn: &Connection, date: NaiveDate) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT slot FROM appointments WHERE date = ?1 AND status != 'cancelada' ORDER BY slot",
    )?;
    let slots = stmt
        .query_map(params![date.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slots)
}

/// Reschedule or change status. `updated_at` is stamped on every update.
pub fn update_appointment(
    conn: &Connection,
    appointment: &Appointment,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET date = ?2, slot = ?3, duration_minutes = ?4, consult_type = ?5,
         status = ?6, notes = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            appointment.id.to_string(),
            appointment.date.to_string(),
            appointment.slot,
            appointment.duration_minutes,
            appointment.consult_type.as_str(),
            appointment.status.as_str(),
            appointment.notes,
            now.to_rfc3339(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Appointment", appointment.id));
    }
    Ok(())
}

/// DELETE is a cancellation, not a row removal: the slot frees up while the
/// visit stays on record.
pub fn cancel_appointment(
    conn: &Connection,
    id: &Uuid,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = 'cancelada', updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), now.to_rfc3339()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Appointment", id));
    }
    Ok(())
}

pub fn link_payment(
    conn: &Connection,
    id: &Uuid,
    payment_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET payment_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), payment_id.to_string(), now.to_rfc3339()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Appointment", id));
    }
    Ok(())
}

type AppointmentRow = (
    String,
    String,
    String,
    String,
    i32,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
);

fn appointment_row(row: &rusqlite::Row<'_>) -> Result<AppointmentRow, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    let (
        id,
        patient_id,
        date,
        slot,
        duration_minutes,
        consult_type,
        status,
        payment_id,
        notes,
        created_at,
        updated_at,
    ) = row;
    Ok(Appointment {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        date: parse_date(&date)?,
        slot,
        duration_minutes,
        consult_type: ConsultType::from_str(&consult_type)?,
        status: AppointmentStatus::from_str(&status)?,
        payment_id: parse_opt_uuid(payment_id),
        notes,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::free_slots;

    pub(crate) fn sample_appointment(patient_id: Uuid, date: NaiveDate, slot: &str) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            date,
            slot: slot.into(),
            duration_minutes: 30,
            consult_type: ConsultType::PrimeraVez,
            status: AppointmentStatus::Programada,
            payment_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn booked_slot_disappears_from_availability() {
        let conn = open_memory_database().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let appt = sample_appointment(Uuid::new_v4(), date, "09:00");
        insert_appointment(&conn, &appt).unwrap();

        let booked = booked_slots(&conn, date).unwrap();
        let free = free_slots(&booked);
        assert!(!free.contains(&"09:00"));
        assert!(free.contains(&"09:30"));
        assert_eq!(free.len(), 19);
    }

    #[test]
    fn cancelled_appointment_frees_its_slot() {
        let conn = open_memory_database().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let appt = sample_appointment(Uuid::new_v4(), date, "10:00");
        insert_appointment(&conn, &appt).unwrap();
        cancel_appointment(&conn, &appt.id, Utc::now()).unwrap();

        assert!(booked_slots(&conn, date).unwrap().is_empty());
        let found = get_appointment(&conn, &appt.id).unwrap();
        assert_eq!(found.status, AppointmentStatus::Cancelada);
    }

    #[test]
    fn other_dates_do_not_affect_availability() {
        let conn = open_memory_database().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let other = NaiveDate::from_ymd_opt(2026, 9, 2).unwrap();
        insert_appointment(&conn, &sample_appointment(Uuid::new_v4(), other, "09:00")).unwrap();

        assert!(booked_slots(&conn, date).unwrap().is_empty());
    }

    #[test]
    fn update_stamps_updated_at() {
        let conn = open_memory_database().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let mut appt = sample_appointment(Uuid::new_v4(), date, "11:00");
        insert_appointment(&conn, &appt).unwrap();

        appt.status = AppointmentStatus::EnCurso;
        let later = appt.updated_at + chrono::Duration::minutes(10);
        update_appointment(&conn, &appt, later).unwrap();

        let found = get_appointment(&conn, &appt.id).unwrap();
        assert_eq!(found.status, AppointmentStatus::EnCurso);
        assert!(found.updated_at > found.created_at);
    }

    #[test]
    fn link_payment_persists_reference() {
        let conn = open_memory_database().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let appt = sample_appointment(Uuid::new_v4(), date, "12:00");
        insert_appointment(&conn, &appt).unwrap();

        let payment_id = Uuid::new_v4();
        link_payment(&conn, &appt.id, &payment_id, Utc::now()).unwrap();
        let found = get_appointment(&conn, &appt.id).unwrap();
        assert_eq!(found.payment_id, Some(payment_id));
    }
}
