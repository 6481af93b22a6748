use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{parse_datetime, parse_opt_uuid, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Payment, PaymentMethod, PaymentStatus, TreatmentPlan};

const PAYMENT_COLUMNS: &str = "id, patient_id, appointment_id, plan, amount, status,
     sessions_included, sessions_used, issued_at, due_date, alert_sent, method_json";

/// Reporting aggregate over the payments table. Computed per request,
/// nothing is materialized.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatistics {
    /// Revenue from paid payments issued since the start of the month.
    pub month_revenue: f64,
    pub pending_count: i64,
    pub overdue_count: i64,
    /// Sessions still owed across paid payments.
    pub sessions_remaining: i64,
}

pub fn insert_payment(conn: &Connection, payment: &Payment) -> Result<(), DatabaseError> {
    let method_json = method_to_json(payment.method.as_ref())?;
    conn.execute(
        "INSERT INTO payments (id, patient_id, appointment_id, plan, amount, status,
         sessions_included, sessions_used, issued_at, due_date, alert_sent, method_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            payment.id.to_string(),
            payment.patient_id.to_string(),
            payment.appointment_id.map(|id| id.to_string()),
            payment.plan.as_str(),
            payment.amount,
            payment.status.as_str(),
            payment.sessions_included,
            payment.sessions_used,
            payment.issued_at.to_rfc3339(),
            payment.due_date.to_rfc3339(),
            payment.alert_sent as i32,
            method_json,
        ],
    )?;
    Ok(())
}

/// Insert a payment and, when it references an appointment, set the
/// appointment's back-link in the same transaction. Either both rows move
/// or neither does.
pub fn insert_payment_with_link(
    conn: &mut Connection,
    payment: &Payment,
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    insert_payment(&tx, payment)?;
    if let Some(appointment_id) = payment.appointment_id {
        let changed = tx.execute(
            "UPDATE appointments SET payment_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                appointment_id.to_string(),
                payment.id.to_string(),
                payment.issued_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("Appointment", appointment_id));
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn get_payment(conn: &Connection, id: &Uuid) -> Result<Payment, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"),
            params![id.to_string()],
            payment_row_from_rusqlite,
        )
        .optional()?;

    match row {
        Some(row) => payment_from_row(row),
        None => Err(DatabaseError::not_found("Payment", id)),
    }
}

pub fn list_payments_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Payment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE patient_id = ?1 ORDER BY issued_at DESC"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(payment_row_from_rusqlite(row))
    })?;

    let mut payments = Vec::new();
    for row in rows {
        payments.push(payment_from_row(row??)?);
    }
    Ok(payments)
}

pub fn update_payment_status(
    conn: &Connection,
    id: &Uuid,
    status: PaymentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE payments SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Payment", id));
    }
    Ok(())
}

pub fn set_method(
    conn: &Connection,
    id: &Uuid,
    method: &PaymentMethod,
) -> Result<(), DatabaseError> {
    let json = method_to_json(Some(method))?;
    let changed = conn.execute(
        "UPDATE payments SET method_json = ?2 WHERE id = ?1",
        params![id.to_string(), json],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Payment", id));
    }
    Ok(())
}

pub fn link_appointment(
    conn: &Connection,
    id: &Uuid,
    appointment_id: &Uuid,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE payments SET appointment_id = ?2 WHERE id = ?1",
        params![id.to_string(), appointment_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Payment", id));
    }
    Ok(())
}

/// Consume one session, transactionally: read, check the domain rules,
/// write back. Returns the updated payment.
pub fn use_session(conn: &mut Connection, id: &Uuid) -> Result<Payment, DatabaseError> {
    let tx = conn.transaction()?;
    let mut payment = {
        let row = tx
            .query_row(
                &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"),
                params![id.to_string()],
                payment_row_from_rusqlite,
            )
            .optional()?;
        match row {
            Some(row) => payment_from_row(row)?,
            None => return Err(DatabaseError::not_found("Payment", id)),
        }
    };

    payment
        .use_session()
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    tx.execute(
        "UPDATE payments SET sessions_used = ?2 WHERE id = ?1",
        params![id.to_string(), payment.sessions_used],
    )?;
    tx.commit()?;
    Ok(payment)
}

/// Mark the due-date alert as fired. Terminal — nothing re-arms it.
pub fn mark_alert_sent(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(DatabaseError::not_found("Payment", id));
    }
    conn.execute(
        "UPDATE payments SET alert_sent = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

/// Pending payments whose alert window is open (due within one day) and
/// whose alert has not fired yet.
pub fn alertable_payments(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<Vec<Payment>, DatabaseError> {
    let threshold = (now + Duration::days(1)).to_rfc3339();
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments
         WHERE status = 'pendiente' AND alert_sent = 0 AND due_date <= ?1
         ORDER BY due_date"
    ))?;

    let rows = stmt.query_map(params![threshold], |row| {
        Ok(payment_row_from_rusqlite(row))
    })?;

    let mut payments = Vec::new();
    for row in rows {
        payments.push(payment_from_row(row??)?);
    }
    Ok(payments)
}

pub fn statistics(conn: &Connection, now: DateTime<Utc>) -> Result<PaymentStatistics, DatabaseError> {
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
        .to_rfc3339();
    let now_s = now.to_rfc3339();

    let month_revenue: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments
         WHERE status = 'pagado' AND issued_at >= ?1",
        params![month_start],
        |row| row.get(0),
    )?;

    let pending_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE status = 'pendiente' AND due_date >= ?1",
        params![now_s],
        |row| row.get(0),
    )?;

    let overdue_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payments
         WHERE status = 'vencido' OR (status = 'pendiente' AND due_date < ?1)",
        params![now_s],
        |row| row.get(0),
    )?;

    let sessions_remaining: i64 = conn.query_row(
        "SELECT COALESCE(SUM(sessions_included - sessions_used), 0) FROM payments
         WHERE status = 'pagado'",
        [],
        |row| row.get(0),
    )?;

    Ok(PaymentStatistics {
        month_revenue,
        pending_count,
        overdue_count,
        sessions_remaining,
    })
}

fn method_to_json(method: Option<&PaymentMethod>) -> Result<Option<String>, DatabaseError> {
    method
        .map(|m| {
            serde_json::to_string(m)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
        })
        .transpose()
}

struct PaymentRow {
    id: String,
    patient_id: String,
    appointment_id: Option<String>,
    plan: String,
    amount: f64,
    status: String,
    sessions_included: i32,
    sessions_used: i32,
    issued_at: String,
    due_date: String,
    alert_sent: i32,
    method_json: Option<String>,
}

fn payment_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PaymentRow, rusqlite::Error> {
    Ok(PaymentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        appointment_id: row.get(2)?,
        plan: row.get(3)?,
        amount: row.get(4)?,
        status: row.get(5)?,
        sessions_included: row.get(6)?,
        sessions_used: row.get(7)?,
        issued_at: row.get(8)?,
        due_date: row.get(9)?,
        alert_sent: row.get(10)?,
        method_json: row.get(11)?,
    })
}

fn payment_from_row(row: PaymentRow) -> Result<Payment, DatabaseError> {
    let method = row
        .method_json
        .as_deref()
        .map(serde_json::from_str::<PaymentMethod>)
        .transpose()
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    Ok(Payment {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        appointment_id: parse_opt_uuid(row.appointment_id),
        plan: TreatmentPlan::from_str(&row.plan)?,
        amount: row.amount,
        status: PaymentStatus::from_str(&row.status)?,
        sessions_included: row.sessions_included,
        sessions_used: row.sessions_used,
        issued_at: parse_datetime(&row.issued_at)?,
        due_date: parse_datetime(&row.due_date)?,
        alert_sent: row.alert_sent != 0,
        method,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    pub(crate) fn paid_payment(
        conn: &Connection,
        plan: TreatmentPlan,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Payment {
        let mut payment = Payment::new(Uuid::new_v4(), plan, amount, now);
        payment.status = PaymentStatus::Pagado;
        insert_payment(conn, &payment).unwrap();
        payment
    }

    #[test]
    fn payment_round_trips_with_method() {
        let conn = open_memory_database().unwrap();
        let mut payment = Payment::new(Uuid::new_v4(), TreatmentPlan::Mensual, 45000.0, Utc::now());
        payment.method = Some(PaymentMethod::Transferencia {
            bank: "Galicia".into(),
            reference: "OP-991".into(),
        });
        insert_payment(&conn, &payment).unwrap();

        let found = get_payment(&conn, &payment.id).unwrap();
        assert_eq!(found.sessions_included, 4);
        assert_eq!(found.due_date, payment.due_date);
        match found.method {
            Some(PaymentMethod::Transferencia { ref bank, .. }) => assert_eq!(bank, "Galicia"),
            other => panic!("unexpected method: {other:?}"),
        }
    }

    #[test]
    fn linked_insert_writes_both_sides() {
        let mut conn = open_memory_database().unwrap();
        let patient = Uuid::new_v4();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 9, 10).unwrap();
        let appt =
            crate::db::repository::appointment::tests::sample_appointment(patient, date, "09:30");
        crate::db::repository::insert_appointment(&conn, &appt).unwrap();

        let mut payment = Payment::new(patient, TreatmentPlan::Quincenal, 25000.0, Utc::now());
        payment.appointment_id = Some(appt.id);
        insert_payment_with_link(&mut conn, &payment).unwrap();

        assert_eq!(
            get_payment(&conn, &payment.id).unwrap().appointment_id,
            Some(appt.id)
        );
        let linked = crate::db::repository::get_appointment(&conn, &appt.id).unwrap();
        assert_eq!(linked.payment_id, Some(payment.id));
    }

    #[test]
    fn linked_insert_rolls_back_when_appointment_is_gone() {
        let mut conn = open_memory_database().unwrap();
        let mut payment = Payment::new(Uuid::new_v4(), TreatmentPlan::Mensual, 45000.0, Utc::now());
        payment.appointment_id = Some(Uuid::new_v4());

        let err = insert_payment_with_link(&mut conn, &payment).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));

        // The payment row did not survive the failed link.
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM payments", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn use_session_decrements_until_exhausted() {
        let mut conn = open_memory_database().unwrap();
        let payment = paid_payment(&conn, TreatmentPlan::Quincenal, 25000.0, Utc::now());

        use_session(&mut conn, &payment.id).unwrap();
        let after = use_session(&mut conn, &payment.id).unwrap();
        assert_eq!(after.sessions_used, 2);

        let err = use_session(&mut conn, &payment.id).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert_eq!(get_payment(&conn, &payment.id).unwrap().sessions_used, 2);
    }

    #[test]
    fn use_session_rejects_unpaid_payment() {
        let mut conn = open_memory_database().unwrap();
        let payment = Payment::new(Uuid::new_v4(), TreatmentPlan::Mensual, 45000.0, Utc::now());
        insert_payment(&conn, &payment).unwrap();

        let err = use_session(&mut conn, &payment.id).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn alertable_respects_window_and_fire_once() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        // Due in 7 days — outside the window.
        let far = Payment::new(Uuid::new_v4(), TreatmentPlan::SesionUnica, 15000.0, now);
        insert_payment(&conn, &far).unwrap();
        // Due in 15 days, but created 15 days ago — inside the window.
        let near = Payment::new(
            Uuid::new_v4(),
            TreatmentPlan::Quincenal,
            25000.0,
            now - Duration::days(15),
        );
        insert_payment(&conn, &near).unwrap();

        let due = alertable_payments(&conn, now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, near.id);

        mark_alert_sent(&conn, &near.id).unwrap();
        assert!(alertable_payments(&conn, now).unwrap().is_empty());

        // Fire-once: marking again stays terminal, window never reopens.
        mark_alert_sent(&conn, &near.id).unwrap();
        assert!(alertable_payments(&conn, now + Duration::days(30))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn statistics_aggregate_revenue_and_counts() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();

        let mut paid = paid_payment(&conn, TreatmentPlan::Mensual, 45000.0, now);
        paid.sessions_used = 1;
        conn.execute(
            "UPDATE payments SET sessions_used = 1 WHERE id = ?1",
            params![paid.id.to_string()],
        )
        .unwrap();

        paid_payment(&conn, TreatmentPlan::SesionUnica, 15000.0, now);

        // Pending, due in the future.
        insert_payment(
            &conn,
            &Payment::new(Uuid::new_v4(), TreatmentPlan::Quincenal, 25000.0, now),
        )
        .unwrap();
        // Pending, past due — counts as overdue.
        insert_payment(
            &conn,
            &Payment::new(
                Uuid::new_v4(),
                TreatmentPlan::SesionUnica,
                15000.0,
                now - Duration::days(30),
            ),
        )
        .unwrap();

        let stats = statistics(&conn, now).unwrap();
        assert_eq!(stats.month_revenue, 60000.0);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.overdue_count, 1);
        // 4 - 1 from the monthly plan plus 1 - 0 from the single session.
        assert_eq!(stats.sessions_remaining, 4);
    }

    #[test]
    fn due_date_is_not_recomputed_on_status_change() {
        let conn = open_memory_database().unwrap();
        let payment = Payment::new(Uuid::new_v4(), TreatmentPlan::Mensual, 45000.0, Utc::now());
        insert_payment(&conn, &payment).unwrap();

        update_payment_status(&conn, &payment.id, PaymentStatus::Pagado).unwrap();
        let found = get_payment(&conn, &payment.id).unwrap();
        assert_eq!(found.due_date, payment.due_date);
    }
}
