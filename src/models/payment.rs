use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::enums::{PaymentStatus, TreatmentPlan};

/// A billing record with session-based consumption against a treatment plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub plan: TreatmentPlan,
    pub amount: f64,
    pub status: PaymentStatus,
    pub sessions_included: i32,
    pub sessions_used: i32,
    pub issued_at: DateTime<Utc>,
    /// Set once at creation from the plan, never recomputed.
    pub due_date: DateTime<Utc>,
    /// Fire-once flag: never re-armed after the alert goes out.
    pub alert_sent: bool,
    pub method: Option<PaymentMethod>,
}

/// Payment-method-specific metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Mock gateway data — the real integration is pending, so only a
    /// fabricated preference id and checkout URL are stored.
    MercadoPago {
        preference_id: String,
        init_point: String,
    },
    Transferencia {
        bank: String,
        reference: String,
    },
    Efectivo {
        received_by: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment is not paid, sessions cannot be consumed")]
    NotPaid,
    #[error("all included sessions have been used")]
    SessionsExhausted,
}

impl TreatmentPlan {
    /// Sessions granted by this plan.
    pub fn sessions_included(&self) -> i32 {
        match self {
            TreatmentPlan::Mensual => 4,
            TreatmentPlan::Quincenal => 2,
            TreatmentPlan::SesionUnica => 1,
        }
    }

    /// Days until the payment falls due.
    pub fn due_in_days(&self) -> i64 {
        match self {
            TreatmentPlan::Mensual => 30,
            TreatmentPlan::Quincenal => 15,
            TreatmentPlan::SesionUnica => 7,
        }
    }
}

impl Payment {
    /// Build a new pending payment with plan-derived session count and due
    /// date. Both are fixed here and never recomputed afterwards.
    pub fn new(patient_id: Uuid, plan: TreatmentPlan, amount: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            appointment_id: None,
            plan,
            amount,
            status: PaymentStatus::Pendiente,
            sessions_included: plan.sessions_included(),
            sessions_used: 0,
            issued_at: now,
            due_date: now + Duration::days(plan.due_in_days()),
            alert_sent: false,
            method: None,
        }
    }

    pub fn sessions_remaining(&self) -> i32 {
        self.sessions_included - self.sessions_used
    }

    /// Consume one session. Only paid payments with sessions left qualify.
    pub fn use_session(&mut self) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Pagado {
            return Err(PaymentError::NotPaid);
        }
        if self.sessions_used >= self.sessions_included {
            return Err(PaymentError::SessionsExhausted);
        }
        self.sessions_used += 1;
        Ok(())
    }

    /// Pure alert-eligibility check: a pending payment within one day of its
    /// due date whose alert has not fired yet. Fire-once semantics — once
    /// `alert_sent` is set this never returns true again.
    pub fn alert_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pendiente
            && !self.alert_sent
            && now >= self.due_date - Duration::days(1)
    }

    /// A pending payment past its due date is overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pendiente && now > self.due_date
    }
}
