pub mod appointments;
pub mod histories;
pub mod lab_requests;
pub mod patients;
pub mod payments;
pub mod studies;
pub mod treatments;
