pub mod appointment;
pub mod clinical_history;
pub mod enums;
pub mod lab;
pub mod patient;
pub mod payment;
pub mod study;
pub mod treatment;

pub use appointment::*;
pub use clinical_history::*;
pub use enums::*;
pub use lab::*;
pub use patient::*;
pub use payment::*;
pub use study::*;
pub use treatment::*;
