//! # Veterinary clinic scheduling core
//!
//! Decides whether an appointment may be booked for a veterinarian and
//! governs the appointment lifecycle from booking to completion.
//!
//! - [`conflict`]: pure overlap detection over a veterinarian's calendar
//! - [`lifecycle`]: the status state machine
//! - [`manager`]: validated create/update/delete/transition operations
//! - [`store`]: the persistence boundary and an in-memory implementation

pub mod conflict;
pub mod errors;
pub mod lifecycle;
pub mod locks;
pub mod manager;
pub mod models;
pub mod store;
pub mod validation;

pub use errors::{ClinicError, ClinicResult};
pub use manager::{AppointmentManager, ManagerConfig};
pub use store::AppointmentStore;
