//! Application layer: overlay services and the reconciliation loop
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod control;
pub mod error;
pub mod scheduler;
pub mod services;

pub use control::{ControlRequest, ControlResponse, ToggleEvent};
pub use error::{ApplicationError, ApplicationResult};
pub use scheduler::{RetryPolicy, TimerId, TimerQueue};
