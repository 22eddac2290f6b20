//! Booking creation and payment reconciliation flows.

pub mod create_booking;
pub mod reconcile_payment;

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::ports::RepositoryError;
use crate::validation::ValidationError;

pub use create_booking::{BookingRequest, CreateBooking, CreatedBooking};
pub use reconcile_payment::{CallbackInput, FailureReason, ReconcilePayment, Reconciliation};

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Payment initiation failed: {0}")]
    PaymentInitiationFailed(#[source] GatewayError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
