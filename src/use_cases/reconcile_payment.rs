//! Reconcile payment use case.
//! Turns the provider's browser callback into a terminal booking state.

use std::sync::Arc;
use uuid::Uuid;

use super::BookingError;
use crate::domain::booking::{generate_ticket_number, TICKET_PREFIX};
use crate::domain::{Booking, Resolution};
use crate::gateway::{ExecutionResult, GatewayError, PaymentGateway};
use crate::ports::{BookingRepository, RepositoryError};

const TICKET_ATTEMPTS: u32 = 3;

/// Query parameters of the provider callback.
#[derive(Debug, Clone, Default)]
pub struct CallbackInput {
    pub booking_id: Uuid,
    pub payment_id: Option<String>,
    pub status: Option<String>,
}

impl CallbackInput {
    /// No marker (absent or blank) means "go ahead and execute".
    fn reports_success(&self) -> bool {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|status| !status.is_empty())
            .map(|status| status.eq_ignore_ascii_case("success"))
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The provider reported cancel/failure before execution.
    Declined,
    /// Execution ran but did not report a completed transaction.
    NotCompleted,
    /// No payment reference was available to execute.
    MissingPaymentReference,
    /// The gateway call itself failed.
    GatewayError,
}

impl FailureReason {
    /// Error code carried on the redirect back to the ticket page.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::Declined => "payment_failed",
            FailureReason::NotCompleted => "payment_execute_failed",
            FailureReason::MissingPaymentReference | FailureReason::GatewayError => "payment_error",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Reconciliation {
    Paid(Booking),
    Failed(Booking, FailureReason),
    /// Another callback already reconciled, or is reconciling, this booking.
    Unchanged(Booking),
}

impl Reconciliation {
    pub fn booking(&self) -> &Booking {
        match self {
            Reconciliation::Paid(booking)
            | Reconciliation::Failed(booking, _)
            | Reconciliation::Unchanged(booking) => booking,
        }
    }
}

pub struct ReconcilePayment {
    bookings: Arc<dyn BookingRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl ReconcilePayment {
    pub fn new(bookings: Arc<dyn BookingRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { bookings, gateway }
    }

    /// Errors only when the booking cannot be identified or the store is
    /// unreachable; every gateway problem ends in a `Failed` booking.
    pub async fn execute(&self, input: CallbackInput) -> Result<Reconciliation, BookingError> {
        let booking_id = input.booking_id;

        let Some(booking) = self.bookings.claim_for_reconciliation(booking_id).await? else {
            let current = self.bookings.get_by_id(booking_id).await.map_err(|e| match e {
                RepositoryError::NotFound(_) => {
                    BookingError::NotFound(format!("Booking {} not found", booking_id))
                }
                other => BookingError::Repository(other),
            })?;
            tracing::info!(
                booking_id = %booking_id,
                status = current.status.as_str(),
                "Callback for booking that is already reconciled or in progress"
            );
            return Ok(Reconciliation::Unchanged(current));
        };

        if !input.reports_success() {
            tracing::info!(
                booking_id = %booking_id,
                provider_status = input.status.as_deref().unwrap_or_default(),
                "Provider reported unsuccessful payment"
            );
            return self
                .fail(booking, None, FailureReason::Declined)
                .await;
        }

        let Some(payment_reference) = payment_reference_for(&booking, &input) else {
            tracing::warn!(booking_id = %booking_id, "No payment reference to execute");
            return self
                .fail(booking, None, FailureReason::MissingPaymentReference)
                .await;
        };

        let execution = match self.execute_with_provider(&payment_reference).await {
            Ok(execution) => execution,
            Err(e) => {
                tracing::error!(booking_id = %booking_id, error = %e, "Payment execution failed");
                return self.fail(booking, None, FailureReason::GatewayError).await;
            }
        };

        if !execution.completed {
            tracing::info!(booking_id = %booking_id, "Provider did not complete the transaction");
            return self
                .fail(booking, Some(execution.raw), FailureReason::NotCompleted)
                .await;
        }

        match self.mark_paid(&booking, execution).await? {
            Some(paid) => {
                tracing::info!(
                    booking_id = %paid.id,
                    ticket_number = paid.ticket_number.as_deref().unwrap_or_default(),
                    "Booking paid"
                );
                Ok(Reconciliation::Paid(paid))
            }
            None => self.unchanged(booking.id).await,
        }
    }

    /// The money is already captured here, so a ticket number collision is
    /// retried with a fresh number instead of surfacing as an error.
    async fn mark_paid(
        &self,
        booking: &Booking,
        execution: ExecutionResult,
    ) -> Result<Option<Booking>, BookingError> {
        let mut attempt = 1;
        loop {
            let resolution = Resolution::Paid {
                ticket_number: generate_ticket_number(TICKET_PREFIX),
                transaction_id: execution.transaction_id.clone(),
                raw_execute_response: execution.raw.clone(),
            };

            match self.bookings.finalize(booking.id, &resolution).await {
                Err(RepositoryError::DuplicateTicket(ticket)) if attempt < TICKET_ATTEMPTS => {
                    tracing::warn!(
                        booking_id = %booking.id,
                        ticket_number = %ticket,
                        attempt,
                        "Ticket number collision, issuing another"
                    );
                    attempt += 1;
                }
                other => return Ok(other?),
            }
        }
    }

    async fn execute_with_provider(
        &self,
        payment_reference: &str,
    ) -> Result<ExecutionResult, GatewayError> {
        let token = self.gateway.acquire_token().await?;
        self.gateway.execute_payment(payment_reference, &token).await
    }

    async fn fail(
        &self,
        booking: Booking,
        raw_execute_response: Option<serde_json::Value>,
        reason: FailureReason,
    ) -> Result<Reconciliation, BookingError> {
        let resolution = Resolution::Failed {
            raw_execute_response,
        };

        match self.bookings.finalize(booking.id, &resolution).await? {
            Some(failed) => {
                tracing::info!(booking_id = %failed.id, reason = reason.code(), "Booking failed");
                Ok(Reconciliation::Failed(failed, reason))
            }
            None => self.unchanged(booking.id).await,
        }
    }

    async fn unchanged(&self, booking_id: Uuid) -> Result<Reconciliation, BookingError> {
        let current = self.bookings.get_by_id(booking_id).await?;
        Ok(Reconciliation::Unchanged(current))
    }
}

/// Prefers the reference stored at checkout creation; the callback's
/// `paymentID` is only a fallback.
fn payment_reference_for(booking: &Booking, input: &CallbackInput) -> Option<String> {
    let stored = booking.provider_state.payment_reference.as_deref();
    let reported = input.payment_id.as_deref().filter(|id| !id.is_empty());

    if let (Some(stored), Some(reported)) = (stored, reported) {
        if stored != reported {
            tracing::warn!(
                booking_id = %booking.id,
                "Callback paymentID differs from stored payment reference; using stored value"
            );
        }
    }

    stored.or(reported).map(str::to_string)
}
