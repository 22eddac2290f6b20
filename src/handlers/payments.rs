use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::urls::PublicUrls;
use crate::domain::BookingStatus;
use crate::use_cases::{BookingError, CallbackInput, ReconcilePayment, Reconciliation};
use crate::AppState;

const UNKNOWN_BOOKING: &str = "booking_not_found";
const RECONCILIATION_ERROR: &str = "payment_error";
const ALREADY_FAILED: &str = "payment_failed";

/// Query string the provider appends when it sends the browser back.
/// Every field is optional so a mangled callback still gets a redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(rename = "bookingId")]
    pub booking_id: Option<String>,
    #[serde(rename = "paymentID")]
    pub payment_id: Option<String>,
    pub status: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let booking_id = match query
        .booking_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    {
        Some(id) => id,
        None => {
            tracing::warn!(
                booking_id = ?query.booking_id,
                payment_id = ?query.payment_id,
                "Payment callback without a usable booking id"
            );
            return error_redirect(&state.urls, UNKNOWN_BOOKING);
        }
    };

    tracing::info!(
        booking_id = %booking_id,
        payment_id = ?query.payment_id,
        status = ?query.status,
        "Payment callback received"
    );

    let use_case = ReconcilePayment::new(state.bookings.clone(), state.gateway.clone());
    let input = CallbackInput {
        booking_id,
        payment_id: query.payment_id,
        status: query.status,
    };

    match use_case.execute(input).await {
        Ok(Reconciliation::Paid(booking)) => {
            Redirect::to(state.urls.confirmation_url(booking.id).as_str())
        }
        Ok(Reconciliation::Failed(_, reason)) => error_redirect(&state.urls, reason.code()),
        Ok(Reconciliation::Unchanged(booking)) => match booking.status {
            BookingStatus::Paid | BookingStatus::Initiated => {
                Redirect::to(state.urls.confirmation_url(booking.id).as_str())
            }
            BookingStatus::Failed => error_redirect(&state.urls, ALREADY_FAILED),
        },
        Err(BookingError::NotFound(msg)) => {
            tracing::warn!(booking_id = %booking_id, "{}", msg);
            error_redirect(&state.urls, UNKNOWN_BOOKING)
        }
        Err(e) => {
            tracing::error!(booking_id = %booking_id, error = %e, "Payment reconciliation failed");
            error_redirect(&state.urls, RECONCILIATION_ERROR)
        }
    }
}

fn error_redirect(urls: &PublicUrls, code: &str) -> Redirect {
    Redirect::to(urls.ticket_error_url(code).as_str())
}
