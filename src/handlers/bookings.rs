use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::parse_id;
use crate::domain::{Booking, BookingOutcome, BookingStatus};
use crate::error::AppError;
use crate::use_cases::{BookingRequest, CreateBooking};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CheckoutRedirect {
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    #[serde(rename = "bookingId")]
    pub booking_id: Uuid,
}

/// Provider bookkeeping without the raw create/execute payloads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProviderState {
    pub invoice: String,
    pub payment_reference: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: Uuid,
    pub status: BookingStatus,
    pub outcome: BookingOutcome,
    pub movie_id: Uuid,
    pub movie_title: String,
    pub show_date: String,
    pub show_time: String,
    pub seat_type: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_amount: BigDecimal,
    pub customer_name: String,
    pub customer_mobile: String,
    pub customer_email: String,
    pub provider: String,
    pub provider_state: PublicProviderState,
    pub ticket_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingView {
    pub fn from_booking(booking: Booking, now: DateTime<Utc>, grace: chrono::Duration) -> Self {
        let outcome = booking.outcome(now, grace);
        Self {
            id: booking.id,
            status: booking.status,
            outcome,
            movie_id: booking.movie_id,
            movie_title: booking.movie_title,
            show_date: booking.show_date,
            show_time: booking.show_time,
            seat_type: booking.seat_type,
            quantity: booking.quantity,
            unit_price: booking.unit_price,
            total_amount: booking.total_amount,
            customer_name: booking.customer_name,
            customer_mobile: booking.customer_mobile,
            customer_email: booking.customer_email,
            provider: booking.provider,
            provider_state: PublicProviderState {
                invoice: booking.provider_state.invoice,
                payment_reference: booking.provider_state.payment_reference,
                transaction_id: booking.provider_state.transaction_id,
            },
            ticket_number: booking.ticket_number,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

pub async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected booking payload");
        AppError::BadRequest(rejection.body_text())
    })?;

    let use_case = CreateBooking::new(
        state.catalog.clone(),
        state.bookings.clone(),
        state.gateway.clone(),
        state.urls.clone(),
    );
    let created = use_case.execute(request).await?;

    Ok(Json(CheckoutRedirect {
        redirect_url: created.redirect_url,
        booking_id: created.booking.id,
    }))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "Booking")?;
    let booking = state.bookings.get_by_id(id).await?;

    Ok(Json(BookingView::from_booking(
        booking,
        Utc::now(),
        state.pending_grace,
    )))
}
