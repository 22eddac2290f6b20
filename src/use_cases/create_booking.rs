//! Create booking use case.
//! Validates a selection against the catalog, persists an `Initiated`
//! booking and opens a checkout session with the payment provider.

use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::BookingError;
use crate::config::urls::PublicUrls;
use crate::domain::{Booking, Customer, SelectionError};
use crate::gateway::{CreatePaymentRequest, PaymentGateway};
use crate::ports::{BookingRepository, MovieCatalog, PaymentSession};
use crate::validation::{self, sanitize_string};

/// Booking form as the browser submits it.
///
/// `movie_title`, `unit_price` and `total_amount` are accepted for
/// compatibility but never trusted; prices come from the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub movie_id: Uuid,
    pub show_date: String,
    pub show_time: String,
    pub seat_type: String,
    pub quantity: i64,
    pub customer_name: String,
    pub customer_mobile: String,
    pub customer_email: String,
    #[serde(default)]
    pub movie_title: Option<String>,
    #[serde(default)]
    pub unit_price: Option<BigDecimal>,
    #[serde(default)]
    pub total_amount: Option<BigDecimal>,
}

#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub redirect_url: String,
}

pub struct CreateBooking {
    catalog: Arc<dyn MovieCatalog>,
    bookings: Arc<dyn BookingRepository>,
    gateway: Arc<dyn PaymentGateway>,
    urls: PublicUrls,
}

impl CreateBooking {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        bookings: Arc<dyn BookingRepository>,
        gateway: Arc<dyn PaymentGateway>,
        urls: PublicUrls,
    ) -> Self {
        Self {
            catalog,
            bookings,
            gateway,
            urls,
        }
    }

    pub async fn execute(&self, request: BookingRequest) -> Result<CreatedBooking, BookingError> {
        let customer = validate_customer(&request)?;
        validation::validate_quantity(request.quantity)?;
        // bounded to 1..=10 above
        let quantity = request.quantity as i32;

        let snapshot = self.catalog.snapshot().await?;
        let selection = snapshot
            .resolve(
                request.movie_id,
                &request.show_date,
                &request.show_time,
                &request.seat_type,
            )
            .map_err(|e| match e {
                SelectionError::MovieNotFound(id) => {
                    BookingError::NotFound(format!("Movie {} is not available for booking", id))
                }
                SelectionError::Invalid(reason) => BookingError::InvalidSelection(reason),
            })?;

        let booking = Booking::initiate(selection, quantity, customer);

        if let Some(client_total) = &request.total_amount {
            if client_total != &booking.total_amount {
                tracing::warn!(
                    booking_id = %booking.id,
                    client_total = %client_total,
                    catalog_total = %booking.total_amount,
                    "Client-supplied total differs from catalog price; using catalog price"
                );
            }
        }

        let booking = self.bookings.insert(&booking).await?;
        tracing::info!(
            booking_id = %booking.id,
            invoice = %booking.provider_state.invoice,
            movie_id = %booking.movie_id,
            total_amount = %booking.total_amount,
            "Booking initiated"
        );

        let session = self.open_checkout(&booking).await.map_err(|e| {
            tracing::error!(
                booking_id = %booking.id,
                invoice = %booking.provider_state.invoice,
                error = %e,
                "Payment initiation failed; booking left initiated"
            );
            BookingError::PaymentInitiationFailed(e)
        })?;

        let booking = self
            .bookings
            .attach_payment_session(
                booking.id,
                &PaymentSession {
                    payment_reference: session.payment_reference,
                    raw_create_response: session.raw,
                },
            )
            .await?;

        Ok(CreatedBooking {
            booking,
            redirect_url: session.redirect_url,
        })
    }

    async fn open_checkout(
        &self,
        booking: &Booking,
    ) -> Result<crate::gateway::CheckoutSession, crate::gateway::GatewayError> {
        let token = self.gateway.acquire_token().await?;
        let request = CreatePaymentRequest {
            amount: booking.total_amount.clone(),
            invoice: booking.provider_state.invoice.clone(),
            callback_url: self.urls.callback_url(booking.id).to_string(),
        };
        self.gateway.create_payment(&request, &token).await
    }
}

fn validate_customer(request: &BookingRequest) -> Result<Customer, BookingError> {
    let name = sanitize_string(&request.customer_name);
    let mobile = sanitize_string(&request.customer_mobile);
    let email = sanitize_string(&request.customer_email);

    validation::validate_required("customerName", &name)?;
    validation::validate_required("customerMobile", &mobile)?;
    validation::validate_required("customerEmail", &email)?;
    validation::validate_max_len("customerName", &name, validation::CUSTOMER_NAME_MAX_LEN)?;
    validation::validate_max_len("customerMobile", &mobile, validation::CUSTOMER_MOBILE_MAX_LEN)?;
    validation::validate_max_len("customerEmail", &email, validation::CUSTOMER_EMAIL_MAX_LEN)?;

    if !validation::looks_like_email(&email) {
        tracing::warn!("Booking submitted with an unusual email address");
    }
    if !validation::looks_like_mobile(&mobile) {
        tracing::warn!("Booking submitted with an unusual mobile number");
    }

    Ok(Customer {
        name,
        mobile,
        email,
    })
}
