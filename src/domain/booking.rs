//! Booking domain entity.
//! One customer's purchase attempt and its payment lifecycle.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schedule::ResolvedSelection;

pub const PROVIDER_NAME: &str = "external-wallet";
pub const INVOICE_PREFIX: &str = "TKT";
pub const TICKET_PREFIX: &str = "AC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Initiated,
    Paid,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Initiated => "initiated",
            BookingStatus::Paid => "paid",
            BookingStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initiated" => Some(BookingStatus::Initiated),
            "paid" => Some(BookingStatus::Paid),
            "failed" => Some(BookingStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Initiated)
    }
}

/// Provider correlation data kept on the booking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderState {
    pub invoice: String,
    pub payment_reference: Option<String>,
    pub raw_create_response: Option<serde_json::Value>,
    pub raw_execute_response: Option<serde_json::Value>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub name: String,
    pub mobile: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub status: BookingStatus,
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
    pub provider_state: ProviderState,
    pub ticket_number: Option<String>,
    pub reconciliation_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// New `Initiated` booking priced from the resolved selection.
    pub fn initiate(selection: ResolvedSelection, quantity: i32, customer: Customer) -> Self {
        let now = Utc::now();
        let total_amount = &selection.unit_price * BigDecimal::from(quantity);

        Self {
            id: Uuid::new_v4(),
            status: BookingStatus::Initiated,
            movie_id: selection.movie_id,
            movie_title: selection.movie_title,
            show_date: selection.show_date,
            show_time: selection.show_time,
            seat_type: selection.seat_type,
            quantity,
            unit_price: selection.unit_price,
            total_amount,
            customer_name: customer.name,
            customer_mobile: customer.mobile,
            customer_email: customer.email,
            provider: PROVIDER_NAME.to_string(),
            provider_state: ProviderState {
                invoice: generate_invoice(INVOICE_PREFIX),
                ..ProviderState::default()
            },
            ticket_number: None,
            reconciliation_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a terminal resolution. Returns false if already terminal.
    pub fn apply(&mut self, resolution: &Resolution) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        match resolution {
            Resolution::Paid {
                ticket_number,
                transaction_id,
                raw_execute_response,
            } => {
                self.status = BookingStatus::Paid;
                self.ticket_number = Some(ticket_number.clone());
                self.provider_state.transaction_id = transaction_id.clone();
                self.provider_state.raw_execute_response = Some(raw_execute_response.clone());
            }
            Resolution::Failed {
                raw_execute_response,
            } => {
                self.status = BookingStatus::Failed;
                if raw_execute_response.is_some() {
                    self.provider_state.raw_execute_response = raw_execute_response.clone();
                }
            }
        }
        self.updated_at = Utc::now();
        true
    }

    /// What the confirmation page should show. `Initiated` bookings older
    /// than `grace` read as expired since no final push ever arrives.
    pub fn outcome(&self, now: DateTime<Utc>, grace: Duration) -> BookingOutcome {
        match self.status {
            BookingStatus::Paid => BookingOutcome::Confirmed,
            BookingStatus::Failed => BookingOutcome::Failed,
            BookingStatus::Initiated if now - self.created_at > grace => BookingOutcome::Expired,
            BookingStatus::Initiated => BookingOutcome::Processing,
        }
    }
}

/// Terminal transition requested by reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Paid {
        ticket_number: String,
        transaction_id: Option<String>,
        raw_execute_response: serde_json::Value,
    },
    Failed {
        raw_execute_response: Option<serde_json::Value>,
    },
}

impl Resolution {
    pub fn status(&self) -> BookingStatus {
        match self {
            Resolution::Paid { .. } => BookingStatus::Paid,
            Resolution::Failed { .. } => BookingStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingOutcome {
    Confirmed,
    Failed,
    Processing,
    Expired,
}

fn random_hex(bytes: usize) -> String {
    let id = Uuid::new_v4();
    hex::encode_upper(&id.as_bytes()[..bytes])
}

/// `PREFIX-<last 6 digits of epoch millis>-<8 hex>`.
pub fn generate_invoice(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(6)..];
    format!("{}-{}-{}", prefix, tail, random_hex(4))
}

/// `PREFIX-<6 hex>`.
pub fn generate_ticket_number(prefix: &str) -> String {
    format!("{}-{}", prefix, random_hex(3))
}
