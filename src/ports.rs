//! Capabilities the booking core depends on.
//! Postgres and in-memory implementations live in `crate::adapters`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Booking, CatalogSnapshot, Resolution};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Ticket number already issued: {0}")]
    DuplicateTicket(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Data the provider returned when the checkout session was created.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub payment_reference: String,
    pub raw_create_response: serde_json::Value,
}

/// Read-only access to the movie catalog owned by content management.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Bookable movies (now showing, active) as of this call.
    async fn snapshot(&self) -> RepositoryResult<CatalogSnapshot>;
}

/// Durable store of booking attempts. Bookings are never deleted.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<Booking>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Booking>;

    async fn attach_payment_session(
        &self,
        id: Uuid,
        session: &PaymentSession,
    ) -> RepositoryResult<Booking>;

    /// Marks an `Initiated`, unclaimed booking as being reconciled.
    ///
    /// Returns `None` when the booking is terminal or another callback
    /// already holds the claim; the caller must then leave it alone.
    async fn claim_for_reconciliation(&self, id: Uuid) -> RepositoryResult<Option<Booking>>;

    /// Moves an `Initiated` booking to the resolution's terminal state.
    ///
    /// Returns `None` without writing when the booking is already terminal,
    /// and `DuplicateTicket` when another booking holds the ticket number.
    async fn finalize(&self, id: Uuid, resolution: &Resolution) -> RepositoryResult<Option<Booking>>;

    /// Fails every unclaimed `Initiated` booking created before `cutoff`.
    /// Bookings a callback is reconciling are left alone. Returns the count.
    async fn expire_initiated_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;

    async fn ping(&self) -> RepositoryResult<()>;
}
