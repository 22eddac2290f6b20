//! In-memory port implementations for tests and fixture-driven runs.
//!
//! The booking map sits behind one async lock, so each conditional update
//! below is atomic the same way the SQL `UPDATE ... WHERE` is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, CatalogSnapshot, Movie, Resolution};
use crate::ports::{
    BookingRepository, MovieCatalog, PaymentSession, RepositoryError, RepositoryResult,
};

/// Catalog over a fixed list of movies.
#[derive(Debug, Default)]
pub struct StaticMovieCatalog {
    movies: RwLock<Vec<Movie>>,
}

impl StaticMovieCatalog {
    pub fn new(movies: Vec<Movie>) -> Self {
        Self {
            movies: RwLock::new(movies),
        }
    }

    /// Replaces the catalog, as a content edit would.
    pub async fn replace(&self, movies: Vec<Movie>) {
        *self.movies.write().await = movies;
    }
}

#[async_trait]
impl MovieCatalog for StaticMovieCatalog {
    async fn snapshot(&self) -> RepositoryResult<CatalogSnapshot> {
        Ok(CatalogSnapshot::new(self.movies.read().await.clone()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.bookings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bookings.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<Booking> {
        self.bookings.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<Booking> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(RepositoryError::Corrupt {
                id: booking.id.to_string(),
                reason: "duplicate id".to_string(),
            });
        }
        bookings.insert(booking.id, booking.clone());
        Ok(booking.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Booking> {
        self.bookings
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn attach_payment_session(
        &self,
        id: Uuid,
        session: &PaymentSession,
    ) -> RepositoryResult<Booking> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        booking.provider_state.payment_reference = Some(session.payment_reference.clone());
        booking.provider_state.raw_create_response = Some(session.raw_create_response.clone());
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn claim_for_reconciliation(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        let mut bookings = self.bookings.write().await;
        let Some(booking) = bookings.get_mut(&id) else {
            return Ok(None);
        };

        if booking.status != BookingStatus::Initiated || booking.reconciliation_started_at.is_some() {
            return Ok(None);
        }

        let now = Utc::now();
        booking.reconciliation_started_at = Some(now);
        booking.updated_at = now;
        Ok(Some(booking.clone()))
    }

    async fn finalize(&self, id: Uuid, resolution: &Resolution) -> RepositoryResult<Option<Booking>> {
        let mut bookings = self.bookings.write().await;
        if let Resolution::Paid { ticket_number, .. } = resolution {
            let taken = bookings.values().any(|other| {
                other.id != id && other.ticket_number.as_deref() == Some(ticket_number.as_str())
            });
            if taken {
                return Err(RepositoryError::DuplicateTicket(ticket_number.clone()));
            }
        }
        let Some(booking) = bookings.get_mut(&id) else {
            return Ok(None);
        };

        Ok(booking.apply(resolution).then(|| booking.clone()))
    }

    async fn expire_initiated_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut bookings = self.bookings.write().await;
        let mut expired = 0;
        for booking in bookings.values_mut() {
            if booking.created_at < cutoff
                && booking.reconciliation_started_at.is_none()
                && booking.apply(&Resolution::Failed {
                    raw_execute_response: None,
                })
            {
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}
