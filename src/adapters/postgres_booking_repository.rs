//! Postgres implementation of BookingRepository.
//!
//! Every state change is a single conditional `UPDATE ... RETURNING`, so two
//! callbacks racing on the same booking cannot both win.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, ProviderState, Resolution};
use crate::ports::{BookingRepository, PaymentSession, RepositoryError, RepositoryResult};

const TICKET_NUMBER_INDEX: &str = "idx_bookings_ticket_number";

const BOOKING_COLUMNS: &str = r#"
    id, status, movie_id, movie_title, show_date, show_time, seat_type, quantity,
    unit_price, total_amount, customer_name, customer_mobile, customer_email, provider,
    invoice, payment_reference, raw_create_response, raw_execute_response, transaction_id,
    ticket_number, reconciliation_started_at, created_at, updated_at
"#;

/// Postgres-backed booking repository.
#[derive(Clone)]
pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BookingRow::into_domain).transpose()
    }
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<Booking> {
        let state = &booking.provider_state;
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            INSERT INTO bookings (
                id, status, movie_id, movie_title, show_date, show_time, seat_type, quantity,
                unit_price, total_amount, customer_name, customer_mobile, customer_email, provider,
                invoice, payment_reference, raw_create_response, raw_execute_response, transaction_id,
                ticket_number, reconciliation_started_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                      $15, $16, $17, $18, $19, $20, $21, $22, $23)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.movie_id)
        .bind(&booking.movie_title)
        .bind(&booking.show_date)
        .bind(&booking.show_time)
        .bind(&booking.seat_type)
        .bind(booking.quantity)
        .bind(&booking.unit_price)
        .bind(&booking.total_amount)
        .bind(&booking.customer_name)
        .bind(&booking.customer_mobile)
        .bind(&booking.customer_email)
        .bind(&booking.provider)
        .bind(&state.invoice)
        .bind(&state.payment_reference)
        .bind(&state.raw_create_response)
        .bind(&state.raw_execute_response)
        .bind(&state.transaction_id)
        .bind(&booking.ticket_number)
        .bind(booking.reconciliation_started_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Booking> {
        self.fetch_optional(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn attach_payment_session(
        &self,
        id: Uuid,
        session: &PaymentSession,
    ) -> RepositoryResult<Booking> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET payment_reference = $2, raw_create_response = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(&session.payment_reference)
        .bind(&session.raw_create_response)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn claim_for_reconciliation(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET reconciliation_started_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'initiated' AND reconciliation_started_at IS NULL
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BookingRow::into_domain).transpose()
    }

    async fn finalize(&self, id: Uuid, resolution: &Resolution) -> RepositoryResult<Option<Booking>> {
        let (ticket_number, transaction_id, raw_execute_response) = match resolution {
            Resolution::Paid {
                ticket_number,
                transaction_id,
                raw_execute_response,
            } => (
                Some(ticket_number.as_str()),
                transaction_id.as_deref(),
                Some(raw_execute_response),
            ),
            Resolution::Failed {
                raw_execute_response,
            } => (None, None, raw_execute_response.as_ref()),
        };

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = $2,
                ticket_number = $3,
                transaction_id = COALESCE($4, transaction_id),
                raw_execute_response = COALESCE($5, raw_execute_response),
                updated_at = NOW()
            WHERE id = $1 AND status = 'initiated'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(resolution.status().as_str())
        .bind(ticket_number)
        .bind(transaction_id)
        .bind(raw_execute_response)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.constraint() == Some(TICKET_NUMBER_INDEX) => {
                RepositoryError::DuplicateTicket(ticket_number.unwrap_or_default().to_string())
            }
            other => RepositoryError::Database(other),
        })?;

        row.map(BookingRow::into_domain).transpose()
    }

    async fn expire_initiated_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'failed', updated_at = NOW() \
             WHERE status = 'initiated' AND reconciliation_started_at IS NULL AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    status: String,
    movie_id: Uuid,
    movie_title: String,
    show_date: String,
    show_time: String,
    seat_type: String,
    quantity: i32,
    unit_price: BigDecimal,
    total_amount: BigDecimal,
    customer_name: String,
    customer_mobile: String,
    customer_email: String,
    provider: String,
    invoice: String,
    payment_reference: Option<String>,
    raw_create_response: Option<serde_json::Value>,
    raw_execute_response: Option<serde_json::Value>,
    transaction_id: Option<String>,
    ticket_number: Option<String>,
    reconciliation_started_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_domain(self) -> RepositoryResult<Booking> {
        let status = BookingStatus::parse(&self.status).ok_or_else(|| RepositoryError::Corrupt {
            id: self.id.to_string(),
            reason: format!("unknown status {}", self.status),
        })?;

        Ok(Booking {
            id: self.id,
            status,
            movie_id: self.movie_id,
            movie_title: self.movie_title,
            show_date: self.show_date,
            show_time: self.show_time,
            seat_type: self.seat_type,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_amount: self.total_amount,
            customer_name: self.customer_name,
            customer_mobile: self.customer_mobile,
            customer_email: self.customer_email,
            provider: self.provider,
            provider_state: ProviderState {
                invoice: self.invoice,
                payment_reference: self.payment_reference,
                raw_create_response: self.raw_create_response,
                raw_execute_response: self.raw_execute_response,
                transaction_id: self.transaction_id,
            },
            ticket_number: self.ticket_number,
            reconciliation_started_at: self.reconciliation_started_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
