mod common;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use cinema_core::adapters::InMemoryBookingRepository;
use cinema_core::domain::{Booking, BookingStatus, Resolution};
use cinema_core::gateway::{
    AccessToken, CheckoutSession, CreatePaymentRequest, ExecutionResult, GatewayResult,
    PaymentGateway,
};
use cinema_core::ports::{BookingRepository, PaymentSession, RepositoryError, RepositoryResult};
use cinema_core::use_cases::{
    BookingError, BookingRequest, CallbackInput, CreateBooking, FailureReason, ReconcilePayment,
    Reconciliation,
};
use common::{booking_form, urls, FakeGateway, Harness};

fn create_use_case(h: &Harness) -> CreateBooking {
    CreateBooking::new(
        h.catalog.clone(),
        h.bookings.clone(),
        h.gateway.clone(),
        urls(),
    )
}

fn reconcile_use_case(h: &Harness) -> ReconcilePayment {
    ReconcilePayment::new(h.bookings.clone(), h.gateway.clone())
}

fn request(value: serde_json::Value) -> BookingRequest {
    serde_json::from_value(value).unwrap()
}

fn callback(booking_id: Uuid, payment_id: Option<&str>, status: Option<&str>) -> CallbackInput {
    CallbackInput {
        booking_id,
        payment_id: payment_id.map(str::to_string),
        status: status.map(str::to_string),
    }
}

#[tokio::test]
async fn test_create_booking_prices_from_catalog() {
    let h = Harness::new();

    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 2)))
        .await
        .unwrap();

    let booking = h.bookings.get_by_id(created.booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Initiated);
    assert_eq!(booking.total_amount, BigDecimal::from(700));
    assert_eq!(booking.unit_price, BigDecimal::from(350));
    assert_eq!(booking.movie_title, "M");
    assert!(booking.ticket_number.is_none());
    assert!(created.redirect_url.starts_with("https://wallet.example/checkout/"));

    let expected_reference = FakeGateway::payment_reference_for(&booking.provider_state.invoice);
    assert_eq!(
        booking.provider_state.payment_reference.as_deref(),
        Some(expected_reference.as_str())
    );
    assert!(booking.provider_state.invoice.starts_with("TKT-"));

    let sent = h.gateway.create_requests.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].amount, BigDecimal::from(700));
    assert_eq!(
        sent[0].callback_url,
        format!(
            "https://cinema.example/payments/callback?bookingId={}",
            booking.id
        )
    );
}

#[tokio::test]
async fn test_client_supplied_prices_are_ignored() {
    let h = Harness::new();
    let mut form = booking_form(h.movie.id, "18:00", "Rear", 3);
    form["unitPrice"] = json!(1);
    form["totalAmount"] = json!(3);
    form["movieTitle"] = json!("Something Else");

    let created = create_use_case(&h).execute(request(form)).await.unwrap();

    assert_eq!(created.booking.unit_price, BigDecimal::from(450));
    assert_eq!(created.booking.total_amount, BigDecimal::from(1350));
    assert_eq!(created.booking.movie_title, "M");
}

#[tokio::test]
async fn test_unknown_showtime_is_rejected_without_persisting() {
    let h = Harness::new();

    let result = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "19:00", "Front", 2)))
        .await;

    assert!(matches!(result, Err(BookingError::InvalidSelection(_))));
    assert!(h.bookings.is_empty().await);
    assert_eq!(h.gateway.token_calls(), 0);
}

#[tokio::test]
async fn test_unknown_category_and_empty_date_are_rejected() {
    let h = Harness::new();
    let use_case = create_use_case(&h);

    let wrong_category = use_case
        .execute(request(booking_form(h.movie.id, "21:15", "Rear", 1)))
        .await;
    assert!(matches!(wrong_category, Err(BookingError::InvalidSelection(_))));

    let mut form = booking_form(h.movie.id, "18:00", "Front", 1);
    form["showDate"] = json!("2025-08-12");
    let empty_day = use_case.execute(request(form)).await;
    assert!(matches!(empty_day, Err(BookingError::InvalidSelection(_))));

    assert!(h.bookings.is_empty().await);
}

#[tokio::test]
async fn test_unknown_or_unbookable_movie_is_not_found() {
    let h = Harness::new();
    let use_case = create_use_case(&h);

    let unknown = use_case
        .execute(request(booking_form(Uuid::new_v4(), "18:00", "Front", 1)))
        .await;
    assert!(matches!(unknown, Err(BookingError::NotFound(_))));

    let soon = common::upcoming_movie();
    h.catalog.replace(vec![h.movie.clone(), soon.clone()]).await;
    let upcoming = use_case
        .execute(request(booking_form(soon.id, "18:00", "Front", 1)))
        .await;
    assert!(matches!(upcoming, Err(BookingError::NotFound(_))));
    assert!(h.bookings.is_empty().await);
}

#[tokio::test]
async fn test_quantity_bounds_are_enforced() {
    let h = Harness::new();
    let use_case = create_use_case(&h);

    for quantity in [0, -1, 11] {
        let result = use_case
            .execute(request(booking_form(h.movie.id, "18:00", "Front", quantity)))
            .await;
        assert!(
            matches!(result, Err(BookingError::Validation(_))),
            "quantity {} should be rejected",
            quantity
        );
    }

    let max = use_case
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 10)))
        .await
        .unwrap();
    assert_eq!(max.booking.total_amount, BigDecimal::from(3500));
    assert_eq!(h.bookings.len().await, 1);
}

#[tokio::test]
async fn test_missing_customer_name_is_rejected() {
    let h = Harness::new();
    let mut form = booking_form(h.movie.id, "18:00", "Front", 1);
    form["customerName"] = json!("   ");

    let result = create_use_case(&h).execute(request(form)).await;

    assert!(matches!(result, Err(BookingError::Validation(_))));
    assert!(h.bookings.is_empty().await);
}

#[tokio::test]
async fn test_gateway_failure_leaves_booking_initiated() {
    let h = Harness::new();
    h.gateway.fail_create.store(true, Ordering::SeqCst);

    let result = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 2)))
        .await;

    assert!(matches!(result, Err(BookingError::PaymentInitiationFailed(_))));
    let stored = h.bookings.all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, BookingStatus::Initiated);
    assert!(stored[0].provider_state.payment_reference.is_none());
    assert!(stored[0].ticket_number.is_none());
}

#[tokio::test]
async fn test_successful_callback_issues_ticket() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 2)))
        .await
        .unwrap();
    let reference = created.booking.provider_state.payment_reference.clone();

    let outcome = reconcile_use_case(&h)
        .execute(callback(created.booking.id, reference.as_deref(), Some("success")))
        .await
        .unwrap();

    let Reconciliation::Paid(paid) = outcome else {
        panic!("expected a paid booking, got {:?}", outcome);
    };
    assert_eq!(paid.status, BookingStatus::Paid);
    assert!(paid.ticket_number.as_deref().unwrap().starts_with("AC-"));
    assert_eq!(paid.provider_state.transaction_id.as_deref(), Some("TRX12345"));
    assert!(paid.provider_state.raw_execute_response.is_some());
    assert_eq!(h.gateway.execute_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_callback_fails_without_execute() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 2)))
        .await
        .unwrap();

    let outcome = reconcile_use_case(&h)
        .execute(callback(created.booking.id, Some("PAY-X"), Some("cancel")))
        .await
        .unwrap();

    match outcome {
        Reconciliation::Failed(booking, reason) => {
            assert_eq!(booking.status, BookingStatus::Failed);
            assert!(booking.ticket_number.is_none());
            assert_eq!(reason, FailureReason::Declined);
            assert_eq!(reason.code(), "payment_failed");
        }
        other => panic!("expected a failed booking, got {:?}", other),
    }
    assert_eq!(h.gateway.execute_calls(), 0);
}

#[tokio::test]
async fn test_incomplete_execution_fails_booking() {
    let h = Harness::new();
    h.gateway.decline_execute.store(true, Ordering::SeqCst);
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "21:15", "Front", 1)))
        .await
        .unwrap();

    let outcome = reconcile_use_case(&h)
        .execute(callback(created.booking.id, None, Some("success")))
        .await
        .unwrap();

    match outcome {
        Reconciliation::Failed(booking, reason) => {
            assert_eq!(reason.code(), "payment_execute_failed");
            assert!(booking.ticket_number.is_none());
            assert_eq!(
                booking.provider_state.raw_execute_response.unwrap()["statusCode"],
                "2056"
            );
        }
        other => panic!("expected a failed booking, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gateway_error_during_callback_fails_booking() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 1)))
        .await
        .unwrap();
    h.gateway.fail_execute.store(true, Ordering::SeqCst);

    let outcome = reconcile_use_case(&h)
        .execute(callback(created.booking.id, None, Some("success")))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        Reconciliation::Failed(_, FailureReason::GatewayError)
    ));
    let stored = h.bookings.get_by_id(created.booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Failed);
}

#[tokio::test]
async fn test_stored_payment_reference_wins_over_callback() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 1)))
        .await
        .unwrap();
    let stored_reference = created.booking.provider_state.payment_reference.clone().unwrap();

    reconcile_use_case(&h)
        .execute(callback(created.booking.id, Some("PAY-FORGED"), Some("success")))
        .await
        .unwrap();

    let executed = h.gateway.executed_references.lock().unwrap().clone();
    assert_eq!(executed, vec![stored_reference]);
}

#[tokio::test]
async fn test_unknown_booking_callback_is_not_found() {
    let h = Harness::new();

    let result = reconcile_use_case(&h)
        .execute(callback(Uuid::new_v4(), Some("PAY-1"), Some("success")))
        .await;

    assert!(matches!(result, Err(BookingError::NotFound(_))));
    assert_eq!(h.gateway.execute_calls(), 0);
}

#[tokio::test]
async fn test_second_callback_is_a_no_op() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 2)))
        .await
        .unwrap();
    let use_case = reconcile_use_case(&h);

    let first = use_case
        .execute(callback(created.booking.id, None, Some("success")))
        .await
        .unwrap();
    let ticket = first.booking().ticket_number.clone();

    let second = use_case
        .execute(callback(created.booking.id, None, Some("cancel")))
        .await
        .unwrap();

    let Reconciliation::Unchanged(current) = second else {
        panic!("expected the second callback to be a no-op");
    };
    assert_eq!(current.status, BookingStatus::Paid);
    assert_eq!(current.ticket_number, ticket);
    assert_eq!(h.gateway.execute_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_callbacks_issue_exactly_one_ticket() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 2)))
        .await
        .unwrap();
    let first_use_case = reconcile_use_case(&h);
    let second_use_case = reconcile_use_case(&h);

    let (first, second) = futures::join!(
        first_use_case.execute(callback(created.booking.id, None, Some("success"))),
        second_use_case.execute(callback(created.booking.id, None, Some("success"))),
    );
    let outcomes = [first.unwrap(), second.unwrap()];

    let paid = outcomes
        .iter()
        .filter(|o| matches!(o, Reconciliation::Paid(_)))
        .count();
    let unchanged = outcomes
        .iter()
        .filter(|o| matches!(o, Reconciliation::Unchanged(_)))
        .count();
    assert_eq!(paid, 1);
    assert_eq!(unchanged, 1);
    assert_eq!(h.gateway.execute_calls(), 1);

    let stored = h.bookings.get_by_id(created.booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Paid);
    assert!(stored.ticket_number.is_some());
}

#[tokio::test]
async fn test_ticket_number_set_only_for_paid_bookings() {
    let h = Harness::new();
    let create = create_use_case(&h);
    let reconcile = reconcile_use_case(&h);

    let paid = create
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 1)))
        .await
        .unwrap();
    let cancelled = create
        .execute(request(booking_form(h.movie.id, "18:00", "Rear", 2)))
        .await
        .unwrap();
    create
        .execute(request(booking_form(h.movie.id, "21:15", "Front", 3)))
        .await
        .unwrap();

    reconcile
        .execute(callback(paid.booking.id, None, Some("success")))
        .await
        .unwrap();
    reconcile
        .execute(callback(cancelled.booking.id, None, Some("failure")))
        .await
        .unwrap();

    let all = h.bookings.all().await;
    assert_eq!(all.len(), 3);
    for booking in all {
        assert_eq!(
            booking.ticket_number.is_some(),
            booking.status == BookingStatus::Paid,
            "booking {} breaks ticket/status coupling",
            booking.id
        );
    }
}

#[tokio::test]
async fn test_expire_stale_fails_only_old_initiated_bookings() {
    let h = Harness::new();
    let create = create_use_case(&h);

    let pending = create
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 1)))
        .await
        .unwrap();
    let paid = create
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 1)))
        .await
        .unwrap();
    reconcile_use_case(&h)
        .execute(callback(paid.booking.id, None, Some("success")))
        .await
        .unwrap();

    let cutoff = chrono::Utc::now() + chrono::Duration::seconds(1);
    let expired = h.bookings.expire_initiated_before(cutoff).await.unwrap();

    assert_eq!(expired, 1);
    let pending = h.bookings.get_by_id(pending.booking.id).await.unwrap();
    assert_eq!(pending.status, BookingStatus::Failed);
    let paid = h.bookings.get_by_id(paid.booking.id).await.unwrap();
    assert_eq!(paid.status, BookingStatus::Paid);
}

#[tokio::test]
async fn test_empty_status_marker_still_executes() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 1)))
        .await
        .unwrap();

    let outcome = reconcile_use_case(&h)
        .execute(callback(created.booking.id, None, Some("  ")))
        .await
        .unwrap();

    assert!(matches!(outcome, Reconciliation::Paid(_)));
    assert_eq!(h.gateway.execute_calls(), 1);
}

/// Runs the operator expiry sweep while the provider is executing, the way
/// `bookings expire-stale` can overlap a slow callback.
struct SweepDuringExecute {
    inner: Arc<FakeGateway>,
    bookings: Arc<InMemoryBookingRepository>,
}

#[async_trait]
impl PaymentGateway for SweepDuringExecute {
    async fn acquire_token(&self) -> GatewayResult<AccessToken> {
        self.inner.acquire_token().await
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
        token: &AccessToken,
    ) -> GatewayResult<CheckoutSession> {
        self.inner.create_payment(request, token).await
    }

    async fn execute_payment(
        &self,
        payment_reference: &str,
        token: &AccessToken,
    ) -> GatewayResult<ExecutionResult> {
        let cutoff = chrono::Utc::now() + chrono::Duration::hours(1);
        self.bookings.expire_initiated_before(cutoff).await.unwrap();
        self.inner.execute_payment(payment_reference, token).await
    }
}

#[tokio::test]
async fn test_expiry_sweep_does_not_fail_a_booking_being_reconciled() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 2)))
        .await
        .unwrap();

    let gateway = Arc::new(SweepDuringExecute {
        inner: h.gateway.clone(),
        bookings: h.bookings.clone(),
    });
    let outcome = ReconcilePayment::new(h.bookings.clone(), gateway)
        .execute(callback(created.booking.id, None, Some("success")))
        .await
        .unwrap();

    let Reconciliation::Paid(paid) = outcome else {
        panic!("expected the charged booking to be paid, got {:?}", outcome);
    };
    assert!(paid.ticket_number.is_some());
    assert_eq!(paid.provider_state.transaction_id.as_deref(), Some("TRX12345"));
    assert_eq!(h.gateway.execute_calls(), 1);
}

/// Reports the first issued ticket number as already taken.
struct FirstTicketTaken {
    inner: Arc<InMemoryBookingRepository>,
    rejected: AtomicUsize,
}

#[async_trait]
impl BookingRepository for FirstTicketTaken {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<Booking> {
        self.inner.insert(booking).await
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Booking> {
        self.inner.get_by_id(id).await
    }

    async fn attach_payment_session(
        &self,
        id: Uuid,
        session: &PaymentSession,
    ) -> RepositoryResult<Booking> {
        self.inner.attach_payment_session(id, session).await
    }

    async fn claim_for_reconciliation(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        self.inner.claim_for_reconciliation(id).await
    }

    async fn finalize(&self, id: Uuid, resolution: &Resolution) -> RepositoryResult<Option<Booking>> {
        if let Resolution::Paid { ticket_number, .. } = resolution {
            if self.rejected.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RepositoryError::DuplicateTicket(ticket_number.clone()));
            }
        }
        self.inner.finalize(id, resolution).await
    }

    async fn expire_initiated_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        self.inner.expire_initiated_before(cutoff).await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn test_ticket_number_collision_issues_a_fresh_ticket() {
    let h = Harness::new();
    let created = create_use_case(&h)
        .execute(request(booking_form(h.movie.id, "18:00", "Front", 2)))
        .await
        .unwrap();

    let bookings = Arc::new(FirstTicketTaken {
        inner: h.bookings.clone(),
        rejected: AtomicUsize::new(0),
    });
    let outcome = ReconcilePayment::new(bookings.clone(), h.gateway.clone())
        .execute(callback(created.booking.id, None, Some("success")))
        .await
        .unwrap();

    let Reconciliation::Paid(paid) = outcome else {
        panic!("expected a paid booking after the retry, got {:?}", outcome);
    };
    assert!(paid.ticket_number.unwrap().starts_with("AC-"));
    assert_eq!(bookings.rejected.load(Ordering::SeqCst), 2);
    assert_eq!(h.gateway.execute_calls(), 1);
}
