#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use cinema_core::adapters::{InMemoryBookingRepository, StaticMovieCatalog};
use cinema_core::config::urls::PublicUrls;
use cinema_core::domain::{Movie, MovieStatus, Schedule, SeatCategory, ShowTime};
use cinema_core::gateway::{
    AccessToken, CheckoutSession, CreatePaymentRequest, ExecutionResult, GatewayError,
    GatewayResult, PaymentGateway,
};
use cinema_core::middleware::request_logger::RequestLogConfig;
use cinema_core::AppState;

pub const BASE_URL: &str = "https://cinema.example";
pub const SHOW_DATE: &str = "2025-08-11";

/// Scripted wallet provider that counts every call it receives.
#[derive(Default)]
pub struct FakeGateway {
    pub token_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub fail_token: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_execute: AtomicBool,
    pub decline_execute: AtomicBool,
    pub create_requests: Mutex<Vec<CreatePaymentRequest>>,
    pub executed_references: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn payment_reference_for(invoice: &str) -> String {
        format!("PAY-{}", invoice)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn acquire_token(&self) -> GatewayResult<AccessToken> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_token.load(Ordering::SeqCst) {
            return Err(GatewayError::Auth("Invalid App Key".to_string()));
        }
        Ok(AccessToken::new("fake-id-token"))
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
        _token: &AccessToken,
    ) -> GatewayResult<CheckoutSession> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.create_requests.lock().unwrap().push(request.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }

        let payment_reference = Self::payment_reference_for(&request.invoice);
        Ok(CheckoutSession {
            redirect_url: format!("https://wallet.example/checkout/{}", payment_reference),
            payment_reference: payment_reference.clone(),
            raw: json!({
                "paymentID": payment_reference,
                "statusCode": "0000",
                "merchantInvoiceNumber": request.invoice,
            }),
        })
    }

    async fn execute_payment(
        &self,
        payment_reference: &str,
        _token: &AccessToken,
    ) -> GatewayResult<ExecutionResult> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        self.executed_references
            .lock()
            .unwrap()
            .push(payment_reference.to_string());

        if self.fail_execute.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("Execute failed".to_string()));
        }

        if self.decline_execute.load(Ordering::SeqCst) {
            return Ok(ExecutionResult {
                completed: false,
                transaction_id: None,
                raw: json!({ "statusCode": "2056", "statusMessage": "Invalid Payment State" }),
            });
        }

        Ok(ExecutionResult {
            completed: true,
            transaction_id: Some("TRX12345".to_string()),
            raw: json!({
                "paymentID": payment_reference,
                "trxID": "TRX12345",
                "transactionStatus": "Completed",
                "statusCode": "0000",
            }),
        })
    }
}

fn category(name: &str, price: i64) -> SeatCategory {
    SeatCategory {
        name: name.to_string(),
        price: BigDecimal::from(price),
    }
}

/// "M" screens at 18:00 (Front 350, Rear 450) and 21:15 (Front 400) on 2025-08-11.
pub fn movie_m() -> Movie {
    let mut schedule = BTreeMap::new();
    schedule.insert(
        SHOW_DATE.to_string(),
        vec![
            ShowTime {
                time: "21:15".to_string(),
                categories: vec![category("Front", 400)],
            },
            ShowTime {
                time: "18:00".to_string(),
                categories: vec![category("Front", 350), category("Rear", 450)],
            },
        ],
    );
    schedule.insert("2025-08-12".to_string(), vec![]);

    Movie {
        id: Uuid::new_v4(),
        title: "M".to_string(),
        genres: vec!["Thriller".to_string()],
        poster_url: "https://img.example/m.jpg".to_string(),
        trailer_url: "https://www.youtube.com/embed/m".to_string(),
        status: MovieStatus::NowShowing,
        is_active: true,
        schedule: Schedule(schedule),
    }
}

pub fn upcoming_movie() -> Movie {
    let mut movie = movie_m();
    movie.id = Uuid::new_v4();
    movie.title = "Coming Soon".to_string();
    movie.status = MovieStatus::Upcoming;
    movie
}

pub fn urls() -> PublicUrls {
    PublicUrls::new(BASE_URL).unwrap()
}

pub fn booking_form(movie_id: Uuid, time: &str, seat_type: &str, quantity: i64) -> serde_json::Value {
    json!({
        "movieId": movie_id,
        "showDate": SHOW_DATE,
        "showTime": time,
        "seatType": seat_type,
        "quantity": quantity,
        "customerName": "Rafi Ahmed",
        "customerMobile": "01712345678",
        "customerEmail": "rafi@example.com",
    })
}

pub struct Harness {
    pub movie: Movie,
    pub catalog: Arc<StaticMovieCatalog>,
    pub bookings: Arc<InMemoryBookingRepository>,
    pub gateway: Arc<FakeGateway>,
}

impl Harness {
    pub fn new() -> Self {
        let movie = movie_m();
        Self {
            catalog: Arc::new(StaticMovieCatalog::new(vec![movie.clone(), upcoming_movie()])),
            movie,
            bookings: Arc::new(InMemoryBookingRepository::new()),
            gateway: FakeGateway::new(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            bookings: self.bookings.clone(),
            catalog: self.catalog.clone(),
            gateway: self.gateway.clone(),
            urls: urls(),
            pending_grace: chrono::Duration::minutes(15),
            request_log: RequestLogConfig::default(),
        }
    }
}
