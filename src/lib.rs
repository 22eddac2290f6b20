pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod startup;
pub mod use_cases;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::config::urls::PublicUrls;
use crate::gateway::PaymentGateway;
use crate::middleware::request_logger::{request_logger_middleware, RequestLogConfig};
use crate::ports::{BookingRepository, MovieCatalog};

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<dyn BookingRepository>,
    pub catalog: Arc<dyn MovieCatalog>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub urls: PublicUrls,
    pub pending_grace: chrono::Duration,
    pub request_log: RequestLogConfig,
}

pub fn create_app(state: AppState) -> Router {
    let request_log = state.request_log;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/schedule/dates", get(handlers::schedule::available_dates))
        .route(
            "/schedule/dates/:date/movies",
            get(handlers::schedule::movies_on),
        )
        .route(
            "/movies/:id/showtimes",
            get(handlers::schedule::show_times),
        )
        .route(
            "/movies/:id/categories",
            get(handlers::schedule::categories),
        )
        .route("/bookings", post(handlers::bookings::create_booking))
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route("/payments/callback", get(handlers::payments::callback))
        .layer(axum::middleware::from_fn_with_state(
            request_log,
            request_logger_middleware,
        ))
        .with_state(state)
}
