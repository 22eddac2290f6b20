pub mod in_memory;
pub mod postgres_booking_repository;
pub mod postgres_movie_catalog;

pub use in_memory::{InMemoryBookingRepository, StaticMovieCatalog};
pub use postgres_booking_repository::PostgresBookingRepository;
pub use postgres_movie_catalog::PostgresMovieCatalog;
