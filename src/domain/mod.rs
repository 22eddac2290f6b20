//! Framework-agnostic domain types.

pub mod booking;
pub mod schedule;

pub use booking::{Booking, BookingOutcome, BookingStatus, Customer, ProviderState, Resolution};
pub use schedule::{
    CatalogSnapshot, Movie, MovieStatus, ResolvedSelection, Schedule, SeatCategory, SelectionError,
    ShowTime,
};
