//! Movie schedule model and the read-only lookup the booking wizard runs against.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use crate::validation::{self, ValidationError, ValidationResult};

/// Prices are whole cents; booking amounts are stored as `NUMERIC(12, 2)`.
pub const PRICE_SCALE: i64 = 2;

/// A named pricing tier inside one showtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatCategory {
    pub name: String,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowTime {
    /// `HH:MM`, 24h clock.
    pub time: String,
    pub categories: Vec<SeatCategory>,
}

/// Date key (`YYYY-MM-DD`) to the showtimes screened that day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(pub BTreeMap<String, Vec<ShowTime>>);

impl Schedule {
    pub fn show_times_on(&self, date: &str) -> &[ShowTime] {
        self.0.get(date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dates(&self) -> impl Iterator<Item = &String> {
        self.0
            .iter()
            .filter(|(_, times)| !times.is_empty())
            .map(|(date, _)| date)
    }

    /// Checks key formats, per-date time uniqueness, per-showtime category
    /// uniqueness, and that prices are non-negative with at most two decimals.
    pub fn validate(&self) -> ValidationResult {
        let zero = BigDecimal::from(0);

        for (date, times) in &self.0 {
            validation::validate_date_key("schedule.date", date)?;

            let mut seen_times = HashSet::new();
            for show in times {
                validation::validate_show_time("schedule.time", &show.time)?;
                if !seen_times.insert(show.time.as_str()) {
                    return Err(ValidationError::new(
                        "schedule.time",
                        format!("duplicate showtime {} on {}", show.time, date),
                    ));
                }

                let mut seen_names = HashSet::new();
                for category in &show.categories {
                    validation::validate_required("schedule.category", &category.name)?;
                    if !seen_names.insert(category.name.as_str()) {
                        return Err(ValidationError::new(
                            "schedule.category",
                            format!(
                                "duplicate category {} at {} {}",
                                category.name, date, show.time
                            ),
                        ));
                    }
                    if category.price < zero {
                        return Err(ValidationError::new(
                            "schedule.price",
                            format!("negative price for {}", category.name),
                        ));
                    }
                    if category.price.with_scale(PRICE_SCALE) != category.price {
                        return Err(ValidationError::new(
                            "schedule.price",
                            format!(
                                "price {} for {} has more than {} decimal places",
                                category.price, category.name, PRICE_SCALE
                            ),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovieStatus {
    NowShowing,
    Upcoming,
}

impl MovieStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovieStatus::NowShowing => "now-showing",
            MovieStatus::Upcoming => "upcoming",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "now-showing" => Some(MovieStatus::NowShowing),
            "upcoming" => Some(MovieStatus::Upcoming),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub genres: Vec<String>,
    #[serde(rename = "posterURL")]
    pub poster_url: String,
    #[serde(rename = "trailerURL")]
    pub trailer_url: String,
    pub status: MovieStatus,
    pub is_active: bool,
    pub schedule: Schedule,
}

impl Movie {
    pub fn is_bookable(&self) -> bool {
        self.status == MovieStatus::NowShowing && self.is_active
    }
}

/// A (movie, date, time, category) tuple resolved against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelection {
    pub movie_id: Uuid,
    pub movie_title: String,
    pub show_date: String,
    pub show_time: String,
    pub seat_type: String,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The movie is unknown or not currently bookable.
    MovieNotFound(Uuid),
    /// The date, time or category does not exist in the movie's schedule.
    Invalid(String),
}

/// Point-in-time view over the bookable movies.
///
/// Every query is a pure function of the snapshot; the booking flow takes a
/// fresh snapshot per request and never writes back into it.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    movies: Vec<Movie>,
}

impl CatalogSnapshot {
    /// Builds a snapshot, dropping movies that are not bookable.
    pub fn new(movies: Vec<Movie>) -> Self {
        Self {
            movies: movies.into_iter().filter(Movie::is_bookable).collect(),
        }
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn movie(&self, id: Uuid) -> Option<&Movie> {
        self.movies.iter().find(|movie| movie.id == id)
    }

    /// Union of all non-empty schedule dates, ascending.
    pub fn available_dates(&self) -> Vec<String> {
        self.movies
            .iter()
            .flat_map(|movie| movie.schedule.dates().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn movies_on(&self, date: &str) -> Vec<&Movie> {
        self.movies
            .iter()
            .filter(|movie| !movie.schedule.show_times_on(date).is_empty())
            .collect()
    }

    /// Showtimes for the movie on `date`, sorted by time.
    pub fn show_times_for(&self, movie: &Movie, date: &str) -> Vec<ShowTime> {
        let mut times = movie.schedule.show_times_on(date).to_vec();
        times.sort_by(|a, b| a.time.cmp(&b.time));
        times
    }

    /// Categories of the matching showtime, empty when the time is unknown.
    pub fn categories_for(&self, movie: &Movie, date: &str, time: &str) -> Vec<SeatCategory> {
        movie
            .schedule
            .show_times_on(date)
            .iter()
            .find(|show| show.time == time)
            .map(|show| show.categories.clone())
            .unwrap_or_default()
    }

    /// Resolves the authoritative unit price for a selection.
    pub fn resolve(
        &self,
        movie_id: Uuid,
        date: &str,
        time: &str,
        seat_type: &str,
    ) -> Result<ResolvedSelection, SelectionError> {
        let movie = self
            .movie(movie_id)
            .ok_or(SelectionError::MovieNotFound(movie_id))?;

        let times = movie
            .schedule
            .0
            .get(date)
            .filter(|times| !times.is_empty())
            .ok_or_else(|| {
                SelectionError::Invalid(format!("{} is not scheduled on {}", movie.title, date))
            })?;

        let show = times.iter().find(|show| show.time == time).ok_or_else(|| {
            SelectionError::Invalid(format!("no {} showing of {} on {}", time, movie.title, date))
        })?;

        let category = show
            .categories
            .iter()
            .find(|category| category.name == seat_type)
            .ok_or_else(|| {
                SelectionError::Invalid(format!(
                    "seat type {} is not offered at {} on {}",
                    seat_type, time, date
                ))
            })?;

        Ok(ResolvedSelection {
            movie_id: movie.id,
            movie_title: movie.title.clone(),
            show_date: date.to_string(),
            show_time: show.time.clone(),
            seat_type: category.name.clone(),
            unit_price: category.price.clone(),
        })
    }
}
