use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parse_id;
use crate::domain::{CatalogSnapshot, Movie};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AvailableDates {
    pub dates: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub id: Uuid,
    pub title: String,
    pub genres: Vec<String>,
    #[serde(rename = "posterURL")]
    pub poster_url: String,
    #[serde(rename = "trailerURL")]
    pub trailer_url: String,
}

impl From<&Movie> for MovieSummary {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            genres: movie.genres.clone(),
            poster_url: movie.poster_url.clone(),
            trailer_url: movie.trailer_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub date: String,
    pub time: String,
}

async fn snapshot(state: &AppState) -> Result<CatalogSnapshot, AppError> {
    state.catalog.snapshot().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to load movie catalog");
        AppError::Database(e.to_string())
    })
}

fn bookable_movie<'a>(snapshot: &'a CatalogSnapshot, raw_id: &str) -> Result<&'a Movie, AppError> {
    let id = parse_id(raw_id, "Movie")?;
    snapshot
        .movie(id)
        .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", id)))
}

pub async fn available_dates(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let snapshot = snapshot(&state).await?;
    Ok(Json(AvailableDates {
        dates: snapshot.available_dates(),
    }))
}

pub async fn movies_on(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = snapshot(&state).await?;
    let movies: Vec<MovieSummary> = snapshot
        .movies_on(&date)
        .into_iter()
        .map(MovieSummary::from)
        .collect();

    Ok(Json(movies))
}

pub async fn show_times(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = snapshot(&state).await?;
    let movie = bookable_movie(&snapshot, &id)?;

    Ok(Json(snapshot.show_times_for(movie, &query.date)))
}

pub async fn categories(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ShowQuery>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = snapshot(&state).await?;
    let movie = bookable_movie(&snapshot, &id)?;

    Ok(Json(snapshot.categories_for(movie, &query.date, &query.time)))
}
