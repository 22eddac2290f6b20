//! Postgres implementation of MovieCatalog.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{CatalogSnapshot, Movie, MovieStatus, Schedule};
use crate::ports::{MovieCatalog, RepositoryResult};

/// Reads bookable movies from the content-management `movies` table.
#[derive(Clone)]
pub struct PostgresMovieCatalog {
    pool: PgPool,
}

impl PostgresMovieCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MovieCatalog for PostgresMovieCatalog {
    async fn snapshot(&self) -> RepositoryResult<CatalogSnapshot> {
        let rows = sqlx::query_as::<_, MovieRow>(
            r#"
            SELECT id, title, genres, poster_url, trailer_url, status, is_active, schedule
            FROM movies
            WHERE status = 'now-showing' AND is_active
            ORDER BY title ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let movies = rows.into_iter().filter_map(MovieRow::into_domain).collect();
        Ok(CatalogSnapshot::new(movies))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovieRow {
    id: Uuid,
    title: String,
    genres: Vec<String>,
    poster_url: String,
    trailer_url: String,
    status: String,
    is_active: bool,
    schedule: Json<serde_json::Value>,
}

impl MovieRow {
    /// Movies with an unknown status or malformed schedule are left out of
    /// the snapshot rather than failing the whole catalog.
    fn into_domain(self) -> Option<Movie> {
        let Some(status) = MovieStatus::parse(&self.status) else {
            tracing::warn!(movie_id = %self.id, status = %self.status, "Skipping movie with unknown status");
            return None;
        };

        let schedule: Schedule = match serde_json::from_value(self.schedule.0) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(movie_id = %self.id, error = %e, "Skipping movie with undecodable schedule");
                return None;
            }
        };
        if let Err(e) = schedule.validate() {
            tracing::warn!(movie_id = %self.id, error = %e, "Skipping movie with malformed schedule");
            return None;
        }

        Some(Movie {
            id: self.id,
            title: self.title,
            genres: self.genres,
            poster_url: self.poster_url,
            trailer_url: self.trailer_url,
            status,
            is_active: self.is_active,
            schedule,
        })
    }
}
