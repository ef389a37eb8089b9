use crate::{config::Config, services::submission::DedupPolicy};
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self { pool, config }
    }

    /// Deduplication applies unless `ALLOW_MULTIPLE_RESPONSES` is set.
    pub fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy::from_allow_multiple(self.config.allow_multiple_responses)
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
