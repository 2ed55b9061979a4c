use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::cache::CacheStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub active_connections: u64,
}

#[derive(Serialize)]
pub struct CacheReport {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        active_connections: state.connections.active_count(),
    })
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheReport> {
    let stats = state.cache.stats();
    Json(CacheReport {
        hit_rate: stats.hit_rate(),
        stats,
    })
}
