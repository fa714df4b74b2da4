use axum::{Extension, Json};
use serde::Serialize;

use crate::{db::DbContext, error::AppError};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DbPingResponse {
    pub result: i32,
    pub db_ms: f64,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Round-trips `SELECT 1` through the request transaction.
pub async fn db_ping(Extension(ctx): Extension<DbContext>) -> Result<Json<DbPingResponse>, AppError> {
    let mut tx = ctx.transaction().await?;
    let result = tx
        .run(|conn| {
            Box::pin(async move {
                sqlx::query_scalar::<_, i32>("SELECT 1")
                    .fetch_one(conn)
                    .await
            })
        })
        .await?;

    Ok(Json(DbPingResponse {
        result,
        db_ms: tx.elapsed().as_secs_f64() * 1000.0,
    }))
}
