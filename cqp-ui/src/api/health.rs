//! Health endpoint (no session required)

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "cqp-ui",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
