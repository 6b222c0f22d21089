//! Web server for the price dashboard
//!
//! Provides REST API endpoints for catalog records, the dashboard view and
//! the operator reset.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{CatalogStore, ItemRecord};
use crate::dashboard::{build_view, DashboardView, DISPLAY_ITEMS};
use crate::scan::RecentScans;

/// Shared application state (catalog + recent scans)
#[derive(Clone)]
struct AppState {
    store: Arc<CatalogStore>,
    recent: Arc<RecentScans>,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// GET /api/items
async fn items_handler(
    State(state): State<AppState>,
) -> Json<ApiResponse<BTreeMap<String, ItemRecord>>> {
    ApiResponse::ok(state.store.all_records())
}

/// GET /api/items/{barcode}
async fn item_handler(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> (StatusCode, Json<ApiResponse<ItemRecord>>) {
    match state.store.get(&barcode) {
        Some(record) => (StatusCode::OK, ApiResponse::ok(record)),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse {
                success: false,
                data: None,
                error: Some(format!("Item {} not found", barcode)),
            }),
        ),
    }
}

/// GET /api/dashboard - recent scans and top items
async fn dashboard_handler(State(state): State<AppState>) -> Json<ApiResponse<DashboardView>> {
    let records = state.store.all_records();
    let recent = state.recent.latest(DISPLAY_ITEMS);
    ApiResponse::ok(build_view(&records, &recent))
}

/// POST /api/reset - reset every item to its base price
async fn reset_handler(State(state): State<AppState>) -> Json<ApiResponse<usize>> {
    let store = Arc::clone(&state.store);
    // reset() persists the whole catalog
    match tokio::task::spawn_blocking(move || {
        store.reset();
        store.len()
    })
    .await
    {
        Ok(count) => ApiResponse::ok(count),
        Err(e) => {
            log::error!("Reset task failed: {}", e);
            Json(ApiResponse {
                success: false,
                data: None,
                error: Some("Reset failed".to_string()),
            })
        }
    }
}

/// Build the web server router
pub fn create_router(store: Arc<CatalogStore>, recent: Arc<RecentScans>) -> Router {
    let state = AppState { store, recent };

    Router::new()
        .route("/api/items", get(items_handler))
        .route("/api/items/{barcode}", get(item_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/reset", post(reset_handler))
        .with_state(state)
}

/// Start the web server (async)
///
/// Binds to 0.0.0.0 (all interfaces) so the dashboard can run on another
/// machine on the shop network.
pub async fn serve(
    store: Arc<CatalogStore>,
    recent: Arc<RecentScans>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(store, recent);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Dashboard API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> (Arc<CatalogStore>, Arc<RecentScans>) {
        let mut a = ItemRecord::new("Apples", 10.0);
        a.meter = 3;
        a.current_price = 10.07;
        a.history = vec![10.0, 10.07];
        let store = Arc::new(CatalogStore::in_memory(vec![
            ("A".to_string(), a),
            ("B".to_string(), ItemRecord::new("Bread", 2.5)),
        ]));
        let recent = Arc::new(RecentScans::new());
        recent.record("A");
        recent.record("Z");
        (store, recent)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn items_endpoint_lists_catalog() {
        let (store, recent) = test_state();
        let response = create_router(store, recent)
            .oneshot(Request::get("/api/items").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["A"]["current_price"], 10.07);
        assert_eq!(json["data"]["B"]["item_name"], "Bread");
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let (store, recent) = test_state();
        let response = create_router(store, recent)
            .oneshot(Request::get("/api/items/Z").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn dashboard_shows_recent_and_top() {
        let (store, recent) = test_state();
        let response = create_router(store, recent)
            .oneshot(Request::get("/api/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        let data = &json["data"];
        assert_eq!(data["recent"][0]["barcode"], "Z");
        assert!(data["recent"][0]["item_name"].is_null());
        assert_eq!(data["recent"][1]["trend"], "up");
        assert_eq!(data["top"][0]["barcode"], "A");
        assert_eq!(data["top"][0]["history"][1], 10.07);
    }

    #[tokio::test]
    async fn reset_restores_base_prices() {
        let (store, recent) = test_state();
        let response = create_router(Arc::clone(&store), recent)
            .oneshot(
                Request::post("/api/reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"], 2);

        let a = store.get("A").unwrap();
        assert_eq!(a.current_price, 10.0);
        assert_eq!(a.meter, 0);
        assert!(a.history.is_empty());
    }

    #[test]
    fn test_api_response_error_serialization() {
        let response: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some("Test error".to_string()),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"Test error\""));
        // data should be omitted when None
        assert!(!json.contains("\"data\""));
    }
}
