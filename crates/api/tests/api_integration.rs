//! Integration tests for the REST front end.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use booking::BookingService;
use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use inventory_store::testing::DelayedRouteStore;
use inventory_store::{InMemoryRouteStore, RouteStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_store() -> (axum::Router, InMemoryRouteStore) {
    let store = InMemoryRouteStore::new();
    let booking = Arc::new(BookingService::new(store.clone()));
    let state = api::create_state(booking, Duration::from_secs(5));
    (api::create_app(state, get_metrics_handle()), store)
}

fn setup() -> axum::Router {
    setup_with_store().0
}

fn setup_delayed(store: DelayedRouteStore, request_timeout: Duration) -> axum::Router {
    let booking = Arc::new(BookingService::new(store));
    let state = api::create_state(booking, request_timeout);
    api::create_app(state, get_metrics_handle())
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn tomorrow_at(hour: u32) -> chrono::DateTime<Utc> {
    (Utc::now() + ChronoDuration::days(1))
        .date_naive()
        .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap())
        .and_utc()
}

fn route_json(end_point: &str, start: chrono::DateTime<Utc>, seats: u32) -> serde_json::Value {
    serde_json::json!({
        "start_point": "Minsk",
        "end_point": end_point,
        "start": start,
        "cost": 1500,
        "all_seats": seats
    })
}

async fn create_route(app: &axum::Router, body: serde_json::Value) -> i64 {
    let response = app
        .clone()
        .oneshot(post_json("/routes", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "up");
}

#[tokio::test]
async fn test_health_reports_store_down() {
    let (app, store) = setup_with_store();
    store.set_unavailable(true).await;

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["status"], "degraded");
}

#[tokio::test]
async fn test_create_and_get_route() {
    let app = setup();
    let start = tomorrow_at(9);

    let id = create_route(&app, route_json("Vitebsk", start, 13)).await;
    assert!(id > 0);

    let response = app
        .oneshot(get(&format!("/routes/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let route = json_body(response).await;
    assert_eq!(route["id"], id);
    assert_eq!(route["start_point"], "Minsk");
    assert_eq!(route["end_point"], "Vitebsk");
    assert_eq!(route["free_seats"], 13);
    assert_eq!(route["all_seats"], 13);
    assert_eq!(route["cost"], 1500);
}

#[tokio::test]
async fn test_create_route_in_past_is_bad_request() {
    let app = setup();
    let body = route_json("Vitebsk", Utc::now() - ChronoDuration::hours(2), 13);

    let response = app.oneshot(post_json("/routes", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["kind"], "invalid_date");
}

#[tokio::test]
async fn test_get_nonexistent_route() {
    let app = setup();

    let response = app.oneshot(get("/routes/4242")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["kind"], "not_found");
}

#[tokio::test]
async fn test_invalid_route_id_format() {
    let app = setup();

    let response = app.oneshot(get("/routes/not-a-number")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_all_and_current_routes() {
    let (app, store) = setup_with_store();
    store
        .insert(&common::Route::new(
            common::Points::new("Minsk", "Grodno"),
            Utc::now() - ChronoDuration::days(4),
            900,
            10,
        ))
        .await
        .unwrap();
    create_route(&app, route_json("Vitebsk", tomorrow_at(9), 13)).await;

    let all = json_body(app.clone().oneshot(get("/routes")).await.unwrap()).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let current = json_body(app.oneshot(get("/routes/current")).await.unwrap()).await;
    let current = current.as_array().unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["end_point"], "Vitebsk");
}

#[tokio::test]
async fn test_delete_route_twice() {
    let app = setup();
    let id = create_route(&app, route_json("Vitebsk", tomorrow_at(9), 13)).await;

    let first = app
        .clone()
        .oneshot(delete(&format!("/routes/{id}")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let second = app
        .oneshot(delete(&format!("/routes/{id}")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(second).await["kind"], "not_found");
}

#[tokio::test]
async fn test_buy_ticket_until_sold_out() {
    let app = setup();
    let id = create_route(&app, route_json("Vitebsk", tomorrow_at(9), 2)).await;

    for expected_place in 1..=2 {
        let response = app
            .clone()
            .oneshot(post_empty(&format!("/routes/buy/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let ticket = json_body(response).await;
        assert_eq!(ticket["route_id"], id);
        assert_eq!(ticket["place"], expected_place);
        assert_eq!(ticket["end_point"], "Vitebsk");
    }

    let response = app
        .oneshot(post_empty(&format!("/routes/buy/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["kind"], "no_free_seats");
}

#[tokio::test]
async fn test_search_routes_by_day_and_point() {
    let app = setup();
    let day = tomorrow_at(0).date_naive();
    create_route(&app, route_json("Vitebsk", tomorrow_at(7), 13)).await;
    create_route(&app, route_json("Vitebsk", tomorrow_at(18), 13)).await;
    create_route(&app, route_json("Brest", tomorrow_at(8), 13)).await;

    let response = app
        .oneshot(get(&format!("/route_search?date={day}&point=Vitebsk")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let routes = json_body(response).await;
    let routes = routes.as_array().unwrap();
    assert_eq!(routes.len(), 2);
    assert!(routes.iter().all(|r| r["end_point"] == "Vitebsk"));
}

#[tokio::test]
async fn test_search_keeps_not_found_kinds_apart() {
    let app = setup();
    let day = tomorrow_at(0).date_naive();
    create_route(&app, route_json("Vitebsk", tomorrow_at(7), 13)).await;

    let unknown = app
        .clone()
        .oneshot(get(&format!("/route_search?date={day}&point=Pinsk")))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(unknown).await["kind"], "no_routes_by_endpoint");

    let later = day + ChronoDuration::days(2);
    let wrong_day = app
        .oneshot(get(&format!("/route_search?date={later}&point=Vitebsk")))
        .await
        .unwrap();
    assert_eq!(wrong_day.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(wrong_day).await["kind"], "no_routes");
}

#[tokio::test]
async fn test_search_validates_query() {
    let app = setup();

    let bad_date = app
        .clone()
        .oneshot(get("/route_search?date=tomorrow&point=Vitebsk"))
        .await
        .unwrap();
    assert_eq!(bad_date.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(bad_date).await["kind"], "invalid_date");

    let no_point = app
        .oneshot(get("/route_search?date=2030-01-01"))
        .await
        .unwrap();
    assert_eq!(no_point.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(no_point).await["kind"], "invalid_argument");
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let (app, store) = setup_with_store();
    store.set_unavailable(true).await;

    let response = app.oneshot(get("/routes")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["kind"], "store_unavailable");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let id = create_route(&app, route_json("Vitebsk", tomorrow_at(9), 2)).await;
    app.clone()
        .oneshot(post_empty(&format!("/routes/buy/{id}")))
        .await
        .unwrap();

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("tickets_sold_total"));
}

async fn insert_route(store: &InMemoryRouteStore, seats: u32) -> i64 {
    store
        .insert(&common::Route::new(
            common::Points::new("Minsk", "Vitebsk"),
            tomorrow_at(9),
            1500,
            seats,
        ))
        .await
        .unwrap()
        .as_i64()
}

#[tokio::test]
async fn test_slow_read_is_gateway_timeout() {
    let store = DelayedRouteStore::new(InMemoryRouteStore::new(), Duration::from_millis(200));
    let app = setup_delayed(store, Duration::from_millis(50));

    let response = app.oneshot(get("/routes")).await.unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(response).await["kind"], "deadline_exceeded");
}

#[tokio::test]
async fn test_write_timeout_leaves_seats_untouched() {
    let inner = InMemoryRouteStore::new();
    let id = insert_route(&inner, 3).await;
    let store = DelayedRouteStore::new(inner.clone(), Duration::from_millis(200))
        .with_write_limit(Duration::from_millis(50));
    let app = setup_delayed(store, Duration::from_secs(5));

    let response = app
        .oneshot(post_empty(&format!("/routes/buy/{id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(response).await["kind"], "deadline_exceeded");
    let route = inner.get_by_id(common::RouteId::new(id)).await.unwrap();
    assert_eq!(route.free_seats, 3);
}

#[tokio::test]
async fn test_slow_write_is_not_cut_short_by_request_deadline() {
    let inner = InMemoryRouteStore::new();
    let id = insert_route(&inner, 3).await;
    let store = DelayedRouteStore::new(inner.clone(), Duration::from_millis(150));
    let app = setup_delayed(store, Duration::from_millis(20));

    let response = app
        .oneshot(post_empty(&format!("/routes/buy/{id}")))
        .await
        .unwrap();

    // A seat that was taken is always reported as sold.
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["place"], 1);
    let route = inner.get_by_id(common::RouteId::new(id)).await.unwrap();
    assert_eq!(route.free_seats, 2);
}
