//! End-to-end tests: both front ends over real sockets, one engine behind them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use booking::BookingService;
use chrono::{Duration as ChronoDuration, Utc};
use common::{Points, Route};
use inventory_store::testing::DelayedRouteStore;
use inventory_store::{InMemoryRouteStore, RouteStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use rpc::RpcClient;
use server::{Config, Orchestrator, ServiceState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn start_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        rest_port: 0,
        rpc_port: 0,
        shutdown_grace: Duration::from_secs(3),
        ..Config::default()
    }
}

fn orchestrator() -> Orchestrator<InMemoryRouteStore> {
    let booking = Arc::new(BookingService::new(InMemoryRouteStore::new()));
    let handle = PrometheusBuilder::new().build_recorder().handle();
    Orchestrator::new(booking, handle, &start_config())
}

/// Sends one HTTP/1.1 request and returns the raw response text.
async fn http(addr: SocketAddr, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn start_then_stop_leaves_nothing_reachable() {
    let mut service = orchestrator();
    service.start().await.unwrap();
    let rest_addr = service.rest_addr().unwrap();
    let rpc_addr = service.rpc_addr().unwrap();

    let health = http(rest_addr, "GET", "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"), "unexpected response: {health}");

    let mut client = RpcClient::connect(rpc_addr).await.unwrap();
    assert!(client.list_routes().await.unwrap().is_empty());
    drop(client);

    service.stop().await;
    assert_eq!(service.state(), ServiceState::Stopped);
    assert!(TcpStream::connect(rest_addr).await.is_err());
    assert!(TcpStream::connect(rpc_addr).await.is_err());

    // Second stop is a no-op.
    service.stop().await;
    assert_eq!(service.state(), ServiceState::Stopped);
}

#[tokio::test]
async fn both_front_ends_share_one_inventory() {
    let mut service = orchestrator();
    service.start().await.unwrap();
    let rest_addr = service.rest_addr().unwrap();

    let mut client = RpcClient::connect(service.rpc_addr().unwrap()).await.unwrap();
    let route = client
        .create_route(Route::new(
            Points::new("Minsk", "Vitebsk"),
            Utc::now() + ChronoDuration::days(1),
            1500,
            2,
        ))
        .await
        .unwrap();
    let id = route.id.as_i64();

    // One seat through RPC, one through REST, then the route is full on both.
    assert_eq!(client.buy_ticket(route.id).await.unwrap().place, 1);
    let bought = http(rest_addr, "POST", &format!("/routes/buy/{id}")).await;
    assert!(bought.starts_with("HTTP/1.1 201"), "unexpected response: {bought}");
    assert!(bought.contains("\"place\":2"));

    let rejected = client.buy_ticket(route.id).await.unwrap_err();
    assert_eq!(rejected.remote_kind(), Some("no_free_seats"));
    let sold_out = http(rest_addr, "POST", &format!("/routes/buy/{id}")).await;
    assert!(sold_out.starts_with("HTTP/1.1 409"), "unexpected response: {sold_out}");

    drop(client);
    service.stop().await;
}

#[tokio::test]
async fn stop_waits_for_open_rpc_connection_to_close() {
    let mut service = orchestrator();
    service.start().await.unwrap();
    let mut client = RpcClient::connect(service.rpc_addr().unwrap()).await.unwrap();
    assert!(client.list_routes().await.unwrap().is_empty());

    // The idle connection is closed by the server, so stop finishes well
    // inside the grace period.
    tokio::time::timeout(Duration::from_secs(2), service.stop())
        .await
        .expect("stop did not finish");
    assert!(client.list_routes().await.is_err());
}

#[tokio::test]
async fn stop_lets_in_flight_purchases_finish_on_both_front_ends() {
    let inner = InMemoryRouteStore::new();
    let id = inner
        .insert(&Route::new(
            Points::new("Minsk", "Vitebsk"),
            Utc::now() + ChronoDuration::days(1),
            1500,
            5,
        ))
        .await
        .unwrap();
    let store = DelayedRouteStore::new(inner.clone(), Duration::from_millis(300));
    let booking = Arc::new(BookingService::new(store));
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let mut service = Orchestrator::new(booking, handle, &start_config());
    service.start().await.unwrap();

    let rpc_addr = service.rpc_addr().unwrap();
    let rpc_purchase = tokio::spawn(async move {
        let mut client = RpcClient::connect(rpc_addr).await.unwrap();
        client.buy_ticket(id).await
    });
    let rest_addr = service.rest_addr().unwrap();
    let rest_purchase = tokio::spawn(async move {
        http(rest_addr, "POST", &format!("/routes/buy/{}", id.as_i64())).await
    });

    // Both requests are inside the store when the stop begins.
    tokio::time::sleep(Duration::from_millis(100)).await;
    service.stop().await;
    assert_eq!(service.state(), ServiceState::Stopped);

    let ticket = rpc_purchase.await.unwrap().unwrap();
    let response = rest_purchase.await.unwrap();
    assert!(response.starts_with("HTTP/1.1 201"), "unexpected response: {response}");

    let mut places = vec![ticket.place];
    places.push(if response.contains("\"place\":1") { 1 } else { 2 });
    places.sort_unstable();
    assert_eq!(places, vec![1, 2]);
    assert_eq!(inner.get_by_id(id).await.unwrap().free_seats, 3);
}
