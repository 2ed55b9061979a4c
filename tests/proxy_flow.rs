//! End-to-end request flows through a running proxy.

use std::time::Duration;

mod common;
use common::*;

#[tokio::test]
async fn miss_then_hit_is_byte_identical() {
    let response = response_with_body(100);
    let origin = start_origin(response.clone()).await;
    let proxy = start_proxy(test_config()).await;
    let url = origin.url("/page");

    let first = proxy_get(proxy.addr, &url).await;
    let second = proxy_get(proxy.addr, &url).await;

    assert_eq!(first, response);
    assert_eq!(second, response);
    assert_eq!(origin.hits(), 1);

    let stats = proxy.cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.occupied, 1);
}

#[tokio::test]
async fn origin_sees_http10_rewrite() {
    let origin = start_origin(response_with_body(4)).await;
    let proxy = start_proxy(test_config()).await;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: spoofed\r\nProxy-Connection: keep-alive\r\n\r\n",
        origin.url("/a/b?c=d")
    );
    send_raw(proxy.addr, &request).await;

    let heads = origin.requests();
    assert_eq!(heads.len(), 1);
    let head = &heads[0];
    assert!(head.starts_with("GET /a/b?c=d HTTP/1.0\r\n"), "{head}");
    assert!(head.contains(&format!("Host: 127.0.0.1:{}\r\n", origin.addr.port())));
    assert!(head.contains("Connection: close\r\n"));
    assert!(head.contains("Proxy-Connection: close\r\n"));
    assert!(!head.contains("spoofed"));
}

#[tokio::test]
async fn oversized_response_streamed_not_cached() {
    let response = response_with_body(2048);
    let origin = start_origin(response.clone()).await;
    let proxy = start_proxy(test_config()).await;
    let url = origin.url("/big");

    assert_eq!(proxy_get(proxy.addr, &url).await, response);
    assert_eq!(proxy_get(proxy.addr, &url).await, response);

    assert_eq!(origin.hits(), 2);
    assert_eq!(proxy.cache.len(), 0);
}

#[tokio::test]
async fn boundary_sized_response_is_cached() {
    let mut config = test_config();
    config.cache.max_object_size = 256;
    let response = response_with_body(0);
    let padded = {
        let mut r = response.clone();
        r.resize(256, b'y');
        r
    };
    let origin = start_origin(padded.clone()).await;
    let proxy = start_proxy(config).await;

    assert_eq!(proxy_get(proxy.addr, &origin.url("/edge")).await, padded);
    assert_eq!(proxy.cache.len(), 1);
}

#[tokio::test]
async fn empty_origin_response_not_cached() {
    let origin = start_origin(Vec::new()).await;
    let proxy = start_proxy(test_config()).await;
    let url = origin.url("/empty");

    assert!(proxy_get(proxy.addr, &url).await.is_empty());
    assert!(proxy_get(proxy.addr, &url).await.is_empty());
    assert_eq!(origin.hits(), 2);
    assert!(proxy.cache.is_empty());
}

#[tokio::test]
async fn distinct_targets_cached_separately() {
    let origin = start_origin(response_with_body(10)).await;
    let proxy = start_proxy(test_config()).await;

    proxy_get(proxy.addr, &origin.url("/one")).await;
    proxy_get(proxy.addr, &origin.url("/two")).await;
    proxy_get(proxy.addr, &origin.url("/one")).await;

    assert_eq!(origin.hits(), 2);
    assert_eq!(proxy.cache.len(), 2);
}

#[tokio::test]
async fn concurrent_clients_share_cached_object() {
    let response = response_with_body(512);
    let origin = start_origin(response.clone()).await;
    let proxy = start_proxy(test_config()).await;
    let url = origin.url("/shared");

    proxy_get(proxy.addr, &url).await;

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let url = url.clone();
        let addr = proxy.addr;
        tasks.push(tokio::spawn(async move { proxy_get(addr, &url).await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), response);
    }

    assert_eq!(origin.hits(), 1);
    assert_eq!(proxy.cache.stats().hits, 32);
}

#[tokio::test]
async fn reqwest_through_proxy() {
    let origin = start_origin(
        b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello".to_vec(),
    )
    .await;
    let proxy = start_proxy(test_config()).await;

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy.addr)).unwrap())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();

    for _ in 0..2 {
        let res = client.get(origin.url("/greeting")).send().await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), "hello");
    }
    assert_eq!(origin.hits(), 1);
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let proxy = start_proxy(test_config()).await;
    proxy.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let connect = tokio::net::TcpStream::connect(proxy.addr).await;
    assert!(connect.is_err());
}
