//! Request routing through the master.

use std::sync::Arc;

use fleet_sdk::FleetClient;
use serde_json::Value;

mod common;
use common::{client, echo, join, master_config, start_master, start_worker, NoSpawn};

async fn get_json(url: &str, host: &str) -> Value {
    let res = client()
        .get(url)
        .header("host", host)
        .send()
        .await
        .expect("master unreachable");
    assert_eq!(res.status(), 200);
    res.json().await.unwrap()
}

#[tokio::test]
async fn test_routes_by_host_to_ring_owner() {
    let master = start_master(master_config(), Arc::new(NoSpawn)).await;
    let a = start_worker(echo).await;
    let b = start_worker(echo).await;
    join(&master.url, &a).await;
    join(&master.url, &b).await;
    assert_eq!(master.registry.len(), 2);

    let mut served = std::collections::HashSet::new();
    for i in 0..20 {
        let host = format!("tenant-{}.example", i);
        let owner = master.registry.lookup(&host).unwrap();

        let first = get_json(&format!("{}/orders/{}", master.url, i), &host).await;
        let second = get_json(&format!("{}/orders/{}", master.url, i), &host).await;
        assert_eq!(first["node"], owner.as_str());
        assert_eq!(first["node"], second["node"]);
        assert_eq!(first["path"], format!("/orders/{}", i));
        served.insert(first["node"].as_str().unwrap().to_string());
    }
    // 20 hosts over two members with 50 positions each land on both
    assert_eq!(served.len(), 2);
}

#[tokio::test]
async fn test_empty_fleet_served_by_master() {
    let master = start_master(master_config(), Arc::new(NoSpawn)).await;
    let body = get_json(&format!("{}/hello", master.url), "anything.example").await;
    assert_eq!(body["node"], "master");
    assert_eq!(body["path"], "/hello");
}

#[tokio::test]
async fn test_unreachable_worker_is_bad_gateway() {
    let master = start_master(master_config(), Arc::new(NoSpawn)).await;

    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);
    FleetClient::new(&master.url)
        .register("127.0.0.1", port)
        .await
        .unwrap();

    let res = client()
        .get(format!("{}/x", master.url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn test_request_id_reaches_worker() {
    let master = start_master(master_config(), Arc::new(NoSpawn)).await;
    let worker = start_worker(echo).await;
    join(&master.url, &worker).await;

    let res = client()
        .get(format!("{}/trace", master.url))
        .header("x-request-id", "trace-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-42");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["request_id"], "trace-42");

    // generated by the master when the client sends none
    let res = client()
        .get(format!("{}/trace", master.url))
        .send()
        .await
        .unwrap();
    let header = res.headers()["x-request-id"].to_str().unwrap().to_string();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["request_id"], header.as_str());
    assert!(uuid::Uuid::parse_str(&header).is_ok());
}

#[tokio::test]
async fn test_eviction_moves_only_evicted_keys() {
    let master = start_master(master_config(), Arc::new(NoSpawn)).await;
    let workers = vec![
        start_worker(echo).await,
        start_worker(echo).await,
        start_worker(echo).await,
    ];
    for w in &workers {
        join(&master.url, w).await;
    }

    let hosts: Vec<String> = (0..200).map(|i| format!("h{}.example", i)).collect();
    let before: Vec<_> = hosts.iter().map(|h| master.registry.lookup(h).unwrap()).collect();

    let gone = master.registry.snapshot()[0].clone();
    master.registry.evict(&gone);

    for (host, owner) in hosts.iter().zip(&before) {
        let now = master.registry.lookup(host).unwrap();
        assert_ne!(now, gone);
        if *owner != gone {
            assert_eq!(&now, owner, "{} moved although its owner stayed", host);
        }
    }

    let body = get_json(&format!("{}/", master.url), &hosts[0]).await;
    assert_ne!(body["node"], gone.as_str());
}

#[tokio::test]
async fn test_state_reports_membership() {
    let master = start_master(master_config(), Arc::new(NoSpawn)).await;
    let sdk = FleetClient::new(&master.url);
    sdk.register("127.0.0.1", 4101).await.unwrap();
    sdk.register("127.0.0.1", 4102).await.unwrap();
    sdk.register("127.0.0.1", 4101).await.unwrap();

    let state = sdk.state(Some(1000)).await.unwrap();
    assert_eq!(state.nodes, vec!["127.0.0.1:4101", "127.0.0.1:4102"]);
    assert_eq!(state.workers.len(), 2);
    assert_eq!(state.positions, 100);
    let distribution = state.distribution.unwrap();
    assert_eq!(distribution.values().sum::<usize>(), 1000);

    let err = sdk.register("", 4103).await.unwrap_err();
    assert!(matches!(err, fleet_sdk::SdkError::Status { status: 400, .. }));

    assert!(sdk.health().await.unwrap());
}
