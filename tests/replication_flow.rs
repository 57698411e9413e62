//! End-to-end replication between real HTTP nodes on localhost.
//!
//! Database access is mocked; everything between the nodes (probes,
//! replica RPCs, registration) goes over the real reqwest client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dbrelay::api::HttpServer;
use dbrelay::config::ReplicationConfig;
use dbrelay::executor::MariaDbExecutor;
use dbrelay::network::{HttpPeerClient, PeerTransport};
use dbrelay::node::NodeService;
use dbrelay::replication::{ReplicaAck, ReplicationDispatcher, ReplicationTask};
use dbrelay::state::{NodeRole, ReplicaHealth, ReplicaRegistry, RoleState};

struct TestNode {
    address: String,
    executor: Arc<MariaDbExecutor>,
    registry: Arc<ReplicaRegistry>,
    service: Arc<NodeService>,
}

fn client() -> HttpPeerClient {
    HttpPeerClient::new(Duration::from_secs(2)).unwrap()
}

fn replication_config() -> ReplicationConfig {
    ReplicationConfig {
        probe_timeout_ms: 1000,
        delivery_timeout_ms: 2000,
        ..Default::default()
    }
}

/// Start a node serving HTTP on an ephemeral port
async fn spawn_node(role: NodeRole) -> TestNode {
    spawn_node_with(role, MariaDbExecutor::new_mock()).await
}

async fn spawn_node_with(role: NodeRole, executor: MariaDbExecutor) -> TestNode {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());

    let executor = Arc::new(executor);
    let registry = Arc::new(ReplicaRegistry::new());
    let transport: Arc<dyn PeerTransport> = Arc::new(client());
    let (dispatcher, worker) =
        ReplicationDispatcher::new(&replication_config(), Arc::clone(&registry), transport);
    tokio::spawn(worker.run());

    let primary = if role == NodeRole::Leader {
        address.clone()
    } else {
        "http://127.0.0.1:1".to_string()
    };
    let role_state = Arc::new(RoleState::new(address.clone(), role, primary));
    let service = Arc::new(NodeService::new(
        Arc::clone(&executor),
        Arc::clone(&registry),
        dispatcher,
        role_state,
    ));

    let router = HttpServer::create_router(Arc::clone(&service), true);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestNode {
        address,
        executor,
        registry,
        service,
    }
}

/// An address with nothing listening on it
async fn dead_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    address
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn create_database_reaches_replica() {
    let primary = spawn_node(NodeRole::Leader).await;
    let replica = spawn_node(NodeRole::Follower).await;
    primary.registry.register(&replica.address).await;

    primary
        .service
        .execute_write(ReplicationTask::CreateDatabase { name: "shop".into() })
        .await
        .unwrap();

    eventually(|| async { !replica.executor.executed_statements().is_empty() }).await;
    assert_eq!(
        replica.executor.executed_statements(),
        vec!["CREATE DATABASE IF NOT EXISTS `shop`"]
    );
    eventually(|| async { primary.service.status().await.dispatch.deliveries_succeeded == 1 }).await;
    assert_eq!(primary.registry.health_of(&replica.address).await, ReplicaHealth::Healthy);

    // The replica's answer to GET /replicate/db?name=shop
    let ack = client()
        .deliver(&replica.address, &ReplicationTask::CreateDatabase { name: "shop".into() })
        .await
        .unwrap();
    assert_eq!(
        ack,
        ReplicaAck {
            message: "Database replicated successfully".into(),
            dbname: Some("shop".into()),
            ..Default::default()
        }
    );
}

#[tokio::test]
async fn insert_over_http_reaches_replica() {
    let primary = spawn_node(NodeRole::Leader).await;
    let replica = spawn_node(NodeRole::Follower).await;
    primary.registry.register(&replica.address).await;

    let response = reqwest::Client::new()
        .post(format!("{}/insert", primary.address))
        .json(&serde_json::json!({"dbname": "shop", "table": "orders", "values": "1,'A'"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"message": "Record inserted successfully"}));

    assert_eq!(
        primary.executor.executed_statements(),
        vec!["INSERT INTO `shop`.`orders` VALUES (1,'A')"]
    );
    eventually(|| async { !replica.executor.executed_statements().is_empty() }).await;
    assert_eq!(
        replica.executor.executed_statements(),
        vec!["INSERT INTO `shop`.`orders` VALUES (1,'A')"]
    );
}

#[tokio::test]
async fn unreachable_replica_is_skipped_by_later_tasks() {
    let primary = spawn_node(NodeRole::Leader).await;
    let healthy = spawn_node(NodeRole::Follower).await;
    let dead = dead_address().await;
    primary.registry.register(&dead).await;
    primary.registry.register(&healthy.address).await;

    primary
        .service
        .execute_write(ReplicationTask::CreateDatabase { name: "first".into() })
        .await
        .unwrap();

    eventually(|| async { healthy.executor.executed_statements().len() == 1 }).await;
    eventually(|| async { primary.registry.health_of(&dead).await == ReplicaHealth::Unhealthy }).await;
    assert_eq!(primary.service.status().await.dispatch.probes_failed, 1);

    primary
        .service
        .execute_write(ReplicationTask::CreateDatabase { name: "second".into() })
        .await
        .unwrap();

    eventually(|| async { healthy.executor.executed_statements().len() == 2 }).await;
    let status = primary.service.status().await;
    // The dead replica was not probed again.
    assert_eq!(status.dispatch.probes_failed, 1);
    assert_eq!(status.dispatch.deliveries_started, 2);
    assert_eq!(primary.registry.health_of(&dead).await, ReplicaHealth::Unhealthy);
}

#[tokio::test]
async fn replica_answering_500_is_marked_unhealthy() {
    let primary = spawn_node(NodeRole::Leader).await;
    let broken = spawn_node_with(
        NodeRole::Follower,
        MariaDbExecutor::new_failing_mock("disk full"),
    )
    .await;
    primary.registry.register(&broken.address).await;

    // The replica answers /ping but fails to apply the operation
    let err = client()
        .deliver(&broken.address, &ReplicationTask::CreateDatabase { name: "ledger".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, dbrelay::Error::ReplicaRejected { status: 500, .. }));

    primary
        .service
        .execute_write(ReplicationTask::CreateDatabase { name: "shop".into() })
        .await
        .unwrap();

    eventually(|| async { primary.registry.health_of(&broken.address).await == ReplicaHealth::Unhealthy }).await;
    let status = primary.service.status().await;
    assert_eq!(status.dispatch.probes_failed, 0);
    assert_eq!(status.dispatch.deliveries_failed, 1);
}

#[tokio::test]
async fn replica_registers_with_primary() {
    let primary = spawn_node(NodeRole::Leader).await;

    client()
        .register_until_accepted(&primary.address, "http://127.0.0.1:8084", Duration::from_millis(50))
        .await;

    assert_eq!(
        primary.registry.health_of("http://127.0.0.1:8084").await,
        ReplicaHealth::Healthy
    );
}

#[tokio::test]
async fn replica_refuses_client_writes() {
    let replica = spawn_node(NodeRole::Follower).await;

    let response = reqwest::get(format!("{}/createdb?name=shop", replica.address))
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_PRIMARY");
    assert!(replica.executor.executed_statements().is_empty());
}
