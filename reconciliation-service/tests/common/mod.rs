//! Common test utilities for reconciliation-service integration tests.
//!
//! The gRPC tests need a running Postgres; they skip themselves when
//! `TEST_DATABASE_URL` is unset so the infrastructure-free suites still run
//! everywhere.

use reconciliation_service::config::{DatabaseConfig, ReconciliationConfig, RedisConfig};
use reconciliation_service::grpc::proto::reconciliation_service_client::ReconciliationServiceClient;
use reconciliation_service::services::Database;
use reconciliation_service::startup::Application;
use service_core::config::Config as CommonConfig;
use std::sync::Once;
use tonic::transport::Channel;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,reconciliation_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config(database_url: String) -> ReconciliationConfig {
    ReconciliationConfig {
        common: CommonConfig { port: 0 },
        service_name: "reconciliation-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
        // Empty = in-process cache
        redis: RedisConfig { url: String::new() },
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub grpc_client: ReconciliationServiceClient<Channel>,
    pub db: Database,
    pub tenant_id: Uuid,
    pub http_port: u16,
    pub grpc_port: u16,
}

/// Spawn a test application with a unique tenant ID, or `None` when
/// `TEST_DATABASE_URL` is not set.
pub async fn spawn_app() -> Option<TestApp> {
    init_tracing();

    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set - skipping integration test");
        return None;
    };

    let config = test_config(database_url);

    let app = Application::build(config)
        .await
        .expect("Failed to build application");

    let db = app.db().clone();
    let http_port = app.http_port();
    let grpc_port = app.grpc_port();
    let grpc_addr = format!("http://127.0.0.1:{}", grpc_port);

    // Start the application in the background
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    // Wait for server to be ready with retry
    let grpc_client = {
        let mut attempts = 0;
        loop {
            match ReconciliationServiceClient::connect(grpc_addr.clone()).await {
                Ok(client) => break client,
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                }
                Err(e) => panic!("Failed to connect gRPC client after 20 attempts: {}", e),
            }
        }
    };

    Some(TestApp {
        grpc_client,
        db,
        tenant_id: Uuid::new_v4(),
        http_port,
        grpc_port,
    })
}

/// Helper to inject tenant ID and user ID into request metadata.
pub fn with_tenant<T>(request: T, tenant_id: &Uuid) -> tonic::Request<T> {
    let mut req = tonic::Request::new(request);
    req.metadata_mut()
        .insert("x-tenant-id", tenant_id.to_string().parse().unwrap());
    req.metadata_mut()
        .insert("x-user-id", "test-user".parse().unwrap());
    req
}
