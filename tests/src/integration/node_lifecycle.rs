//! # Node Lifecycle
//!
//! Startup ordering, upstream session recovery, restart durability and
//! graceful shutdown of a full node.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use node_runtime::NodeRuntime;
    use rs_02_identity_client::test_utils::FakeUpstream;

    use crate::harness::{node_config, TestNode, ALICE};

    #[tokio::test]
    async fn test_startup_fails_when_upstream_rejects_login() {
        let upstream = FakeUpstream::start().await.unwrap();
        upstream.set_reject_logins(true);
        let dir = tempfile::tempdir().unwrap();

        let err = NodeRuntime::start(node_config(&upstream, &dir))
            .await
            .err()
            .expect("startup should fail");
        assert!(format!("{:#}", err).contains("initial login"));
        assert_eq!(upstream.login_calls(), 1);
    }

    #[tokio::test]
    async fn test_startup_fails_on_invalid_config() {
        let upstream = FakeUpstream::start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut config = node_config(&upstream, &dir);
        config.upstream.password.clear();

        assert!(NodeRuntime::start(config).await.is_err());
        assert_eq!(upstream.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_startup_logs_in_once() {
        let node = TestNode::start().await;
        assert_eq!(node.upstream.login_calls(), 1);
        assert_eq!(node.upstream.verify_calls(), 1);
        assert!(node.container.identity.has_session());
        assert!(node.container.registry.is_empty());
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_upstream_session_is_renewed_on_next_connection() {
        let node = TestNode::start().await;
        node.upstream.expire_sessions();

        let mut client = node.connect(ALICE).await;
        let reply = client.request(json!({"id": 1, "op": "get", "key": "k"})).await;
        assert_eq!(reply, json!({"id": 1, "result": null}));
        assert_eq!(node.upstream.login_calls(), 2);
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_are_audited() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        client
            .request(json!({"id": 1, "op": "put", "key": "k", "value": {"n": 1}}))
            .await;
        client.request(json!({"id": 2, "op": "get", "key": "k"})).await;
        client.request(json!({"id": 3, "op": "delete", "key": "k"})).await;
        client.request(json!({"id": 4, "op": "get", "key": "k"})).await;
        client.request(json!({"type": "keepalive", "timestamp": 1})).await;

        let storage = &node.container.storage;
        storage.audit().flush().await;
        let rows = sqlx_rows(storage).await;
        assert_eq!(
            rows,
            vec![
                ("PUT".to_string(), Some(r#"{"n":1}"#.to_string())),
                ("GET".to_string(), Some(r#"{"n":1}"#.to_string())),
                ("DELETE".to_string(), Some("DELETED".to_string())),
                ("GET".to_string(), Some("NOT_FOUND".to_string())),
            ]
        );
        node.stop().await.unwrap();
    }

    async fn sqlx_rows(
        storage: &rs_01_storage_engine::SqlStorageEngine,
    ) -> Vec<(String, Option<String>)> {
        sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT operation, value FROM operation_logs WHERE username = 'alice' ORDER BY id",
        )
        .fetch_all(storage.pool())
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_data_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("durable.db").display());

        let url = database_url.clone();
        let node = TestNode::start_with(move |config| config.storage.database_url = url).await;
        let mut client = node.connect(ALICE).await;
        client
            .request(json!({"id": 1, "op": "put", "key": "save", "value": {"level": 3}}))
            .await;
        drop(client);
        node.stop().await.unwrap();

        let node = TestNode::start_with(move |config| config.storage.database_url = database_url).await;
        let mut client = node.connect(ALICE).await;
        let reply = client.request(json!({"id": 1, "op": "get", "key": "save"})).await;
        assert_eq!(reply["result"], json!({"level": 3}));
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_open_connections() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;
        client.request(json!({"id": 1, "op": "get", "key": "k"})).await;
        let container = std::sync::Arc::clone(&node.container);

        let stopped = tokio::spawn(node.stop());

        assert_eq!(client.expect_closed().await, Some(1001));
        tokio::time::timeout(Duration::from_secs(10), stopped)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Shutdown releases everything.
        assert!(container.registry.is_empty());
        assert!(!container.identity.has_session());
    }
}
