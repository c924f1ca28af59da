//! # WebSocket Flows
//!
//! Client-visible protocol behaviour over a real node:
//!
//! 1. **Authentication**: token in the URL, one failure frame then close
//! 2. **Storage**: put/get/delete scoped per user, JSON values returned intact
//! 3. **Errors**: unknown op, bad JSON, missing key/value, expired session
//! 4. **Ordering**: pipelined requests answered in order

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio_tungstenite::tungstenite::Message;

    use crate::harness::{TestNode, ALICE, BOB};

    // =============================================================================
    // AUTHENTICATION
    // =============================================================================

    #[tokio::test]
    async fn test_unknown_token_gets_security_error_then_close() {
        let node = TestNode::start().await;
        let mut client = node.connect("not-a-real-token").await;

        let frame = client.recv_json().await;
        assert_eq!(
            frame,
            json!({"error": "Invalid or expired token", "errorName": "SecurityError"})
        );
        assert_eq!(client.expect_closed().await, Some(1000));

        let metrics = node.get_json("/metrics").await;
        assert_eq!(metrics["connections"]["auth_failures"], 1);
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let node = TestNode::start().await;
        let mut client = crate::harness::Client::connect(&format!("ws://{}/", node.addr)).await;

        let frame = client.recv_json().await;
        assert_eq!(frame["errorName"], "SecurityError");
        assert!(frame.get("id").is_none());
        client.expect_closed().await;
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_short_token_never_reaches_upstream() {
        let node = TestNode::start().await;
        let lookups = node.upstream.lookup_calls();

        let mut client = node.connect("abcd").await;
        assert_eq!(client.recv_json().await["errorName"], "SecurityError");
        assert_eq!(node.upstream.lookup_calls(), lookups);
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticated_connection_is_registered() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        // A round trip proves authentication finished.
        let reply = client.request(json!({"id": 1, "op": "get", "key": "k"})).await;
        assert_eq!(reply, json!({"id": 1, "result": null}));

        let health = node.get_json("/health").await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["active_connections"], 1);
        assert_eq!(health["active_sessions"], 1);
        assert!(node.container.registry.contains(ALICE));

        drop(client);
        node.wait_for_health("active_connections", 0).await;
        // Sessions outlive their connections.
        assert!(node.container.registry.contains(ALICE));
        node.stop().await.unwrap();
    }

    // =============================================================================
    // STORAGE
    // =============================================================================

    #[tokio::test]
    async fn test_put_get_delete_get() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        let reply = client
            .request(json!({"id": 1, "op": "put", "key": "k1", "value": {"a": 1}}))
            .await;
        assert_eq!(reply, json!({"id": 1, "result": "k1"}));

        let reply = client.request(json!({"id": 2, "op": "get", "key": "k1"})).await;
        assert_eq!(reply, json!({"id": 2, "result": {"a": 1}}));

        let reply = client.request(json!({"id": 3, "op": "delete", "key": "k1"})).await;
        assert_eq!(reply, json!({"id": 3, "result": null}));

        let reply = client.request(json!({"id": 4, "op": "get", "key": "k1"})).await;
        assert_eq!(reply, json!({"id": 4, "result": null}));

        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_values_round_trip_as_json() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        let values = [
            json!([1, 2, {"deep": [true, null]}]),
            json!("plain string"),
            json!(42.5),
            json!(false),
            json!({"unicode": "привет, 世界"}),
        ];
        for (i, value) in values.iter().enumerate() {
            let key = format!("v{}", i);
            let put = client
                .request(json!({"id": "put", "op": "put", "key": key, "value": value}))
                .await;
            assert_eq!(put["result"], json!(key));

            let got = client
                .request(json!({"id": "get", "op": "get", "key": key}))
                .await;
            assert_eq!(&got["result"], value);
        }
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_users_cannot_see_each_other() {
        let node = TestNode::start().await;
        let mut alice = node.connect(ALICE).await;
        let mut bob = node.connect(BOB).await;

        alice
            .request(json!({"id": 1, "op": "put", "key": "save", "value": "alice-data"}))
            .await;
        bob.request(json!({"id": 1, "op": "put", "key": "save", "value": "bob-data"}))
            .await;

        let a = alice.request(json!({"id": 2, "op": "get", "key": "save"})).await;
        let b = bob.request(json!({"id": 2, "op": "get", "key": "save"})).await;
        assert_eq!(a["result"], "alice-data");
        assert_eq!(b["result"], "bob-data");

        bob.request(json!({"id": 3, "op": "delete", "key": "save"})).await;
        let a = alice.request(json!({"id": 3, "op": "get", "key": "save"})).await;
        assert_eq!(a["result"], "alice-data");
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_same_user_shares_data_across_connections() {
        let node = TestNode::start().await;
        let mut first = node.connect(ALICE).await;
        first
            .request(json!({"id": 1, "op": "put", "key": "shared", "value": [1, 2]}))
            .await;
        drop(first);

        let mut second = node.connect(ALICE).await;
        let reply = second.request(json!({"id": 1, "op": "get", "key": "shared"})).await;
        assert_eq!(reply["result"], json!([1, 2]));
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_string_key_is_echoed() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        let reply = client
            .request(json!({"id": 1, "op": "put", "key": 7, "value": "seven"}))
            .await;
        assert_eq!(reply, json!({"id": 1, "result": 7}));

        let reply = client.request(json!({"id": 2, "op": "get", "key": 7})).await;
        assert_eq!(reply["result"], "seven");
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_binary_frames_are_handled_as_text() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        client
            .send_binary(br#"{"id":9,"op":"put","key":"bin","value":1}"#.to_vec())
            .await;
        assert_eq!(client.recv_json().await, json!({"id": 9, "result": "bin"}));

        client.send_binary(vec![0xff, 0xfe, 0x00]).await;
        assert_eq!(
            client.recv_json().await,
            json!({"id": 0, "error": "Invalid JSON", "errorName": "SyntaxError"})
        );
        node.stop().await.unwrap();
    }

    // =============================================================================
    // ERRORS
    // =============================================================================

    #[tokio::test]
    async fn test_unknown_operation() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        let reply = client.request(json!({"id": 5, "op": "list", "key": "k"})).await;
        assert_eq!(
            reply,
            json!({"id": 5, "error": "Unknown operation: list", "errorName": "DataError"})
        );

        let reply = client.request(json!({"id": 6, "key": "k"})).await;
        assert_eq!(reply["error"], "Unknown operation: null");
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_json_gets_id_zero() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        client.send_text("{not json").await;
        assert_eq!(
            client.recv_json().await,
            json!({"id": 0, "error": "Invalid JSON", "errorName": "SyntaxError"})
        );

        // The connection stays usable.
        let reply = client.request(json!({"id": 1, "op": "get", "key": "k"})).await;
        assert_eq!(reply["id"], 1);
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_key_and_value() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        let reply = client.request(json!({"id": 1, "op": "get"})).await;
        assert_eq!(reply, json!({"id": 1, "result": null}));

        let reply = client.request(json!({"id": 2, "op": "put", "key": "k"})).await;
        assert_eq!(
            reply,
            json!({"id": 2, "error": "No value provided for put", "errorName": "DataError"})
        );

        let reply = client.request(json!({"id": 3, "op": "put", "value": 1})).await;
        assert_eq!(
            reply,
            json!({"id": 3, "error": "Database write failed", "errorName": "UnknownError"})
        );

        let reply = client.request(json!({"id": 4, "op": "delete"})).await;
        assert_eq!(reply, json!({"id": 4, "result": null}));

        let storage = &node.container.storage;
        storage.audit().flush().await;
        let rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT operation, storage_key, value FROM operation_logs WHERE username = 'alice' ORDER BY id",
        )
        .fetch_all(storage.pool())
        .await
        .unwrap();
        assert_eq!(
            rows,
            vec![
                ("GET".to_string(), None, Some("NOT_FOUND".to_string())),
                ("PUT".to_string(), None, Some("ERROR".to_string())),
                ("DELETE".to_string(), None, Some("NOT_FOUND".to_string())),
            ]
        );
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_requests_without_id_get_no_reply() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        client
            .send_json(json!({"op": "put", "key": "quiet", "value": 1}))
            .await;
        client.send_json(json!({"id": 0, "op": "get", "key": "quiet"})).await;
        client.send_json(json!({"id": "", "op": "get", "key": "quiet"})).await;
        client.send_json(json!([1, 2, 3])).await;

        // Dropped requests are not executed, and the first reply belongs to
        // the first request that had an id.
        let reply = client.request(json!({"id": 7, "op": "get", "key": "quiet"})).await;
        assert_eq!(reply, json!({"id": 7, "result": null}));
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_registry_miss_expires_connection() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;
        client.request(json!({"id": 1, "op": "get", "key": "k"})).await;

        node.container.registry.clear();

        let reply = client.request(json!({"id": 2, "op": "get", "key": "k"})).await;
        assert_eq!(
            reply,
            json!({"id": 2, "error": "Session expired, please reload", "errorName": "SecurityError"})
        );
        assert_eq!(client.expect_closed().await, Some(1000));
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_upstream_revocation_does_not_affect_open_connection() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;
        client.request(json!({"id": 1, "op": "get", "key": "k"})).await;

        node.upstream.remove_user(ALICE);

        let reply = client
            .request(json!({"id": 2, "op": "put", "key": "k", "value": 1}))
            .await;
        assert_eq!(reply["result"], "k");

        // New connections with the revoked token fail.
        let mut again = node.connect(ALICE).await;
        assert_eq!(again.recv_json().await["errorName"], "SecurityError");
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversize_message_ends_connection() {
        let node = TestNode::start_with(|config| config.server.max_message_size = 1024).await;
        let mut client = node.connect(ALICE).await;

        let big = "x".repeat(4096);
        client
            .send_json(json!({"id": 1, "op": "put", "key": "big", "value": big}))
            .await;
        client.expect_closed().await;

        // Other connections are unaffected.
        let mut other = node.connect(BOB).await;
        let reply = other.request(json!({"id": 1, "op": "get", "key": "big"})).await;
        assert_eq!(reply["result"], Value::Null);
        node.stop().await.unwrap();
    }

    // =============================================================================
    // KEEPALIVE AND ORDERING
    // =============================================================================

    #[tokio::test]
    async fn test_keepalive_echoes_timestamp() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        let reply = client
            .request(json!({"type": "keepalive", "timestamp": 1234567}))
            .await;
        assert_eq!(reply["type"], "keepalive_response");
        assert_eq!(reply["timestamp"], 1234567);
        assert!(reply["server_time"].as_u64().unwrap() > 1_600_000_000_000);

        let reply = client.request(json!({"type": "keepalive"})).await;
        assert_eq!(reply["timestamp"], Value::Null);

        let metrics = node.get_json("/metrics").await;
        assert_eq!(metrics["requests"]["keepalives"], 2);
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_pipelined_requests_answered_in_order() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;

        for i in 0..20 {
            client
                .send_json(json!({"id": i + 1, "op": "put", "key": format!("k{}", i), "value": i}))
                .await;
        }
        for i in 0..20 {
            let reply = client.recv_json().await;
            assert_eq!(reply["id"], i + 1);
            assert_eq!(reply["result"], format!("k{}", i));
        }

        client.send_json(json!({"id": "a", "op": "get", "key": "k3"})).await;
        client.send_json(json!({"id": "b", "op": "delete", "key": "k3"})).await;
        client.send_json(json!({"id": "c", "op": "get", "key": "k3"})).await;
        assert_eq!(client.recv_json().await, json!({"id": "a", "result": 3}));
        assert_eq!(client.recv_json().await, json!({"id": "b", "result": null}));
        assert_eq!(client.recv_json().await, json!({"id": "c", "result": null}));

        client.expect_silence(Duration::from_millis(100)).await;
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_client_close_is_clean() {
        let node = TestNode::start().await;
        let mut client = node.connect(ALICE).await;
        client.request(json!({"id": 1, "op": "get", "key": "k"})).await;

        client.send_message(Message::Close(None)).await;
        node.wait_for_health("active_connections", 0).await;

        let metrics = node.get_json("/metrics").await;
        assert_eq!(metrics["connections"]["opened"], 1);
        node.stop().await.unwrap();
    }
}
