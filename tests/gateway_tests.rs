use axum::http::{HeaderMap, HeaderValue};
use rotating_bloom_rs::gateway::{NAMESPACE, Rejecter, register};
use rotating_bloom_rs::{FilterError, FilterRegistry};
use serde_json::{Map, Value, json};
use std::time::Duration;

fn extra_config(entry: Value) -> Map<String, Value> {
    let mut config = Map::new();
    config.insert(NAMESPACE.to_string(), entry);
    config
}

fn valid_entry() -> Value {
    json!({
        "N": 10_000,
        "P": 0.0000001,
        "HashName": "optimal",
        "TTL": 1500,
        "Port": 1234,
        "TokenKeys": ["jti"],
        "Headers": ["X-Api-Key"],
    })
}

#[cfg(test)]
mod register_tests {
    use super::*;

    #[tokio::test]
    async fn test_register_initializes_and_announces() {
        let registry = FilterRegistry::default();
        let mut announced = None;

        let rejecter = register(
            "revocations",
            &extra_config(valid_entry()),
            &registry,
            |name, port| announced = Some((name.to_string(), port)),
        )
        .expect("Register should succeed");

        assert_eq!(announced, Some(("revocations".to_string(), 1234)));
        let config = registry.filter().unwrap().config().unwrap();
        assert_eq!(config.bloom.capacity, 10_000);
        assert_eq!(config.ttl, Duration::from_secs(1500));
        assert!(!rejecter.reject_token(&Map::new()));
    }

    #[test]
    fn test_missing_config() {
        let registry = FilterRegistry::default();
        let err = register("svc", &Map::new(), &registry, |_, _| {
            panic!("nothing to announce")
        })
        .unwrap_err();

        match err {
            FilterError::GatewayConfig(message) => {
                assert!(message.starts_with("no config"), "{message}")
            }
            other => panic!("Expected GatewayConfig, got {other:?}"),
        }
        assert!(!registry.is_initialized());
    }

    #[test]
    fn test_malformed_config() {
        let registry = FilterRegistry::default();
        let entry = json!({ "N": "lots", "P": 0.1 });
        let err = register("svc", &extra_config(entry), &registry, |_, _| {})
            .unwrap_err();

        match err {
            FilterError::GatewayConfig(message) => {
                assert!(message.starts_with("invalid config"), "{message}")
            }
            other => panic!("Expected GatewayConfig, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_out_of_range_config() {
        let registry = FilterRegistry::default();
        for (field, value) in [("P", json!(1.5)), ("TTL", json!(u64::MAX))] {
            let mut entry = valid_entry();
            entry[field] = value;
            let err =
                register("svc", &extra_config(entry), &registry, |_, _| {})
                    .unwrap_err();
            assert!(
                matches!(err, FilterError::GatewayConfig(_)),
                "{field}: {err:?}"
            );
            assert!(!registry.is_initialized());
        }
    }
}

#[cfg(test)]
mod rejecter_tests {
    use super::*;

    async fn registered() -> (Rejecter, FilterRegistry) {
        let registry = FilterRegistry::default();
        let rejecter = register(
            "svc",
            &extra_config(valid_entry()),
            &registry,
            |_, _| {},
        )
        .unwrap();
        (rejecter, registry)
    }

    #[tokio::test]
    async fn test_reject_token_uses_key_value_lookup() {
        let (rejecter, registry) = registered().await;
        registry.add(&[b"jti-revoked-token".as_slice()]).unwrap();

        let mut claims = Map::new();
        claims.insert("jti".into(), json!("revoked-token"));
        assert!(rejecter.reject_token(&claims));

        claims.insert("jti".into(), json!("fresh-token"));
        assert!(!rejecter.reject_token(&claims));

        // only string claims are looked up
        registry.add(&[b"jti-42".as_slice()]).unwrap();
        claims.insert("jti".into(), json!(42));
        assert!(!rejecter.reject_token(&claims));

        // unconfigured keys are ignored
        let mut other = Map::new();
        other.insert("sub".into(), json!("revoked-token"));
        assert!(!rejecter.reject_token(&other));
    }

    #[tokio::test]
    async fn test_reject_header() {
        let (rejecter, registry) = registered().await;
        registry.add(&[b"X-Api-Key-leaked".as_slice()]).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("leaked"));
        assert!(rejecter.reject_header(&headers));

        headers.insert("x-api-key", HeaderValue::from_static("rotated"));
        assert!(!rejecter.reject_header(&headers));

        headers.insert("x-api-key", HeaderValue::from_static(""));
        assert!(!rejecter.reject_header(&headers));
    }

    #[test]
    fn test_noop_rejects_nothing() {
        let rejecter = Rejecter::noop();
        let mut claims = Map::new();
        claims.insert("jti".into(), json!("anything"));
        assert!(!rejecter.reject_token(&claims));
        assert!(!rejecter.reject_header(&HeaderMap::new()));
    }
}
