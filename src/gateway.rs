//! Request rejection for API gateways.
//!
//! A gateway hands over its per-service extra config. The entry under
//! [`NAMESPACE`] configures the shared filter and names the token claims
//! and headers whose values get rejected once they have been added to the
//! filter as `key + "-" + value`.

use crate::bloom::BloomConfig;
use crate::error::{FilterError, Result};
use crate::filter::{EmptyFilter, MembershipFilter};
use crate::hash::HashStrategy;
use crate::rotating::RotatingConfig;
use crate::rpc::FilterRegistry;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Key of the filter's entry in a gateway's extra config.
pub const NAMESPACE: &str = "rotating_bloom_rs";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayConfig {
    #[serde(rename = "N")]
    pub capacity: usize,
    #[serde(rename = "P")]
    pub false_positive_rate: f64,
    #[serde(rename = "HashName")]
    pub hash_strategy: HashStrategy,
    /// Rotation period in seconds
    #[serde(rename = "TTL")]
    pub ttl_secs: u64,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "TokenKeys", default)]
    pub token_keys: Vec<String>,
    #[serde(rename = "Headers", default)]
    pub headers: Vec<String>,
}

impl GatewayConfig {
    pub fn rotating_config(&self) -> RotatingConfig {
        RotatingConfig {
            bloom: BloomConfig {
                capacity: self.capacity,
                false_positive_rate: self.false_positive_rate,
                hash_strategy: self.hash_strategy,
            },
            ttl: Duration::from_secs(self.ttl_secs),
        }
    }
}

/// Reads the filter config out of `extra_config`, initializes `registry`
/// with it and announces `(service_name, port)`.
///
/// On error callers may keep serving with [`Rejecter::noop`].
pub fn register<F>(
    service_name: &str,
    extra_config: &Map<String, Value>,
    registry: &FilterRegistry,
    announce: F,
) -> Result<Rejecter>
where
    F: FnOnce(&str, u16),
{
    let Some(raw) = extra_config.get(NAMESPACE) else {
        debug!("No {NAMESPACE} entry in extra config");
        return Err(FilterError::GatewayConfig(
            "no config for the bloom filter".into(),
        ));
    };
    let config = GatewayConfig::deserialize(raw).map_err(|e| {
        FilterError::GatewayConfig(format!(
            "invalid config for the bloom filter: {e}"
        ))
    })?;

    let filter = registry.init(config.rotating_config()).map_err(|e| {
        FilterError::GatewayConfig(format!(
            "invalid config for the bloom filter: {e}"
        ))
    })?;
    announce(service_name, config.port);
    info!(service_name, port = config.port, "Registered bloom filter");

    Ok(Rejecter {
        filter,
        token_keys: config.token_keys,
        headers: config.headers,
    })
}

/// Checks request credentials against the filter.
#[derive(Clone)]
pub struct Rejecter {
    filter: Arc<dyn MembershipFilter + Send + Sync>,
    token_keys: Vec<String>,
    headers: Vec<String>,
}

impl Rejecter {
    pub fn new(
        filter: Arc<dyn MembershipFilter + Send + Sync>,
        token_keys: Vec<String>,
        headers: Vec<String>,
    ) -> Self {
        Self {
            filter,
            token_keys,
            headers,
        }
    }

    /// Rejects nothing.
    pub fn noop() -> Self {
        Self::new(Arc::new(EmptyFilter), Vec::new(), Vec::new())
    }

    /// True when any configured claim holds a string value in the filter.
    pub fn reject_token(&self, claims: &Map<String, Value>) -> bool {
        self.token_keys.iter().any(|key| match claims.get(key) {
            Some(Value::String(value)) => self.seen(key, value),
            _ => false,
        })
    }

    /// True when any configured, non-empty header value is in the filter.
    pub fn reject_header(&self, headers: &HeaderMap) -> bool {
        self.headers.iter().any(|key| {
            headers
                .get(key.as_str())
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .is_some_and(|value| self.seen(key, value))
        })
    }

    fn seen(&self, key: &str, value: &str) -> bool {
        let lookup = format!("{key}-{value}");
        matches!(self.filter.check(lookup.as_bytes()), Ok(true))
    }
}

impl fmt::Debug for Rejecter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejecter")
            .field("kind", &self.filter.kind())
            .field("token_keys", &self.token_keys)
            .field("headers", &self.headers)
            .finish()
    }
}
