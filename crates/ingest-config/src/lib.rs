//! Environment configuration (§6.6): 27 recognized keys across 6 groups,
//! plus one reserved override, loaded via `envy` with `dotenvy` support for
//! local `.env` files. Each group is deserialized with its own env var
//! prefix and falls back to the defaults named throughout spec.md §3/§4
//! when a key is absent.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load {group} configuration: {source}")]
    Group {
        group: &'static str,
        #[source]
        source: envy::Error,
    },
}

/// Legacy backend connection parameters (5 keys, `LEGACY_DB_*`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LegacyBackendConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for LegacyBackendConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "iot_legacy".to_string(),
        }
    }
}

/// Generic multi-domain backend connection URL (1 key, `GENERIC_BACKEND_URL`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenericBackendConfig {
    pub url: String,
}

impl Default for GenericBackendConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/ingest_generic".to_string(),
        }
    }
}

/// Dedup + DLQ backing-store URL (1 key, `DEDUP_STORE_URL`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub store_url: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            store_url: "redis://localhost:6379".to_string(),
        }
    }
}

/// MQTT broker host, port, credentials (4 keys, `MQTT_*`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
        }
    }
}

/// Feature toggles (6 keys, `FEATURE_*`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub mqtt_ingest_enabled: bool,
    pub modular_receiver_enabled: bool,
    pub generic_mqtt_enabled: bool,
    pub websocket_enabled: bool,
    pub csv_enabled: bool,
    pub device_auth_enabled: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            mqtt_ingest_enabled: true,
            modular_receiver_enabled: true,
            generic_mqtt_enabled: false,
            websocket_enabled: true,
            csv_enabled: true,
            device_auth_enabled: false,
        }
    }
}

/// Tuning (10 keys, `TUNING_*`). Defaults match the constants named in
/// spec.md §3/§4 (dedup TTL, DLQ capacity, breaker threshold/open-duration,
/// retry attempts/base-delay, bus interval, cache TTL, warm-up N,
/// stale-timeout).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub dedup_ttl_seconds: u64,
    pub dlq_max_length: usize,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_open_duration_seconds: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub bus_min_interval_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub state_warmup_readings: u64,
    pub stale_timeout_seconds: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_seconds: 60,
            dlq_max_length: 10_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_open_duration_seconds: 30,
            retry_max_attempts: 3,
            retry_base_delay_ms: 100,
            bus_min_interval_seconds: 1,
            cache_ttl_seconds: 60,
            state_warmup_readings: 10,
            stale_timeout_seconds: 300.0,
        }
    }
}

/// The full recognized environment (§6.6): six grouped sections plus one
/// reserved override.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub legacy_backend: LegacyBackendConfig,
    pub generic_backend: GenericBackendConfig,
    pub dedup: DedupConfig,
    pub mqtt: MqttConfig,
    pub features: FeatureToggles,
    pub tuning: TuningConfig,
    /// Reserved override for the prediction bus endpoint (1 key,
    /// `RESERVED_BUS_URL`); absent unless a deployment needs to point the
    /// bus somewhere other than its compiled-in default.
    pub bus_url_override: Option<String>,
}

impl GatewayConfig {
    /// Loads `.env` (if present, via `dotenvy`) then each group from its own
    /// prefixed environment namespace. Never panics on a missing key — every
    /// field falls back to its documented default.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let legacy_backend = load_group("legacy_backend", "LEGACY_DB_")?;
        let generic_backend = load_group("generic_backend", "GENERIC_BACKEND_")?;
        let dedup = load_group("dedup", "DEDUP_")?;
        let mqtt = load_group("mqtt", "MQTT_")?;
        let features = load_group("features", "FEATURE_")?;
        let tuning = load_group("tuning", "TUNING_")?;
        let bus_url_override = std::env::var("RESERVED_BUS_URL").ok();

        Ok(Self {
            legacy_backend,
            generic_backend,
            dedup,
            mqtt,
            features,
            tuning,
            bus_url_override,
        })
    }
}

fn load_group<T: serde::de::DeserializeOwned>(group: &'static str, prefix: &str) -> Result<T, ConfigError> {
    envy::prefixed(prefix)
        .from_env::<T>()
        .map_err(|source| ConfigError::Group { group, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive_enough_to_boot() {
        let tuning = TuningConfig::default();
        assert_eq!(tuning.dedup_ttl_seconds, 60);
        assert_eq!(tuning.dlq_max_length, 10_000);
        assert_eq!(tuning.circuit_breaker_threshold, 5);
    }

    #[test]
    fn feature_toggles_default_mqtt_and_csv_on() {
        let features = FeatureToggles::default();
        assert!(features.mqtt_ingest_enabled);
        assert!(features.csv_enabled);
        assert!(!features.generic_mqtt_enabled);
    }
}
