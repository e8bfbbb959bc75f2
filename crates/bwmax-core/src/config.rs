use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the over-threshold streak reacts to a sample at or below the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakDecay {
    /// Any sub-threshold sample resets the streak to 0.
    #[default]
    Reset,
    /// Each sub-threshold sample decrements the streak by one (floor 0).
    Decrement,
}

/// Largest duration any setting may hold (one week).
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Seconds to `Duration`, saturating instead of panicking. Out-of-range values
/// are rejected by `validate`; this only keeps unvalidated configs from panicking.
fn secs(value: f64) -> Duration {
    match Duration::try_from_secs_f64(value) {
        Ok(d) => d,
        Err(_) if value > 0.0 => Duration::from_secs_f64(MAX_DURATION_SECS),
        Err(_) => Duration::ZERO,
    }
}

/// QoS cooldown parameters (`[qos]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QosConfig {
    /// Rate above which a sample counts toward the streak (megabits per second).
    pub threshold_mbps: f64,
    /// Consecutive over-threshold samples that trigger a cooldown.
    pub streak_length: u32,
    /// Length of a cooldown in seconds.
    pub cooldown_secs: f64,
    /// Longest single wait of a worker while the guard is cooling.
    pub check_interval_secs: f64,
    /// Streak behavior on a sub-threshold sample.
    pub streak_decay: StreakDecay,
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            threshold_mbps: 250.0,
            streak_length: 5,
            cooldown_secs: 120.0,
            check_interval_secs: 30.0,
            streak_decay: StreakDecay::Reset,
        }
    }
}

impl QosConfig {
    pub fn cooldown(&self) -> Duration {
        secs(self.cooldown_secs)
    }

    pub fn check_interval(&self) -> Duration {
        secs(self.check_interval_secs)
    }
}

/// Global configuration loaded from `~/.config/bwmax/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BwmaxConfig {
    /// Download sources; one is picked uniformly at random per request.
    pub candidate_urls: Vec<String>,
    /// Receive buffer size handed to curl (bytes per chunk).
    pub chunk_size_bytes: usize,
    /// Connect timeout, and the stall window after which a read is abandoned.
    pub request_timeout_secs: f64,
    /// Hard wall-clock cap on a single request; forces URL rotation.
    pub max_download_secs: f64,
    /// Pause between two requests of the same worker.
    pub inter_request_delay_secs: f64,
    /// Capacity of the rolling throughput window.
    pub rolling_window_size: usize,
    /// Sampling period of the aggregator.
    pub tick_interval_secs: f64,
    /// Upper bound for the connection count accepted by `start`.
    pub max_connections: usize,
    /// Connection count used when the caller does not pick one.
    pub default_connections: usize,
    /// Capacity of the bounded event channel; events are dropped when full.
    pub event_buffer: usize,
    /// Skip TLS certificate verification.
    pub insecure_tls: bool,
    /// Request headers sent with every GET.
    pub headers: BTreeMap<String, String>,
    pub qos: QosConfig,
}

pub const DEFAULT_CANDIDATE_URLS: [&str; 3] = [
    "http://http.speed.hinet.net/test_60m.zip",
    "http://http.speed.hinet.net/test_100m.zip",
    "http://http.speed.hinet.net/test_200m.zip",
];

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(
        "User-Agent".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0".to_string(),
    );
    headers.insert("Accept".to_string(), "*/*".to_string());
    headers.insert("Accept-Encoding".to_string(), "identity".to_string());
    headers
}

impl Default for BwmaxConfig {
    fn default() -> Self {
        Self {
            candidate_urls: DEFAULT_CANDIDATE_URLS.iter().map(|s| s.to_string()).collect(),
            chunk_size_bytes: 128 * 1024,
            request_timeout_secs: 10.0,
            max_download_secs: 30.0,
            inter_request_delay_secs: 0.2,
            rolling_window_size: 10,
            tick_interval_secs: 1.0,
            max_connections: 20,
            default_connections: 12,
            event_buffer: 256,
            insecure_tls: false,
            headers: default_headers(),
            qos: QosConfig::default(),
        }
    }
}

impl BwmaxConfig {
    pub fn request_timeout(&self) -> Duration {
        secs(self.request_timeout_secs)
    }

    pub fn max_download(&self) -> Duration {
        secs(self.max_download_secs)
    }

    pub fn inter_request_delay(&self) -> Duration {
        secs(self.inter_request_delay_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        secs(self.tick_interval_secs)
    }

    /// Check value ranges that serde cannot express. Returns the first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.candidate_urls.is_empty() {
            return Err("candidate_urls is empty".to_string());
        }
        for raw in &self.candidate_urls {
            let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL {raw:?}: {e}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!("unsupported scheme in {raw:?}"));
            }
        }
        if self.chunk_size_bytes == 0 {
            return Err("chunk_size_bytes must be positive".to_string());
        }
        if self.rolling_window_size == 0 {
            return Err("rolling_window_size must be positive".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be positive".to_string());
        }
        if self.qos.streak_length == 0 {
            return Err("qos.streak_length must be positive".to_string());
        }
        let positive = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("max_download_secs", self.max_download_secs),
            ("tick_interval_secs", self.tick_interval_secs),
            ("qos.cooldown_secs", self.qos.cooldown_secs),
            ("qos.check_interval_secs", self.qos.check_interval_secs),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{name} must be a positive number of seconds"));
            }
        }
        if !(self.inter_request_delay_secs.is_finite() && self.inter_request_delay_secs >= 0.0) {
            return Err("inter_request_delay_secs must not be negative".to_string());
        }
        let bounded = positive
            .into_iter()
            .chain([("inter_request_delay_secs", self.inter_request_delay_secs)]);
        for (name, value) in bounded {
            if value > MAX_DURATION_SECS || Duration::try_from_secs_f64(value).is_err() {
                return Err(format!("{name} exceeds {MAX_DURATION_SECS} seconds"));
            }
        }
        if !self.qos.threshold_mbps.is_finite() {
            return Err("qos.threshold_mbps must be finite".to_string());
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bwmax")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BwmaxConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BwmaxConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file. Missing keys take their defaults.
pub fn load_from_path(path: &Path) -> Result<BwmaxConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: BwmaxConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
