use crate::rpc::RpcProbe;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Latency recorded when a probe never completed.
pub const NOT_MEASURED: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointType {
    #[serde(rename = "JSON-RPC")]
    JsonRpc,
    #[serde(rename = "API")]
    Api,
    #[serde(rename = "Static Website")]
    StaticWebsite,
    Unknown,
}

impl EndpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::JsonRpc => "JSON-RPC",
            EndpointType::Api => "API",
            EndpointType::StaticWebsite => "Static Website",
            EndpointType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe against one URL.
///
/// `is_healthy == false` with no `error` means the endpoint answered with a
/// non-200 status. A set `error` means the attempt never completed, in which
/// case `latency_ms` is [`NOT_MEASURED`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub latency_ms: f64,
    pub status: Option<u16>,
    pub endpoint_type: EndpointType,
    pub is_healthy: bool,
    pub is_slow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub(crate) fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            latency_ms: NOT_MEASURED,
            status: None,
            endpoint_type: EndpointType::Unknown,
            is_healthy: false,
            is_slow: false,
            error: Some(error.into()),
        }
    }

    pub fn is_measured(&self) -> bool {
        self.latency_ms >= 0.0
    }
}

pub const DEFAULT_RPC_SIGNATURES: &[&str] = &[
    "rpc.ankr",
    "/rpc",
    "endpoints.omni",
    "public.blast",
    "blockpi.network",
    "drpc.org",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    pub slow_threshold_ms: u64,
    /// Global in-flight cap; also the size of one scheduling wave.
    pub max_concurrent: u32,
    pub max_per_domain: u32,
    /// Optional requests-per-second quota applied per domain key.
    pub max_rate_per_domain: Option<u32>,
    /// URL substrings that mark a known RPC gateway.
    pub rpc_signatures: Vec<String>,
    pub rpc_probes: Vec<RpcProbe>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            slow_threshold_ms: 1000,
            max_concurrent: 50,
            max_per_domain: 10,
            max_rate_per_domain: None,
            rpc_signatures: DEFAULT_RPC_SIGNATURES.iter().map(|s| s.to_string()).collect(),
            rpc_probes: RpcProbe::defaults(),
        }
    }
}

impl ProbeConfig {
    pub(crate) fn is_slow(&self, latency_ms: f64) -> bool {
        latency_ms > self.slow_threshold_ms as f64
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
