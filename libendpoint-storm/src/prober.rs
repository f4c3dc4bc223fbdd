use crate::{
    domain::domain_key,
    gate::DomainGate,
    http::{create_http_pool, HttpError},
    rpc::{check_health_route, detect_rpc},
    types::{EndpointType, ProbeConfig, ProbeResult},
};
use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

const RPC_URL_KEYWORDS: &[&str] = &["ethereum", "eth", "solana", "sui", "rpc"];

pub struct Prober {
    pub(crate) client: Client,
    pub(crate) gate: Arc<DomainGate>,
    pub(crate) config: Arc<ProbeConfig>,
}

impl Prober {
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(ProbeConfig::default())
    }

    pub fn with_config(config: ProbeConfig) -> Result<Self, HttpError> {
        let client = create_http_pool(config.timeout, config.max_per_domain as usize * 10)?;
        let gate = DomainGate::new(
            config.max_per_domain,
            config.max_concurrent,
            config.max_rate_per_domain,
        );
        Ok(Self {
            client,
            gate: Arc::new(gate),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn gate(&self) -> &DomainGate {
        &self.gate
    }

    /// Checks one URL under its domain's permit. Never fails: every error
    /// ends up in the returned [`ProbeResult`].
    pub async fn probe_one(&self, url: &str) -> ProbeResult {
        let domain = domain_key(url);
        let _permit = match self.gate.acquire(&domain).await {
            Ok(permit) => permit,
            Err(e) => return ProbeResult::failed(url, e.to_string()),
        };

        self.check(url).await
    }

    pub fn is_rpc_first(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.config
            .rpc_signatures
            .iter()
            .any(|signature| lower.contains(&signature.to_lowercase()))
    }

    async fn check(&self, url: &str) -> ProbeResult {
        let start = Instant::now();
        let rpc_first = self.is_rpc_first(url);

        if rpc_first {
            if let Some(result) = self.try_rpc(url, start).await {
                return result;
            }
        }

        let request = self.client.get(url).send();
        let response = match tokio::time::timeout(self.config.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return ProbeResult::failed(url, "Timeout"),
            Ok(Err(e)) => return ProbeResult::failed(url, e.to_string()),
            Err(_) => return ProbeResult::failed(url, "Timeout"),
        };
        let latency_ms = as_millis(start.elapsed());
        let status = response.status();

        if status == StatusCode::NOT_FOUND && !rpc_first {
            if let Some(result) = self.try_rpc(url, start).await {
                return result;
            }
        }

        let endpoint_type = detect_endpoint_type(url, response, self.config.timeout).await;

        ProbeResult {
            url: url.to_string(),
            latency_ms,
            status: Some(status.as_u16()),
            endpoint_type,
            is_healthy: status == StatusCode::OK,
            is_slow: self.config.is_slow(latency_ms),
            error: None,
        }
    }

    /// `/health` first, then the JSON-RPC payloads.
    async fn try_rpc(&self, url: &str, start: Instant) -> Option<ProbeResult> {
        let timeout = self.config.timeout;
        let accepted = if check_health_route(&self.client, url, timeout).await {
            Some(start.elapsed())
        } else {
            detect_rpc(&self.client, url, &self.config.rpc_probes, timeout, start).await
        };

        accepted.map(|elapsed| {
            let latency_ms = as_millis(elapsed);
            ProbeResult {
                url: url.to_string(),
                latency_ms,
                status: Some(StatusCode::OK.as_u16()),
                endpoint_type: EndpointType::JsonRpc,
                is_healthy: true,
                is_slow: self.config.is_slow(latency_ms),
                error: None,
            }
        })
    }
}

impl Clone for Prober {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            gate: Arc::clone(&self.gate),
            config: Arc::clone(&self.config),
        }
    }
}

fn as_millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

async fn detect_endpoint_type(url: &str, response: Response, timeout: Duration) -> EndpointType {
    let lower = url.to_lowercase();
    if RPC_URL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return EndpointType::JsonRpc;
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();

    if content_type.contains("application/json-rpc") {
        EndpointType::JsonRpc
    } else if content_type.contains("application/json") {
        match tokio::time::timeout(timeout, response.json::<Value>()).await {
            Ok(Ok(_)) => EndpointType::Api,
            _ => EndpointType::Unknown,
        }
    } else if content_type.contains("text/html") {
        EndpointType::StaticWebsite
    } else {
        EndpointType::Unknown
    }
}
