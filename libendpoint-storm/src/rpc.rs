use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Solana,
    Sui,
}

/// One JSON-RPC health call: which chain it targets and what to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcProbe {
    pub chain: Chain,
    pub method: String,
    /// `None` omits the `params` member entirely, which some nodes require.
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

impl RpcProbe {
    pub fn new(chain: Chain, method: impl Into<String>, params: Option<Vec<Value>>) -> Self {
        Self {
            chain,
            method: method.into(),
            params,
        }
    }

    pub fn defaults() -> Vec<RpcProbe> {
        vec![
            RpcProbe::new(Chain::Ethereum, "eth_blockNumber", Some(Vec::new())),
            RpcProbe::new(Chain::Solana, "getHealth", None),
            RpcProbe::new(Chain::Sui, "sui_getProtocolConfig", Some(Vec::new())),
        ]
    }

    pub fn payload(&self) -> Value {
        let mut payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": self.method,
        });
        if let Some(params) = &self.params {
            payload["params"] = Value::Array(params.clone());
        }
        payload
    }
}

fn chain_preference(url: &str) -> [Chain; 3] {
    let lower = url.to_lowercase();
    if lower.contains("sol") {
        [Chain::Solana, Chain::Ethereum, Chain::Sui]
    } else if lower.contains("sui") {
        [Chain::Sui, Chain::Ethereum, Chain::Solana]
    } else {
        [Chain::Ethereum, Chain::Solana, Chain::Sui]
    }
}

/// Orders the configured probes for `url`: the chain the URL text hints at
/// goes first. Probes of the same chain keep their configured order.
pub fn order_for<'a>(probes: &'a [RpcProbe], url: &str) -> Vec<&'a RpcProbe> {
    let preference = chain_preference(url);
    let mut ordered: Vec<&RpcProbe> = probes.iter().collect();
    ordered.sort_by_key(|probe| {
        preference
            .iter()
            .position(|chain| *chain == probe.chain)
            .unwrap_or(preference.len())
    });
    ordered
}

fn health_url(url: &str) -> String {
    format!("{}/health", url.trim_end_matches('/'))
}

/// `GET {url}/health`; only an HTTP 200 counts.
pub async fn check_health_route(client: &Client, url: &str, timeout: Duration) -> bool {
    let target = health_url(url);
    match tokio::time::timeout(timeout, client.get(&target).send()).await {
        Ok(Ok(response)) => response.status() == StatusCode::OK,
        Ok(Err(e)) => {
            debug!(url = %target, error = %e, "health route request failed");
            false
        }
        Err(_) => {
            debug!(url = %target, "health route timed out");
            false
        }
    }
}

/// Posts each probe in turn and stops at the first HTTP 200.
///
/// Returns the elapsed time since `start` at acceptance, or `None` when no
/// payload was accepted.
pub async fn detect_rpc(
    client: &Client,
    url: &str,
    probes: &[RpcProbe],
    timeout: Duration,
    start: Instant,
) -> Option<Duration> {
    for probe in order_for(probes, url) {
        let request = client.post(url).json(&probe.payload()).send();

        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => {
                debug!(url, method = %probe.method, "rpc probe accepted");
                return Some(start.elapsed());
            }
            Ok(Ok(response)) => {
                debug!(url, method = %probe.method, status = response.status().as_u16(), "rpc probe rejected");
            }
            Ok(Err(e)) => {
                debug!(url, method = %probe.method, error = %e, "rpc probe failed");
            }
            Err(_) => {
                debug!(url, method = %probe.method, "rpc probe timed out");
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn methods(url: &str) -> Vec<String> {
        let probes = RpcProbe::defaults();
        order_for(&probes, url)
            .into_iter()
            .map(|p| p.method.clone())
            .collect()
    }

    #[test]
    fn ethereum_first_by_default() {
        assert_eq!(
            methods("https://rpc.ankr.com/eth"),
            ["eth_blockNumber", "getHealth", "sui_getProtocolConfig"]
        );
    }

    #[test]
    fn solana_hint_moves_get_health_first() {
        assert_eq!(
            methods("https://api.mainnet-beta.SOLANA.com"),
            ["getHealth", "eth_blockNumber", "sui_getProtocolConfig"]
        );
    }

    #[test]
    fn sui_hint_moves_protocol_config_first() {
        assert_eq!(
            methods("https://fullnode.mainnet.sui.io"),
            ["sui_getProtocolConfig", "eth_blockNumber", "getHealth"]
        );
    }

    #[test]
    fn same_chain_probes_keep_configured_order() {
        let mut probes = RpcProbe::defaults();
        probes.insert(0, RpcProbe::new(Chain::Sui, "sui_getChainIdentifier", None));
        let ordered: Vec<_> = order_for(&probes, "https://node.example.org")
            .into_iter()
            .map(|p| p.method.as_str())
            .collect();
        assert_eq!(
            ordered,
            ["eth_blockNumber", "getHealth", "sui_getChainIdentifier", "sui_getProtocolConfig"]
        );
    }

    #[test]
    fn payload_omits_params_when_absent() {
        let solana = RpcProbe::new(Chain::Solana, "getHealth", None).payload();
        assert!(solana.get("params").is_none());
        assert_eq!(solana["jsonrpc"], "2.0");

        let eth = RpcProbe::new(Chain::Ethereum, "eth_blockNumber", Some(vec![])).payload();
        assert_eq!(eth["params"], json!([]));
        assert_eq!(eth["id"], 1);
    }

    #[tokio::test]
    async fn health_route_requires_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = Client::new();
        let url = format!("{}/", server.uri());
        assert!(check_health_route(&client, &url, Duration::from_secs(2)).await);

        let other = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&other)
            .await;
        assert!(!check_health_route(&client, &other.uri(), Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn detect_rpc_falls_through_to_accepting_chain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_blockNumber"})))
            .respond_with(ResponseTemplate::new(405))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "getHealth"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "sui_getProtocolConfig"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = Client::new();
        let hit = detect_rpc(
            &client,
            &server.uri(),
            &RpcProbe::defaults(),
            Duration::from_secs(2),
            Instant::now(),
        )
        .await;
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn detect_rpc_gives_up_after_all_payloads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = Client::new();
        let hit = detect_rpc(
            &client,
            &server.uri(),
            &RpcProbe::defaults(),
            Duration::from_secs(2),
            Instant::now(),
        )
        .await;
        assert!(hit.is_none());
    }
}
