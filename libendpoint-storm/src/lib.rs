mod domain;
mod extract;
mod gate;
mod http;
mod prober;
mod report;
pub mod rpc;
mod schedule;
mod types;

pub use domain::domain_key;
pub use extract::{extract_from_str, extract_from_value, retain_http};
pub use gate::{DomainGate, GateError, GatePermit};
pub use http::HttpError;
pub use prober::Prober;
pub use report::{Report, Status, Summary};
pub use rpc::{Chain, RpcProbe};
pub use schedule::{DomainQueues, Progress};
pub use types::{EndpointType, ProbeConfig, ProbeResult, DEFAULT_RPC_SIGNATURES, NOT_MEASURED};

pub async fn probe(url: &str) -> Result<ProbeResult, HttpError> {
    Ok(Prober::new()?.probe_one(url).await)
}

pub async fn probe_many<I>(urls: I) -> Result<Report, HttpError>
where
    I: IntoIterator<Item = String>,
{
    let prober = Prober::new()?;
    Ok(Report::from_results(prober.check_all(urls).await))
}
