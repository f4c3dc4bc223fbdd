//! Wave scheduling: interleave domains so one wave touches as many
//! different operators as possible.

use crate::{domain::domain_key, prober::Prober, types::ProbeResult};
use futures::{
    future::join_all,
    stream::{self, Stream, StreamExt},
};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{info, warn};

/// Per-domain FIFO queues, domains kept in first-seen order.
#[derive(Debug, Default)]
pub struct DomainQueues {
    queues: Vec<(String, VecDeque<String>)>,
    remaining: usize,
}

impl DomainQueues {
    pub fn new<I>(urls: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queues: Vec<(String, VecDeque<String>)> = Vec::new();

        for url in urls {
            if !seen.insert(url.clone()) {
                continue;
            }
            let domain = domain_key(&url);
            let slot = *index.entry(domain.clone()).or_insert_with(|| {
                queues.push((domain, VecDeque::new()));
                queues.len() - 1
            });
            queues[slot].1.push_back(url);
        }

        let remaining = queues.iter().map(|(_, q)| q.len()).sum();
        Self { queues, remaining }
    }

    pub fn len(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    pub fn domain_count(&self) -> usize {
        self.queues.len()
    }

    /// Pops one URL from each non-empty queue in domain order until `cap`
    /// URLs are taken. Domains past the cap wait for a later wave.
    pub fn next_wave(&mut self, cap: usize) -> Vec<String> {
        let cap = cap.max(1);
        let mut wave = Vec::with_capacity(cap.min(self.queues.len()));

        for (_, queue) in self.queues.iter_mut() {
            if let Some(url) = queue.pop_front() {
                wave.push(url);
                if wave.len() >= cap {
                    break;
                }
            }
        }

        self.remaining -= wave.len();
        wave
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub wave: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}

impl Prober {
    fn wave_size(&self) -> usize {
        self.config.max_concurrent.max(1) as usize
    }

    /// Probes one wave concurrently and waits for every member.
    pub async fn probe_wave(&self, wave: &[String]) -> Vec<ProbeResult> {
        join_all(wave.iter().map(|url| self.probe_one(url))).await
    }

    /// Runs every URL through domain-interleaved waves. `on_progress` is
    /// called after each wave with that wave's results.
    pub async fn run<I, F>(&self, urls: I, mut on_progress: F) -> Vec<ProbeResult>
    where
        I: IntoIterator<Item = String>,
        F: FnMut(Progress, &[ProbeResult]),
    {
        let mut queues = DomainQueues::new(urls);
        let total = queues.len();

        if total == 0 {
            warn!("No endpoints to check");
            return Vec::new();
        }

        info!(total, domains = queues.domain_count(), "Checking endpoints");

        let cap = self.wave_size();
        let mut results = Vec::with_capacity(total);
        let mut wave_no = 0;

        loop {
            let wave = queues.next_wave(cap);
            if wave.is_empty() {
                break;
            }
            wave_no += 1;

            let wave_results = self.probe_wave(&wave).await;
            for result in &wave_results {
                log_result(result);
            }

            let progress = Progress {
                processed: results.len() + wave_results.len(),
                total,
                wave: wave_no,
            };
            info!(
                "Progress: {}/{} ({:.1}%)",
                progress.processed,
                progress.total,
                progress.percent()
            );
            on_progress(progress, &wave_results);
            results.extend(wave_results);
        }

        results
    }

    pub async fn check_all<I>(&self, urls: I) -> Vec<ProbeResult>
    where
        I: IntoIterator<Item = String>,
    {
        self.run(urls, |_, _| {}).await
    }

    /// Streams results as they complete. Waves are still strictly
    /// sequential; only ordering within a wave is by completion.
    pub fn probe_stream<I>(&self, urls: I) -> impl Stream<Item = ProbeResult> + '_
    where
        I: IntoIterator<Item = String> + 'static,
    {
        let queues = DomainQueues::new(urls);
        let cap = self.wave_size();

        stream::unfold(queues, move |mut queues| async move {
            let wave = queues.next_wave(cap);
            if wave.is_empty() {
                return None;
            }
            let width = wave.len();
            let results = stream::iter(wave)
                .map(move |url| async move { self.probe_one(&url).await })
                .buffer_unordered(width);
            Some((results, queues))
        })
        .flatten()
    }
}

fn log_result(result: &ProbeResult) {
    match &result.error {
        Some(error) => warn!(url = %result.url, error = %error, "Endpoint check failed"),
        None => info!(
            url = %result.url,
            latency_ms = result.latency_ms,
            status = ?result.status,
            endpoint_type = %result.endpoint_type,
            "Endpoint checked"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeConfig;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn waves_interleave_domains() {
        let mut queues = DomainQueues::new(urls(&[
            "https://rpc.ankr.com/eth",
            "https://rpc.ankr.com/bsc",
            "https://api.ankr.com/x",
            "https://eth.llamarpc.com",
            "https://solana.drpc.org",
        ]));
        assert_eq!(queues.domain_count(), 3);
        assert_eq!(queues.len(), 5);

        assert_eq!(
            queues.next_wave(50),
            urls(&["https://rpc.ankr.com/eth", "https://eth.llamarpc.com", "https://solana.drpc.org"])
        );
        assert_eq!(queues.next_wave(50), urls(&["https://rpc.ankr.com/bsc"]));
        assert_eq!(queues.next_wave(50), urls(&["https://api.ankr.com/x"]));
        assert!(queues.next_wave(50).is_empty());
        assert!(queues.is_empty());
    }

    #[test]
    fn wave_stops_at_cap_and_later_domains_wait() {
        let mut queues = DomainQueues::new(urls(&[
            "https://a.com/1",
            "https://a.com/2",
            "https://b.com/1",
            "https://c.com/1",
        ]));

        assert_eq!(queues.next_wave(2), urls(&["https://a.com/1", "https://b.com/1"]));
        assert_eq!(queues.next_wave(2), urls(&["https://a.com/2", "https://c.com/1"]));
        assert!(queues.next_wave(2).is_empty());
    }

    #[test]
    fn every_url_scheduled_exactly_once() {
        let input: Vec<String> = (0..230)
            .map(|i| format!("https://n{}.d{}.io/{}", i, i % 7, i))
            .chain(std::iter::once("https://n0.d0.io/0".to_string()))
            .collect();
        let mut queues = DomainQueues::new(input);
        assert_eq!(queues.len(), 230);

        let mut seen = HashSet::new();
        loop {
            let wave = queues.next_wave(50);
            if wave.is_empty() {
                break;
            }
            assert!(wave.len() <= 50);
            let domains: HashSet<_> = wave.iter().map(|u| domain_key(u)).collect();
            assert_eq!(domains.len(), wave.len(), "one URL per domain per wave");
            for url in wave {
                assert!(seen.insert(url));
            }
        }
        assert_eq!(seen.len(), 230);
    }

    #[test]
    fn progress_percent_handles_empty_total() {
        let empty = Progress { processed: 0, total: 0, wave: 0 };
        assert_eq!(empty.percent(), 0.0);
        let half = Progress { processed: 5, total: 10, wave: 1 };
        assert_eq!(half.percent(), 50.0);
    }

    #[tokio::test]
    async fn run_reports_progress_per_wave() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = Prober::with_config(ProbeConfig {
            timeout: Duration::from_secs(3),
            ..ProbeConfig::default()
        })
        .unwrap();

        // All on one domain key, so each wave holds a single URL.
        let input: Vec<String> = (0..3).map(|i| format!("{}/page{}", server.uri(), i)).collect();
        let mut seen = Vec::new();
        let results = prober
            .run(input, |progress, wave| {
                assert_eq!(wave.len(), 1);
                seen.push(progress);
            })
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_healthy));
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().map(|p| (p.processed, p.total, p.wave)), Some((3, 3, 3)));
    }

    #[tokio::test]
    async fn run_with_no_urls_returns_empty() {
        let prober = Prober::new().unwrap();
        let results = prober.check_all(Vec::<String>::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn stream_yields_one_result_per_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = Prober::new().unwrap();
        let input: Vec<String> = (0..4).map(|i| format!("{}/p{}", server.uri(), i)).collect();
        let mut results: Vec<String> = prober.probe_stream(input.clone()).map(|r| r.url).collect().await;
        results.sort();
        assert_eq!(results, input);
    }
}
