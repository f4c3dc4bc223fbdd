use crate::types::ProbeResult;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Slow,
    Errored,
}

impl Status {
    /// Errored when the attempt never completed; Slow when it was slow or
    /// answered with a non-200 status; Healthy otherwise.
    pub fn of(result: &ProbeResult) -> Status {
        if result.error.is_some() {
            Status::Errored
        } else if !result.is_healthy || result.is_slow {
            Status::Slow
        } else {
            Status::Healthy
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub healthy: usize,
    pub slow: usize,
    pub errored: usize,
}

impl Summary {
    /// Share of `count` in the total, 0.0 for an empty run.
    pub fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub healthy: Vec<ProbeResult>,
    pub slow: Vec<ProbeResult>,
    pub errored: Vec<ProbeResult>,
}

impl Report {
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = ProbeResult>,
    {
        let mut results: Vec<ProbeResult> = results.into_iter().collect();
        results.sort_by(|a, b| {
            a.url
                .cmp(&b.url)
                .then_with(|| a.latency_ms.partial_cmp(&b.latency_ms).unwrap_or(Ordering::Equal))
        });

        let mut report = Report {
            summary: Summary {
                total: results.len(),
                ..Summary::default()
            },
            ..Report::default()
        };

        for result in results {
            match Status::of(&result) {
                Status::Healthy => report.healthy.push(result),
                Status::Slow => report.slow.push(result),
                Status::Errored => report.errored.push(result),
            }
        }

        report.summary.healthy = report.healthy.len();
        report.summary.slow = report.slow.len();
        report.summary.errored = report.errored.len();
        report
    }

    pub fn is_empty(&self) -> bool {
        self.summary.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EndpointType, NOT_MEASURED};

    fn result(url: &str, latency_ms: f64, status: Option<u16>, slow: bool, error: Option<&str>) -> ProbeResult {
        ProbeResult {
            url: url.to_string(),
            latency_ms,
            status,
            endpoint_type: EndpointType::Api,
            is_healthy: status == Some(200) && error.is_none(),
            is_slow: slow,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn classification_rules() {
        assert_eq!(Status::of(&result("a", 10.0, Some(200), false, None)), Status::Healthy);
        assert_eq!(Status::of(&result("a", 1500.0, Some(200), true, None)), Status::Slow);
        assert_eq!(Status::of(&result("a", 10.0, Some(503), false, None)), Status::Slow);
        assert_eq!(Status::of(&result("a", NOT_MEASURED, None, false, Some("Timeout"))), Status::Errored);
    }

    #[test]
    fn empty_run_has_zero_counts_and_percentages() {
        let report = Report::from_results(Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.summary, Summary::default());
        assert_eq!(report.summary.percent(report.summary.healthy), 0.0);
        assert_eq!(report.summary.percent(report.summary.errored), 0.0);
    }

    #[test]
    fn groups_are_sorted_and_counted() {
        let report = Report::from_results(vec![
            result("https://z.com", 20.0, Some(200), false, None),
            result("https://a.com", 30.0, Some(200), false, None),
            result("https://b.com", 2000.0, Some(200), true, None),
            result("https://c.com", 5.0, Some(404), false, None),
            result("https://d.com", NOT_MEASURED, None, false, Some("Timeout")),
        ]);

        assert_eq!(
            report.summary,
            Summary { total: 5, healthy: 2, slow: 2, errored: 1 }
        );
        let healthy: Vec<_> = report.healthy.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(healthy, ["https://a.com", "https://z.com"]);
        let slow: Vec<_> = report.slow.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(slow, ["https://b.com", "https://c.com"]);
        assert_eq!(report.summary.percent(report.summary.healthy), 40.0);
    }

    #[test]
    fn serializes_for_machine_output() {
        let report = Report::from_results(vec![result("https://a.com", 1.0, Some(200), false, None)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["total"], 1);
        assert_eq!(json["healthy"][0]["endpoint_type"], "API");
        assert!(json["healthy"][0].get("error").is_none());
    }
}
