//! Edge vs. origin comparison.

use super::service::MeasurementSampler;
use super::types::{speedup_ratio, ComparisonResult, Role};
use crate::infra::CounterStore;
use std::sync::Arc;

/// Samples the edge and origin paths concurrently and folds them into a
/// [`ComparisonResult`].
///
/// `origin_target` defaults to `target`. Both samples always resolve, since
/// samplers absorb failures. A usage-counter increment is spawned alongside
/// and never awaited.
pub async fn compare(
    sampler: &dyn MeasurementSampler,
    counter: Arc<dyn CounterStore>,
    target: Option<&str>,
    origin_target: Option<&str>,
) -> ComparisonResult {
    let origin_target = origin_target.or(target);

    let (edge, origin) = tokio::join!(
        sampler.measure(target, Role::Edge),
        sampler.measure(origin_target, Role::Origin),
    );

    let speedup = speedup_ratio(edge.total_time_ms, origin.total_time_ms);
    tracing::info!(
        edge_ms = edge.total_time_ms,
        origin_ms = origin.total_time_ms,
        speedup,
        edge_failed = edge.failed,
        origin_failed = origin.failed,
        "Comparison complete"
    );

    record_usage(counter);

    ComparisonResult {
        edge,
        origin,
        speedup,
        target_url: target.map(str::to_string),
        origin_url: origin_target.map(str::to_string),
    }
}

fn record_usage(counter: Arc<dyn CounterStore>) {
    tokio::spawn(async move {
        match counter.increment().await {
            Ok(value) => tracing::debug!(value, "Usage counter incremented"),
            Err(e) => tracing::warn!(error = %e, "Failed to update usage counter"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::counter::{CounterError, CounterFuture};
    use crate::infra::MemoryCounterStore;
    use crate::measure::service::SampleFuture;
    use crate::measure::types::{
        Estimate, LatencyBreakdown, Protocol, SourceKind, TimingSample,
    };
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tokio::sync::Notify;

    /// Returns fixed totals per role after an optional delay.
    struct FixedSampler {
        edge_ms: u64,
        origin_ms: u64,
        delay: Duration,
        seen: Mutex<Vec<(Option<String>, Role)>>,
    }

    impl FixedSampler {
        fn new(edge_ms: u64, origin_ms: u64) -> Self {
            Self {
                edge_ms,
                origin_ms,
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl MeasurementSampler for FixedSampler {
        fn measure<'a>(&'a self, target: Option<&'a str>, role: Role) -> SampleFuture<'a> {
            self.seen
                .lock()
                .unwrap()
                .push((target.map(str::to_string), role));
            let total = match role {
                Role::Edge => self.edge_ms,
                Role::Origin => self.origin_ms,
            };
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                let estimate = Estimate {
                    breakdown: LatencyBreakdown::placeholder(Protocol::Https),
                    is_estimated: true,
                };
                TimingSample::measured(role, SourceKind::Worker, Protocol::Https, total, estimate)
            })
        }
    }

    struct FailingSampler;

    impl MeasurementSampler for FailingSampler {
        fn measure<'a>(&'a self, _target: Option<&'a str>, role: Role) -> SampleFuture<'a> {
            Box::pin(async move { TimingSample::failed(role, SourceKind::Browser, Protocol::Https) })
        }
    }

    /// Counter that signals every increment attempt.
    struct SignallingCounter {
        notify: Notify,
        fail: bool,
    }

    impl CounterStore for SignallingCounter {
        fn get_value(&self) -> CounterFuture<'_> {
            Box::pin(async { Ok(0) })
        }

        fn increment(&self) -> CounterFuture<'_> {
            Box::pin(async move {
                self.notify.notify_one();
                if self.fail {
                    Err(CounterError::Io(std::io::Error::other("store offline")))
                } else {
                    Ok(1)
                }
            })
        }
    }

    #[tokio::test]
    async fn test_speedup_from_samples() {
        let sampler = FixedSampler::new(100, 1000);
        let result = compare(&sampler, Arc::new(MemoryCounterStore::new()), None, None).await;
        assert_eq!(result.edge.total_time_ms, 100);
        assert_eq!(result.origin.total_time_ms, 1000);
        assert_eq!(result.speedup, 10.0);
        assert!(result.target_url.is_none());
    }

    #[tokio::test]
    async fn test_origin_target_defaults_to_target() {
        let sampler = FixedSampler::new(50, 50);
        let result = compare(
            &sampler,
            Arc::new(MemoryCounterStore::new()),
            Some("https://example.com/"),
            None,
        )
        .await;

        assert_eq!(result.origin_url.as_deref(), Some("https://example.com/"));
        let seen = sampler.seen.lock().unwrap();
        assert!(seen.contains(&(Some("https://example.com/".to_string()), Role::Edge)));
        assert!(seen.contains(&(Some("https://example.com/".to_string()), Role::Origin)));
    }

    #[tokio::test]
    async fn test_both_failures_still_compare() {
        let result = compare(&FailingSampler, Arc::new(MemoryCounterStore::new()), None, None).await;
        assert!(result.edge.failed);
        assert!(result.origin.failed);
        assert_eq!(result.speedup, 1.0);
        assert!(result.speedup.is_finite());
    }

    #[tokio::test]
    async fn test_samples_run_concurrently() {
        let mut sampler = FixedSampler::new(10, 10);
        sampler.delay = Duration::from_millis(200);

        let start = Instant::now();
        compare(&sampler, Arc::new(MemoryCounterStore::new()), None, None).await;
        assert!(start.elapsed() < Duration::from_millis(390));
    }

    #[tokio::test]
    async fn test_counter_is_incremented() {
        let counter = Arc::new(SignallingCounter {
            notify: Notify::new(),
            fail: false,
        });
        compare(&FixedSampler::new(10, 20), counter.clone(), None, None).await;

        tokio::time::timeout(Duration::from_secs(1), counter.notify.notified())
            .await
            .expect("increment was never attempted");
    }

    #[tokio::test]
    async fn test_counter_failure_is_ignored() {
        let counter = Arc::new(SignallingCounter {
            notify: Notify::new(),
            fail: true,
        });
        let result = compare(&FixedSampler::new(100, 300), counter.clone(), None, None).await;
        assert_eq!(result.speedup, 3.0);

        tokio::time::timeout(Duration::from_secs(1), counter.notify.notified())
            .await
            .expect("increment was never attempted");
    }
}
