use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;

/// Self-metrics of the daemon: stream sessions and sent events.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at: Instant,
    pub sysfeed_sessions_active: Gauge,
    pub sysfeed_sessions_started_total: Counter,
    pub sysfeed_sessions_ended_total: CounterVec,
    pub sysfeed_events_sent_total: Counter,
    pub sysfeed_scrape_count_total: Counter,
    pub sysfeed_uptime_seconds: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let sysfeed_sessions_active = Gauge::with_opts(opts!(
            "sysfeed_sessions_active",
            "Number of clients currently attached to /sys-info"
        ))?;
        let sysfeed_sessions_started_total = Counter::with_opts(opts!(
            "sysfeed_sessions_started_total",
            "Stream sessions started"
        ))?;
        let sysfeed_sessions_ended_total = CounterVec::new(
            opts!(
                "sysfeed_sessions_ended_total",
                "Stream sessions ended by outcome"
            ),
            &["outcome"],
        )?;
        let sysfeed_events_sent_total = Counter::with_opts(opts!(
            "sysfeed_events_sent_total",
            "sysInfo events written to clients"
        ))?;
        let sysfeed_scrape_count_total = Counter::with_opts(opts!(
            "sysfeed_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;
        let sysfeed_uptime_seconds = Gauge::with_opts(opts!(
            "sysfeed_uptime_seconds",
            "Seconds since the daemon started"
        ))?;

        register(&registry, &sysfeed_sessions_active)?;
        register(&registry, &sysfeed_sessions_started_total)?;
        register(&registry, &sysfeed_sessions_ended_total)?;
        register(&registry, &sysfeed_events_sent_total)?;
        register(&registry, &sysfeed_scrape_count_total)?;
        register(&registry, &sysfeed_uptime_seconds)?;

        Ok(Arc::new(Self {
            registry,
            started_at: Instant::now(),
            sysfeed_sessions_active,
            sysfeed_sessions_started_total,
            sysfeed_sessions_ended_total,
            sysfeed_events_sent_total,
            sysfeed_scrape_count_total,
            sysfeed_uptime_seconds,
        }))
    }

    pub fn session_started(&self) {
        self.sysfeed_sessions_started_total.inc();
        self.sysfeed_sessions_active.inc();
    }

    pub fn session_ended(&self, outcome: &str) {
        self.sysfeed_sessions_active.dec();
        self.sysfeed_sessions_ended_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn inc_events_sent(&self) {
        self.sysfeed_events_sent_total.inc();
    }

    pub fn inc_scrape_count(&self) {
        self.sysfeed_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.sysfeed_uptime_seconds
            .set(self.started_at.elapsed().as_secs_f64());

        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_lifecycle_is_counted() {
        let metrics = Metrics::new().expect("инициализация метрик");
        metrics.session_started();
        metrics.session_started();
        metrics.session_ended("disconnected");
        metrics.inc_events_sent();

        assert_eq!(metrics.sysfeed_sessions_active.get(), 1.0);
        assert_eq!(metrics.sysfeed_sessions_started_total.get(), 2.0);
        assert_eq!(
            metrics
                .sysfeed_sessions_ended_total
                .with_label_values(&["disconnected"])
                .get(),
            1.0
        );

        let text = String::from_utf8(metrics.encode_metrics().unwrap()).unwrap();
        assert!(text.contains("sysfeed_events_sent_total 1"));
        assert!(text.contains("sysfeed_uptime_seconds"));
    }
}
