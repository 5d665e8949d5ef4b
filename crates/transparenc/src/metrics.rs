// transparenc/crates/transparenc/src/metrics.rs
//! Process-local counters for the two upstream endpoints.

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static STREAM_CHUNKS: OnceLock<IntCounter> = OnceLock::new();
static ACTIVE_STREAMS: OnceLock<IntGauge> = OnceLock::new();
static STREAM_DURATION: OnceLock<Histogram> = OnceLock::new();

pub const ROUTE_DOC_RETRIEVAL: &str = "doc-retrieval";
pub const ROUTE_CLAUDE_STREAM: &str = "claude-stream";

pub fn init_metrics() -> anyhow::Result<()> {
    let req_counter = match REQ_COUNTER.get() {
        Some(counter) => counter.clone(),
        None => {
            let counter = IntCounterVec::new(
                prometheus::opts!("upstream_requests_total", "Upstream requests per route and outcome"),
                &["route", "status"],
            )?;
            REQ_COUNTER.get_or_init(|| counter).clone()
        }
    };

    let stream_chunks = match STREAM_CHUNKS.get() {
        Some(counter) => counter.clone(),
        None => {
            let counter = IntCounter::new("stream_chunks_total", "Decoded chunks appended to transcripts")?;
            STREAM_CHUNKS.get_or_init(|| counter).clone()
        }
    };

    let active_streams = match ACTIVE_STREAMS.get() {
        Some(gauge) => gauge.clone(),
        None => {
            let gauge = IntGauge::new("active_streams", "Streams currently being assembled")?;
            ACTIVE_STREAMS.get_or_init(|| gauge).clone()
        }
    };

    let stream_duration = match STREAM_DURATION.get() {
        Some(histogram) => histogram.clone(),
        None => {
            let histogram = Histogram::with_opts(prometheus::HistogramOpts::new(
                "stream_duration_seconds",
                "Wall time from request to end of stream",
            ))?;
            STREAM_DURATION.get_or_init(|| histogram).clone()
        }
    };

    // Re-registration after a second init is harmless.
    REGISTRY.register(Box::new(req_counter)).ok();
    REGISTRY.register(Box::new(stream_chunks)).ok();
    REGISTRY.register(Box::new(active_streams)).ok();
    REGISTRY.register(Box::new(stream_duration)).ok();
    Ok(())
}

pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}

pub fn inc_stream_chunks() {
    if let Some(counter) = STREAM_CHUNKS.get() {
        counter.inc();
    }
}

pub fn inc_streams() {
    if let Some(gauge) = ACTIVE_STREAMS.get() {
        gauge.inc();
    }
}

pub fn dec_streams() {
    if let Some(gauge) = ACTIVE_STREAMS.get() {
        gauge.dec();
    }
}

pub fn observe_stream_duration(seconds: f64) {
    if let Some(histogram) = STREAM_DURATION.get() {
        histogram.observe(seconds);
    }
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_exposition() {
        init_metrics().unwrap();
        inc_request(ROUTE_DOC_RETRIEVAL, "ok");
        inc_stream_chunks();

        let text = gather_text().unwrap();
        assert!(text.contains("upstream_requests_total"));
        assert!(text.contains("route=\"doc-retrieval\""));
        assert!(text.contains("stream_chunks_total"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_metrics().unwrap();
        init_metrics().unwrap();
        assert!(gather_text().is_ok());
    }
}
