//! Prometheus metrics (SPEC_FULL item 9): fills, signals, rejects,
//! aggressive retries, and flatten/exit transitions, exposed over an
//! embedded `hyper` server on a runtime-configured address — the same
//! "cold path, runtime-configured" pattern the reference deployment uses
//! for its own Prometheus endpoint.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// The engine's Prometheus counters. One instance is shared (behind an
/// `Arc`) between every strategy and the dispatch loop.
pub struct MetricsCollector {
    registry: Registry,
    pub fills_total: IntCounterVec,
    pub signals_total: IntCounterVec,
    pub rejects_total: IntCounter,
    pub aggressive_retries_total: IntCounter,
    pub flatten_total: IntCounterVec,
    pub exit_total: IntCounterVec,
    enabled: bool,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        let registry = Registry::new();

        let fills_total = IntCounterVec::new(
            Opts::new("arb_fills_total", "Fills processed, by category (passive/aggressive)"),
            &["category"],
        )
        .expect("metric names are static and valid");
        let signals_total = IntCounterVec::new(
            Opts::new("arb_signals_total", "Trading signals produced, by category"),
            &["category"],
        )
        .expect("metric names are static and valid");
        let rejects_total = IntCounter::new("arb_rejects_total", "Order rejects observed")
            .expect("metric names are static and valid");
        let aggressive_retries_total = IntCounter::new(
            "arb_aggressive_retries_total",
            "Aggressive hedge-chase retries issued (§4.6.5)",
        )
        .expect("metric names are static and valid");
        let flatten_total = IntCounterVec::new(
            Opts::new("arb_flatten_total", "TriggerFlatten transitions, by reason"),
            &["reason"],
        )
        .expect("metric names are static and valid");
        let exit_total = IntCounterVec::new(
            Opts::new("arb_exit_total", "TriggerExit transitions, by reason"),
            &["reason"],
        )
        .expect("metric names are static and valid");

        if enabled {
            registry
                .register(Box::new(fills_total.clone()))
                .expect("metric registered exactly once");
            registry
                .register(Box::new(signals_total.clone()))
                .expect("metric registered exactly once");
            registry
                .register(Box::new(rejects_total.clone()))
                .expect("metric registered exactly once");
            registry
                .register(Box::new(aggressive_retries_total.clone()))
                .expect("metric registered exactly once");
            registry
                .register(Box::new(flatten_total.clone()))
                .expect("metric registered exactly once");
            registry
                .register(Box::new(exit_total.clone()))
                .expect("metric registered exactly once");
        }

        Self {
            registry,
            fills_total,
            signals_total,
            rejects_total,
            aggressive_retries_total,
            flatten_total,
            exit_total,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_fill(&self, aggressive: bool) {
        if !self.enabled {
            return;
        }
        let category = if aggressive { "aggressive" } else { "passive" };
        self.fills_total.with_label_values(&[category]).inc();
    }

    pub fn record_signal(&self, aggressive: bool) {
        if !self.enabled {
            return;
        }
        let category = if aggressive { "aggressive" } else { "passive" };
        self.signals_total.with_label_values(&[category]).inc();
    }

    pub fn record_reject(&self) {
        if self.enabled {
            self.rejects_total.inc();
        }
    }

    pub fn record_aggressive_retry(&self) {
        if self.enabled {
            self.aggressive_retries_total.inc();
        }
    }

    pub fn record_flatten(&self, reason: &str) {
        if self.enabled {
            self.flatten_total.with_label_values(&[reason]).inc();
        }
    }

    pub fn record_exit(&self, reason: &str) {
        if self.enabled {
            self.exit_total.with_label_values(&[reason]).inc();
        }
    }

    /// Render the current registry in the Prometheus text exposition
    /// format, as served by [`serve`] on `GET /metrics`.
    pub fn render(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buf)
            .expect("encoding a gathered registry cannot fail");
        String::from_utf8(buf).expect("Prometheus text encoding is always valid UTF-8")
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Serve `/metrics` on `addr` until the process exits. Callers spawn this
/// as its own `tokio::task`; the embedded server is otherwise independent
/// of the dispatch/timer loop.
pub async fn serve(collector: Arc<MetricsCollector>, addr: SocketAddr) -> std::io::Result<()> {
    if !collector.is_enabled() {
        info!(%addr, "metrics server disabled, not binding");
        return Ok(());
    }
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "metrics server listening on /metrics");

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "metrics server: accept failed");
                continue;
            }
        };
        let collector = collector.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let collector = collector.clone();
                async move { Ok::<_, std::convert::Infallible>(handle(&collector, req)) }
            });
            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                error!(%err, "metrics server: connection error");
            }
        });
    }
}

fn handle(
    collector: &MetricsCollector,
    req: Request<hyper::body::Incoming>,
) -> Response<Full<Bytes>> {
    if req.uri().path() == "/metrics" {
        Response::builder()
            .status(200)
            .header("content-type", "text/plain; version=0.0.4")
            .body(Full::new(Bytes::from(collector.render())))
            .expect("static response is well-formed")
    } else {
        Response::builder()
            .status(404)
            .body(Full::new(Bytes::from_static(b"not found")))
            .expect("static response is well-formed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_collector_does_not_register_or_count() {
        let c = MetricsCollector::new(false);
        c.record_fill(false);
        assert!(!c.render().contains("arb_fills_total"));
    }

    #[test]
    fn enabled_collector_renders_recorded_counters() {
        let c = MetricsCollector::new(true);
        c.record_fill(true);
        c.record_fill(false);
        c.record_signal(true);
        c.record_reject();
        c.record_aggressive_retry();
        c.record_flatten("stop_loss");
        c.record_exit("max_loss");

        let text = c.render();
        assert!(text.contains("arb_fills_total"));
        assert!(text.contains("category=\"aggressive\""));
        assert!(text.contains("arb_rejects_total 1"));
        assert!(text.contains("arb_aggressive_retries_total 1"));
        assert!(text.contains("arb_flatten_total"));
        assert!(text.contains("arb_exit_total"));
    }
}
