//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the queue components:
//! - Queue-number allocation and cap rejections
//! - Ticket status transitions and auto-advance outcomes
//! - Store operation latency (described here, recorded by the `PostgreSQL` store)
//!
//! Only the recorder is installed; render the scrape text with
//! [`MetricsServer::render`] and serve it from the host application.
//!
//! # Example
//!
//! ```rust,no_run
//! use queue_desk_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use queue_desk_core::TicketStatus;
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder.
///
/// Installs the global recorder only; no HTTP listener is started. The
/// scrape text is read through [`MetricsServer::render`], and the configured
/// address is informational.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Configured metrics address, logged and reported but not bound (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test), this logs a
    /// warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Configured metrics address. Nothing listens on it; use [`Self::render`].
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "queue_numbers_allocated_total",
        "Total number of queue numbers handed out"
    );
    describe_counter!(
        "queue_full_rejections_total",
        "Total number of allocations rejected by the daily cap"
    );
    describe_counter!(
        "ticket_transitions_total",
        "Total number of applied ticket status transitions"
    );
    describe_counter!(
        "ticket_auto_advance_total",
        "Auto-advance attempts after a ticket was marked done, by outcome"
    );
    describe_histogram!(
        "store_operation_duration_seconds",
        "Time taken by store operations"
    );
}

/// Allocator metrics recorder.
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record a successful allocation.
    pub fn record_allocated(branch: &str) {
        counter!("queue_numbers_allocated_total", "branch" => branch.to_string()).increment(1);
    }

    /// Record an allocation rejected by the daily cap.
    pub fn record_queue_full(branch: &str) {
        counter!("queue_full_rejections_total", "branch" => branch.to_string()).increment(1);
    }
}

/// State machine metrics recorder.
pub struct TicketMetrics;

impl TicketMetrics {
    /// Record an applied transition.
    pub fn record_transition(from: TicketStatus, to: TicketStatus) {
        counter!("ticket_transitions_total", "from" => from.as_str(), "to" => to.as_str())
            .increment(1);
    }

    /// Record an auto-advance outcome (`advanced`, `empty`, `busy`, `failed`).
    pub fn record_auto_advance(outcome: &'static str) {
        counter!("ticket_auto_advance_total", "outcome" => outcome).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert_eq!(server.addr(), addr);
    }

    #[test]
    fn test_metrics_server_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        QueueMetrics::record_allocated("MAIN");
        QueueMetrics::record_queue_full("MAIN");
        TicketMetrics::record_transition(TicketStatus::Waiting, TicketStatus::Serving);
        TicketMetrics::record_auto_advance("advanced");

        // The handle is None if another test installed the recorder first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("queue_numbers_allocated_total"));
            assert!(rendered.contains("queue_full_rejections_total"));
            assert!(rendered.contains("ticket_transitions_total"));
            assert!(rendered.contains("ticket_auto_advance_total"));
        }
    }
}
