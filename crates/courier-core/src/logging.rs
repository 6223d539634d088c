//! Logging facilities for Courier.
//!
//! Courier uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("courier_net=debug,courier_core=info")
//!         .init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Filtering by target replaces a global "logging on/off" switch: leave the
//! Courier targets out of the filter and nothing is emitted.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "courier_core";
    /// Worker pool target.
    pub const THREADPOOL: &str = "courier_core::threadpool";
    /// Request lifecycle target (start, cancel, outcome delivery).
    pub const HTTP: &str = "courier_net::http";
    /// Transport target (connect, accessor failures, wire parsing).
    pub const TRANSPORT: &str = "courier_net::transport";
}

/// Span names used throughout Courier for tracing.
pub mod span_names {
    /// A single request, from submission to outcome delivery.
    pub const REQUEST: &str = "courier::request";
    /// A worker thread's lifetime.
    pub const WORKER: &str = "courier::worker";
}

#[cfg(test)]
mod tests {
    use super::targets;

    #[test]
    fn test_targets_are_nested_under_crate_names() {
        assert!(targets::THREADPOOL.starts_with(targets::CORE));
        assert!(targets::HTTP.starts_with("courier_net"));
        assert!(targets::TRANSPORT.starts_with("courier_net"));
    }
}
