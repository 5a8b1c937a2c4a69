//! Observability infrastructure for rsacl.
//!
//! This module provides:
//! - Structured logging configuration
//! - Registration of the ACL metric descriptions

mod logging;

pub use logging::{create_json_layer, init_logging, LoggingConfig};

/// Registers the descriptions of every metric rsacl records.
///
/// Call once during startup, after installing a metrics recorder.
pub fn register_metrics() {
    rsacl_domain::cache::register_acl_cache_metrics();
}
