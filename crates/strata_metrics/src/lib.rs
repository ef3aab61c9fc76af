//! Strata Metrics - named counters for storage instrumentation
//!
//! Provides zero-cost counters that completely vanish in production
//! builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use strata_metrics::Counter;
//!
//! let mut counters = Counter::new();
//! counters.increment("chunks_created", 1);
//! println!("chunks: {}", counters.get("chunks_created"));
//! ```
//!
//! Without the `metrics` feature, `Counter` is a unit struct whose
//! methods do nothing and report zero.

#[cfg(feature = "metrics")]
mod counter;

#[cfg(feature = "metrics")]
pub use counter::Counter;

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Execute code only when metrics are enabled.
///
/// The `cfg` is evaluated in the calling crate, so callers must declare
/// their own `metrics` feature (usually forwarding to this crate's).
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default, Clone)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &str, _value: usize) {}
    pub fn set(&mut self, _name: &str, _value: usize) {}
    pub fn get(&self, _name: &str) -> usize { 0 }
    pub fn reset(&mut self, _name: &str) {}
    pub fn reset_all(&mut self) {}
    pub fn snapshot(&self) -> Vec<(String, usize)> { Vec::new() }
}
