//! Process-wide logging setup shared by the binaries.

/// Install the JSON log subscriber.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init() {
    tracing::init();
}

/// Log the effective filter once the subscriber is live.
pub fn announce(service: &str) {
    ::tracing::info!(service, filter = %tracing::filter_directive(), "logging initialised");
}

pub mod tracing;
