//! End-to-end scenario tests.
//!
//! The scenarios run the whole harness (fake DLP server, scenario runner,
//! probes, capture and stats verification) against an in-process stand-in
//! proxy, so they need neither Docker nor a proxy binary.
//!
//! ```bash
//! cargo test --package integration-tests
//! ```

pub mod proxy;

#[cfg(test)]
mod harness_tests;
#[cfg(test)]
mod scenario_tests;

/// Initialize tracing for tests.
#[cfg(test)]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}
