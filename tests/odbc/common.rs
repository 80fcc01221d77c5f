use ddbc::OdbcStatementOptions;
use ddbc_core::mock::MockDriver;

/// A fresh driver with logging routed to the test harness.
pub fn setup() -> MockDriver {
    let _ = env_logger::builder().is_test(true).try_init();
    MockDriver::new()
}

/// Options parsed from a `key=value;` string.
#[allow(dead_code)]
pub fn options(spec: &str) -> anyhow::Result<OdbcStatementOptions> {
    Ok(spec.parse()?)
}
