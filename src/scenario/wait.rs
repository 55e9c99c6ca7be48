//! Bounded polling for conditions that live outside a `ScenarioState`
//!
//! Used where nothing notifies on change, e.g. repeatedly asking the app
//! through the backdoor whether a setting flipped.

use std::thread;
use std::time::Instant;

use crate::config::WaitSettings;
use crate::error::{Result, StagehandError};

/// Poll `condition` every `settings.poll_interval` until it returns true.
///
/// Fails with `Timeout` naming `expected` once `settings.timeout` has
/// passed. Errors returned by `condition` propagate immediately.
pub fn wait_for<F>(settings: &WaitSettings, expected: &str, mut condition: F) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();
    loop {
        if condition()? {
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= settings.timeout {
            log::warn!("timed out after {:?} waiting for {}", elapsed, expected);
            return Err(StagehandError::Timeout {
                expected: expected.to_string(),
                waited: elapsed,
            });
        }

        thread::sleep(settings.poll_interval.min(settings.timeout - elapsed));
    }
}
