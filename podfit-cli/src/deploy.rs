//! Readiness polling after a pod is created.

use std::time::{Duration, Instant};

use podfit_core::ProvisionError;
use podfit_core::providers::{CloudProvider, PodStatus};

const INITIAL_DELAY: Duration = Duration::from_secs(5);
const MAX_DELAY: Duration = Duration::from_secs(30);
/// Consecutive status-query failures tolerated before giving up.
const MAX_POLL_ERRORS: u32 = 3;

/// Poll until the pod reports a reachable address or `timeout` elapses.
/// Returns the last observed status either way.
pub fn wait_for_ready(
    provider: &dyn CloudProvider,
    pod_id: &str,
    timeout: Duration,
) -> Result<PodStatus, ProvisionError> {
    poll_until_ready(provider, pod_id, timeout, INITIAL_DELAY)
}

fn poll_until_ready(
    provider: &dyn CloudProvider,
    pod_id: &str,
    timeout: Duration,
    initial_delay: Duration,
) -> Result<PodStatus, ProvisionError> {
    let started = Instant::now();
    let mut delay = initial_delay;
    let mut errors = 0;
    let mut last = PodStatus::Unknown;

    loop {
        match provider.pod_status(pod_id) {
            Ok(status) => {
                errors = 0;
                if status.is_running() {
                    return Ok(status);
                }
                tracing::debug!(pod_id, ?status, "pod not ready yet");
                last = status;
            }
            Err(e) => {
                errors += 1;
                tracing::warn!(pod_id, error = %e, attempt = errors, "status query failed");
                if errors >= MAX_POLL_ERRORS {
                    return Err(e);
                }
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Ok(last);
        }
        std::thread::sleep(delay.min(timeout - elapsed));
        delay = (delay * 2).min(MAX_DELAY);
    }
}
