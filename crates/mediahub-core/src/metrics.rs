//! Domain metrics for the orchestrator.
//!
//! Recorded through the `metrics` facade; the control server installs the
//! Prometheus recorder and serves `/metrics`.

use metrics::{counter, gauge};

/// Launch attempts by resolved method and outcome.
pub const LAUNCH_TOTAL: &str = "mediahub_launch_total";

/// CEC adapter commands by command and outcome.
pub const CEC_COMMAND_TOTAL: &str = "mediahub_cec_command_total";

/// Published reachability state (1 = online).
pub const REACHABILITY_ONLINE: &str = "mediahub_reachability_online";

/// Presented processes that had to be force-killed after the grace period.
pub const FORCED_KILL_TOTAL: &str = "mediahub_forced_kill_total";

/// Records a launch attempt.
pub fn record_launch(method: &str, outcome: &str) {
    counter!(
        LAUNCH_TOTAL,
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Records a CEC command result.
pub fn record_cec_command(command: &str, outcome: &str) {
    counter!(
        CEC_COMMAND_TOTAL,
        "command" => command.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Publishes the current reachability state.
pub fn set_reachability(online: bool) {
    gauge!(REACHABILITY_ONLINE).set(if online { 1.0 } else { 0.0 });
}

/// Records a forced kill.
pub fn record_forced_kill() {
    counter!(FORCED_KILL_TOTAL).increment(1);
}
