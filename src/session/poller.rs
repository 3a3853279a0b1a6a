//! Bounded-retry polling of the device installer.
//!
//! The progress endpoint is unreliable while an upgrade runs (the device's
//! web server can restart mid-install), so individual query failures are
//! tolerated silently; only an unbroken run of failures gives up.

use std::time::Duration;

use crate::client::ReportKind;
use crate::error::UpdateError;

use super::{Severity, StatusNotice, StatusSink, UpdateApi, UpdatePhase};

/// Interval between progress queries
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive query failures tolerated before giving up
const MAX_CONSECUTIVE_FAILURES: u32 = 30;

/// Poll the installer until it reports a terminal status.
///
/// Successful responses reset the failure budget regardless of the status
/// they carry. Progress and message updates reach the sink only when the
/// report includes a progress value.
///
/// # Returns
/// `Ok(())` once the device reports `done`; [`UpdateError::ServerFailure`]
/// when it reports `failed`; [`UpdateError::PollTimeout`] after
/// [`MAX_CONSECUTIVE_FAILURES`] queries fail in a row.
pub(super) async fn poll_install_progress(
    api: &dyn UpdateApi,
    sink: &dyn StatusSink,
) -> Result<(), UpdateError> {
    let mut consecutive_failures = 0u32;

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let report = match api.install_progress().await {
            Ok(report) => {
                consecutive_failures = 0;
                report
            }
            Err(e) => {
                consecutive_failures += 1;
                tracing::debug!(
                    "Progress query failed ({}/{}): {}",
                    consecutive_failures,
                    MAX_CONSECUTIVE_FAILURES,
                    e
                );
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    tracing::warn!("Giving up on progress polling: no response from device");
                    return Err(UpdateError::PollTimeout);
                }
                continue;
            }
        };

        match report.kind() {
            ReportKind::InProgress => {
                if let Some(percent) = report.percent() {
                    sink.notify(StatusNotice {
                        phase: UpdatePhase::Polling,
                        progress: percent,
                        severity: Severity::Info,
                        message: report.message,
                    });
                }
            }
            ReportKind::Done => {
                tracing::info!("Device reports installation complete");
                return Ok(());
            }
            ReportKind::Failed => {
                let message = if report.message.is_empty() {
                    "the device reported an installation error".to_string()
                } else {
                    report.message
                };
                tracing::warn!("Device reports installation failure: {}", message);
                return Err(UpdateError::ServerFailure(message));
            }
        }
    }
}
