//! Update session state machine.
//!
//! This module handles:
//! - Sequencing a device update: transfer, installer hand-off, progress polling
//! - Typed status notifications for the presentation layer
//! - The cancellation protocol (local abort gated on device confirmation)

mod poller;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::client::{CancelAck, InstallReport};
use crate::error::UpdateError;

/// Pause between a completed upload and the first progress poll, giving the
/// device time to launch its installer.
const INSTALL_HANDOFF_DELAY: Duration = Duration::from_secs(1);

/// Current phase of an update session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Idle,
    Transferring,
    AwaitingInstall,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
}

impl UpdatePhase {
    /// Get a human-readable description of the current phase
    pub fn description(&self) -> &'static str {
        match self {
            UpdatePhase::Idle => "Ready",
            UpdatePhase::Transferring => "Transferring update package...",
            UpdatePhase::AwaitingInstall => "Waiting for installer...",
            UpdatePhase::Polling => "Installing update...",
            UpdatePhase::Succeeded => "Update complete!",
            UpdatePhase::Failed => "Update failed",
            UpdatePhase::Cancelled => "Update cancelled",
        }
    }

    /// Whether the session has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdatePhase::Succeeded | UpdatePhase::Failed | UpdatePhase::Cancelled
        )
    }
}

/// Severity of a status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Info,
    Success,
    Error,
}

/// One status notification from the session
#[derive(Debug, Clone, Default)]
pub struct StatusNotice {
    pub phase: UpdatePhase,
    pub progress: u8,
    pub severity: Severity,
    pub message: String,
}

impl StatusNotice {
    /// Whether the presentation layer should show the progress bar and the
    /// cancel affordance for this notification.
    ///
    /// Visibility is a function of the phase. Earlier clients inferred it by
    /// matching the message text against transfer wording; the phase field
    /// replaces that.
    pub fn shows_progress(&self) -> bool {
        matches!(
            self.phase,
            UpdatePhase::Transferring | UpdatePhase::AwaitingInstall | UpdatePhase::Polling
        )
    }
}

/// Receiver of session status notifications
pub trait StatusSink: Send + Sync {
    fn notify(&self, notice: StatusNotice);
}

/// A watch channel is the natural sink for live rendering: the receiving
/// side always sees the latest notification.
impl StatusSink for watch::Sender<StatusNotice> {
    fn notify(&self, notice: StatusNotice) {
        let _ = self.send(notice);
    }
}

/// Callback invoked with transfer progress as an integer percent
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// What to transfer to the device
#[derive(Debug, Clone)]
pub enum TransferRequest {
    /// Upload a local update package
    LocalArtifact(PathBuf),
    /// Have the device download the package itself
    RemoteUrl(String),
}

impl TransferRequest {
    fn validate(&self) -> Result<(), UpdateError> {
        match self {
            TransferRequest::LocalArtifact(path) if path.as_os_str().is_empty() => Err(
                UpdateError::Validation("no update package selected".to_string()),
            ),
            TransferRequest::RemoteUrl(url) if url.trim().is_empty() => Err(
                UpdateError::Validation("no package URL provided".to_string()),
            ),
            _ => Ok(()),
        }
    }

    fn start_message(&self) -> &'static str {
        match self {
            TransferRequest::LocalArtifact(_) => "Uploading update package",
            TransferRequest::RemoteUrl(_) => "Requesting remote package download",
        }
    }
}

/// Abort signal for one in-flight transfer.
///
/// A fresh handle is created per transfer and discarded when the transfer
/// ends; firing a stale handle is a no-op.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    signal: watch::Sender<bool>,
}

impl AbortHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (signal, rx) = watch::channel(false);
        (Self { signal }, rx)
    }

    pub fn abort(&self) {
        let _ = self.signal.send(true);
    }
}

/// Wire operations the session needs from the device
#[async_trait]
pub trait UpdateApi: Send + Sync {
    /// Stream a local package to the device. `progress` receives integer
    /// percents; the call fails with [`UpdateError::Cancelled`] if `abort`
    /// fires before the device acknowledges the upload.
    async fn push_artifact(
        &self,
        artifact: &Path,
        progress: ProgressCallback,
        abort: watch::Receiver<bool>,
    ) -> Result<(), UpdateError>;

    /// Ask the device to download the package from a URL.
    async fn request_url_fetch(&self, url: &str) -> Result<(), UpdateError>;

    /// Query the installer's current progress report.
    async fn install_progress(&self) -> Result<InstallReport, UpdateError>;

    /// Ask the device to cancel the running upgrade.
    async fn cancel_install(&self) -> Result<CancelAck, UpdateError>;
}

/// The update session state machine.
///
/// Owns the phase sequence and the shared abort slot, drives the transfer
/// and polling stages, and reports every transition to the sink. One
/// session runs at a time; `run` resets all state, so the value can be
/// reused for a later update.
pub struct UpdateSession {
    api: Arc<dyn UpdateApi>,
    sink: Arc<dyn StatusSink>,
    phase: UpdatePhase,
    progress: u8,
    last_message: String,
    /// Abort handle for the active transfer. `Some` only while a local
    /// upload is in flight; shared with [`SessionCanceller`].
    transfer_abort: Arc<Mutex<Option<AbortHandle>>>,
}

impl UpdateSession {
    pub fn new(api: Arc<dyn UpdateApi>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            api,
            sink,
            phase: UpdatePhase::Idle,
            progress: 0,
            last_message: String::new(),
            transfer_abort: Arc::new(Mutex::new(None)),
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// Handle for cancelling this session's transfer from another task
    pub fn canceller(&self) -> SessionCanceller {
        SessionCanceller {
            api: Arc::clone(&self.api),
            sink: Arc::clone(&self.sink),
            transfer_abort: Arc::clone(&self.transfer_abort),
        }
    }

    /// Run one full update: transfer the package, hand off to the installer,
    /// poll to a terminal state.
    ///
    /// Every phase transition emits one notification. The abort slot is
    /// cleared on every exit path, success included.
    pub async fn run(&mut self, request: TransferRequest) -> Result<(), UpdateError> {
        if let Err(e) = request.validate() {
            self.report(Severity::Error, 0, e.to_string());
            return Err(e);
        }

        match &request {
            TransferRequest::LocalArtifact(path) => {
                tracing::info!("Starting update from local package: {}", path.display());
            }
            TransferRequest::RemoteUrl(url) => {
                tracing::info!("Starting update from remote URL: {}", url);
            }
        }

        self.reset();

        let outcome = self.drive(&request).await;

        // Cleanup runs no matter how the session ended.
        *self.transfer_abort.lock() = None;
        match &outcome {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                self.set_phase(UpdatePhase::Cancelled);
                self.report(Severity::Info, 0, "Update cancelled".to_string());
            }
            Err(e) => {
                self.set_phase(UpdatePhase::Failed);
                self.report(Severity::Error, 0, format!("Update failed: {}", e));
            }
        }
        outcome
    }

    async fn drive(&mut self, request: &TransferRequest) -> Result<(), UpdateError> {
        self.set_phase(UpdatePhase::Transferring);
        self.report(Severity::Info, 0, request.start_message().to_string());

        self.transfer(request).await?;

        // An upload hands the package to the installer; give it a moment to
        // start before the first poll. The URL mode installs as it fetches,
        // so polling begins immediately.
        if matches!(request, TransferRequest::LocalArtifact(_)) {
            self.set_phase(UpdatePhase::AwaitingInstall);
            self.report(
                Severity::Success,
                100,
                "Upload complete, starting installation".to_string(),
            );
            tokio::time::sleep(INSTALL_HANDOFF_DELAY).await;
        }

        self.set_phase(UpdatePhase::Polling);
        self.report(
            Severity::Info,
            0,
            UpdatePhase::Polling.description().to_string(),
        );

        poller::poll_install_progress(self.api.as_ref(), self.sink.as_ref()).await?;

        self.set_phase(UpdatePhase::Succeeded);
        self.report(
            Severity::Success,
            100,
            UpdatePhase::Succeeded.description().to_string(),
        );
        Ok(())
    }

    async fn transfer(&mut self, request: &TransferRequest) -> Result<(), UpdateError> {
        match request {
            TransferRequest::LocalArtifact(path) => {
                let (handle, abort_rx) = AbortHandle::new();
                *self.transfer_abort.lock() = Some(handle);

                let sink = Arc::clone(&self.sink);
                let on_progress: ProgressCallback = Arc::new(move |percent| {
                    sink.notify(StatusNotice {
                        phase: UpdatePhase::Transferring,
                        progress: percent,
                        severity: Severity::Info,
                        message: "Uploading update package".to_string(),
                    });
                });

                let result = self.api.push_artifact(path, on_progress, abort_rx).await;

                // The handle must not outlive the transfer it belongs to.
                *self.transfer_abort.lock() = None;
                result
            }
            TransferRequest::RemoteUrl(url) => self.api.request_url_fetch(url).await,
        }
    }

    /// Clear all carry-over from a prior run
    fn reset(&mut self) {
        self.phase = UpdatePhase::Idle;
        self.progress = 0;
        self.last_message.clear();
        *self.transfer_abort.lock() = None;
    }

    fn set_phase(&mut self, phase: UpdatePhase) {
        tracing::debug!("Session phase: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn report(&mut self, severity: Severity, progress: u8, message: String) {
        self.progress = progress;
        self.last_message = message.clone();
        self.sink.notify(StatusNotice {
            phase: self.phase,
            progress,
            severity,
            message,
        });
    }
}

/// Cancels a running transfer from outside the session task.
///
/// The local abort is gated on the device confirming the cancel request. By
/// the time confirmation arrives the transfer may already have finished; the
/// abort is then a no-op against an empty slot.
#[derive(Clone)]
pub struct SessionCanceller {
    api: Arc<dyn UpdateApi>,
    sink: Arc<dyn StatusSink>,
    transfer_abort: Arc<Mutex<Option<AbortHandle>>>,
}

impl SessionCanceller {
    /// Ask the device to cancel the upgrade, aborting the local transfer if
    /// the device confirms. Returns whether it did.
    ///
    /// A confirmed cancel is reported at info severity with progress 0. A
    /// failed request is reported without touching the session; a 2xx
    /// response without the confirmation marker is ignored.
    pub async fn cancel(&self) -> Result<bool, UpdateError> {
        match self.api.cancel_install().await {
            Ok(ack) if ack.confirmed() => {
                tracing::info!("Device confirmed cancellation");
                self.sink.notify(StatusNotice {
                    phase: UpdatePhase::Cancelled,
                    progress: 0,
                    severity: Severity::Info,
                    message: "Update cancelled".to_string(),
                });
                if let Some(handle) = self.transfer_abort.lock().as_ref() {
                    handle.abort();
                }
                Ok(true)
            }
            Ok(ack) => {
                tracing::warn!("Device did not confirm cancellation: {}", ack.status);
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Cancel request failed: {}", e);
                self.sink.notify(StatusNotice {
                    phase: UpdatePhase::Transferring,
                    progress: 0,
                    severity: Severity::Error,
                    message: format!("Cancel request failed: {}", e),
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sink that records every notification for later assertions
    #[derive(Default)]
    struct RecordingSink {
        notices: Mutex<Vec<StatusNotice>>,
    }

    impl RecordingSink {
        fn notices(&self) -> Vec<StatusNotice> {
            self.notices.lock().clone()
        }

        fn phases(&self) -> Vec<UpdatePhase> {
            self.notices.lock().iter().map(|n| n.phase).collect()
        }
    }

    impl StatusSink for RecordingSink {
        fn notify(&self, notice: StatusNotice) {
            self.notices.lock().push(notice);
        }
    }

    /// How the fake device handles the transfer stage
    enum TransferScript {
        /// Emit these percents, then succeed
        Emit(Vec<u8>),
        /// Fail without emitting anything
        Fail(&'static str),
        /// Park until the abort signal fires, then report cancellation
        BlockUntilAbort,
    }

    struct FakeApi {
        transfer: TransferScript,
        reports: Mutex<VecDeque<Result<InstallReport, UpdateError>>>,
        cancel_acks: Mutex<VecDeque<Result<CancelAck, UpdateError>>>,
        polls: AtomicUsize,
    }

    impl FakeApi {
        fn new(transfer: TransferScript) -> Self {
            Self {
                transfer,
                reports: Mutex::new(VecDeque::new()),
                cancel_acks: Mutex::new(VecDeque::new()),
                polls: AtomicUsize::new(0),
            }
        }

        fn with_reports(self, reports: Vec<Result<InstallReport, UpdateError>>) -> Self {
            *self.reports.lock() = reports.into();
            self
        }

        fn with_cancel_acks(self, acks: Vec<Result<CancelAck, UpdateError>>) -> Self {
            *self.cancel_acks.lock() = acks.into();
            self
        }
    }

    #[async_trait]
    impl UpdateApi for FakeApi {
        async fn push_artifact(
            &self,
            _artifact: &Path,
            progress: ProgressCallback,
            mut abort: watch::Receiver<bool>,
        ) -> Result<(), UpdateError> {
            match &self.transfer {
                TransferScript::Emit(percents) => {
                    for p in percents {
                        progress(*p);
                    }
                    Ok(())
                }
                TransferScript::Fail(msg) => Err(UpdateError::Protocol((*msg).to_string())),
                TransferScript::BlockUntilAbort => {
                    let _ = abort.wait_for(|aborted| *aborted).await;
                    Err(UpdateError::Cancelled)
                }
            }
        }

        async fn request_url_fetch(&self, _url: &str) -> Result<(), UpdateError> {
            match &self.transfer {
                TransferScript::Fail(msg) => Err(UpdateError::Protocol((*msg).to_string())),
                _ => Ok(()),
            }
        }

        async fn install_progress(&self) -> Result<InstallReport, UpdateError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.reports
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(UpdateError::Protocol("no scripted report".to_string())))
        }

        async fn cancel_install(&self) -> Result<CancelAck, UpdateError> {
            self.cancel_acks.lock().pop_front().unwrap_or_else(|| {
                Ok(CancelAck {
                    status: "cancelled".to_string(),
                })
            })
        }
    }

    fn session_with(api: &Arc<FakeApi>) -> (UpdateSession, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let session = UpdateSession::new(api.clone(), sink.clone());
        (session, sink)
    }

    fn in_progress(percent: f64) -> Result<InstallReport, UpdateError> {
        Ok(InstallReport {
            status: "in_progress".to_string(),
            progress: Some(percent),
            ..Default::default()
        })
    }

    fn done() -> Result<InstallReport, UpdateError> {
        Ok(InstallReport {
            status: "done".to_string(),
            progress: Some(100.0),
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_runs_full_phase_chain() {
        let api = Arc::new(
            FakeApi::new(TransferScript::Emit(vec![0, 50, 100]))
                .with_reports(vec![in_progress(40.0), done()]),
        );
        let (mut session, sink) = session_with(&api);

        let result = session
            .run(TransferRequest::LocalArtifact(PathBuf::from("fw.raucb")))
            .await;

        assert!(result.is_ok());
        assert_eq!(session.phase(), UpdatePhase::Succeeded);
        assert_eq!(session.progress(), 100);

        assert_eq!(
            sink.phases(),
            vec![
                UpdatePhase::Transferring,
                UpdatePhase::Transferring,
                UpdatePhase::Transferring,
                UpdatePhase::Transferring,
                UpdatePhase::AwaitingInstall,
                UpdatePhase::Polling,
                UpdatePhase::Polling,
                UpdatePhase::Succeeded,
            ]
        );
        let progress: Vec<u8> = sink.notices().iter().map(|n| n.progress).collect();
        assert_eq!(progress, vec![0, 0, 50, 100, 100, 0, 40, 100]);

        let last = sink.notices().last().cloned().unwrap();
        assert_eq!(last.severity, Severity::Success);
        assert!(!last.shows_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_mode_skips_install_handoff() {
        let api = Arc::new(FakeApi::new(TransferScript::Emit(vec![])).with_reports(vec![done()]));
        let (mut session, sink) = session_with(&api);

        let result = session
            .run(TransferRequest::RemoteUrl("http://mirror/fw.raucb".to_string()))
            .await;

        assert!(result.is_ok());
        assert_eq!(
            sink.phases(),
            vec![
                UpdatePhase::Transferring,
                UpdatePhase::Polling,
                UpdatePhase::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_url_fails_validation_without_starting() {
        let api = Arc::new(FakeApi::new(TransferScript::Emit(vec![])));
        let (mut session, sink) = session_with(&api);

        let result = session.run(TransferRequest::RemoteUrl("  ".to_string())).await;

        assert!(matches!(result, Err(UpdateError::Validation(_))));
        assert_eq!(session.phase(), UpdatePhase::Idle);
        assert_eq!(api.polls.load(Ordering::SeqCst), 0);

        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].phase, UpdatePhase::Idle);
        assert_eq!(notices[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_empty_artifact_path_fails_validation() {
        let api = Arc::new(FakeApi::new(TransferScript::Emit(vec![])));
        let (mut session, _sink) = session_with(&api);

        let result = session.run(TransferRequest::LocalArtifact(PathBuf::new())).await;

        assert!(matches!(result, Err(UpdateError::Validation(_))));
        assert_eq!(session.phase(), UpdatePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_failure_reaches_failed_with_cleanup() {
        let api = Arc::new(FakeApi::new(TransferScript::Fail("device rejected the upload")));
        let (mut session, sink) = session_with(&api);

        let result = session
            .run(TransferRequest::LocalArtifact(PathBuf::from("fw.raucb")))
            .await;

        assert!(result.is_err());
        assert_eq!(session.phase(), UpdatePhase::Failed);
        assert_eq!(api.polls.load(Ordering::SeqCst), 0);
        assert!(session.transfer_abort.lock().is_none());

        let last = sink.notices().last().cloned().unwrap();
        assert_eq!(last.phase, UpdatePhase::Failed);
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(last.progress, 0);
        assert!(last.message.contains("device rejected the upload"));
        assert!(!last.shows_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_reported_failure_carries_message() {
        let api = Arc::new(
            FakeApi::new(TransferScript::Emit(vec![100])).with_reports(vec![Ok(InstallReport {
                status: "failed".to_string(),
                message: "checksum mismatch".to_string(),
                ..Default::default()
            })]),
        );
        let (mut session, sink) = session_with(&api);

        let result = session
            .run(TransferRequest::LocalArtifact(PathBuf::from("fw.raucb")))
            .await;

        match result {
            Err(UpdateError::ServerFailure(msg)) => assert_eq!(msg, "checksum mismatch"),
            other => panic!("expected server failure, got {:?}", other),
        }
        assert_eq!(session.phase(), UpdatePhase::Failed);
        let last = sink.notices().last().cloned().unwrap();
        assert!(last.message.contains("checksum mismatch"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_cancel_aborts_active_transfer() {
        let api = Arc::new(FakeApi::new(TransferScript::BlockUntilAbort));
        let sink = Arc::new(RecordingSink::default());
        let mut session = UpdateSession::new(api.clone(), sink.clone());
        let canceller = session.canceller();

        let task = tokio::spawn(async move {
            let result = session
                .run(TransferRequest::LocalArtifact(PathBuf::from("fw.raucb")))
                .await;
            (session, result)
        });

        // Let the session park inside the transfer before cancelling.
        tokio::time::sleep(Duration::from_millis(1)).await;

        let confirmed = canceller.cancel().await.unwrap();
        assert!(confirmed);

        let (session, result) = task.await.unwrap();
        assert!(matches!(result, Err(UpdateError::Cancelled)));
        assert_eq!(session.phase(), UpdatePhase::Cancelled);
        assert!(session.transfer_abort.lock().is_none());

        // Both the canceller and the session report the cancellation.
        let phases = sink.phases();
        assert_eq!(
            phases
                .iter()
                .filter(|p| **p == UpdatePhase::Cancelled)
                .count(),
            2
        );
        let last = sink.notices().last().cloned().unwrap();
        assert_eq!(last.severity, Severity::Info);
        assert_eq!(last.progress, 0);
        assert!(!last.shows_progress());
    }

    #[tokio::test]
    async fn test_cancel_without_active_transfer_is_noop() {
        let api = Arc::new(FakeApi::new(TransferScript::Emit(vec![])));
        let (session, _sink) = session_with(&api);
        let canceller = session.canceller();

        let confirmed = canceller.cancel().await.unwrap();

        assert!(confirmed);
        assert_eq!(session.phase(), UpdatePhase::Idle);
        assert!(session.transfer_abort.lock().is_none());
    }

    #[tokio::test]
    async fn test_failed_cancel_request_reports_without_abort() {
        let api = Arc::new(
            FakeApi::new(TransferScript::Emit(vec![]))
                .with_cancel_acks(vec![Err(UpdateError::Protocol("connection reset".to_string()))]),
        );
        let (session, sink) = session_with(&api);
        let canceller = session.canceller();

        let result = canceller.cancel().await;

        assert!(result.is_err());
        assert_eq!(session.phase(), UpdatePhase::Idle);
        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Error);
        assert!(notices[0].message.contains("Cancel request failed"));
    }

    #[tokio::test]
    async fn test_unconfirmed_cancel_is_silent() {
        let api = Arc::new(FakeApi::new(TransferScript::Emit(vec![])).with_cancel_acks(vec![Ok(
            CancelAck {
                status: "busy".to_string(),
            },
        )]));
        let (session, sink) = session_with(&api);
        let canceller = session.canceller();

        let confirmed = canceller.cancel().await.unwrap();

        assert!(!confirmed);
        assert!(sink.notices().is_empty());
        assert_eq!(session.phase(), UpdatePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_state_resets_between_runs() {
        let api = Arc::new(
            FakeApi::new(TransferScript::Emit(vec![100])).with_reports(vec![done(), done()]),
        );
        let (mut session, sink) = session_with(&api);

        session
            .run(TransferRequest::LocalArtifact(PathBuf::from("a.raucb")))
            .await
            .unwrap();
        assert_eq!(session.phase(), UpdatePhase::Succeeded);

        session
            .run(TransferRequest::LocalArtifact(PathBuf::from("b.raucb")))
            .await
            .unwrap();
        assert_eq!(session.phase(), UpdatePhase::Succeeded);

        // The second run starts from a clean slate.
        let notices = sink.notices();
        assert_eq!(notices.len(), 10);
        assert_eq!(notices[5].phase, UpdatePhase::Transferring);
        assert_eq!(notices[5].progress, 0);
    }

    #[tokio::test]
    async fn test_abort_handle_signals_receiver() {
        let (handle, mut rx) = AbortHandle::new();
        assert!(!*rx.borrow());

        handle.abort();
        handle.abort();

        assert!(rx.wait_for(|aborted| *aborted).await.is_ok());
    }

    #[test]
    fn test_abort_after_receiver_dropped_is_noop() {
        let (handle, rx) = AbortHandle::new();
        drop(rx);
        handle.abort();
    }

    #[test]
    fn test_transfer_request_validation() {
        assert!(TransferRequest::LocalArtifact(PathBuf::new()).validate().is_err());
        assert!(TransferRequest::RemoteUrl(String::new()).validate().is_err());
        assert!(TransferRequest::RemoteUrl("   ".to_string()).validate().is_err());
        assert!(TransferRequest::LocalArtifact(PathBuf::from("fw.raucb"))
            .validate()
            .is_ok());
        assert!(TransferRequest::RemoteUrl("http://mirror/fw.raucb".to_string())
            .validate()
            .is_ok());
    }

    #[test]
    fn test_update_phase_description() {
        assert_eq!(UpdatePhase::Idle.description(), "Ready");
        assert_eq!(
            UpdatePhase::Transferring.description(),
            "Transferring update package..."
        );
        assert_eq!(
            UpdatePhase::AwaitingInstall.description(),
            "Waiting for installer..."
        );
        assert_eq!(UpdatePhase::Polling.description(), "Installing update...");
        assert_eq!(UpdatePhase::Succeeded.description(), "Update complete!");
        assert_eq!(UpdatePhase::Failed.description(), "Update failed");
        assert_eq!(UpdatePhase::Cancelled.description(), "Update cancelled");
    }

    #[test]
    fn test_terminal_phases() {
        assert!(UpdatePhase::Succeeded.is_terminal());
        assert!(UpdatePhase::Failed.is_terminal());
        assert!(UpdatePhase::Cancelled.is_terminal());
        assert!(!UpdatePhase::Idle.is_terminal());
        assert!(!UpdatePhase::Transferring.is_terminal());
        assert!(!UpdatePhase::AwaitingInstall.is_terminal());
        assert!(!UpdatePhase::Polling.is_terminal());
    }

    #[test]
    fn test_notice_visibility_follows_phase() {
        let notice = |phase| StatusNotice {
            phase,
            ..Default::default()
        };
        assert!(notice(UpdatePhase::Transferring).shows_progress());
        assert!(notice(UpdatePhase::AwaitingInstall).shows_progress());
        assert!(notice(UpdatePhase::Polling).shows_progress());
        assert!(!notice(UpdatePhase::Idle).shows_progress());
        assert!(!notice(UpdatePhase::Succeeded).shows_progress());
        assert!(!notice(UpdatePhase::Failed).shows_progress());
        assert!(!notice(UpdatePhase::Cancelled).shows_progress());
    }
}
