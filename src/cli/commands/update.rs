//! Device update commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use tokio::sync::watch;

use crate::cli::output::{
    print_error, print_formatted, print_success, should_show_progress, OutputFormat,
};
use crate::session::{Severity, StatusNotice, TransferRequest, UpdateApi, UpdateSession};

#[derive(Subcommand, Debug)]
pub enum UpdateCommands {
    /// Upload an update package from the local machine
    Push {
        /// Path to the update package (full image or delta)
        file: PathBuf,
    },

    /// Have the device download an update package itself
    Fetch {
        /// URL the device should fetch the package from
        url: String,
    },

    /// Show the current installation status
    Status,

    /// Ask the device to cancel a running installation
    Cancel,
}

pub async fn run(
    command: UpdateCommands,
    device: Option<String>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        UpdateCommands::Push { file } => {
            run_update(TransferRequest::LocalArtifact(file), device, format, quiet).await
        }
        UpdateCommands::Fetch { url } => {
            run_update(TransferRequest::RemoteUrl(url), device, format, quiet).await
        }
        UpdateCommands::Status => status(device, format).await,
        UpdateCommands::Cancel => cancel(device, quiet).await,
    }
}

/// Drive a full update session to completion, rendering progress and
/// translating Ctrl-C into a cancellation request
async fn run_update(
    request: TransferRequest,
    device: Option<String>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let client = super::connect(device)?;
    let api: Arc<dyn UpdateApi> = Arc::new(client);

    let (status_tx, mut status_rx) = watch::channel(StatusNotice::default());
    let mut session = UpdateSession::new(api, Arc::new(status_tx));
    let canceller = session.canceller();

    // Spawn progress reporter (only if TTY and not quiet)
    let renderer = should_show_progress(quiet, format).then(|| {
        tokio::spawn(async move {
            while status_rx.changed().await.is_ok() {
                let notice = status_rx.borrow().clone();
                if let Some(line) = progress_line(&notice) {
                    eprint!("\r{}   ", line);
                }
                if notice.phase.is_terminal() {
                    break;
                }
            }
            eprintln!();
        })
    });

    // First Ctrl-C asks the device to cancel; a second one gives up waiting.
    let cancel_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("\nCancelling update...");
        if let Err(e) = canceller.cancel().await {
            print_error(&format!("Cancel request failed: {}", e));
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let outcome = session.run(request).await;
    tracing::debug!(
        "Session finished: {:?} at {}% ({})",
        session.phase(),
        session.progress(),
        session.last_message()
    );

    cancel_task.abort();
    let _ = cancel_task.await;
    drop(session);
    if let Some(renderer) = renderer {
        let _ = renderer.await;
    }

    match outcome {
        Ok(()) => {
            print_success("Update complete!", quiet);
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            print_success("Update cancelled.", quiet);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// One line of live progress output, or `None` when the notification should
/// not drive the progress readout.
///
/// The device's own installer message takes priority over the generic phase
/// label. Error notices never reach the progress line: they carry no
/// meaningful percentage, and the failure itself is reported once the
/// session ends.
fn progress_line(notice: &StatusNotice) -> Option<String> {
    if !notice.shows_progress() || notice.severity == Severity::Error {
        return None;
    }
    let label = if notice.message.is_empty() {
        notice.phase.description()
    } else {
        notice.message.as_str()
    };
    Some(format!("{}: {}%", label, notice.progress))
}

async fn status(device: Option<String>, format: OutputFormat) -> Result<()> {
    let client = super::connect(device)?;
    let report = client.install_progress().await?;

    print_formatted(&report, format, |r| {
        let mut lines = vec![format!("Status:   {}", r.status)];

        if let Some(percent) = r.percent() {
            lines.push(format!("Progress: {}%", percent));
        }
        if !r.message.is_empty() {
            lines.push(format!("Message:  {}", r.message));
        }
        if !r.output.is_empty() {
            lines.push(String::new());
            lines.push("Recent installer output:".to_string());
            for line in &r.output {
                lines.push(format!("  {}", line));
            }
        }

        lines.join("\n")
    });

    Ok(())
}

async fn cancel(device: Option<String>, quiet: bool) -> Result<()> {
    let client = super::connect(device)?;
    let ack = client.cancel_install().await?;

    if ack.confirmed() {
        print_success("Installation cancelled.", quiet);
    } else {
        print_error(&format!(
            "Device did not confirm the cancellation (status: {})",
            ack.status
        ));
    }

    Ok(())
}
