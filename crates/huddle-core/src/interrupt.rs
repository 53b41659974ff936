//! Ctrl+C handling for interactive asks.
//!
//! The first Ctrl+C cancels the running session (the transport is closed and
//! the session fails with "cancelled"). A second Ctrl+C exits immediately
//! with status 130.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Exit status for a process stopped by Ctrl+C.
pub const EXIT_INTERRUPTED: i32 = 130;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C handler.
///
/// The handler only flips a flag and wakes waiters; printing belongs to the
/// renderer.
///
/// # Errors
/// Returns an error if a handler is already installed or registration fails.
pub fn init() -> Result<()> {
    ctrlc::set_handler(trigger).context("Failed to install Ctrl+C handler")
}

fn notify() -> &'static Notify {
    INTERRUPT_NOTIFY.get_or_init(Notify::new)
}

/// Records an interrupt; a second one exits the process.
pub fn trigger() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        std::process::exit(EXIT_INTERRUPTED);
    }
    notify().notify_waiters();
}

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until an interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        let notified = notify().notified();
        if is_interrupted() {
            return;
        }
        notified.await;
    }
}

pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Cancels `token` on the first interrupt.
///
/// The task ends on its own once `token` is cancelled for another reason.
pub fn cancel_on_interrupt(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = wait_for_interrupt() => {
                tracing::info!("interrupt received, cancelling");
                token.cancel();
            }
        }
    })
}
