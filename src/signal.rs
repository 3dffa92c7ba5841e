//! Cancellation and signal handling.
//!
//! Two related mechanisms live here:
//!
//! - [`CancelToken`]: a per-run, one-shot broadcast signal. The collector
//!   raises it on a fatal error; the walker stops scheduling work when it
//!   sees it; workers `select!` on [`CancelToken::done`] while publishing
//!   so they never block on a result nobody will read. A [`CancelGuard`]
//!   raises the token when the run's scope exits.
//! - [`ShutdownHandler`]: a process-wide Ctrl+C flag installed once with
//!   `ctrlc`. The finder treats it like cancellation and reports the run
//!   as interrupted.
//!
//! # Usage
//!
//! ```rust
//! use dupescan::signal::CancelToken;
//!
//! let token = CancelToken::new();
//! let observer = token.clone();
//! {
//!     let _guard = token.guard();
//!     assert!(!observer.is_cancelled());
//! }
//! assert!(observer.is_cancelled());
//! ```
//!
//! # Exit Codes
//!
//! When Ctrl+C is received the application exits with code 130 (128 + SIGINT).

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crossbeam_channel::{Receiver, Sender};

/// Exit code for SIGINT (Ctrl+C) interruption.
/// This follows Unix convention: 128 + signal number (SIGINT = 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

#[derive(Debug)]
struct CancelInner {
    raised: AtomicBool,
    /// Dropped on cancel, which disconnects `done` for every observer.
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

/// One-shot, idempotent cancellation signal shared by clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Create a token that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        let (trigger, done) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(CancelInner {
                raised: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                done,
            }),
        }
    }

    /// Raise the signal. Returns `true` only for the call that raised it.
    pub fn cancel(&self) -> bool {
        if self.inner.raised.swap(true, Ordering::SeqCst) {
            return false;
        }
        let trigger = match self.inner.trigger.lock() {
            Ok(mut guard) => guard.take(),
            Err(poison) => poison.into_inner().take(),
        };
        drop(trigger);
        true
    }

    /// Whether the signal has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// A receiver that becomes ready (disconnected) once the token is raised.
    ///
    /// Intended for `crossbeam_channel::select!`; no value is ever sent.
    #[must_use]
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Guard that raises this token when dropped.
    #[must_use = "the token is raised as soon as the guard is dropped"]
    pub fn guard(&self) -> CancelGuard {
        CancelGuard {
            token: self.clone(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Raises its [`CancelToken`] on drop, so a run's token is always released
/// on every exit path.
#[derive(Debug)]
pub struct CancelGuard {
    token: CancelToken,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Centralized shutdown handler for Ctrl+C.
///
/// Wraps an `AtomicBool` flag that is set when the signal arrives. The flag
/// is shared with the finder, which checks it alongside the run's
/// [`CancelToken`].
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a new shutdown handler with the flag initially set to `false`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Manually request a shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Get a clone of the shutdown flag for passing to the finder.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Reset the shutdown flag to `false`.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install a Ctrl+C handler that sets the shutdown flag on interrupt.
///
/// Safe to call more than once per process (tests call `run_app`
/// repeatedly): later calls reset and return the already-installed handler.
///
/// # Errors
///
/// Never fails in practice; if the hook cannot be registered an unhooked
/// handler is returned so manual shutdown requests still work.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();

        log::info!("Shutdown signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(_) => {
            if let Some(handler) = GLOBAL_HANDLER.get() {
                handler.reset();
                Ok(handler.clone())
            } else {
                log::debug!("Ctrl+C handler already registered, using unhooked handler");
                let fallback = ShutdownHandler::new();
                let _ = GLOBAL_HANDLER.set(fallback.clone());
                Ok(fallback)
            }
        }
    }
}
