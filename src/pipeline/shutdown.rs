use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Lifecycle of a run with respect to interruption and the final flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Stopping,
    Flushed,
}

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const FLUSHED: u8 = 2;

/// RUNNING -> STOPPING on interrupt, -> FLUSHED once the snapshot has been handed off.
/// Repeated interrupts never escalate; there is at most one flush.
pub struct ShutdownController {
    state: AtomicU8,
    token: CancellationToken,
    interrupts: AtomicUsize,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
            token: CancellationToken::new(),
            interrupts: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> ShutdownState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => ShutdownState::Running,
            STOPPING => ShutdownState::Stopping,
            _ => ShutdownState::Flushed,
        }
    }

    /// Fires when dispatch should stop.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// External interrupt. Returns true for the interrupt that started the stop.
    pub fn interrupt(&self) -> bool {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        let first = self.request_stop();
        if first {
            warn!("Interrupt received: finishing in-flight items, then saving collected data");
        } else {
            warn!("Already stopping: waiting for in-flight items");
        }
        first
    }

    pub fn was_interrupted(&self) -> bool {
        self.interrupts.load(Ordering::SeqCst) > 0
    }

    /// RUNNING -> STOPPING. No-op in any later state.
    pub fn request_stop(&self) -> bool {
        let moved = self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        self.token.cancel();
        moved
    }

    /// Claim the single flush. Returns false if a flush already happened.
    pub fn begin_flush(&self) -> bool {
        let previous = self.state.swap(FLUSHED, Ordering::SeqCst);
        self.token.cancel();
        previous != FLUSHED
    }

    /// Translate Ctrl-C into `interrupt` until the returned task is aborted.
    pub fn listen_for_ctrl_c(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Cannot listen for Ctrl-C: {}", e);
                    break;
                }
                controller.interrupt();
            }
        })
    }
}
