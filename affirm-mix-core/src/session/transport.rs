use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::models::audio_models::ChannelRole;
use crate::models::error::MixerError;
use crate::models::state::TransportState;
use crate::traits::output_device::OutputUnlock;

struct TransportInner {
    state: TransportState,
    pending_loads: usize,
    loaded: [bool; 2],
}

impl TransportInner {
    /// Settle one load and leave `Loading` once nothing is outstanding.
    fn settle(&mut self, role: ChannelRole, applied: bool) -> Option<TransportState> {
        self.pending_loads = self.pending_loads.saturating_sub(1);
        if applied {
            self.loaded[role.index()] = true;
        }
        if self.state != TransportState::Loading || self.pending_loads > 0 {
            return None;
        }
        self.state = if self.loaded.iter().any(|l| *l) {
            TransportState::Ready
        } else {
            TransportState::Idle
        };
        Some(self.state)
    }
}

/// Owns the transport state machine and the one-time output unlock.
///
/// State changes that must happen together with a graph mutation run the
/// mutation while the state lock is held, so a concurrent `dispose` either
/// sees the mutation finished or prevents it from starting.
pub struct TransportController {
    inner: Mutex<TransportInner>,
    unlocked: OnceCell<()>,
}

impl TransportController {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TransportInner {
                state: TransportState::Idle,
                pending_loads: 0,
                loaded: [false; 2],
            }),
            unlocked: OnceCell::new(),
        }
    }

    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    /// Current state, or `Disposed` as an error.
    pub fn ensure_live(&self) -> Result<TransportState, MixerError> {
        let state = self.inner.lock().state;
        if state.is_disposed() {
            return Err(MixerError::Disposed);
        }
        Ok(state)
    }

    pub fn pending_loads(&self) -> usize {
        self.inner.lock().pending_loads
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.initialized()
    }

    /// Run the platform unlock at most once per session.
    ///
    /// Concurrent callers wait on the same attempt. A rejected unlock is not
    /// memoized; the next caller tries again.
    pub async fn unlock<U: OutputUnlock + ?Sized>(&self, output: &U) -> Result<(), MixerError> {
        self.unlocked
            .get_or_try_init(|| async {
                log::info!("Unlocking audio output");
                output.unlock().await
            })
            .await
            .map(|_| ())
    }

    /// Register an outstanding load. Returns the ticket that settles it and
    /// the new state if this load moved the transport into `Loading`.
    pub fn begin_load(
        self: &Arc<Self>,
        role: ChannelRole,
    ) -> Result<(LoadTicket, Option<TransportState>), MixerError> {
        let mut inner = self.inner.lock();
        if inner.state.is_disposed() {
            return Err(MixerError::Disposed);
        }
        inner.pending_loads += 1;
        let change = if matches!(inner.state, TransportState::Idle | TransportState::Ready) {
            inner.state = TransportState::Loading;
            Some(TransportState::Loading)
        } else {
            None
        };
        let ticket = LoadTicket {
            controller: Arc::clone(self),
            role,
            settled: false,
        };
        Ok((ticket, change))
    }

    /// Move to `to` if `allowed(current)` holds, running `apply` under the
    /// state lock.
    ///
    /// Returns the previous state when the transition happened and `None`
    /// when the current state made it a no-op.
    pub fn transition<A, F>(
        &self,
        allowed: A,
        to: TransportState,
        apply: F,
    ) -> Result<Option<TransportState>, MixerError>
    where
        A: FnOnce(TransportState) -> bool,
        F: FnOnce(),
    {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        if previous.is_disposed() {
            return Err(MixerError::Disposed);
        }
        if !allowed(previous) {
            return Ok(None);
        }
        apply();
        inner.state = to;
        log::debug!("Transport {} -> {}", previous.name(), to.name());
        Ok(Some(previous))
    }

    /// Enter `Disposed`. Returns the previous state the first time only.
    pub fn dispose(&self) -> Option<TransportState> {
        let mut inner = self.inner.lock();
        if inner.state.is_disposed() {
            return None;
        }
        let previous = inner.state;
        inner.state = TransportState::Disposed;
        Some(previous)
    }
}

impl Default for TransportController {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of settling a load ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSettlement {
    pub applied: bool,
    pub state_change: Option<TransportState>,
}

/// One outstanding load. Settles itself on drop, so a cancelled load
/// future never leaves the transport stuck in `Loading`.
pub struct LoadTicket {
    controller: Arc<TransportController>,
    role: ChannelRole,
    settled: bool,
}

impl LoadTicket {
    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Apply a finished load. `apply` runs under the transport lock unless
    /// the session was disposed, and reports whether the result was used.
    pub fn complete<F>(mut self, apply: F) -> LoadSettlement
    where
        F: FnOnce() -> bool,
    {
        self.settled = true;
        let mut inner = self.controller.inner.lock();
        let applied = !inner.state.is_disposed() && apply();
        let state_change = inner.settle(self.role, applied);
        LoadSettlement { applied, state_change }
    }

    /// Settle a failed load.
    pub fn fail(mut self) -> Option<TransportState> {
        self.settled = true;
        self.controller.inner.lock().settle(self.role, false)
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if !self.settled {
            log::debug!("{} load abandoned before completion", self.role.name());
            self.controller.inner.lock().settle(self.role, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    struct CountingUnlock {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl OutputUnlock for CountingUnlock {
        async fn unlock(&self) -> Result<(), MixerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(MixerError::Unlock("no user gesture".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn loads_move_through_loading_to_ready() {
        let transport = Arc::new(TransportController::new());
        let (voice, change) = transport.begin_load(ChannelRole::Voice).unwrap();
        assert_eq!(change, Some(TransportState::Loading));
        let (music, change) = transport.begin_load(ChannelRole::Music).unwrap();
        assert_eq!(change, None);

        // Completion order is independent of request order.
        let settled = music.complete(|| true);
        assert!(settled.applied);
        assert_eq!(settled.state_change, None);
        assert_eq!(transport.state(), TransportState::Loading);

        let settled = voice.complete(|| true);
        assert_eq!(settled.state_change, Some(TransportState::Ready));
        assert_eq!(transport.pending_loads(), 0);
    }

    #[test]
    fn failed_only_load_returns_to_idle() {
        let transport = Arc::new(TransportController::new());
        let (ticket, _) = transport.begin_load(ChannelRole::Voice).unwrap();
        assert_eq!(ticket.fail(), Some(TransportState::Idle));
    }

    #[test]
    fn dropped_ticket_settles() {
        let transport = Arc::new(TransportController::new());
        let (ticket, _) = transport.begin_load(ChannelRole::Music).unwrap();
        drop(ticket);
        assert_eq!(transport.state(), TransportState::Idle);
        assert_eq!(transport.pending_loads(), 0);
    }

    #[test]
    fn completion_after_dispose_is_not_applied() {
        let transport = Arc::new(TransportController::new());
        let (ticket, _) = transport.begin_load(ChannelRole::Voice).unwrap();
        transport.dispose();

        let mut called = false;
        let settled = ticket.complete(|| {
            called = true;
            true
        });

        assert!(!called);
        assert!(!settled.applied);
        assert_eq!(transport.state(), TransportState::Disposed);
    }

    #[test]
    fn transitions_respect_guards() {
        let transport = Arc::new(TransportController::new());
        let started = transport
            .transition(|s| !s.is_playing(), TransportState::Playing, || {})
            .unwrap();
        assert_eq!(started, Some(TransportState::Idle));

        let again = transport
            .transition(|s| !s.is_playing(), TransportState::Playing, || panic!("must not run"))
            .unwrap();
        assert_eq!(again, None);

        assert_eq!(transport.dispose(), Some(TransportState::Playing));
        assert_eq!(transport.dispose(), None);
        assert_eq!(
            transport.transition(|_| true, TransportState::Stopped, || {}),
            Err(MixerError::Disposed)
        );
        assert!(transport.begin_load(ChannelRole::Voice).is_err());
    }

    #[tokio::test]
    async fn unlock_is_memoized() {
        let transport = TransportController::new();
        let output = CountingUnlock {
            calls: AtomicUsize::new(0),
            fail_first: false,
        };

        transport.unlock(&output).await.unwrap();
        transport.unlock(&output).await.unwrap();

        assert_eq!(output.calls.load(Ordering::SeqCst), 1);
        assert!(transport.is_unlocked());
    }

    #[tokio::test]
    async fn rejected_unlock_is_retried() {
        let transport = TransportController::new();
        let output = CountingUnlock {
            calls: AtomicUsize::new(0),
            fail_first: true,
        };

        assert!(matches!(transport.unlock(&output).await, Err(MixerError::Unlock(_))));
        assert!(!transport.is_unlocked());
        transport.unlock(&output).await.unwrap();
        transport.unlock(&output).await.unwrap();

        assert_eq!(output.calls.load(Ordering::SeqCst), 2);
    }
}
