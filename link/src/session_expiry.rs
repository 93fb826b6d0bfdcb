//! Single-flight handling of session expiry.
//!
//! Many requests can discover an expired session at the same moment. The
//! [`SessionExpiryCoordinator`] makes sure only the first of them clears the
//! session store, shows a notice and navigates to login; the rest are
//! dropped until the quiet window has passed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::storage::SessionStore;

/// Notice shown when the backend gives no message of its own.
pub const DEFAULT_EXPIRY_MESSAGE: &str = "Session expired, redirecting to login...";

/// Navigation side effect, implemented by the embedding application.
pub trait LoginRedirect: Send + Sync {
    /// Show a transient, non-blocking notice to the operator.
    fn show_notice(&self, message: &str);

    /// Navigate to the login entry point.
    fn redirect_to_login(&self);
}

/// Does nothing. For headless use where the caller inspects
/// [`SessionExpiryCoordinator::episodes`] instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRedirect;

impl LoginRedirect for NoopRedirect {
    fn show_notice(&self, _message: &str) {}

    fn redirect_to_login(&self) {}
}

/// Reports expiry through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRedirect;

impl LoginRedirect for LoggingRedirect {
    fn show_notice(&self, message: &str) {
        log::warn!("[SESSION] {}", message);
    }

    fn redirect_to_login(&self) {
        log::info!("[SESSION] Login required");
    }
}

#[derive(Debug, Default)]
struct ExpiryState {
    redirecting: bool,
    last_transition: Option<Instant>,
}

struct Inner {
    state: Mutex<ExpiryState>,
    quiet_window: Duration,
    store: Arc<dyn SessionStore>,
    redirect: Arc<dyn LoginRedirect>,
    episodes: AtomicU64,
}

/// Gate for the "redirect to login" side effect.
///
/// Created once per client and shared by cloning. Time is measured with
/// `tokio::time`, so the quiet window follows a paused test clock.
#[derive(Clone)]
pub struct SessionExpiryCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionExpiryCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionExpiryCoordinator")
            .field("quiet_window", &self.inner.quiet_window)
            .field("redirecting", &self.is_redirecting())
            .field("episodes", &self.episodes())
            .finish()
    }
}

impl SessionExpiryCoordinator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        redirect: Arc<dyn LoginRedirect>,
        quiet_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ExpiryState::default()),
                quiet_window,
                store,
                redirect,
                episodes: AtomicU64::new(0),
            }),
        }
    }

    /// Report that the session has expired.
    ///
    /// The first report of an episode clears the session store, shows one
    /// notice, navigates to login and returns `true`. Reports arriving while
    /// the episode is active return `false` and do nothing.
    pub fn report_expiry(&self, message: Option<&str>) -> bool {
        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            if Self::active(&state, self.inner.quiet_window) {
                log::debug!("[SESSION] Expiry already being handled; ignoring");
                return false;
            }
            state.redirecting = true;
            state.last_transition = Some(Instant::now());
        }

        let episode = self.inner.episodes.fetch_add(1, Ordering::SeqCst) + 1;
        let message = message.filter(|m| !m.trim().is_empty()).unwrap_or(DEFAULT_EXPIRY_MESSAGE);
        log::info!("[SESSION] Session expired (episode {}): {}", episode, message);

        if let Err(e) = self.inner.store.clear_all() {
            log::error!("[SESSION] Failed to clear session store: {}", e);
        }
        self.inner.redirect.show_notice(message);
        self.inner.redirect.redirect_to_login();
        true
    }

    /// `true` while an episode is active and new requests should be refused.
    pub fn is_redirecting(&self) -> bool {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::active(&state, self.inner.quiet_window)
    }

    /// End the current episode, e.g. after a successful login.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.redirecting = false;
        state.last_transition = Some(Instant::now());
    }

    /// Number of episodes handled so far.
    pub fn episodes(&self) -> u64 {
        self.inner.episodes.load(Ordering::SeqCst)
    }

    pub fn quiet_window(&self) -> Duration {
        self.inner.quiet_window
    }

    pub(crate) fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    fn active(state: &ExpiryState, window: Duration) -> bool {
        match (state.redirecting, state.last_transition) {
            (true, Some(at)) => at.elapsed() < window,
            _ => false,
        }
    }
}
