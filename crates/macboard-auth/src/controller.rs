//! Session Controller
//!
//! Owns the authoritative session state of one browsing context and every
//! operation that mutates it. Writes go back to the shared store: the
//! session snapshot and the force-logout signal.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use macboard_storage::KeyValueStore;

use crate::error::{format_error_message, ProviderError};
use crate::provider::{IdentityProvider, ProviderEvent};
use crate::signal::ForceLogoutSignal;
use crate::snapshot::SnapshotStore;
use crate::state::{Session, SessionPhase, SessionView, SurfacedError};
use crate::user::{ProviderUser, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// How long initialization waits for the first provider push before
    /// settling on the snapshot
    pub bootstrap_grace: Duration,
    /// How long a surfaced error stays before it is dismissed
    pub error_display_window: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            bootstrap_grace: Duration::from_millis(1500),
            error_display_window: Duration::from_secs(5),
        }
    }
}

pub struct SessionController {
    provider: Arc<dyn IdentityProvider>,
    signal: ForceLogoutSignal,
    snapshots: SnapshotStore,
    options: ControllerOptions,
    session: Arc<RwLock<Session>>,
    view_tx: Arc<watch::Sender<SessionView>>,
    sign_in_pending: Arc<AtomicBool>,
    error_generation: Arc<AtomicU64>,
    /// Bumped by every sign-out; a sign-in that started in an older epoch
    /// is discarded when it resolves
    session_epoch: Arc<AtomicU64>,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
    dismissal: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Resets the pending flag when a sign-in attempt ends, however it ends.
struct SignInGuard {
    pending: Arc<AtomicBool>,
}

impl Drop for SignInGuard {
    fn drop(&mut self) {
        self.pending.store(false, Ordering::Release);
    }
}

impl SessionController {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn IdentityProvider>,
        options: ControllerOptions,
    ) -> Self {
        let (view_tx, _) = watch::channel(SessionView::default());

        Self {
            provider,
            signal: ForceLogoutSignal::new(Arc::clone(&store)),
            snapshots: SnapshotStore::new(store),
            options,
            session: Arc::new(RwLock::new(Session::default())),
            view_tx: Arc::new(view_tx),
            sign_in_pending: Arc::new(AtomicBool::new(false)),
            error_generation: Arc::new(AtomicU64::new(0)),
            session_epoch: Arc::new(AtomicU64::new(0)),
            listener: Arc::new(Mutex::new(None)),
            dismissal: Arc::new(Mutex::new(None)),
        }
    }

    /// Seed state from the store, then subscribe to provider pushes.
    ///
    /// Seeding is synchronous and optimistic: the snapshot user is shown
    /// before the provider confirms anything, unless the force-logout
    /// signal is raised. The session stays `Loading` until the first push
    /// arrives or the bootstrap grace period passes.
    ///
    /// Must be called from within a tokio runtime. Calling it twice is a
    /// no-op.
    pub fn initialize(&self) {
        if self.session.read().initialized {
            tracing::warn!("Session controller already initialized");
            return;
        }

        let user = if self.signal.is_set() {
            tracing::info!("Force-logout signal present at startup, starting signed out");
            None
        } else {
            self.snapshots.load_user()
        };

        tracing::info!(
            restored = user.is_some(),
            user_id = user.as_ref().map(|u| u.id.as_str()).unwrap_or(""),
            "Bootstrapped session from store"
        );

        self.update(|session| {
            session.user = user;
            session.is_loading = true;
            session.error = None;
            session.initialized = true;
        });

        let events = self.provider.subscribe();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let grace = self.options.bootstrap_grace;
                let task = handle.spawn(listen(self.clone(), events, grace));
                if let Some(previous) = self.listener.lock().replace(task) {
                    previous.abort();
                }
            }
            Err(_) => {
                tracing::error!("No async runtime; provider pushes will not be observed");
                self.settle_without_push();
            }
        }
    }

    /// Interactive sign-in. Never fails: returns the signed-in user, or
    /// `None` when the attempt failed, was cancelled, or another sign-in
    /// is already pending.
    pub async fn sign_in_interactive(&self) -> Option<User> {
        let _guard = self.begin_sign_in("interactive")?;
        let epoch = self.start_loading();

        let result = self.provider.sign_in_interactive().await;
        self.complete_sign_in(result, epoch, "interactive").await
    }

    /// Anonymous sign-in. Without provider support this creates a local
    /// guest instead, with no provider round-trip.
    pub async fn sign_in_anonymous(&self) -> Option<User> {
        let _guard = self.begin_sign_in("anonymous")?;

        if !self.provider.supports_anonymous() {
            tracing::info!("Provider has no anonymous sign-in, creating local guest");
            return Some(self.establish(User::guest(), "local_guest"));
        }

        let epoch = self.start_loading();
        let result = self.provider.sign_in_anonymous().await;
        self.complete_sign_in(result, epoch, "anonymous").await
    }

    /// Sign out of this and every other context sharing the store.
    ///
    /// The force-logout signal is written before the provider is called,
    /// and local state is cleared whatever the provider answers. Repeating
    /// the call leaves the same final state. Any sign-in still pending is
    /// discarded when it resolves.
    pub async fn sign_out(&self) {
        self.session_epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.signal.raise() {
            tracing::error!(error = %e, "Failed to raise force-logout signal");
        }

        let had_user = self.session.read().user.is_some();

        if let Err(e) = self.snapshots.clear() {
            tracing::error!(error = %e, "Failed to remove session snapshot");
        }
        self.error_generation.fetch_add(1, Ordering::SeqCst);
        self.update(|session| {
            session.user = None;
            session.is_loading = false;
            session.error = None;
        });

        // The provider may hold a session this context never restored,
        // e.g. after starting with the signal raised
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(
                code = %e.code,
                error = %e,
                "Provider sign-out failed, local session already cleared"
            );
        }

        tracing::info!(had_user, "Signed out");
    }

    pub fn clear_error(&self) {
        self.error_generation.fetch_add(1, Ordering::SeqCst);
        self.update(|session| session.error = None);
    }

    /// Reconcile one provider push. Replaying the same event is harmless.
    pub fn handle_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::Changed(provider_user) => {
                if self.signal.is_set() {
                    if provider_user.is_some() {
                        tracing::debug!("Ignoring provider push, force-logout signal is raised");
                    }
                    self.update(|session| {
                        session.user = None;
                        session.is_loading = false;
                    });
                    return;
                }

                self.update(|session| session.is_loading = true);

                let user = match provider_user {
                    Some(raw) => {
                        let user = User::from_provider(&raw);
                        if let Err(e) = self.snapshots.save(&user) {
                            tracing::error!(error = %e, "Failed to persist session snapshot");
                        }
                        tracing::debug!(user_id = %user.id, "Provider reports signed-in user");
                        Some(user)
                    }
                    None => {
                        // Keep the cached user while the provider resynchronizes
                        let restored = self.snapshots.load_user();
                        tracing::debug!(
                            restored = restored.is_some(),
                            "Provider reports no user, falling back to snapshot"
                        );
                        restored
                    }
                };

                self.update(|session| {
                    session.user = user;
                    session.is_loading = false;
                    session.error = None;
                });
            }
            ProviderEvent::Failed(error) => {
                tracing::error!(code = %error.code, error = %error, "Provider subscription error");
                self.surface_error(&error);
            }
        }
    }

    /// Stop observing the provider and cancel pending error dismissal.
    pub fn shutdown(&self) {
        if let Some(task) = self.listener.lock().take() {
            task.abort();
            tracing::debug!("Unsubscribed from provider");
        }
        if let Some(task) = self.dismissal.lock().take() {
            task.abort();
        }
    }

    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    pub fn view(&self) -> SessionView {
        let force_logout = self.signal.is_set();
        SessionView::from_session(&self.session.read(), force_logout)
    }

    pub fn phase(&self) -> SessionPhase {
        let force_logout = self.signal.is_set();
        self.session.read().phase(force_logout)
    }

    pub fn user(&self) -> Option<User> {
        self.session.read().user.clone()
    }

    pub fn has_user(&self) -> bool {
        self.session.read().user.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        let force_logout = self.signal.is_set();
        self.session.read().is_authenticated(force_logout)
    }

    pub fn is_loading(&self) -> bool {
        self.session.read().is_loading
    }

    pub fn error(&self) -> Option<SurfacedError> {
        self.session.read().error.clone()
    }

    pub fn signal(&self) -> &ForceLogoutSignal {
        &self.signal
    }

    pub fn options(&self) -> ControllerOptions {
        self.options
    }

    /// Watch the presentation view. A new value is published after every
    /// state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Session),
    {
        f(&mut self.session.write());
        self.publish();
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_replace(view);
    }

    fn begin_sign_in(&self, method: &'static str) -> Option<SignInGuard> {
        if self
            .sign_in_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(method, "Sign-in already in progress, rejecting");
            return None;
        }

        Some(SignInGuard {
            pending: Arc::clone(&self.sign_in_pending),
        })
    }

    /// Returns the session epoch the attempt belongs to.
    fn start_loading(&self) -> u64 {
        let epoch = self.session_epoch.load(Ordering::SeqCst);
        self.error_generation.fetch_add(1, Ordering::SeqCst);
        self.update(|session| {
            session.is_loading = true;
            session.error = None;
        });
        epoch
    }

    async fn complete_sign_in(
        &self,
        result: Result<ProviderUser, ProviderError>,
        epoch: u64,
        method: &'static str,
    ) -> Option<User> {
        if self.session_epoch.load(Ordering::SeqCst) != epoch {
            tracing::info!(method, "Discarding sign-in that resolved after a sign-out");
            if result.is_ok() {
                if let Err(e) = self.provider.sign_out().await {
                    tracing::warn!(code = %e.code, error = %e, "Provider sign-out failed");
                }
            }
            return None;
        }

        match result {
            Ok(raw) => Some(self.establish(User::from_provider(&raw), method)),
            Err(error) => {
                tracing::warn!(method, code = %error.code, error = %error, "Sign-in failed");
                self.surface_error(&error);
                None
            }
        }
    }

    fn establish(&self, user: User, method: &'static str) -> User {
        // Clear before the local update, or a watchdog tick in between
        // would log the fresh session straight back out
        if let Err(e) = self.signal.clear() {
            tracing::error!(error = %e, "Failed to clear force-logout signal");
        }
        if let Err(e) = self.snapshots.save(&user) {
            tracing::error!(error = %e, "Failed to persist session snapshot");
        }

        self.error_generation.fetch_add(1, Ordering::SeqCst);
        self.update(|session| {
            session.user = Some(user.clone());
            session.is_loading = false;
            session.error = None;
        });

        tracing::info!(
            user_id = %user.id,
            anonymous = user.is_anonymous,
            method,
            "Signed in"
        );

        user
    }

    fn surface_error(&self, error: &ProviderError) {
        let kind = error.kind();

        if !kind.is_surfaced() {
            tracing::debug!(kind = %kind, "Not surfacing user-driven error");
            self.update(|session| {
                session.is_loading = false;
                session.error = None;
            });
            return;
        }

        let generation = self.error_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let surfaced = SurfacedError {
            kind,
            message: format_error_message(Some(error)),
            generation,
        };
        self.update(|session| {
            session.is_loading = false;
            session.error = Some(surfaced);
        });

        self.schedule_dismissal(generation);
    }

    fn schedule_dismissal(&self, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let controller = self.clone();
        let window = self.options.error_display_window;
        let task = handle.spawn(async move {
            tokio::time::sleep(window).await;
            controller.dismiss_error(generation);
        });

        if let Some(previous) = self.dismissal.lock().replace(task) {
            previous.abort();
        }
    }

    fn dismiss_error(&self, generation: u64) {
        let dismissed = {
            let mut session = self.session.write();
            match &session.error {
                Some(error) if error.generation == generation => {
                    session.error = None;
                    true
                }
                _ => false,
            }
        };

        if dismissed {
            tracing::debug!(generation, "Dismissed error");
            self.publish();
        }
    }

    fn settle_without_push(&self) {
        if self.sign_in_pending.load(Ordering::Acquire) {
            return;
        }

        let force_logout = self.signal.is_set();
        self.update(|session| {
            if !session.is_loading {
                return;
            }
            if force_logout {
                session.user = None;
            }
            session.is_loading = false;
        });
    }
}

impl Clone for SessionController {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            signal: self.signal.clone(),
            snapshots: self.snapshots.clone(),
            options: self.options,
            session: Arc::clone(&self.session),
            view_tx: Arc::clone(&self.view_tx),
            sign_in_pending: Arc::clone(&self.sign_in_pending),
            error_generation: Arc::clone(&self.error_generation),
            session_epoch: Arc::clone(&self.session_epoch),
            listener: Arc::clone(&self.listener),
            dismissal: Arc::clone(&self.dismissal),
        }
    }
}

async fn listen(
    controller: SessionController,
    mut events: mpsc::UnboundedReceiver<ProviderEvent>,
    grace: Duration,
) {
    match tokio::time::timeout(grace, events.recv()).await {
        Ok(Some(event)) => controller.handle_provider_event(event),
        Ok(None) => {
            tracing::debug!("Provider subscription closed during bootstrap");
            controller.settle_without_push();
            return;
        }
        Err(_) => {
            tracing::debug!(
                grace_ms = grace.as_millis() as u64,
                "No provider push during bootstrap, keeping snapshot"
            );
            controller.settle_without_push();
        }
    }

    while let Some(event) = events.recv().await {
        controller.handle_provider_event(event);
    }

    tracing::debug!("Provider subscription closed");
}
