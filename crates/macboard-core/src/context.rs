//! Browsing context container
//!
//! One instance per tab or window. Owns exactly one session controller and
//! its watchdog for the lifetime of the UI root: `mount` to `unmount`.
//! Sibling contexts of the same origin share only the store.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use macboard_auth::{
    IdentityProvider, SessionController, SessionPhase, SessionView, User, Watchdog,
};
use macboard_storage::{Database, KeyValueStore};

use crate::config::Config;
use crate::Result;

pub struct BrowsingContext {
    id: String,
    mounted_at: DateTime<Utc>,
    controller: SessionController,
    watchdog: Option<Watchdog>,
}

impl BrowsingContext {
    /// Open the configured database and mount a context on it.
    pub fn open(config: &Config, provider: Arc<dyn IdentityProvider>) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.database_path)?;
        Self::mount(config, Arc::new(db), provider)
    }

    /// Mount a context on `store`: bootstrap the session, subscribe to the
    /// provider and start the watchdog. Must be called from within a tokio
    /// runtime. Fails on an invalid `config`.
    pub fn mount(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4().to_string();
        let controller = SessionController::new(store, provider, config.controller_options());
        controller.initialize();

        let watchdog = Watchdog::spawn(controller.clone(), config.watchdog_interval());

        tracing::info!(
            context_id = %id,
            watchdog_interval_ms = config.watchdog_interval_ms,
            "Mounted browsing context"
        );

        Ok(Self {
            id,
            mounted_at: Utc::now(),
            controller,
            watchdog: Some(watchdog),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mounted_at(&self) -> DateTime<Utc> {
        self.mounted_at
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn is_mounted(&self) -> bool {
        self.watchdog.is_some()
    }

    // === Presentation surface ===

    pub fn view(&self) -> SessionView {
        self.controller.view()
    }

    pub fn phase(&self) -> SessionPhase {
        self.controller.phase()
    }

    pub async fn sign_in_interactive(&self) -> Option<User> {
        self.controller.sign_in_interactive().await
    }

    pub async fn sign_in_anonymous(&self) -> Option<User> {
        self.controller.sign_in_anonymous().await
    }

    pub async fn sign_out(&self) {
        self.controller.sign_out().await;
    }

    pub fn clear_error(&self) {
        self.controller.clear_error();
    }

    /// Tear down the watchdog and the provider subscription. Session state
    /// in the store is left as is.
    pub fn unmount(&mut self) {
        let Some(watchdog) = self.watchdog.take() else {
            return;
        };

        watchdog.stop();
        self.controller.shutdown();

        tracing::info!(
            context_id = %self.id,
            uptime_secs = (Utc::now() - self.mounted_at).num_seconds(),
            "Unmounted browsing context"
        );
    }
}

impl Drop for BrowsingContext {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macboard_auth::testing::{provider_user, MockProvider};
    use macboard_auth::{ProviderEvent, FORCE_LOGOUT_KEY};
    use crate::error::CoreError;
    use macboard_storage::MemoryStore;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> Config {
        Config::new(PathBuf::from("/tmp/macboard-test"))
    }

    fn mount(store: &Arc<dyn KeyValueStore>, provider: &Arc<MockProvider>) -> BrowsingContext {
        BrowsingContext::mount(
            &config(),
            Arc::clone(store),
            Arc::clone(provider) as Arc<dyn IdentityProvider>,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_in_one_context_reaches_the_other() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let provider_a = Arc::new(MockProvider::new());
        let provider_b = Arc::new(MockProvider::new());
        provider_a.queue_interactive(Ok(provider_user("uid-1", "Ada")));
        provider_b.queue_interactive(Ok(provider_user("uid-1", "Ada")));

        let a = mount(&store, &provider_a);
        let b = mount(&store, &provider_b);

        let user = a.sign_in_interactive().await.unwrap();
        assert_eq!(a.phase(), SessionPhase::Authenticated(user));
        b.sign_in_interactive().await.unwrap();

        b.sign_out().await;
        assert_eq!(b.phase(), SessionPhase::Unauthenticated);
        // A's provider subscription never fires; only the signal moves A
        assert!(!a.view().is_authenticated);
        assert!(a.view().user.is_some());

        tokio::time::sleep(config().watchdog_interval()).await;

        assert!(a.view().user.is_none());
        assert_eq!(a.phase(), SessionPhase::Unauthenticated);
        assert_eq!(provider_a.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_dominates_any_push_order() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let context = mount(&store, &provider);

        let present = ProviderEvent::Changed(Some(provider_user("uid-1", "Ada")));
        let absent = ProviderEvent::Changed(None);

        for events in [
            vec![present.clone(), absent.clone()],
            vec![absent.clone(), present.clone()],
            vec![present.clone(), present.clone()],
        ] {
            store.set(FORCE_LOGOUT_KEY, "true").unwrap();
            for event in events {
                provider.push(event);
                tokio::task::yield_now().await;
                assert!(!context.view().is_authenticated);
            }
            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert!(!context.view().is_authenticated);

            // Lowering the signal lets a fresh push through again
            store.remove(FORCE_LOGOUT_KEY).unwrap();
            provider.push(present.clone());
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            assert!(context.view().is_authenticated);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_contexts_on_one_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path().to_path_buf());
        config.watchdog_interval_ms = 200;

        let provider_a = Arc::new(MockProvider::new());
        let provider_b = Arc::new(MockProvider::new());
        provider_a.queue_interactive(Ok(provider_user("uid-1", "Ada")));

        let a = BrowsingContext::open(
            &config,
            Arc::clone(&provider_a) as Arc<dyn IdentityProvider>,
        )
        .unwrap();
        a.sign_in_interactive().await.unwrap();

        // A second tab opened later restores the session from the snapshot
        let b = BrowsingContext::open(
            &config,
            Arc::clone(&provider_b) as Arc<dyn IdentityProvider>,
        )
        .unwrap();
        assert_eq!(b.phase(), SessionPhase::Loading);
        tokio::time::sleep(config.bootstrap_grace() + Duration::from_millis(50)).await;
        assert_eq!(b.view().user.unwrap().id, "uid-1");
        assert!(b.view().is_authenticated);

        a.sign_out().await;
        tokio::time::sleep(config.watchdog_interval()).await;

        assert!(b.view().user.is_none());
        assert!(!b.view().is_authenticated);
    }

    #[tokio::test]
    async fn test_mount_rejects_zero_watchdog_interval() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let mut config = config();
        config.watchdog_interval_ms = 0;

        let result = BrowsingContext::mount(
            &config,
            Arc::clone(&store),
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
        );

        assert!(matches!(result, Err(CoreError::Config(_))));
        assert_eq!(provider.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unmount_releases_subscription() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());

        let mut context = mount(&store, &provider);
        assert!(context.is_mounted());
        tokio::task::yield_now().await;
        assert_eq!(provider.subscriber_count(), 1);

        context.unmount();
        assert!(!context.is_mounted());
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.subscriber_count(), 0);

        // Unmounting twice is harmless
        context.unmount();
    }
}
