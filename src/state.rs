use std::sync::Arc;

use crate::api::{Gateway, HttpGateway};
use crate::cache::CacheStore;
use crate::config::AppConfig;
use crate::missions::services::RegistrationSync;
use crate::session::{FileSessionStore, SessionStore};
use crate::users::services::AuthService;

/// Composition root. Owns the single cache instance and the transport and
/// session seams; every consumer receives these by handle, no globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn Gateway>,
    pub cache: Arc<CacheStore>,
    pub session: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let gateway = Arc::new(HttpGateway::new(
            config.base_url.clone(),
            config.retry_attempts,
        )?) as Arc<dyn Gateway>;
        let cache = Arc::new(CacheStore::new(config.cache.clone()));
        let session =
            Arc::new(FileSessionStore::new(config.session_dir.clone())) as Arc<dyn SessionStore>;
        Ok(Self::from_parts(config, gateway, cache, session))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        gateway: Arc<dyn Gateway>,
        cache: Arc<CacheStore>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            gateway,
            cache,
            session,
        }
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.gateway.clone(), self.session.clone())
    }

    pub fn registration_sync(&self) -> RegistrationSync {
        RegistrationSync::new(self.gateway.clone(), self.cache.clone())
    }

    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::api::testing::FakeGateway>) {
        use crate::config::CachePolicy;
        use crate::session::MemorySessionStore;

        let config = Arc::new(AppConfig {
            base_url: "http://fake.local".into(),
            cache: CachePolicy::default(),
            retry_attempts: 0,
            session_dir: std::env::temp_dir(),
        });
        let gateway = crate::api::testing::FakeGateway::new();
        let cache = Arc::new(CacheStore::new(config.cache.clone()));
        let session = Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>;
        let state = Self::from_parts(config, gateway.clone() as Arc<dyn Gateway>, cache, session);
        (state, gateway)
    }
}

#[cfg(test)]
mod state_tests {
    use serde_json::json;

    use super::*;
    use crate::cache::CacheKey;
    use crate::missions::repo;

    #[tokio::test]
    async fn fake_state_wires_gateway_cache_and_session_together() {
        let (state, gateway) = AppState::fake();
        assert!(state.auth().restore().await.unwrap().is_none());

        gateway.respond("GET /registrations", Ok(json!([])));
        let regs = repo::list_registrations(state.gateway.as_ref(), &state.cache)
            .await
            .unwrap();
        assert!(regs.is_empty());
        assert!(state.cache.get(&CacheKey::Registrations).is_some());
    }
}
