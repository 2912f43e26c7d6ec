use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::api::{self, Gateway};
use crate::cache::{CacheKey, CacheStore};
use crate::error::Error;
use crate::missions::dto::{NewRegistration, Registration};
use crate::missions::repo;

const PROVISIONAL_PREFIX: &str = "pending-";

/// True for placeholder identifiers minted for optimistic entries. These never
/// reach the server and are never persisted as real identifiers.
pub fn is_provisional(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}

fn provisional_id() -> String {
    format!(
        "{PROVISIONAL_PREFIX}{}",
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationState {
    Pending,
    Committed,
    RolledBack,
}

/// One optimistic mutation of a cache key. Holds the pre-mutation snapshot in
/// its own state so settlement never depends on captured context.
struct Mutation {
    key: CacheKey,
    snapshot: Option<Value>,
    state: MutationState,
}

impl Mutation {
    /// Enter the pending state: supersede any in-flight fetch for the key so
    /// a late stale read cannot clobber the optimistic write, then capture
    /// the rollback snapshot.
    fn begin(cache: &CacheStore, key: CacheKey) -> Self {
        cache.cancel_fetches(&key);
        let snapshot = cache.snapshot(&key);
        debug!(%key, "mutation pending");
        Self {
            key,
            snapshot,
            state: MutationState::Pending,
        }
    }

    fn commit(&mut self) {
        debug!(key = %self.key, "mutation committed");
        self.state = MutationState::Committed;
    }

    fn roll_back(&mut self, cache: &CacheStore) {
        cache.restore(&self.key, self.snapshot.take());
        debug!(key = %self.key, "mutation rolled back");
        self.state = MutationState::RolledBack;
    }
}

/// Result of an unregister call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unregistered {
    Removed,
    /// The target was already gone from the collection; nothing was done.
    AlreadyAbsent,
}

/// Optimistic register/unregister against the registrations collection.
///
/// Each mutation appends or removes an entry in the cache first for immediate
/// feedback, then reconciles with server truth: invalidate on success so the
/// next read refetches the authoritative collection, restore the snapshot on
/// failure.
pub struct RegistrationSync {
    gateway: Arc<dyn Gateway>,
    cache: Arc<CacheStore>,
    /// Provisional ids unregistered while their create request was in flight;
    /// the pending register compensates by deleting the committed entry.
    cancelled: Mutex<HashSet<String>>,
}

impl RegistrationSync {
    pub fn new(gateway: Arc<dyn Gateway>, cache: Arc<CacheStore>) -> Self {
        Self {
            gateway,
            cache,
            cancelled: Mutex::new(HashSet::new()),
        }
    }

    fn take_cancelled(&self, provisional: &str) -> bool {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(provisional)
    }

    fn mark_cancelled(&self, provisional: &str) {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provisional.to_string());
    }

    async fn current_registrations(&self) -> Result<Vec<Registration>, Error> {
        repo::list_registrations(self.gateway.as_ref(), &self.cache).await
    }

    /// Register `user_id` for `mission_id`. A registration already held for
    /// the pair is refused with `Error::Conflict` before anything is written.
    pub async fn register(&self, user_id: &str, mission_id: &str) -> Result<Registration, Error> {
        let current = self.current_registrations().await?;
        if current
            .iter()
            .any(|r| r.user_id == user_id && r.mission_id == mission_id)
        {
            return Err(Error::Conflict("Already registered for this mission".into()));
        }

        let mut mutation = Mutation::begin(&self.cache, CacheKey::Registrations);
        let provisional = provisional_id();
        let mut optimistic: Vec<Registration> = match &mutation.snapshot {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
            None => Vec::new(),
        };
        optimistic.push(Registration {
            id: provisional.clone(),
            user_id: user_id.to_string(),
            mission_id: mission_id.to_string(),
        });
        self.cache
            .set(&CacheKey::Registrations, serde_json::to_value(&optimistic)?);
        debug!(%user_id, %mission_id, %provisional, "optimistic registration applied");

        let body = NewRegistration {
            user_id,
            mission_id,
        };
        match api::post::<Registration, _>(self.gateway.as_ref(), "/registrations", &body).await {
            Ok(created) => {
                mutation.commit();
                self.cache.invalidate(&CacheKey::Registrations);
                info!(%user_id, %mission_id, registration_id = %created.id, "registration committed");
                if self.take_cancelled(&provisional) {
                    // The user unregistered while the create was in flight;
                    // remove the committed entry so no binding survives.
                    let path = format!("/registrations/{}", created.id);
                    match self.gateway.delete(&path).await {
                        Ok(()) => info!(registration_id = %created.id, "pending registration compensated"),
                        Err(e) => {
                            warn!(error = %e, registration_id = %created.id, "compensating delete failed")
                        }
                    }
                    self.cache.invalidate(&CacheKey::Registrations);
                }
                Ok(created)
            }
            Err(e) => {
                mutation.roll_back(&self.cache);
                warn!(error = %e, %user_id, %mission_id, "register failed, cache restored");
                Err(e)
            }
        }
    }

    /// Remove a registration. Unregistering an id that is already absent is a
    /// graceful no-op, so calling this twice never corrupts state.
    pub async fn unregister(&self, registration_id: &str) -> Result<Unregistered, Error> {
        let current = self.current_registrations().await?;
        if !current.iter().any(|r| r.id == registration_id) {
            debug!(%registration_id, "unregister target already absent");
            return Ok(Unregistered::AlreadyAbsent);
        }

        let mut mutation = Mutation::begin(&self.cache, CacheKey::Registrations);
        let regs: Vec<Registration> = match &mutation.snapshot {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
            None => Vec::new(),
        };
        let remaining: Vec<Registration> = regs
            .into_iter()
            .filter(|r| r.id != registration_id)
            .collect();
        self.cache
            .set(&CacheKey::Registrations, serde_json::to_value(&remaining)?);

        if is_provisional(registration_id) {
            // The entry only ever existed locally; there is nothing to delete
            // server-side. Flag it so the in-flight register compensates.
            self.mark_cancelled(registration_id);
            mutation.commit();
            info!(%registration_id, "provisional registration cancelled locally");
            return Ok(Unregistered::Removed);
        }

        match self
            .gateway
            .delete(&format!("/registrations/{registration_id}"))
            .await
        {
            Ok(()) => {
                mutation.commit();
                self.cache.invalidate(&CacheKey::Registrations);
                info!(%registration_id, "unregistered");
                Ok(Unregistered::Removed)
            }
            Err(e) => {
                mutation.roll_back(&self.cache);
                warn!(error = %e, %registration_id, "unregister failed, cache restored");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod registration_sync_tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::FakeGateway;
    use crate::config::CachePolicy;

    fn sync_with(gateway: Arc<FakeGateway>) -> Arc<RegistrationSync> {
        let cache = Arc::new(CacheStore::new(CachePolicy::default()));
        Arc::new(RegistrationSync::new(gateway, cache))
    }

    fn reg_json(id: &str, user_id: &str, mission_id: &str) -> Value {
        json!({ "id": id, "userId": user_id, "missionId": mission_id })
    }

    fn cached_registrations(sync: &RegistrationSync) -> Vec<Registration> {
        sync.cache
            .get_as::<Vec<Registration>>(&CacheKey::Registrations)
            .map(|c| c.value)
            .unwrap_or_default()
    }

    async fn wait_for_provisional(sync: &RegistrationSync) -> Registration {
        for _ in 0..1000 {
            if let Some(reg) = cached_registrations(sync)
                .into_iter()
                .find(|r| is_provisional(&r.id))
            {
                return reg;
            }
            tokio::task::yield_now().await;
        }
        panic!("no provisional registration appeared");
    }

    #[tokio::test]
    async fn register_shows_provisional_entry_before_settlement() {
        let gateway = FakeGateway::new();
        gateway.respond("GET /registrations", Ok(json!([])));
        gateway.respond("POST /registrations", Ok(reg_json("r9", "u1", "m1")));
        let release = gateway.gate("POST /registrations");
        let sync = sync_with(gateway.clone());

        let task = tokio::spawn({
            let sync = sync.clone();
            async move { sync.register("u1", "m1").await }
        });

        let provisional = wait_for_provisional(&sync).await;
        assert_eq!(provisional.user_id, "u1");
        assert_eq!(provisional.mission_id, "m1");

        release.notify_one();
        let created = task.await.unwrap().unwrap();
        assert_eq!(created.id, "r9");

        // Settlement invalidated the key; the next read refetches and the
        // authoritative entry replaces the provisional one, no duplicate.
        assert!(sync.cache.get(&CacheKey::Registrations).unwrap().is_stale);
        gateway.respond("GET /registrations", Ok(json!([reg_json("r9", "u1", "m1")])));
        let regs = sync.current_registrations().await.unwrap();
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].id, "r9");
    }

    #[tokio::test]
    async fn failed_register_restores_the_exact_snapshot() {
        let gateway = FakeGateway::new();
        let sync = sync_with(gateway.clone());
        let seeded = json!([reg_json("r1", "u2", "m3")]);
        sync.cache.set(&CacheKey::Registrations, seeded.clone());
        gateway.respond(
            "POST /registrations",
            Err(Error::api(500, "insert failed")),
        );

        let err = sync.register("u1", "m1").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(
            sync.cache.get(&CacheKey::Registrations).unwrap().value,
            seeded
        );
    }

    #[tokio::test]
    async fn duplicate_registration_is_refused_before_dispatch() {
        let gateway = FakeGateway::new();
        let sync = sync_with(gateway.clone());
        sync.cache
            .set(&CacheKey::Registrations, json!([reg_json("r1", "u1", "m1")]));

        let err = sync.register("u1", "m1").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(gateway.calls().iter().all(|c| !c.starts_with("POST")));
    }

    #[tokio::test]
    async fn unregister_twice_is_a_noop_not_an_error() {
        let gateway = FakeGateway::new();
        let sync = sync_with(gateway.clone());
        sync.cache
            .set(&CacheKey::Registrations, json!([reg_json("r1", "u1", "m1")]));
        gateway.respond("DELETE /registrations/r1", Ok(Value::Null));

        assert_eq!(sync.unregister("r1").await.unwrap(), Unregistered::Removed);

        // Second call: the invalidated cache refetches and the entry is gone.
        gateway.respond("GET /registrations", Ok(json!([])));
        assert_eq!(
            sync.unregister("r1").await.unwrap(),
            Unregistered::AlreadyAbsent
        );
        let deletes = gateway
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("DELETE"))
            .count();
        assert_eq!(deletes, 1);
    }

    #[tokio::test]
    async fn failed_unregister_restores_the_exact_snapshot() {
        let gateway = FakeGateway::new();
        let sync = sync_with(gateway.clone());
        let seeded = json!([reg_json("r1", "u1", "m1"), reg_json("r2", "u2", "m1")]);
        sync.cache.set(&CacheKey::Registrations, seeded.clone());
        gateway.respond(
            "DELETE /registrations/r1",
            Err(Error::Network("connection reset".into())),
        );

        let err = sync.unregister("r1").await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(
            sync.cache.get(&CacheKey::Registrations).unwrap().value,
            seeded
        );
    }

    #[tokio::test]
    async fn rapid_register_then_unregister_leaves_no_binding() {
        let gateway = FakeGateway::new();
        gateway.respond("GET /registrations", Ok(json!([])));
        gateway.respond("POST /registrations", Ok(reg_json("r9", "u1", "m1")));
        gateway.respond("DELETE /registrations/r9", Ok(Value::Null));
        let release = gateway.gate("POST /registrations");
        let sync = sync_with(gateway.clone());

        let task = tokio::spawn({
            let sync = sync.clone();
            async move { sync.register("u1", "m1").await }
        });

        let provisional = wait_for_provisional(&sync).await;
        assert_eq!(
            sync.unregister(&provisional.id).await.unwrap(),
            Unregistered::Removed
        );

        release.notify_one();
        task.await.unwrap().unwrap();

        // The provisional id never reached the server, the committed entry
        // was compensated, and a fresh read shows no binding for (u1, m1).
        let calls = gateway.calls();
        assert!(calls.iter().all(|c| !c.contains(PROVISIONAL_PREFIX)));
        assert!(calls.contains(&"DELETE /registrations/r9".to_string()));

        gateway.respond("GET /registrations", Ok(json!([])));
        let regs = sync.current_registrations().await.unwrap();
        assert!(regs.is_empty());
        assert!(regs.iter().all(|r| !is_provisional(&r.id)));
    }

    #[tokio::test]
    async fn mutation_snapshot_round_trips_through_rollback() {
        let cache = CacheStore::new(CachePolicy::default());
        cache.set(&CacheKey::Registrations, json!(["before"]));

        let mut mutation = Mutation::begin(&cache, CacheKey::Registrations);
        assert_eq!(mutation.state, MutationState::Pending);
        cache.set(&CacheKey::Registrations, json!(["after"]));

        mutation.roll_back(&cache);
        assert_eq!(mutation.state, MutationState::RolledBack);
        assert_eq!(
            cache.get(&CacheKey::Registrations).unwrap().value,
            json!(["before"])
        );
    }
}
