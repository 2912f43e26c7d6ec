use crate::api::Gateway;
use crate::cache::{read_through, CacheKey, CacheStore};
use crate::error::Error;
use crate::missions::dto::{Mission, Registration};

/// All missions, served from cache within its staleness window.
pub async fn list_missions(
    gateway: &dyn Gateway,
    cache: &CacheStore,
) -> Result<Vec<Mission>, Error> {
    read_through(cache, &CacheKey::Missions, || gateway.get_raw("/missions")).await
}

/// One mission by id, cached under its own key.
pub async fn get_mission(
    gateway: &dyn Gateway,
    cache: &CacheStore,
    id: &str,
) -> Result<Mission, Error> {
    let path = format!("/missions/{id}");
    read_through(cache, &CacheKey::Mission(id.to_string()), || async move {
        gateway.get_raw(&path).await
    })
    .await
}

/// The full registrations collection. Short staleness window; user actions
/// change this collection often.
pub async fn list_registrations(
    gateway: &dyn Gateway,
    cache: &CacheStore,
) -> Result<Vec<Registration>, Error> {
    read_through(cache, &CacheKey::Registrations, || {
        gateway.get_raw("/registrations")
    })
    .await
}
