use crate::api::{self, Gateway};
use crate::error::Error;
use crate::users::dto::{NewUser, User};

/// Users matching an exact email, via the backend's query-string filter.
pub async fn find_by_email(gateway: &dyn Gateway, email: &str) -> Result<Vec<User>, Error> {
    let encoded: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
    api::get(gateway, &format!("/users?email={encoded}")).await
}

pub async fn get_user(gateway: &dyn Gateway, id: &str) -> Result<User, Error> {
    api::get(gateway, &format!("/users/{id}")).await
}

pub async fn create_user(gateway: &dyn Gateway, new_user: &NewUser<'_>) -> Result<User, Error> {
    api::post(gateway, "/users", new_user).await
}
