use serde::{Deserialize, Serialize};

/// Aggregate counters shown on the profile screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub completed_missions: u32,
}

/// A user account. The password is only present transiently during auth
/// round trips and is stripped before anything is persisted or returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub stats: UserStats,
}

impl User {
    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }
}

/// Body for `POST /users`.
#[derive(Debug, Serialize)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub stats: UserStats,
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn password_is_omitted_from_serialization_when_absent() {
        let user = User {
            id: "u1".into(),
            name: "Sami".into(),
            email: "sami@example.com".into(),
            password: None,
            stats: UserStats {
                completed_missions: 0,
            },
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("completedMissions"));
    }

    #[test]
    fn password_deserializes_when_the_server_sends_one() {
        let user: User = serde_json::from_str(
            r#"{"id":"u1","name":"Sami","email":"sami@example.com","password":"s3cretpass","stats":{"completedMissions":2}}"#,
        )
        .unwrap();
        assert_eq!(user.password.as_deref(), Some("s3cretpass"));
        assert_eq!(user.stats.completed_missions, 2);
        assert!(user.without_password().password.is_none());
    }
}
