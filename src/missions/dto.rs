use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

/// Mission category. Wire names are the French labels used by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionCategory {
    #[serde(rename = "Nettoyage")]
    Cleanup,
    #[serde(rename = "Plantation")]
    Planting,
    #[serde(rename = "Atelier")]
    Workshop,
    #[serde(rename = "Sensibilisation")]
    Awareness,
}

impl MissionCategory {
    pub const ALL: [Self; 4] = [Self::Cleanup, Self::Planting, Self::Workshop, Self::Awareness];

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Cleanup => "Nettoyage",
            Self::Planting => "Plantation",
            Self::Workshop => "Atelier",
            Self::Awareness => "Sensibilisation",
        }
    }
}

impl FromStr for MissionCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.wire_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown category: {s}")))
    }
}

/// A volunteer mission. Read-only from the client's perspective; created and
/// updated server-side only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub location: String,
    pub category: MissionCategory,
    pub capacity: u32,
    pub image: String,
}

/// A binding of one user to one mission. The identifier is server-assigned on
/// commit; provisional client-side identifiers never leave the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub user_id: String,
    pub mission_id: String,
}

/// Body for `POST /registrations`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration<'a> {
    pub user_id: &'a str,
    pub mission_id: &'a str,
}
