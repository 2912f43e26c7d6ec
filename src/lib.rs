//! Client-side data layer for the EcoAction volunteer-missions app.
//!
//! Typed REST access to missions, registrations and users; a key-based
//! in-memory cache with per-key staleness windows and in-flight fetch
//! coordination; optimistic register/unregister synchronization with rollback;
//! pure derived-view calculators; and a local session store for the
//! authenticated user.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod missions;
pub mod session;
pub mod state;
pub mod users;

pub use error::Error;
