//! Interfaces to the identity and mentor-profile collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, ErrorCode, Result};

/// Answers whether a mentor profile exists.
#[async_trait]
pub trait MentorDirectory: std::fmt::Debug + Send + Sync {
    async fn exists(&self, mentor_id: i64) -> Result<bool>;
}

/// Maps an authenticated principal to its canonical mentor id.
///
/// Implementations own the single mapping; the engine never falls back to
/// a second lookup path.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_mentor_id(&self, principal: &str) -> Result<i64>;
}

/// In-memory mentor directory and principal mapping.
#[derive(Debug, Default)]
pub struct KnownMentors {
    ids: RwLock<HashSet<i64>>,
    principals: RwLock<HashMap<String, i64>>,
}

impl KnownMentors {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: RwLock::new(ids.into_iter().collect()),
            principals: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, mentor_id: i64) {
        self.ids
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(mentor_id);
    }

    /// Registers the mentor and binds `principal` to it.
    pub fn bind(&self, principal: impl Into<String>, mentor_id: i64) {
        self.insert(mentor_id);
        self.principals
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(principal.into(), mentor_id);
    }
}

#[async_trait]
impl MentorDirectory for KnownMentors {
    async fn exists(&self, mentor_id: i64) -> Result<bool> {
        Ok(self
            .ids
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&mentor_id))
    }
}

#[async_trait]
impl IdentityResolver for KnownMentors {
    async fn resolve_mentor_id(&self, principal: &str) -> Result<i64> {
        self.principals
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(principal)
            .copied()
            .ok_or_else(|| {
                Error::rejected(
                    ErrorCode::MentorNotFound,
                    format!("No mentor profile found for principal {principal}"),
                )
            })
    }
}

pub(crate) async fn ensure_mentor(directory: &dyn MentorDirectory, mentor_id: i64) -> Result<()> {
    if directory.exists(mentor_id).await? {
        Ok(())
    } else {
        Err(Error::rejected(
            ErrorCode::MentorNotFound,
            format!("Mentor with ID {mentor_id} does not exist"),
        ))
    }
}
