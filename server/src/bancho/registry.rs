// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use super::session::Session;

/// Process-wide session index. The three maps always agree: a token
/// is present in `by_token` iff its user id is in `token_by_user_id`
/// iff its safe name is in `token_by_name`.
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    by_token: HashMap<String, Arc<Session>>,
    token_by_user_id: HashMap<i32, String>,
    token_by_name: HashMap<String, String>,
}

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("user #{0} already has a live session")]
    DuplicateSession(i32),
    #[error("username {0:?} is taken by another live session")]
    NameTaken(String),
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Atomically insert into all three maps. The caller is expected
    /// to have evicted any conflicting session already; a conflict
    /// here leaves the registry untouched.
    pub fn register(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap();
        if inner.token_by_user_id.contains_key(&session.user_id) {
            return Err(RegistryError::DuplicateSession(session.user_id));
        }
        if let Some(token) = inner.token_by_name.get(&session.username_safe) {
            let other = &inner.by_token[token];
            if other.user_id != session.user_id {
                return Err(RegistryError::NameTaken(session.username_safe.clone()));
            }
        }
        inner
            .token_by_user_id
            .insert(session.user_id, session.token.clone());
        inner
            .token_by_name
            .insert(session.username_safe.clone(), session.token.clone());
        inner.by_token.insert(session.token.clone(), session);
        Ok(())
    }

    pub fn unregister(&self, session: &Session) {
        let mut inner = self.inner.write().unwrap();
        inner.by_token.remove(&session.token);
        inner.token_by_user_id.remove(&session.user_id);
        inner.token_by_name.remove(&session.username_safe);
    }

    pub fn by_token(&self, token: &str) -> Option<Arc<Session>> {
        self.inner.read().unwrap().by_token.get(token).cloned()
    }

    pub fn by_user_id(&self, user_id: i32) -> Option<Arc<Session>> {
        let inner = self.inner.read().unwrap();
        let token = inner.token_by_user_id.get(&user_id)?;
        inner.by_token.get(token).cloned()
    }

    pub fn by_name(&self, username_safe: &str) -> Option<Arc<Session>> {
        let inner = self.inner.read().unwrap();
        let token = inner.token_by_name.get(username_safe)?;
        inner.by_token.get(token).cloned()
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.inner
            .read()
            .unwrap()
            .by_token
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `bytes` to every registered non-restricted session's
    /// queue, except the excluded user ids.
    pub fn broadcast(&self, bytes: &[u8], exclude: &[i32]) {
        for session in self.sessions() {
            if session.is_restricted() || exclude.contains(&session.user_id) {
                continue;
            }
            session.enqueue(bytes);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bancho::session::{random_token, SessionConfig};
    use crate::geoloc::Geolocation;
    use packet::Privileges;

    fn session(user_id: i32, name: &str) -> Arc<Session> {
        Arc::new(Session::new(SessionConfig {
            user_id,
            username: name.to_owned(),
            token: random_token(),
            osu_version: "b20240820".to_owned(),
            utc_offset: 0,
            pm_private: false,
            privileges: Privileges::PLAYER,
            geo: Geolocation::fallback(),
            silence_end: 0,
            is_bot: false,
        }))
    }

    #[test]
    fn maps_agree_after_register_and_unregister() {
        let registry = Registry::new();
        let alice = session(3, "Alice B");
        registry.register(alice.clone()).unwrap();

        assert!(registry.by_token(&alice.token).is_some());
        assert!(registry.by_user_id(3).is_some());
        assert!(registry.by_name("alice_b").is_some());

        registry.unregister(&alice);
        assert!(registry.by_token(&alice.token).is_none());
        assert!(registry.by_user_id(3).is_none());
        assert!(registry.by_name("alice_b").is_none());
    }

    #[test]
    fn duplicate_user_id_is_rejected() {
        let registry = Registry::new();
        registry.register(session(3, "alice")).unwrap();
        assert_eq!(
            registry.register(session(3, "alice")),
            Err(RegistryError::DuplicateSession(3))
        );
    }

    #[test]
    fn name_collision_with_other_user_is_rejected() {
        let registry = Registry::new();
        registry.register(session(3, "alice")).unwrap();
        assert_eq!(
            registry.register(session(4, "Alice")),
            Err(RegistryError::NameTaken("alice".to_owned()))
        );
    }

    #[test]
    fn broadcast_skips_excluded_and_restricted() {
        let registry = Registry::new();
        let alice = session(3, "alice");
        let bob = session(4, "bob");
        let shadow = Arc::new(Session::new(SessionConfig {
            user_id: 5,
            username: "shadow".to_owned(),
            token: random_token(),
            osu_version: "b20240820".to_owned(),
            utc_offset: 0,
            pm_private: false,
            privileges: Privileges::SUPPORTER, // no PLAYER bit
            geo: Geolocation::fallback(),
            silence_end: 0,
            is_bot: false,
        }));
        registry.register(alice.clone()).unwrap();
        registry.register(bob.clone()).unwrap();
        registry.register(shadow.clone()).unwrap();

        registry.broadcast(&[0xff], &[alice.user_id]);
        assert!(alice.drain().is_empty());
        assert_eq!(bob.drain(), vec![0xff]);
        assert!(shadow.drain().is_empty());
    }
}
