//! Shared fixtures: an in-memory user directory and session helpers.
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use aquamine_console::gate::{SessionClaims, SessionMetadata};
use aquamine_console::identity::{
    merge_metadata, DirectoryError, DirectoryUser, Metadata, UserDirectory, UserPage,
};

// ---

pub const SIGNING_KEY: &str = "test-signing-key";

/// Directory kept in memory, counting calls per operation. With `bare` set
/// it answers like a provider that returns unpaginated lists.
#[derive(Default, Clone)]
pub struct MemoryDirectory {
    pub users: Arc<Mutex<Vec<DirectoryUser>>>,
    pub bare: Arc<AtomicBool>,
    pub list_calls: Arc<AtomicUsize>,
    pub update_calls: Arc<AtomicUsize>,
}

impl MemoryDirectory {
    pub fn with_users(users: Vec<DirectoryUser>) -> Self {
        Self {
            users: Arc::new(Mutex::new(users)),
            ..Default::default()
        }
    }

    pub fn add(&self, user: DirectoryUser) {
        self.users.lock().unwrap().push(user);
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn find(&self, id: &str) -> Option<DirectoryUser> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }
}

impl UserDirectory for MemoryDirectory {
    async fn list_users(&self, limit: u32, offset: u32) -> Result<UserPage, DirectoryError> {
        // ---
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        if self.bare.load(Ordering::SeqCst) {
            return Ok(UserPage {
                users: users.clone(),
                paginated: false,
            });
        }

        Ok(UserPage {
            users: users
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect(),
            paginated: true,
        })
    }

    async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, DirectoryError> {
        self.find(user_id)
            .ok_or_else(|| DirectoryError::NotFound(user_id.to_string()))
    }

    async fn update_public_metadata(
        &self,
        user_id: &str,
        patch: Metadata,
    ) -> Result<DirectoryUser, DirectoryError> {
        // ---
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| DirectoryError::NotFound(user_id.to_string()))?;
        merge_metadata(&mut user.public_metadata, patch);
        Ok(user.clone())
    }
}

pub fn user(id: &str, email: &str, metadata: Value) -> DirectoryUser {
    serde_json::from_value(json!({
        "id": id,
        "email_addresses": [{ "id": format!("idn_{id}"), "email_address": email }],
        "primary_email_address_id": format!("idn_{id}"),
        "public_metadata": metadata
    }))
    .unwrap()
}

pub fn claims(sub: &str, role: Option<&str>, allowlisted: bool) -> SessionClaims {
    SessionClaims {
        sub: sub.to_string(),
        exp: 4_102_444_800,
        email: None,
        metadata: SessionMetadata {
            role: role.map(String::from),
            allowlisted: Some(allowlisted),
        },
    }
}

pub fn token(claims: &SessionClaims) -> String {
    sign(claims, SIGNING_KEY)
}

pub fn sign(claims: &SessionClaims, key: &str) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(key.as_bytes())).unwrap()
}
