//! Admin user-management actions.
//!
//! Every action re-checks that the caller holds `superadmin` before it
//! touches the directory. Listings always read the directory, so new
//! sign-ups show up on the next request.

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::gate::SessionClaims;
use crate::identity::{DirectoryError, DirectoryUser, Metadata, Role, UserDirectory};

// ---

/// Users requested per directory page.
pub const PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

pub struct AdminActions<D> {
    directory: D,
    superadmin_email: Option<String>,
}

impl<D: UserDirectory> AdminActions<D> {
    /// `superadmin_email` enables [`bootstrap_superadmin`](Self::bootstrap_superadmin);
    /// it is compared case-insensitively.
    pub fn new(directory: D, superadmin_email: Option<String>) -> Self {
        Self {
            directory,
            superadmin_email: superadmin_email.map(|e| e.to_lowercase()),
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// All users, fetched fresh from the directory.
    pub async fn list_users(&self, caller: &SessionClaims) -> Result<Vec<DirectoryUser>, AdminError> {
        ensure_superadmin(caller)?;
        Ok(self.fetch_all_users().await?)
    }

    /// Set or clear (`None`) a user's role.
    pub async fn set_role(
        &self,
        caller: &SessionClaims,
        user_id: &str,
        role: Option<Role>,
    ) -> Result<DirectoryUser, AdminError> {
        // ---
        ensure_superadmin(caller)?;

        let value = role.map_or(Value::Null, |r| Value::String(r.as_str().to_string()));
        let updated = self
            .directory
            .update_public_metadata(user_id, patch(json!({ "role": value })))
            .await?;

        info!(by = %caller.sub, user_id, role = ?role, "Role updated");
        Ok(updated)
    }

    pub async fn set_allowlisted(
        &self,
        caller: &SessionClaims,
        user_id: &str,
        allowlisted: bool,
    ) -> Result<DirectoryUser, AdminError> {
        // ---
        ensure_superadmin(caller)?;

        let updated = self
            .directory
            .update_public_metadata(user_id, patch(json!({ "allowlisted": allowlisted })))
            .await?;

        info!(by = %caller.sub, user_id, allowlisted, "Allowlist updated");
        Ok(updated)
    }

    /// Promote the configured superadmin email on first sign-in.
    ///
    /// Returns `Ok(true)` when the user was promoted. Does nothing when no
    /// bootstrap email is configured, the email does not match, or any
    /// superadmin already exists.
    pub async fn bootstrap_superadmin(&self, user_id: &str, email: &str) -> Result<bool, AdminError> {
        // ---
        let Some(expected) = self.superadmin_email.as_deref() else {
            return Ok(false);
        };
        if email.to_lowercase() != expected {
            return Ok(false);
        }

        let users = self.fetch_all_users().await?;
        if users.iter().any(|u| u.role() == Some(Role::Superadmin)) {
            info!("Bootstrap locked: superadmin already exists");
            return Ok(false);
        }

        self.directory
            .update_public_metadata(
                user_id,
                patch(json!({ "role": Role::Superadmin.as_str(), "allowlisted": true })),
            )
            .await?;

        warn!(user_id, email, "Bootstrapped superadmin");
        Ok(true)
    }

    async fn fetch_all_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        // ---
        let mut users = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.directory.list_users(PAGE_LIMIT, offset).await?;
            let last = !page.paginated || page.users.len() < PAGE_LIMIT as usize;
            users.extend(page.users);
            if last {
                break;
            }
            offset += PAGE_LIMIT;
        }

        Ok(users)
    }
}

fn ensure_superadmin(caller: &SessionClaims) -> Result<(), AdminError> {
    if caller.has_role(Role::Superadmin) {
        Ok(())
    } else {
        Err(AdminError::Unauthorized)
    }
}

fn patch(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        _ => Metadata::new(),
    }
}
