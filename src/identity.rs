//! Identity provider user directory.
//!
//! Users carry two pieces of public metadata the console cares about:
//! `role` (`admin` | `superadmin`) and `allowlisted`. [`UserDirectory`] is
//! the seam the admin actions talk to; [`ClerkDirectory`] implements it
//! over the provider's backend management API.

use std::{fmt, future::Future};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

// ---

/// Public metadata object. In updates, a `null` value removes the key.
pub type Metadata = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Unknown role names read as "no role".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryUser {
    // ---
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub public_metadata: Metadata,
}

impl DirectoryUser {
    pub fn role(&self) -> Option<Role> {
        self.public_metadata
            .get("role")
            .and_then(Value::as_str)
            .and_then(Role::parse)
    }

    pub fn is_allowlisted(&self) -> bool {
        self.public_metadata.get("allowlisted") == Some(&Value::Bool(true))
    }

    pub fn primary_email(&self) -> Option<&str> {
        // ---
        let primary_id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|e| e.id == primary_id)
            .map(|e| e.email_address.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("user not found: {0}")]
    NotFound(String),
}

/// One page of the user list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPage {
    pub users: Vec<DirectoryUser>,
    /// `false` when the provider returned the whole list unpaginated; there
    /// is nothing more to request.
    pub paginated: bool,
}

/// User management operations needed by the console.
pub trait UserDirectory: Send + Sync + 'static {
    /// One page of users, in provider order.
    fn list_users(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<UserPage, DirectoryError>> + Send;

    fn get_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<DirectoryUser, DirectoryError>> + Send;

    /// Merge `patch` into the user's public metadata; `null` values delete.
    fn update_public_metadata(
        &self,
        user_id: &str,
        patch: Metadata,
    ) -> impl Future<Output = Result<DirectoryUser, DirectoryError>> + Send;
}

/// Directory backed by the Clerk backend API.
#[derive(Debug, Clone)]
pub struct ClerkDirectory {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

/// The user list comes back either bare (unpaginated) or wrapped in
/// `{data: [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserPage {
    Bare(Vec<DirectoryUser>),
    Wrapped { data: Vec<DirectoryUser> },
}

impl From<RawUserPage> for UserPage {
    fn from(raw: RawUserPage) -> Self {
        match raw {
            RawUserPage::Bare(users) => Self {
                users,
                paginated: false,
            },
            RawUserPage::Wrapped { data } => Self {
                users: data,
                paginated: true,
            },
        }
    }
}

#[derive(Serialize)]
struct MetadataUpdate {
    public_metadata: Metadata,
}

impl ClerkDirectory {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn check(
        &self,
        response: reqwest::Response,
        user_id: Option<&str>,
    ) -> Result<reqwest::Response, DirectoryError> {
        // ---
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = user_id {
                return Err(DirectoryError::NotFound(id.to_string()));
            }
        }
        let message = response.text().await.unwrap_or_default();
        Err(DirectoryError::Status { status, message })
    }
}

impl UserDirectory for ClerkDirectory {
    async fn list_users(&self, limit: u32, offset: u32) -> Result<UserPage, DirectoryError> {
        // ---
        debug!(limit, offset, "Listing directory users");
        let response = self
            .http
            .get(format!("{}/v1/users", self.base_url))
            .bearer_auth(&self.secret_key)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        let page: RawUserPage = self.check(response, None).await?.json().await?;
        Ok(page.into())
    }

    async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, DirectoryError> {
        // ---
        let response = self
            .http
            .get(format!("{}/v1/users/{user_id}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Ok(self.check(response, Some(user_id)).await?.json().await?)
    }

    async fn update_public_metadata(
        &self,
        user_id: &str,
        patch: Metadata,
    ) -> Result<DirectoryUser, DirectoryError> {
        // ---
        debug!(user_id, keys = ?patch.keys().collect::<Vec<_>>(), "Updating public metadata");
        let response = self
            .http
            .patch(format!("{}/v1/users/{user_id}/metadata", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&MetadataUpdate {
                public_metadata: patch,
            })
            .send()
            .await?;

        Ok(self.check(response, Some(user_id)).await?.json().await?)
    }
}

/// Apply a metadata patch with the provider's merge semantics.
pub fn merge_metadata(current: &mut Metadata, patch: Metadata) {
    for (key, value) in patch {
        if value.is_null() {
            current.remove(&key);
        } else {
            current.insert(key, value);
        }
    }
}
