//! Civic Identity - user registration and role lookup
//!
//! Every gate in the lifecycle reads the caller's role from the record kept
//! here, never from what a client claims. Signup rules mirror the public
//! registration form: officials must present a government id and an
//! eight-digit official number.

#![deny(unsafe_code)]

use chrono::{NaiveDate, Utc};
use civic_storage::{CivicStorage, StorageError, UserStore};
use civic_types::{Actor, Role, User, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Length of the official number issued to government staff and employees.
pub const OFFICIAL_NUMBER_DIGITS: usize = 8;

/// Identity registry over the shared user store.
pub struct IdentityRegistry {
    storage: Arc<dyn CivicStorage>,
}

impl IdentityRegistry {
    pub fn new(storage: Arc<dyn CivicStorage>) -> Self {
        Self { storage }
    }

    /// Validate and register a new user.
    pub async fn register(&self, request: RegistrationRequest) -> Result<User, IdentityError> {
        request.validate()?;

        let email = request.email.trim().to_string();
        if self.storage.find_user_by_email(&email).await?.is_some() {
            return Err(IdentityError::EmailTaken(email));
        }

        let user = User {
            id: UserId::generate(),
            name: request.name.trim().to_string(),
            email,
            phone: Some(request.phone.trim().to_string()),
            role: request.role,
            government_id: non_empty(request.government_id),
            official_number: non_empty(request.official_number),
            department: non_empty(request.department),
            address: non_empty(request.address),
            dob: request.dob,
            created_at: Utc::now(),
        };

        self.storage.insert_user(user.clone()).await.map_err(|e| match e {
            // Lost a race with a concurrent signup for the same address.
            StorageError::Conflict(_) => IdentityError::EmailTaken(user.email.clone()),
            other => IdentityError::Storage(other),
        })?;

        tracing::info!(user_id = %user.id, role = %user.role, "Registered user");
        Ok(user)
    }

    /// Lookup a user by id.
    pub async fn lookup(&self, id: &UserId) -> Result<Option<User>, IdentityError> {
        Ok(self.storage.get_user(id).await?)
    }

    /// Resolve an authenticated id to an actor carrying the stored role.
    pub async fn resolve_actor(&self, id: &UserId) -> Result<Actor, IdentityError> {
        self.lookup(id)
            .await?
            .map(|user| user.actor())
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }

    pub async fn list_by_role(&self, role: Role) -> Result<Vec<User>, IdentityError> {
        Ok(self.storage.list_users(Some(role)).await?)
    }

    /// Apply a profile update. Role and email are fixed at signup.
    pub async fn update_profile(
        &self,
        id: &UserId,
        update: ProfileUpdate,
    ) -> Result<User, IdentityError> {
        let mut user = self
            .lookup(id)
            .await?
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))?;

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(IdentityError::Validation("name must not be empty".to_string()));
            }
            user.name = name.to_string();
        }
        if let Some(phone) = update.phone {
            let phone = phone.trim();
            if phone.is_empty() {
                return Err(IdentityError::Validation("phone must not be empty".to_string()));
            }
            user.phone = Some(phone.to_string());
        }
        if update.address.is_some() {
            user.address = non_empty(update.address);
        }
        if update.department.is_some() {
            user.department = non_empty(update.department);
        }
        if update.dob.is_some() {
            user.dob = update.dob;
        }

        self.storage.update_user(user.clone()).await?;
        tracing::debug!(user_id = %user.id, "Updated profile");
        Ok(user)
    }
}

/// Signup form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    #[serde(default)]
    pub government_id: Option<String>,
    #[serde(default)]
    pub official_number: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
}

impl RegistrationRequest {
    fn validate(&self) -> Result<(), IdentityError> {
        if self.name.trim().is_empty() {
            return Err(IdentityError::Validation("name must not be empty".to_string()));
        }
        if !is_plausible_email(&self.email) {
            return Err(IdentityError::Validation(format!(
                "'{}' is not a valid email address",
                self.email.trim()
            )));
        }
        if self.phone.trim().is_empty() {
            return Err(IdentityError::Validation("phone number is required".to_string()));
        }

        let official_number = self
            .official_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        if self.role.is_official() {
            let has_government_id = self
                .government_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty());
            if !has_government_id {
                return Err(IdentityError::Validation(format!(
                    "government id is required for {} accounts",
                    self.role
                )));
            }
            let valid_number = official_number.is_some_and(|n| {
                n.len() == OFFICIAL_NUMBER_DIGITS && n.chars().all(|c| c.is_ascii_digit())
            });
            if !valid_number {
                return Err(IdentityError::Validation(format!(
                    "official number must be exactly {OFFICIAL_NUMBER_DIGITS} digits"
                )));
            }
        } else if official_number.is_some() {
            return Err(IdentityError::Validation(
                "citizens may not carry an official number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Identity-related errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid registration: {0}")]
    Validation(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
