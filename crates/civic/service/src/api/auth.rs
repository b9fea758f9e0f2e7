//! Caller resolution.
//!
//! The gateway in front of civicd authenticates the caller and forwards
//! their user id in [`USER_HEADER`]. Roles always come from the stored user
//! record, never from the request.

use crate::error::ApiError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use civic_types::{Actor, Role, User, UserId};

pub const USER_HEADER: &str = "x-civic-user";

/// The authenticated caller's stored user record.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        self.0.actor()
    }

    pub fn require_government(&self) -> Result<(), ApiError> {
        match self.0.role {
            Role::Government => Ok(()),
            Role::Citizen | Role::Employee => Err(ApiError::Forbidden(format!(
                "{} accounts cannot access this resource",
                self.0.role
            ))),
        }
    }

    /// Government sees everyone; other roles only themselves.
    pub fn require_self_or_government(&self, id: &UserId) -> Result<(), ApiError> {
        if &self.0.id == id {
            return Ok(());
        }
        self.require_government()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::Unauthenticated(format!("missing {USER_HEADER} header")))?
            .to_str()
            .map_err(|_| ApiError::Unauthenticated(format!("malformed {USER_HEADER} header")))?
            .trim();
        if raw.is_empty() {
            return Err(ApiError::Unauthenticated(format!("empty {USER_HEADER} header")));
        }

        let user = state
            .identity
            .lookup(&UserId::new(raw))
            .await?
            .ok_or_else(|| ApiError::Unauthenticated(format!("unknown user {raw}")))?;
        Ok(CurrentUser(user))
    }
}
