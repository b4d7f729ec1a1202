//! Authenticated principal resolution.
//!
//! Credentials and sessions are issued by another system. This module only
//! maps a bearer token to a [`Principal`] so moderation and ownership checks
//! have someone to check against.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::api::AppState;
use crate::config::SessionConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Analyst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// Token lookup table. Only SHA-256 digests of tokens are kept in memory.
#[derive(Debug, Default, Clone)]
pub struct SessionDirectory {
    by_digest: HashMap<String, Principal>,
}

impl SessionDirectory {
    pub fn from_config(sessions: &[SessionConfig]) -> Self {
        let mut dir = Self::default();
        for s in sessions {
            dir.register(
                &s.token,
                Principal {
                    id: s.user_id.clone(),
                    name: s.name.clone(),
                    role: s.role,
                },
            );
        }
        dir
    }

    pub fn register(&mut self, token: &str, principal: Principal) {
        self.by_digest.insert(token_digest(token), principal);
    }

    pub fn resolve(&self, token: &str) -> Option<Principal> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        self.by_digest.get(&token_digest(token)).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }
}

fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// Extractor: a request carrying a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        bearer_token(parts)
            .and_then(|t| state.sessions.resolve(t))
            .map(AuthPrincipal)
            .ok_or(AppError::Unauthorized)
    }
}

impl OptionalFromRequestParts<AppState> for AuthPrincipal {
    type Rejection = AppError;

    /// Missing header means anonymous; a present but unknown token is rejected.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts) {
            None => Ok(None),
            Some(t) => state
                .sessions
                .resolve(t)
                .map(|p| Some(AuthPrincipal(p)))
                .ok_or(AppError::Unauthorized),
        }
    }
}
