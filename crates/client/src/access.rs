//! Token claims and client-side permission checks
//!
//! Tokens are decoded without verifying the signature: the backend is the
//! authority, this only decides what the client offers to do.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Token decoding errors
#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("token is not a three-part JWT")]
    Malformed,

    #[error("token payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is not a claims object: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Entry of an `authorities` claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Authority {
    Code(String),
    Object { authority: String },
}

impl Authority {
    pub fn code(&self) -> &str {
        match self {
            Self::Code(code) | Self::Object { authority: code } => code.as_str(),
        }
    }
}

/// Entry of a permission group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Permission {
    Code(String),
    Object { code: String },
}

impl Permission {
    pub fn code(&self) -> &str {
        match self {
            Self::Code(code) | Self::Object { code } => code.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Claims the client cares about
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub sub: Option<String>,
    pub role: Option<String>,
    pub authorities: Option<Vec<Authority>>,
    pub permission_groups: Option<Vec<PermissionGroup>>,
    pub exp: Option<i64>,
}

/// The shape a token's permission data takes, tried in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimShape {
    Authorities(Vec<String>),
    PermissionGroups(Vec<PermissionGroup>),
    Role(String),
    Empty,
}

impl TokenClaims {
    pub fn shape(&self) -> ClaimShape {
        if let Some(authorities) = self.authorities.as_ref().filter(|a| !a.is_empty()) {
            return ClaimShape::Authorities(
                authorities.iter().map(|a| a.code().to_string()).collect(),
            );
        }
        if let Some(groups) = self.permission_groups.as_ref().filter(|g| !g.is_empty()) {
            return ClaimShape::PermissionGroups(groups.clone());
        }
        match &self.role {
            Some(role) if !role.is_empty() => ClaimShape::Role(role.clone()),
            _ => ClaimShape::Empty,
        }
    }

    /// Role claim, or the first `ROLE_` authority without its prefix
    pub fn role(&self) -> Option<String> {
        if let Some(role) = self.role.as_ref().filter(|r| !r.is_empty()) {
            return Some(role.clone());
        }
        self.authorities
            .iter()
            .flatten()
            .find_map(|a| a.code().strip_prefix("ROLE_"))
            .map(str::to_string)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Tokens without `exp` never expire client-side
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| at <= now)
    }
}

/// Decode the payload segment of a JWT
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClaimsError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Role to persist next to a freshly issued token
pub fn role_from_token(token: &str) -> Option<String> {
    decode_claims(token).ok().and_then(|claims| claims.role())
}

/// What the current user may do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    role: Option<String>,
    codes: BTreeSet<String>,
}

impl PermissionSet {
    pub fn from_claims(claims: &TokenClaims) -> Self {
        let codes = match claims.shape() {
            ClaimShape::Authorities(codes) => codes.into_iter().collect(),
            ClaimShape::PermissionGroups(groups) => groups
                .iter()
                .flat_map(|g| g.permissions.iter().map(|p| p.code().to_string()))
                .collect(),
            ClaimShape::Role(_) | ClaimShape::Empty => BTreeSet::new(),
        };

        Self {
            role: claims.role(),
            codes,
        }
    }

    /// Permissions of a token; an undecodable token grants nothing
    pub fn from_token(token: &str) -> Self {
        decode_claims(token)
            .map(|claims| Self::from_claims(&claims))
            .unwrap_or_default()
    }

    /// Merge permission codes held on the user profile
    #[must_use]
    pub fn with_user_permissions<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.codes.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn is_admin(&self) -> bool {
        let admin = |r: &str| r.eq_ignore_ascii_case("ADMIN") || r.eq_ignore_ascii_case("ROLE_ADMIN");
        self.role.as_deref().is_some_and(admin) || self.codes.iter().any(|c| admin(c))
    }

    pub fn has(&self, code: &str) -> bool {
        self.is_admin() || self.codes.contains(code)
    }

    pub fn has_any(&self, codes: &[&str]) -> bool {
        self.is_admin() || codes.iter().any(|c| self.codes.contains(*c))
    }

    pub fn has_all(&self, codes: &[&str]) -> bool {
        self.is_admin() || codes.iter().all(|c| self.codes.contains(*c))
    }
}
