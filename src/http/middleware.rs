//! Operator token verification
//!
//! Operators present an HS256 JWT signed with `OPERATOR_JWT_SECRET` whose
//! `role` claim is `operator`. Everyone else connects as a spectator.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::game::ViewerRole;
use crate::util::time::unix_millis;

type HmacSha256 = Hmac<Sha256>;

/// Role claim that grants operator access
pub const OPERATOR_ROLE: &str = "operator";

/// JWT claims carried by an operator token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorClaims {
    /// Subject (operator name)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    /// Role
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify a JWT token and extract claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<OperatorClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken);
    };

    // Verify signature (HMAC-SHA256)
    let message = format!("{}.{}", header_b64, payload_b64);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());

    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    mac.verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    // Decode payload
    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    let claims: OperatorClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    if claims.exp < unix_millis() / 1000 {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Decide a connecting viewer's role.
///
/// No token means spectator. A token that fails verification is an error so
/// a misconfigured operator client notices instead of silently losing access.
pub fn resolve_role(token: Option<&str>, secret: Option<&str>) -> Result<ViewerRole, AuthError> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(ViewerRole::Spectator);
    };
    let Some(secret) = secret else {
        return Err(AuthError::OperatorsDisabled);
    };

    let claims = verify_jwt(token, secret)?;
    if claims.role.as_deref() != Some(OPERATOR_ROLE) {
        return Err(AuthError::InsufficientRole);
    }

    Ok(ViewerRole::Operator)
}

/// Authentication error types
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token does not carry the operator role")]
    InsufficientRole,

    #[error("Operator access is disabled")]
    OperatorsDisabled,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::OperatorsDisabled => StatusCode::FORBIDDEN,
        };

        (status, self.to_string()).into_response()
    }
}
