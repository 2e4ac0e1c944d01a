//! Bearer-JWT authentication.
//!
//! Tokens are HS256-signed and must carry the national identity number in
//! the `pid` claim, the way the id-porten/tokenx chain issues them. Handlers
//! call [`verifiser`] first and use the returned pid as the owner ident.

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  /// National identity number of the authenticated end user.
  pub pid: String,
  pub exp: usize,
}

pub struct AuthConfig {
  nokkel:     DecodingKey,
  validering: Validation,
}

impl AuthConfig {
  pub fn ny(hemmelighet: &str) -> Self {
    Self {
      nokkel:     DecodingKey::from_secret(hemmelighet.as_bytes()),
      validering: Validation::new(Algorithm::HS256),
    }
  }
}

/// Check the `Authorization: Bearer` header and return the authenticated
/// pid.
pub fn verifiser(headers: &HeaderMap, auth: &AuthConfig) -> Result<String, ApiError> {
  let verdi = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(|| {
      ApiError::IkkeAutentisert("missing Authorization header".to_string())
    })?;

  let token = verdi.strip_prefix("Bearer ").ok_or_else(|| {
    ApiError::IkkeAutentisert("not a Bearer token".to_string())
  })?;

  let data = decode::<Claims>(token, &auth.nokkel, &auth.validering)
    .map_err(|e| ApiError::IkkeAutentisert(e.to_string()))?;

  Ok(data.claims.pid)
}
