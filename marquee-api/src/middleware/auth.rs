use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use marquee_core::identity::{Principal, Role};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

// ============================================================================
// JWT Claims
// ============================================================================

/// Issued by the identity provider; this service only verifies them
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    /// ADMIN, CLERK or CUSTOMER
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn principal(&self) -> Result<Principal, AppError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| AppError::forbidden(format!("unknown role {}", self.role)))?;
        Ok(Principal::new(self.sub.clone(), role))
    }
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Verify the bearer token and attach the caller's `Principal` to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::AuthenticationError("missing bearer token".into()))?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("invalid token: {}", e)))?;

    let principal = token_data.claims.principal()?;
    tracing::debug!("Authenticated {} as {}", principal.subject, principal.role);
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

// ============================================================================
// Role Checks
// ============================================================================

pub fn require_staff(principal: &Principal) -> Result<(), AppError> {
    if principal.is_staff() {
        Ok(())
    } else {
        Err(AppError::forbidden("counter staff only"))
    }
}

pub fn require_admin(principal: &Principal) -> Result<(), AppError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("administrators only"))
    }
}
