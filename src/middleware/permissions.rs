//! Role-based authorization extractors
//!
//! Usage in handlers:
//! ```ignore
//! use crate::middleware::permissions::{Authorized, TeacherOnly};
//!
//! async fn create_course(
//!     Authorized(user, ..): Authorized<TeacherOnly>,
//!     State(state): State<AppState>,
//! ) -> Result<Json<CourseResponse>> {
//!     // Role already verified
//! }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::user_profile::Role;

/// Trait for role marker types
pub trait RoleRequirement: Send + Sync + 'static {
    const ROLE: Role;
}

/// Creates zero-sized marker types that implement `RoleRequirement`
macro_rules! define_roles {
    ($($(#[$meta:meta])* $name:ident => $role:expr),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $name;

            impl RoleRequirement for $name {
                const ROLE: Role = $role;
            }
        )*
    };
}

define_roles! {
    /// Course authors
    TeacherOnly => Role::Teacher,
    /// Learners
    StudentOnly => Role::Student,
}

/// Extractor that requires the authenticated user to hold a role.
///
/// Rejects with 401 when no session is attached and 403 for any other role.
#[derive(Debug, Clone)]
pub struct Authorized<R: RoleRequirement>(pub AuthenticatedUser, pub PhantomData<R>);

impl<R: RoleRequirement> Authorized<R> {
    pub fn user(&self) -> &AuthenticatedUser {
        &self.0
    }

    pub fn user_id(&self) -> i64 {
        self.0.id()
    }
}

fn authenticated_user(parts: &Parts) -> Result<AuthenticatedUser, AppError> {
    parts
        .extensions
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
}

impl<S, R> FromRequestParts<S> for Authorized<R>
where
    S: Send + Sync,
    R: RoleRequirement,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_user = authenticated_user(parts)?;

        if auth_user.role() != R::ROLE {
            return Err(AppError::Forbidden(format!(
                "{} role required.",
                capitalize(R::ROLE.as_str())
            )));
        }

        Ok(Authorized(auth_user, PhantomData))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Extractor for any authenticated user
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthenticatedUser);

impl Authenticated {
    pub fn user(&self) -> &AuthenticatedUser {
        &self.0
    }

    pub fn user_id(&self) -> i64 {
        self.0.id()
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Authenticated(authenticated_user(parts)?))
    }
}

/// The user when a session is present, for routes that also serve anonymous callers
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthenticated(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_markers() {
        assert_eq!(TeacherOnly::ROLE, Role::Teacher);
        assert_eq!(StudentOnly::ROLE, Role::Student);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("teacher"), "Teacher");
        assert_eq!(capitalize(""), "");
    }
}
