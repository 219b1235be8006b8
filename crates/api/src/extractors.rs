//! Request extractors.

use agora_common::AppError;
use agora_core::Capability;
use axum::{
    extract::{FromRequest, FromRequestParts, Query},
    http::request::Parts,
};

/// JSON request body. Malformed bodies are rejected with the API error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Query string parameters, rejected like [`JsonBody`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Verified capability, required.
#[derive(Debug, Clone)]
pub struct RequireCapability(pub Capability);

impl<S> FromRequestParts<S> for RequireCapability
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        parts
            .extensions
            .get::<Capability>()
            .cloned()
            .map(RequireCapability)
            .ok_or(AppError::Unauthorized)
    }
}

/// Verified capability, if the request carried one.
#[derive(Debug, Clone)]
pub struct MaybeCapability(pub Option<Capability>);

impl<S> FromRequestParts<S> for MaybeCapability
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Capability>().cloned()))
    }
}
