//! Request and response types for the authentication endpoints.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::models::users::SessionUser;

/// Body for requesting a magic login link
#[derive(Debug, Deserialize, ToSchema)]
pub struct MagicLinkRequest {
    pub email: String,
}

/// Acknowledgement returned for every magic-link request.
///
/// The body is identical whether or not the address maps to an account.
#[derive(Debug, Serialize, ToSchema)]
pub struct MagicLinkResponse {
    pub ok: bool,
    pub message: String,
}

impl MagicLinkResponse {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            message: "If that address has an account, a sign-in link is on its way.".to_string(),
        }
    }
}

/// Query parameters for the verification endpoint
#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// Response for `/me`
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: Option<SessionUser>,
}

/// Response for logout
#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub ok: bool,
}

/// Wraps a response body with a Set-Cookie header
pub struct WithSessionCookie<T> {
    pub body: T,
    pub cookie: String,
}

impl<T: IntoResponse> IntoResponse for WithSessionCookie<T> {
    fn into_response(self) -> Response {
        let mut response = self.body.into_response();
        match header::HeaderValue::from_str(&self.cookie) {
            Ok(value) => {
                response.headers_mut().insert(header::SET_COOKIE, value);
                response
            }
            Err(e) => crate::errors::Error::Internal {
                operation: format!("encode session cookie: {e}"),
            }
            .into_response(),
        }
    }
}
