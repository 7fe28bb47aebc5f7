//! OpenAPI documentation for the authentication API.

use utoipa::OpenApi;

use crate::api::{handlers, models};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::request_magic_link,
        handlers::auth::verify_magic_link,
        handlers::auth::logout,
        handlers::users::get_current_session,
    ),
    components(schemas(
        models::auth::MagicLinkRequest,
        models::auth::MagicLinkResponse,
        models::auth::MeResponse,
        models::auth::LogoutResponse,
        models::users::Role,
        models::users::SessionUser,
    )),
    tags(
        (name = "authentication", description = "Magic-link sign-in and session management"),
        (name = "users", description = "Current session identity"),
    ),
    info(
        title = "SOP Library Authentication API",
        description = "Passwordless authentication and session management for the SOP document library.",
    )
)]
pub struct ApiDoc;
