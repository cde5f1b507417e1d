//! OpenAPI document for the HTTP surface, served at `/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::me::me,
        crate::api::handlers::auth::register::register,
        crate::api::handlers::auth::login::login,
        crate::api::handlers::auth::session::session,
        crate::api::handlers::auth::session::refresh,
        crate::api::handlers::auth::session::logout,
        crate::api::handlers::auth::reset::forgot_password,
        crate::api::handlers::auth::reset::verify_reset_code,
        crate::api::handlers::auth::reset::reset_password,
    ),
    components(schemas(
        crate::api::handlers::health::Health,
        crate::api::handlers::auth::types::RegisterRequest,
        crate::api::handlers::auth::types::LoginRequest,
        crate::api::handlers::auth::types::LoginResponse,
        crate::api::handlers::auth::types::RefreshResponse,
        crate::api::handlers::auth::types::SessionResponse,
        crate::api::handlers::auth::types::MessageResponse,
        crate::api::handlers::auth::types::ForgotPasswordRequest,
        crate::api::handlers::auth::types::VerifyResetCodeRequest,
        crate::api::handlers::auth::types::ResetPasswordRequest,
    )),
    tags(
        (name = "auth", description = "Session lifecycle"),
        (name = "recovery", description = "Password recovery"),
        (name = "me", description = "Authenticated caller"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
