use axum::Router;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::auth::login_handler,
        crate::api::handlers::auth::me_handler,
        crate::api::handlers::auth::logout_handler,
        crate::api::handlers::certificates::create_certificate_handler,
        crate::api::handlers::certificates::list_certificates_handler,
        crate::api::handlers::certificates::next_serial_handler,
        crate::api::handlers::certificates::delete_certificate_handler,
        crate::api::handlers::certificates::get_certificate_handler,
    ),
    components(
        schemas(
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::certificates::CreateCertificateResponse,
            crate::api::handlers::certificates::NextSerialResponse,
            crate::api::error::ErrorBody,
            crate::auth::LoginRequest,
            crate::auth::LoginResponse,
            crate::auth::AdminContext,
            crate::domain::Certificate,
            crate::domain::CreateCertificateInput,
        )
    ),
    tags(
        (name = "health", description = "Liveness and database reachability"),
        (name = "auth", description = "Admin login and session management"),
        (name = "certificates", description = "Certificate issuance and verification lookup")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build(),
            ),
        );
    }
}

pub fn docs_router() -> Router {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()).into()
}
