use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI specification for the alert-ingestion core, served at
/// `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Alert Ingestion Core API",
        version = "1.0.0",
        description = "Ingestion and serving core for a vendor alert-feed integration"
    ),
    paths(
        crate::api::handlers::health_handler,
        crate::api::handlers::dispatch_handler,
        crate::api::handlers::access_logs_handler,
        crate::api::handlers::clear_access_logs_handler,
    ),
    components(
        schemas(
            crate::api::handlers::HealthResponse,
            crate::api::handlers::AccessLogsResponse,
            crate::state::AccessLogEntry,
            crate::dispatcher::DispatchAction,
            crate::dispatcher::LookupEntityResult,
            crate::dispatcher::LookupEntityData,
            crate::dispatcher::LookupEntityDetails,
            crate::lookup::LookupEntity,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "dispatch", description = "Alert lookup, fetch, and render actions"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.openapi = utoipa::openapi::OpenApiVersion::Version31;

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
