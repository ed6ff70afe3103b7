use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::errors::ProblemDetail;
use crate::handlers::system::HealthResponse;
use crate::models::{
    BindPermissionsRequest, BindRolesRequest, BrokerMessage, PermissionDto, RoleDto, SignInRequest,
    SignUpRequest, UserRolePermissionDto,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::system::health,
        crate::handlers::sign::sign_in,
        crate::handlers::sign::sign_up,
        crate::handlers::sign::sign_out,
        crate::handlers::urp::page_users,
        crate::handlers::urp::page_roles,
        crate::handlers::urp::page_permissions,
        crate::handlers::urp::bind_role_to_user,
        crate::handlers::urp::bind_permission_to_role,
        crate::handlers::amqp::publish_simple,
        crate::handlers::amqp::publish_work,
        crate::handlers::amqp::publish_topic,
        crate::handlers::amqp::publish_pubsub,
        crate::ws::chat_room
    ),
    components(
        schemas(
            HealthResponse,
            ProblemDetail,
            SignInRequest,
            SignUpRequest,
            UserRolePermissionDto,
            RoleDto,
            PermissionDto,
            BindRolesRequest,
            BindPermissionsRequest,
            BrokerMessage
        )
    ),
    tags(
        (name = "system", description = "System endpoints"),
        (name = "auth", description = "Cookie based sign in, sign up and sign out"),
        (name = "urp", description = "Users, roles and permissions"),
        (name = "amqp", description = "Message broker publishers"),
        (name = "chat", description = "STOMP chat room")
    ),
    info(
        title = "Base Platform API",
        version = "0.1.0",
        description = "Actix-Web service with cookie JWT auth, RBAC, broker, scheduler and chat"
    ),
    servers(
        (url = "/", description = "Current host")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("jwt"))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route_and_the_cookie_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/sign-in",
            "/urp/user",
            "/urp/role/{id}/bind-permission",
            "/amqp/publisher/test/pubsub-mode",
            "/chat-room",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("jwt_cookie"));
    }
}
