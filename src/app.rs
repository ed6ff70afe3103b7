//! Application wiring shared by the server binary and the integration tests.

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::http::header::CACHE_CONTROL;
use actix_web::middleware::DefaultHeaders;
use actix_web::{HttpResponse, Responder, web};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::cache::VerifyCodeCache;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::handlers;
use crate::i18n::MessageSource;
use crate::jwt::CookieJwt;
use crate::mq::Broker;
use crate::openapi::ApiDoc;
use crate::service::{SignService, UserRolePermissionService};
use crate::store::UserRolePermissionStore;
use crate::ws::{self, ChatRoom};

/// Shared state every worker registers as `web::Data`.
#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub jwt: CookieJwt,
    pub urp: UserRolePermissionService,
    pub sign: SignService,
    pub broker: Arc<Broker>,
    pub chat: ChatRoom,
    pub verify_codes: VerifyCodeCache,
    pub messages: Arc<MessageSource>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn UserRolePermissionStore>,
        broker: Arc<Broker>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            jwt: CookieJwt::from_config(&config),
            urp: UserRolePermissionService::new(store.clone()),
            sign: SignService::new(store),
            broker,
            chat: ChatRoom::default(),
            verify_codes: VerifyCodeCache::default(),
            messages: Arc::new(MessageSource::embedded()?),
            config,
        })
    }
}

async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _| AppError::validation(err.to_string()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _| AppError::validation(err.to_string()).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _| AppError::validation(err.to_string()).into())
}

/// CORS from configuration; `*` allows any origin, method or header.
pub fn cors(config: &AppConfig) -> Cors {
    let wildcard = |values: &[String]| values.iter().any(|v| v == "*");

    let mut cors = Cors::default().supports_credentials().max_age(3600);
    if wildcard(&config.cors_allowed_origins) {
        cors = cors.allow_any_origin();
    } else {
        for origin in &config.cors_allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }
    cors = if wildcard(&config.cors_allowed_methods) {
        cors.allow_any_method()
    } else {
        cors.allowed_methods(config.cors_allowed_methods.iter().map(String::as_str))
    };
    if wildcard(&config.cors_allowed_headers) {
        cors.allow_any_header()
    } else {
        cors.allowed_headers(config.cors_allowed_headers.iter().map(String::as_str))
    }
}

/// Registers state, extractor error handlers and every route.
pub fn configure(cfg: &mut web::ServiceConfig, ctx: &AppContext) {
    cfg.app_data(web::Data::new(ctx.config.clone()))
        .app_data(web::Data::new(ctx.jwt.clone()))
        .app_data(web::Data::new(ctx.urp.clone()))
        .app_data(web::Data::new(ctx.sign.clone()))
        .app_data(web::Data::from(ctx.broker.clone()))
        .app_data(web::Data::new(ctx.chat.clone()))
        .app_data(web::Data::new(ctx.verify_codes.clone()))
        .app_data(web::Data::from(ctx.messages.clone()))
        .app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(handlers::health)
        .service(handlers::sign_in)
        .service(handlers::sign_up)
        .service(handlers::sign_out)
        .service(handlers::page_users)
        .service(handlers::page_roles)
        .service(handlers::page_permissions)
        .service(handlers::bind_role_to_user)
        .service(handlers::bind_permission_to_role)
        .service(handlers::publish_simple)
        .service(handlers::publish_work)
        .service(handlers::publish_topic)
        .service(handlers::publish_pubsub)
        .service(ws::chat_room)
        .route("/openapi.json", web::get().to(openapi_json))
        .service(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .service(
            web::scope(&ctx.config.static_resource_handler)
                .wrap(DefaultHeaders::new().add((CACHE_CONTROL, "max-age=60")))
                .service(Files::new("", &ctx.config.static_resource_location)),
        );
}
