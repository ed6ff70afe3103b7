use actix_web::{HttpResponse, post, web};
use log::debug;

use crate::auth::AuthUser;
use crate::errors::{AppError, ProblemDetail};
use crate::models::{BrokerMessage, RoutingKeyQuery};
use crate::mq::{Broker, DIRECT_EXCHANGE, PUBSUB_EXCHANGE, TOPIC_EXCHANGE};

fn publish(
    broker: &Broker,
    exchange: &str,
    routing_key: &str,
    message: &BrokerMessage,
) -> Result<HttpResponse, AppError> {
    let reached = broker
        .publish(exchange, routing_key, message)
        .map_err(anyhow::Error::from)?;
    debug!("published to {exchange} with '{routing_key}', {reached} queue(s)");
    Ok(HttpResponse::Ok().content_type("text/plain").body("succeed"))
}

#[utoipa::path(
    post,
    path = "/amqp/publisher/test/simple-mode",
    request_body = BrokerMessage,
    params(RoutingKeyQuery),
    responses(
        (status = 200, body = String, description = "Always `succeed`"),
        (status = 401, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "amqp"
)]
#[post("/amqp/publisher/test/simple-mode")]
pub async fn publish_simple(
    _auth: AuthUser,
    broker: web::Data<Broker>,
    query: web::Query<RoutingKeyQuery>,
    payload: web::Json<BrokerMessage>,
) -> Result<HttpResponse, AppError> {
    publish(&broker, DIRECT_EXCHANGE, &query.routing_key, &payload)
}

#[utoipa::path(
    post,
    path = "/amqp/publisher/test/work-mode",
    request_body = BrokerMessage,
    params(RoutingKeyQuery),
    responses(
        (status = 200, body = String, description = "Always `succeed`"),
        (status = 401, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "amqp"
)]
#[post("/amqp/publisher/test/work-mode")]
pub async fn publish_work(
    _auth: AuthUser,
    broker: web::Data<Broker>,
    query: web::Query<RoutingKeyQuery>,
    payload: web::Json<BrokerMessage>,
) -> Result<HttpResponse, AppError> {
    publish(&broker, DIRECT_EXCHANGE, &query.routing_key, &payload)
}

#[utoipa::path(
    post,
    path = "/amqp/publisher/test/topic-mode",
    request_body = BrokerMessage,
    params(RoutingKeyQuery),
    responses(
        (status = 200, body = String, description = "Always `succeed`"),
        (status = 401, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "amqp"
)]
#[post("/amqp/publisher/test/topic-mode")]
pub async fn publish_topic(
    _auth: AuthUser,
    broker: web::Data<Broker>,
    query: web::Query<RoutingKeyQuery>,
    payload: web::Json<BrokerMessage>,
) -> Result<HttpResponse, AppError> {
    publish(&broker, TOPIC_EXCHANGE, &query.routing_key, &payload)
}

#[utoipa::path(
    post,
    path = "/amqp/publisher/test/pubsub-mode",
    request_body = BrokerMessage,
    responses(
        (status = 200, body = String, description = "Always `succeed`"),
        (status = 401, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "amqp"
)]
#[post("/amqp/publisher/test/pubsub-mode")]
pub async fn publish_pubsub(
    _auth: AuthUser,
    broker: web::Data<Broker>,
    payload: web::Json<BrokerMessage>,
) -> Result<HttpResponse, AppError> {
    publish(&broker, PUBSUB_EXCHANGE, "", &payload)
}
