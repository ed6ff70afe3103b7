use actix_web::{HttpRequest, HttpResponse, post, web};

use crate::auth::AuthUser;
use crate::errors::{AppError, ProblemDetail};
use crate::jwt::CookieJwt;
use crate::models::{SignInRequest, SignUpRequest};
use crate::service::SignService;

fn is_secure(req: &HttpRequest) -> bool {
    req.connection_info().scheme() == "https"
}

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in; the token is set as a cookie"),
        (status = 400, body = ProblemDetail),
        (status = 500, body = ProblemDetail)
    ),
    tag = "auth"
)]
#[post("/auth/sign-in")]
pub async fn sign_in(
    req: HttpRequest,
    service: web::Data<SignService>,
    jwt: web::Data<CookieJwt>,
    payload: web::Json<SignInRequest>,
) -> Result<HttpResponse, AppError> {
    let request = payload.into_inner();
    let user_id = web::block(move || service.sign_in(&request)).await??;
    let cookie = jwt.build_cookie(&user_id.to_string(), is_secure(&req))?;
    Ok(HttpResponse::Ok().cookie(cookie).finish())
}

#[utoipa::path(
    post,
    path = "/auth/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 400, body = ProblemDetail),
        (status = 500, body = ProblemDetail)
    ),
    tag = "auth"
)]
#[post("/auth/sign-up")]
pub async fn sign_up(
    service: web::Data<SignService>,
    payload: web::Json<SignUpRequest>,
) -> Result<HttpResponse, AppError> {
    let request = payload.into_inner();
    web::block(move || service.sign_up(&request)).await??;
    Ok(HttpResponse::Created().finish())
}

#[utoipa::path(
    post,
    path = "/auth/sign-out",
    responses(
        (status = 200, description = "Cookie cleared"),
        (status = 401, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "auth"
)]
#[post("/auth/sign-out")]
pub async fn sign_out(auth: AuthUser, jwt: web::Data<CookieJwt>) -> HttpResponse {
    log::info!("user {} signed out", auth.username);
    HttpResponse::Ok().cookie(jwt.removal_cookie()).finish()
}
