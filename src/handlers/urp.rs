use actix_web::{HttpResponse, get, post, web};

use crate::auth::AuthUser;
use crate::errors::{AppError, ProblemDetail};
use crate::models::{
    BindPermissionsRequest, BindRolesRequest, PageRequest, PageResponse, PermissionCode,
    PermissionDto, PermissionQuery, RoleDto, RoleQuery, UserQuery, UserRolePermissionDto,
};
use crate::service::UserRolePermissionService;

#[utoipa::path(
    get,
    path = "/urp/user",
    params(PageRequest, UserQuery),
    responses(
        (status = 200, body = PageResponse<UserRolePermissionDto>),
        (status = 401, body = ProblemDetail),
        (status = 403, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "urp"
)]
#[get("/urp/user")]
pub async fn page_users(
    auth: AuthUser,
    service: web::Data<UserRolePermissionService>,
    page: web::Query<PageRequest>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermissionCode::ReadUserRolePermission)?;
    let (page, query) = (page.into_inner(), query.into_inner());
    let result = web::block(move || service.page_query_user(&page, &query)).await??;
    Ok(HttpResponse::Ok().json(result))
}

#[utoipa::path(
    get,
    path = "/urp/role",
    params(PageRequest, RoleQuery),
    responses(
        (status = 200, body = PageResponse<RoleDto>),
        (status = 401, body = ProblemDetail),
        (status = 403, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "urp"
)]
#[get("/urp/role")]
pub async fn page_roles(
    auth: AuthUser,
    service: web::Data<UserRolePermissionService>,
    page: web::Query<PageRequest>,
    query: web::Query<RoleQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermissionCode::ReadUserRolePermission)?;
    let (page, query) = (page.into_inner(), query.into_inner());
    let result = web::block(move || service.page_query_role(&page, &query)).await??;
    Ok(HttpResponse::Ok().json(result))
}

#[utoipa::path(
    get,
    path = "/urp/permission",
    params(PageRequest, PermissionQuery),
    responses(
        (status = 200, body = PageResponse<PermissionDto>),
        (status = 401, body = ProblemDetail),
        (status = 403, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "urp"
)]
#[get("/urp/permission")]
pub async fn page_permissions(
    auth: AuthUser,
    service: web::Data<UserRolePermissionService>,
    page: web::Query<PageRequest>,
    query: web::Query<PermissionQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermissionCode::ReadUserRolePermission)?;
    let (page, query) = (page.into_inner(), query.into_inner());
    let result = web::block(move || service.page_query_permission(&page, &query)).await??;
    Ok(HttpResponse::Ok().json(result))
}

#[utoipa::path(
    post,
    path = "/urp/user/{id}/bind-role",
    request_body = BindRolesRequest,
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Roles replaced"),
        (status = 401, body = ProblemDetail),
        (status = 403, body = ProblemDetail),
        (status = 500, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "urp"
)]
#[post("/urp/user/{id}/bind-role")]
pub async fn bind_role_to_user(
    auth: AuthUser,
    service: web::Data<UserRolePermissionService>,
    path: web::Path<i64>,
    payload: web::Json<BindRolesRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermissionCode::WriteUserRolePermission)?;
    let user_id = path.into_inner();
    let role_ids = payload.into_inner().role_ids;
    web::block(move || service.bind_role_to_user(user_id, &role_ids)).await??;
    Ok(HttpResponse::Ok().finish())
}

#[utoipa::path(
    post,
    path = "/urp/role/{id}/bind-permission",
    request_body = BindPermissionsRequest,
    params(
        ("id" = i64, Path, description = "Role id")
    ),
    responses(
        (status = 200, description = "Permissions replaced"),
        (status = 401, body = ProblemDetail),
        (status = 403, body = ProblemDetail),
        (status = 500, body = ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "urp"
)]
#[post("/urp/role/{id}/bind-permission")]
pub async fn bind_permission_to_role(
    auth: AuthUser,
    service: web::Data<UserRolePermissionService>,
    path: web::Path<i64>,
    payload: web::Json<BindPermissionsRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermissionCode::WriteUserRolePermission)?;
    let role_id = path.into_inner();
    let permission_ids = payload.into_inner().permission_ids;
    web::block(move || service.bind_permission_to_role(role_id, &permission_ids)).await??;
    Ok(HttpResponse::Ok().finish())
}
