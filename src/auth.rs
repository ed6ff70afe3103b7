use std::collections::BTreeSet;

use actix_web::{FromRequest, HttpRequest, web};
use futures_util::future::LocalBoxFuture;
use log::debug;

use crate::errors::AppError;
use crate::jwt::CookieJwt;
use crate::models::PermissionCode;
use crate::service::UserRolePermissionService;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    /// Permission codes granted through the user's roles.
    pub authorities: BTreeSet<String>,
}

impl AuthUser {
    pub fn has_authority(&self, permission: PermissionCode) -> bool {
        self.authorities.contains(permission.as_str())
    }

    pub fn require(&self, permission: PermissionCode) -> Result<(), AppError> {
        if self.has_authority(permission) {
            Ok(())
        } else {
            debug!(
                "user {} lacks authority {}",
                self.username,
                permission.as_str()
            );
            Err(AppError::Forbidden)
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let jwt = req.app_data::<web::Data<CookieJwt>>().cloned();
        let service = req.app_data::<web::Data<UserRolePermissionService>>().cloned();
        let token = jwt.as_ref().and_then(|j| j.token_from(req));

        Box::pin(async move {
            let (Some(jwt), Some(service)) = (jwt, service) else {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "authentication is not configured"
                )));
            };
            let token = token.ok_or(AppError::Unauthorized)?;
            let user_id = jwt
                .subject(&token)
                .and_then(|sub| sub.parse::<i64>().ok())
                .ok_or(AppError::Unauthorized)?;

            web::block(move || service.load_auth_user(user_id))
                .await??
                .ok_or(AppError::Unauthorized)
        })
    }
}
