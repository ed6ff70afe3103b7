use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};

use crate::auth::AuthUser;
use crate::crypto::PasswordEncoder;
use crate::errors::{AppError, AppResult};
use crate::generated::NewUser;
use crate::models::{
    PageRequest, PageResponse, PermissionDto, PermissionQuery, RoleCode, RoleDto, RoleQuery,
    SignInRequest, SignUpRequest, UserQuery, UserRolePermissionDto,
};
use crate::store::UserRolePermissionStore;

const USER_SORT: &[&str] = &["id", "username", "createTime"];
const ROLE_SORT: &[&str] = &["id", "code", "name"];
const PERMISSION_SORT: &[&str] = &["id", "code", "name"];

/// Queries and bindings over users, roles and permissions.
#[derive(Clone)]
pub struct UserRolePermissionService {
    store: Arc<dyn UserRolePermissionStore>,
}

impl UserRolePermissionService {
    pub fn new(store: Arc<dyn UserRolePermissionStore>) -> Self {
        Self { store }
    }

    fn role_with_permissions(&self, role: crate::generated::Role) -> AppResult<RoleDto> {
        let permissions = self.store.permissions_of_role(role.id)?;
        Ok(RoleDto::new(role, permissions))
    }

    fn user_with_roles(&self, user: crate::generated::User) -> AppResult<UserRolePermissionDto> {
        let roles = self
            .store
            .roles_of_user(user.id)?
            .into_iter()
            .map(|r| self.role_with_permissions(r))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(UserRolePermissionDto::new(user, roles))
    }

    pub fn page_query_user(
        &self,
        page: &PageRequest,
        query: &UserQuery,
    ) -> AppResult<PageResponse<UserRolePermissionDto>> {
        page.validate()?;
        let sort = page.sort_order(USER_SORT)?;
        let (total, users) = self.store.page_users(page, sort.as_ref(), query)?;
        let data = users
            .into_iter()
            .map(|u| self.user_with_roles(u))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(PageResponse::new(total, data))
    }

    pub fn query_unique_user_with_role_permission(
        &self,
        user_id: i64,
    ) -> AppResult<Option<UserRolePermissionDto>> {
        self.store
            .user_by_id(user_id)?
            .map(|u| self.user_with_roles(u))
            .transpose()
    }

    pub fn page_query_role(
        &self,
        page: &PageRequest,
        query: &RoleQuery,
    ) -> AppResult<PageResponse<RoleDto>> {
        page.validate()?;
        let sort = page.sort_order(ROLE_SORT)?;
        let mut query = query.clone();
        if let Some(user_id) = query.user_id {
            let role_ids = self.store.role_ids_of_user(user_id)?;
            if role_ids.is_empty() {
                return Ok(PageResponse::empty());
            }
            query.role_id_list = Some(role_ids);
        }
        let (total, roles) = self.store.page_roles(page, sort.as_ref(), &query)?;
        let data = roles
            .into_iter()
            .map(|r| self.role_with_permissions(r))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(PageResponse::new(total, data))
    }

    pub fn page_query_permission(
        &self,
        page: &PageRequest,
        query: &PermissionQuery,
    ) -> AppResult<PageResponse<PermissionDto>> {
        page.validate()?;
        let sort = page.sort_order(PERMISSION_SORT)?;
        let mut query = query.clone();
        if let Some(role_id) = query.role_id {
            let permission_ids = self.store.permission_ids_of_role(role_id)?;
            if permission_ids.is_empty() {
                return Ok(PageResponse::empty());
            }
            query.permission_id_list = Some(permission_ids);
        }
        let (total, permissions) = self.store.page_permissions(page, sort.as_ref(), &query)?;
        Ok(PageResponse::new(
            total,
            permissions.into_iter().map(PermissionDto::from).collect(),
        ))
    }

    /// Replaces the user's roles with those of `role_ids` that exist.
    pub fn bind_role_to_user(&self, user_id: i64, role_ids: &[i64]) -> AppResult<()> {
        if role_ids.is_empty() {
            self.store.replace_user_roles(user_id, &[])?;
            return Ok(());
        }
        let found: Vec<i64> = self.store.roles_by_ids(role_ids)?.iter().map(|r| r.id).collect();
        if found.is_empty() {
            return Err(AppError::business("绑定的角色不存在"));
        }
        self.store.replace_user_roles(user_id, &found)?;
        info!("user {user_id} bound to roles {found:?}");
        Ok(())
    }

    /// Replaces the role's permissions with those of `permission_ids` that exist.
    pub fn bind_permission_to_role(&self, role_id: i64, permission_ids: &[i64]) -> AppResult<()> {
        if permission_ids.is_empty() {
            self.store.replace_role_permissions(role_id, &[])?;
            return Ok(());
        }
        let found: Vec<i64> = self
            .store
            .permissions_by_ids(permission_ids)?
            .iter()
            .map(|p| p.id)
            .collect();
        if found.is_empty() {
            return Err(AppError::business("绑定的权限不存在"));
        }
        self.store.replace_role_permissions(role_id, &found)?;
        info!("role {role_id} bound to permissions {found:?}");
        Ok(())
    }

    /// Principal for an authenticated request. Disabled or missing users
    /// yield `None`.
    pub fn load_auth_user(&self, user_id: i64) -> AppResult<Option<AuthUser>> {
        let Some(dto) = self.query_unique_user_with_role_permission(user_id)? else {
            return Ok(None);
        };
        if !dto.enable {
            debug!("user {} is disabled", dto.username);
            return Ok(None);
        }
        let authorities: BTreeSet<String> =
            dto.permissions.iter().map(|p| p.code.clone()).collect();
        Ok(Some(AuthUser {
            user_id: dto.id,
            username: dto.username,
            authorities,
        }))
    }
}

#[derive(Clone)]
pub struct SignService {
    store: Arc<dyn UserRolePermissionStore>,
    encoder: PasswordEncoder,
}

impl SignService {
    pub fn new(store: Arc<dyn UserRolePermissionStore>) -> Self {
        Self {
            store,
            encoder: PasswordEncoder::default(),
        }
    }

    /// Returns the id of the signed-in user.
    pub fn sign_in(&self, request: &SignInRequest) -> AppResult<i64> {
        request.validate()?;
        let user = self
            .store
            .user_by_username(&request.username)?
            .ok_or_else(|| AppError::business(format!("{} user not found", request.username)))?;
        if !self.encoder.matches(&request.password, &user.password)? {
            return Err(AppError::business("password invalid"));
        }
        info!("user {} signed in", user.username);
        Ok(user.id)
    }

    pub fn is_username_duplicate(&self, username: &str) -> AppResult<bool> {
        Ok(self.store.user_by_username(username)?.is_some())
    }

    /// Creates an enabled user bound to the `GENERAL` role.
    pub fn sign_up(&self, request: &SignUpRequest) -> AppResult<i64> {
        request.validate()?;
        if self.is_username_duplicate(&request.username)? {
            return Err(AppError::business(format!(
                "username {} already exist",
                request.username
            )));
        }
        let role_ids: Vec<i64> = self
            .store
            .roles_by_codes(&[RoleCode::General.as_str()])?
            .iter()
            .map(|r| r.id)
            .collect();
        let new_user = NewUser {
            username: request.username.clone(),
            password: self.encoder.encode(&request.password)?,
            enable: Some(true),
            create_time: None,
        };
        let created = self.store.insert_user(&new_user, &role_ids)?;
        info!("user {} signed up with id {}", created.username, created.id);
        Ok(created.id)
    }
}
