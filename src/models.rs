use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::{AppError, AppResult};
use crate::generated::{Permission, Role, User};

pub const MAX_PAGE_SIZE: i64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleCode {
    General,
    Admin,
}

impl RoleCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleCode::General => "GENERAL",
            RoleCode::Admin => "ADMIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionCode {
    ReadUserRolePermission,
    WriteUserRolePermission,
}

impl PermissionCode {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionCode::ReadUserRolePermission => "READ_USER_ROLE_PERMISSION",
            PermissionCode::WriteUserRolePermission => "WRITE_USER_ROLE_PERMISSION",
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}

impl SignInRequest {
    pub fn validate(&self) -> AppResult<()> {
        require_text("username", &self.username)?;
        require_text("password", &self.password)
    }
}

impl SignUpRequest {
    pub fn validate(&self) -> AppResult<()> {
        require_text("username", &self.username)?;
        require_text("password", &self.password)?;
        if self.username.chars().count() > 64 {
            return Err(AppError::validation("username must be at most 64 characters"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub property: String,
    pub descending: bool,
}

/// Zero-based page request. `sort` reads `property[,asc|desc]`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    pub sort: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: 10,
            sort: None,
        }
    }
}

impl PageRequest {
    pub fn of(page: i64, size: i64) -> Self {
        Self {
            page,
            size,
            sort: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.page < 0 {
            return Err(AppError::validation("page must not be negative"));
        }
        if self.size < 1 || self.size > MAX_PAGE_SIZE {
            return Err(AppError::validation(format!(
                "size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.page.checked_mul(self.size).is_none() {
            return Err(AppError::validation("page is out of range"));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    /// Parses `sort` and checks the property against `allowed`.
    pub fn sort_order(&self, allowed: &[&str]) -> AppResult<Option<SortOrder>> {
        let Some(raw) = self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let (property, direction) = match raw.split_once(',') {
            Some((p, d)) => (p.trim(), d.trim()),
            None => (raw, "asc"),
        };
        if !allowed.contains(&property) {
            return Err(AppError::validation(format!(
                "cannot sort by '{property}'"
            )));
        }
        let descending = match direction.to_ascii_lowercase().as_str() {
            "asc" => false,
            "desc" => true,
            other => {
                return Err(AppError::validation(format!(
                    "unknown sort direction '{other}'"
                )))
            }
        };
        Ok(Some(SortOrder {
            property: property.to_string(),
            descending,
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PageResponse<T> {
    pub total: i64,
    pub data: Vec<T>,
}

impl<T> PageResponse<T> {
    pub fn new(total: i64, data: Vec<T>) -> Self {
        Self { total, data }
    }

    pub fn empty() -> Self {
        Self {
            total: 0,
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RoleQuery {
    /// Restricts the page to the roles bound to this user.
    pub user_id: Option<i64>,
    pub role_id: Option<i64>,
    #[serde(skip)]
    #[param(ignore)]
    pub role_id_list: Option<Vec<i64>>,
    pub role_name: Option<String>,
    pub role_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PermissionQuery {
    /// Restricts the page to the permissions bound to this role.
    pub role_id: Option<i64>,
    pub permission_id: Option<i64>,
    #[serde(skip)]
    #[param(ignore)]
    pub permission_id_list: Option<Vec<i64>>,
    pub permission_name: Option<String>,
    pub permission_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PermissionDto {
    pub id: i64,
    pub code: String,
    pub name: String,
}

impl From<Permission> for PermissionDto {
    fn from(p: Permission) -> Self {
        Self {
            id: p.id,
            code: p.code,
            name: p.name,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RoleDto {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub permissions: Vec<PermissionDto>,
}

impl RoleDto {
    pub fn new(role: Role, permissions: Vec<Permission>) -> Self {
        Self {
            id: role.id,
            code: role.code,
            name: role.name,
            permissions: permissions.into_iter().map(PermissionDto::from).collect(),
        }
    }
}

mod create_time_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&t.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|t| Some(t.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRolePermissionDto {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    #[schema(ignore)]
    pub password: String,
    pub enable: bool,
    #[serde(with = "create_time_format", default)]
    #[schema(value_type = Option<String>, example = "2023-12-02 01:01:01")]
    pub create_time: Option<DateTime<Utc>>,
    pub roles: Vec<RoleDto>,
    /// Union of the permissions of every role, ordered by id.
    pub permissions: Vec<PermissionDto>,
}

impl UserRolePermissionDto {
    pub fn new(user: User, roles: Vec<RoleDto>) -> Self {
        let permissions: BTreeMap<i64, PermissionDto> = roles
            .iter()
            .flat_map(|r| r.permissions.iter())
            .map(|p| (p.id, p.clone()))
            .collect();
        Self {
            id: user.id,
            username: user.username,
            password: user.password,
            enable: user.enable,
            create_time: Some(user.create_time),
            roles,
            permissions: permissions.into_values().collect(),
        }
    }
}

/// Payload carried through the message broker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BrokerMessage {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoutingKeyQuery {
    #[serde(rename = "routing-key")]
    pub routing_key: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BindRolesRequest {
    pub role_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BindPermissionsRequest {
    pub permission_ids: Vec<i64>,
}
