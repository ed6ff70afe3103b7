// @generated automatically by baseplatform codegen. Do not edit.
// Scripts: migrations/*.sql

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::{DbResult, PgPool};

pub mod schema {
    diesel::table! {
        permission (id) {
            id -> Int8,
            #[max_length = 64]
            code -> Varchar,
            #[max_length = 64]
            name -> Varchar,
        }
    }

    diesel::table! {
        role (id) {
            id -> Int8,
            #[max_length = 64]
            code -> Varchar,
            #[max_length = 64]
            name -> Varchar,
        }
    }

    diesel::table! {
        role_permission_map (role_id, permission_id) {
            role_id -> Int8,
            permission_id -> Int8,
        }
    }

    diesel::table! {
        user (id) {
            id -> Int8,
            #[max_length = 64]
            username -> Varchar,
            #[max_length = 255]
            password -> Varchar,
            enable -> Bool,
            create_time -> Timestamptz,
        }
    }

    diesel::table! {
        user_role_map (user_id, role_id) {
            user_id -> Int8,
            role_id -> Int8,
        }
    }

    diesel::joinable!(role_permission_map -> permission (permission_id));
    diesel::joinable!(role_permission_map -> role (role_id));
    diesel::joinable!(user_role_map -> role (role_id));
    diesel::joinable!(user_role_map -> user (user_id));

    diesel::allow_tables_to_appear_in_same_query!(
        permission,
        role,
        role_permission_map,
        user,
        user_role_map,
    );
}

/// Row of the `permission` table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = schema::permission)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Permission {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Insertable `permission` row; `None` leaves the column to its default.
#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = schema::permission)]
pub struct NewPermission {
    pub code: String,
    pub name: String,
}

/// Data access for the `permission` table.
#[derive(Clone)]
pub struct PermissionDao {
    pool: PgPool,
}

impl PermissionDao {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find_all(&self) -> DbResult<Vec<Permission>> {
        let mut conn = self.pool.get()?;
        Ok(schema::permission::table.select(Permission::as_select()).load(&mut conn)?)
    }

    pub fn find_by_id(&self, id: i64) -> DbResult<Option<Permission>> {
        let mut conn = self.pool.get()?;
        Ok(schema::permission::table
            .find(id)
            .select(Permission::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn fetch_by_code(&self, value: &str) -> DbResult<Vec<Permission>> {
        let mut conn = self.pool.get()?;
        Ok(schema::permission::table
            .filter(schema::permission::code.eq(value))
            .select(Permission::as_select())
            .load(&mut conn)?)
    }

    pub fn fetch_one_by_code(&self, value: &str) -> DbResult<Option<Permission>> {
        let mut conn = self.pool.get()?;
        Ok(schema::permission::table
            .filter(schema::permission::code.eq(value))
            .select(Permission::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn fetch_by_name(&self, value: &str) -> DbResult<Vec<Permission>> {
        let mut conn = self.pool.get()?;
        Ok(schema::permission::table
            .filter(schema::permission::name.eq(value))
            .select(Permission::as_select())
            .load(&mut conn)?)
    }

    pub fn insert(&self, record: &NewPermission) -> DbResult<Permission> {
        let mut conn = self.pool.get()?;
        Ok(diesel::insert_into(schema::permission::table)
            .values(record)
            .returning(Permission::as_returning())
            .get_result(&mut conn)?)
    }

    pub fn update(&self, record: &Permission) -> DbResult<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::update(record).set(record).execute(&mut conn)?)
    }

    pub fn delete_by_id(&self, id: i64) -> DbResult<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::delete(schema::permission::table.find(id)).execute(&mut conn)?)
    }
}

/// Row of the `role` table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = schema::role)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Role {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Insertable `role` row; `None` leaves the column to its default.
#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = schema::role)]
pub struct NewRole {
    pub code: String,
    pub name: String,
}

/// Data access for the `role` table.
#[derive(Clone)]
pub struct RoleDao {
    pool: PgPool,
}

impl RoleDao {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find_all(&self) -> DbResult<Vec<Role>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role::table.select(Role::as_select()).load(&mut conn)?)
    }

    pub fn find_by_id(&self, id: i64) -> DbResult<Option<Role>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role::table
            .find(id)
            .select(Role::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn fetch_by_code(&self, value: &str) -> DbResult<Vec<Role>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role::table
            .filter(schema::role::code.eq(value))
            .select(Role::as_select())
            .load(&mut conn)?)
    }

    pub fn fetch_one_by_code(&self, value: &str) -> DbResult<Option<Role>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role::table
            .filter(schema::role::code.eq(value))
            .select(Role::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn fetch_by_name(&self, value: &str) -> DbResult<Vec<Role>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role::table
            .filter(schema::role::name.eq(value))
            .select(Role::as_select())
            .load(&mut conn)?)
    }

    pub fn insert(&self, record: &NewRole) -> DbResult<Role> {
        let mut conn = self.pool.get()?;
        Ok(diesel::insert_into(schema::role::table)
            .values(record)
            .returning(Role::as_returning())
            .get_result(&mut conn)?)
    }

    pub fn update(&self, record: &Role) -> DbResult<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::update(record).set(record).execute(&mut conn)?)
    }

    pub fn delete_by_id(&self, id: i64) -> DbResult<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::delete(schema::role::table.find(id)).execute(&mut conn)?)
    }
}

/// Row of the `role_permission_map` table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::role_permission_map)]
#[diesel(primary_key(role_id, permission_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RolePermissionMap {
    pub role_id: i64,
    pub permission_id: i64,
}

/// Insertable `role_permission_map` row; `None` leaves the column to its default.
#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = schema::role_permission_map)]
pub struct NewRolePermissionMap {
    pub role_id: i64,
    pub permission_id: i64,
}

/// Data access for the `role_permission_map` table.
#[derive(Clone)]
pub struct RolePermissionMapDao {
    pool: PgPool,
}

impl RolePermissionMapDao {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find_all(&self) -> DbResult<Vec<RolePermissionMap>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role_permission_map::table.select(RolePermissionMap::as_select()).load(&mut conn)?)
    }

    pub fn find_by_id(&self, id: (i64, i64)) -> DbResult<Option<RolePermissionMap>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role_permission_map::table
            .find(id)
            .select(RolePermissionMap::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn fetch_by_role_id(&self, value: i64) -> DbResult<Vec<RolePermissionMap>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role_permission_map::table
            .filter(schema::role_permission_map::role_id.eq(value))
            .select(RolePermissionMap::as_select())
            .load(&mut conn)?)
    }

    pub fn fetch_by_permission_id(&self, value: i64) -> DbResult<Vec<RolePermissionMap>> {
        let mut conn = self.pool.get()?;
        Ok(schema::role_permission_map::table
            .filter(schema::role_permission_map::permission_id.eq(value))
            .select(RolePermissionMap::as_select())
            .load(&mut conn)?)
    }

    pub fn insert(&self, record: &NewRolePermissionMap) -> DbResult<RolePermissionMap> {
        let mut conn = self.pool.get()?;
        Ok(diesel::insert_into(schema::role_permission_map::table)
            .values(record)
            .returning(RolePermissionMap::as_returning())
            .get_result(&mut conn)?)
    }

    pub fn delete_by_id(&self, id: (i64, i64)) -> DbResult<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::delete(schema::role_permission_map::table.find(id)).execute(&mut conn)?)
    }
}

/// Row of the `user` table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = schema::user)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub enable: bool,
    pub create_time: chrono::DateTime<chrono::Utc>,
}

/// Insertable `user` row; `None` leaves the column to its default.
#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = schema::user)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub enable: Option<bool>,
    pub create_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Data access for the `user` table.
#[derive(Clone)]
pub struct UserDao {
    pool: PgPool,
}

impl UserDao {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find_all(&self) -> DbResult<Vec<User>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user::table.select(User::as_select()).load(&mut conn)?)
    }

    pub fn find_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn fetch_by_username(&self, value: &str) -> DbResult<Vec<User>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user::table
            .filter(schema::user::username.eq(value))
            .select(User::as_select())
            .load(&mut conn)?)
    }

    pub fn fetch_one_by_username(&self, value: &str) -> DbResult<Option<User>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user::table
            .filter(schema::user::username.eq(value))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn fetch_by_password(&self, value: &str) -> DbResult<Vec<User>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user::table
            .filter(schema::user::password.eq(value))
            .select(User::as_select())
            .load(&mut conn)?)
    }

    pub fn fetch_by_enable(&self, value: bool) -> DbResult<Vec<User>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user::table
            .filter(schema::user::enable.eq(value))
            .select(User::as_select())
            .load(&mut conn)?)
    }

    pub fn fetch_by_create_time(&self, value: chrono::DateTime<chrono::Utc>) -> DbResult<Vec<User>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user::table
            .filter(schema::user::create_time.eq(value))
            .select(User::as_select())
            .load(&mut conn)?)
    }

    pub fn insert(&self, record: &NewUser) -> DbResult<User> {
        let mut conn = self.pool.get()?;
        Ok(diesel::insert_into(schema::user::table)
            .values(record)
            .returning(User::as_returning())
            .get_result(&mut conn)?)
    }

    pub fn update(&self, record: &User) -> DbResult<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::update(record).set(record).execute(&mut conn)?)
    }

    pub fn delete_by_id(&self, id: i64) -> DbResult<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::delete(schema::user::table.find(id)).execute(&mut conn)?)
    }
}

/// Row of the `user_role_map` table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::user_role_map)]
#[diesel(primary_key(user_id, role_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRoleMap {
    pub user_id: i64,
    pub role_id: i64,
}

/// Insertable `user_role_map` row; `None` leaves the column to its default.
#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = schema::user_role_map)]
pub struct NewUserRoleMap {
    pub user_id: i64,
    pub role_id: i64,
}

/// Data access for the `user_role_map` table.
#[derive(Clone)]
pub struct UserRoleMapDao {
    pool: PgPool,
}

impl UserRoleMapDao {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find_all(&self) -> DbResult<Vec<UserRoleMap>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user_role_map::table.select(UserRoleMap::as_select()).load(&mut conn)?)
    }

    pub fn find_by_id(&self, id: (i64, i64)) -> DbResult<Option<UserRoleMap>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user_role_map::table
            .find(id)
            .select(UserRoleMap::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn fetch_by_user_id(&self, value: i64) -> DbResult<Vec<UserRoleMap>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user_role_map::table
            .filter(schema::user_role_map::user_id.eq(value))
            .select(UserRoleMap::as_select())
            .load(&mut conn)?)
    }

    pub fn fetch_by_role_id(&self, value: i64) -> DbResult<Vec<UserRoleMap>> {
        let mut conn = self.pool.get()?;
        Ok(schema::user_role_map::table
            .filter(schema::user_role_map::role_id.eq(value))
            .select(UserRoleMap::as_select())
            .load(&mut conn)?)
    }

    pub fn insert(&self, record: &NewUserRoleMap) -> DbResult<UserRoleMap> {
        let mut conn = self.pool.get()?;
        Ok(diesel::insert_into(schema::user_role_map::table)
            .values(record)
            .returning(UserRoleMap::as_returning())
            .get_result(&mut conn)?)
    }

    pub fn delete_by_id(&self, id: (i64, i64)) -> DbResult<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::delete(schema::user_role_map::table.find(id)).execute(&mut conn)?)
    }
}
