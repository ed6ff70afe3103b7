//! Persistence seam for users, roles and permissions.
//!
//! [`UserRolePermissionStore`] is what the services talk to; [`PgStore`] is
//! the diesel implementation backed by the generated DAOs.

use diesel::pg::Pg;
use diesel::prelude::*;

use crate::db::{DbResult, PgPool};
use crate::generated::schema::{permission, role, role_permission_map, user, user_role_map};
use crate::generated::{
    NewRolePermissionMap, NewUser, NewUserRoleMap, Permission, Role, RoleDao, RolePermissionMapDao,
    User, UserDao, UserRoleMapDao,
};
use crate::models::{PageRequest, PermissionQuery, RoleQuery, SortOrder, UserQuery};

pub type Page<T> = (i64, Vec<T>);

pub trait UserRolePermissionStore: Send + Sync {
    fn user_by_id(&self, id: i64) -> DbResult<Option<User>>;
    fn user_by_username(&self, username: &str) -> DbResult<Option<User>>;
    /// Inserts the user and its role mappings in one transaction.
    fn insert_user(&self, new_user: &NewUser, role_ids: &[i64]) -> DbResult<User>;
    fn page_users(
        &self,
        page: &PageRequest,
        sort: Option<&SortOrder>,
        query: &UserQuery,
    ) -> DbResult<Page<User>>;

    fn roles_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Role>>;
    fn roles_by_codes(&self, codes: &[&str]) -> DbResult<Vec<Role>>;
    fn role_ids_of_user(&self, user_id: i64) -> DbResult<Vec<i64>>;
    fn page_roles(
        &self,
        page: &PageRequest,
        sort: Option<&SortOrder>,
        query: &RoleQuery,
    ) -> DbResult<Page<Role>>;

    fn permissions_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Permission>>;
    fn permission_ids_of_role(&self, role_id: i64) -> DbResult<Vec<i64>>;
    fn page_permissions(
        &self,
        page: &PageRequest,
        sort: Option<&SortOrder>,
        query: &PermissionQuery,
    ) -> DbResult<Page<Permission>>;

    /// Replaces every role mapping of the user.
    fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DbResult<()>;
    /// Replaces every permission mapping of the role.
    fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> DbResult<()>;

    fn roles_of_user(&self, user_id: i64) -> DbResult<Vec<Role>> {
        let ids = self.role_ids_of_user(user_id)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.roles_by_ids(&ids)
    }

    fn permissions_of_role(&self, role_id: i64) -> DbResult<Vec<Permission>> {
        let ids = self.permission_ids_of_role(role_id)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.permissions_by_ids(&ids)
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    users: UserDao,
    roles: RoleDao,
    user_roles: UserRoleMapDao,
    role_permissions: RolePermissionMapDao,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserDao::new(pool.clone()),
            roles: RoleDao::new(pool.clone()),
            user_roles: UserRoleMapDao::new(pool.clone()),
            role_permissions: RolePermissionMapDao::new(pool.clone()),
            pool,
        }
    }

    pub fn role_by_code(&self, code: &str) -> DbResult<Option<Role>> {
        self.roles.fetch_one_by_code(code)
    }
}

fn like(value: &str) -> String {
    format!("%{value}%")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn user_filter(query: &UserQuery) -> user::BoxedQuery<'static, Pg> {
    let mut q = user::table.into_boxed();
    if let Some(name) = non_empty(&query.username) {
        q = q.filter(user::username.like(like(name)));
    }
    q
}

fn role_filter(query: &RoleQuery) -> role::BoxedQuery<'static, Pg> {
    let mut q = role::table.into_boxed();
    if let Some(ids) = &query.role_id_list {
        q = q.filter(role::id.eq_any(ids.clone()));
    }
    if let Some(id) = query.role_id {
        q = q.filter(role::id.eq(id));
    }
    if let Some(name) = non_empty(&query.role_name) {
        q = q.filter(role::name.like(like(name)));
    }
    if let Some(code) = non_empty(&query.role_code) {
        q = q.filter(role::code.eq(code.to_string()));
    }
    q
}

fn permission_filter(query: &PermissionQuery) -> permission::BoxedQuery<'static, Pg> {
    let mut q = permission::table.into_boxed();
    if let Some(ids) = &query.permission_id_list {
        q = q.filter(permission::id.eq_any(ids.clone()));
    }
    if let Some(id) = query.permission_id {
        q = q.filter(permission::id.eq(id));
    }
    if let Some(name) = non_empty(&query.permission_name) {
        q = q.filter(permission::name.like(like(name)));
    }
    if let Some(code) = non_empty(&query.permission_code) {
        q = q.filter(permission::code.eq(code.to_string()));
    }
    q
}

macro_rules! order_by {
    ($q:expr, $sort:expr, { $($prop:literal => $col:expr),+ $(,)? }, $default:expr) => {
        match $sort {
            $(
                Some(s) if s.property == $prop && s.descending => $q.order($col.desc()),
                Some(s) if s.property == $prop => $q.order($col.asc()),
            )+
            _ => $q.order($default.asc()),
        }
    };
}

impl UserRolePermissionStore for PgStore {
    fn user_by_id(&self, id: i64) -> DbResult<Option<User>> {
        self.users.find_by_id(id)
    }

    fn user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        self.users.fetch_one_by_username(username)
    }

    fn insert_user(&self, new_user: &NewUser, role_ids: &[i64]) -> DbResult<User> {
        let mut conn = self.pool.get()?;
        let created = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let created: User = diesel::insert_into(user::table)
                .values(new_user)
                .returning(User::as_returning())
                .get_result(conn)?;
            let rows: Vec<NewUserRoleMap> = role_ids
                .iter()
                .map(|&role_id| NewUserRoleMap {
                    user_id: created.id,
                    role_id,
                })
                .collect();
            if !rows.is_empty() {
                diesel::insert_into(user_role_map::table)
                    .values(&rows)
                    .execute(conn)?;
            }
            Ok(created)
        })?;
        Ok(created)
    }

    fn page_users(
        &self,
        page: &PageRequest,
        sort: Option<&SortOrder>,
        query: &UserQuery,
    ) -> DbResult<Page<User>> {
        let mut conn = self.pool.get()?;
        let total: i64 = user_filter(query).count().get_result(&mut conn)?;
        let ordered = order_by!(user_filter(query), sort, {
            "id" => user::id,
            "username" => user::username,
            "createTime" => user::create_time,
        }, user::id);
        let rows = ordered
            .select(User::as_select())
            .limit(page.limit())
            .offset(page.offset())
            .load(&mut conn)?;
        Ok((total, rows))
    }

    fn roles_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Role>> {
        let mut conn = self.pool.get()?;
        Ok(role::table
            .filter(role::id.eq_any(ids))
            .order(role::id.asc())
            .select(Role::as_select())
            .load(&mut conn)?)
    }

    fn roles_by_codes(&self, codes: &[&str]) -> DbResult<Vec<Role>> {
        let mut found = Vec::with_capacity(codes.len());
        for code in codes {
            if let Some(r) = self.role_by_code(code)? {
                found.push(r);
            }
        }
        Ok(found)
    }

    fn role_ids_of_user(&self, user_id: i64) -> DbResult<Vec<i64>> {
        Ok(self
            .user_roles
            .fetch_by_user_id(user_id)?
            .into_iter()
            .map(|m| m.role_id)
            .collect())
    }

    fn page_roles(
        &self,
        page: &PageRequest,
        sort: Option<&SortOrder>,
        query: &RoleQuery,
    ) -> DbResult<Page<Role>> {
        let mut conn = self.pool.get()?;
        let total: i64 = role_filter(query).count().get_result(&mut conn)?;
        let ordered = order_by!(role_filter(query), sort, {
            "id" => role::id,
            "code" => role::code,
            "name" => role::name,
        }, role::id);
        let rows = ordered
            .select(Role::as_select())
            .limit(page.limit())
            .offset(page.offset())
            .load(&mut conn)?;
        Ok((total, rows))
    }

    fn permissions_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Permission>> {
        let mut conn = self.pool.get()?;
        Ok(permission::table
            .filter(permission::id.eq_any(ids))
            .order(permission::id.asc())
            .select(Permission::as_select())
            .load(&mut conn)?)
    }

    fn permission_ids_of_role(&self, role_id: i64) -> DbResult<Vec<i64>> {
        Ok(self
            .role_permissions
            .fetch_by_role_id(role_id)?
            .into_iter()
            .map(|m| m.permission_id)
            .collect())
    }

    fn page_permissions(
        &self,
        page: &PageRequest,
        sort: Option<&SortOrder>,
        query: &PermissionQuery,
    ) -> DbResult<Page<Permission>> {
        let mut conn = self.pool.get()?;
        let total: i64 = permission_filter(query).count().get_result(&mut conn)?;
        let ordered = order_by!(permission_filter(query), sort, {
            "id" => permission::id,
            "code" => permission::code,
            "name" => permission::name,
        }, permission::id);
        let rows = ordered
            .select(Permission::as_select())
            .limit(page.limit())
            .offset(page.offset())
            .load(&mut conn)?;
        Ok((total, rows))
    }

    fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DbResult<()> {
        let mut conn = self.pool.get()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(user_role_map::table.filter(user_role_map::user_id.eq(user_id)))
                .execute(conn)?;
            let rows: Vec<NewUserRoleMap> = role_ids
                .iter()
                .map(|&role_id| NewUserRoleMap { user_id, role_id })
                .collect();
            if !rows.is_empty() {
                diesel::insert_into(user_role_map::table)
                    .values(&rows)
                    .execute(conn)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> DbResult<()> {
        let mut conn = self.pool.get()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(
                role_permission_map::table.filter(role_permission_map::role_id.eq(role_id)),
            )
            .execute(conn)?;
            let rows: Vec<NewRolePermissionMap> = permission_ids
                .iter()
                .map(|&permission_id| NewRolePermissionMap {
                    role_id,
                    permission_id,
                })
                .collect();
            if !rows.is_empty() {
                diesel::insert_into(role_permission_map::table)
                    .values(&rows)
                    .execute(conn)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}
