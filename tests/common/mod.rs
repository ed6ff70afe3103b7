#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use actix_web::cookie::Cookie;
use baseplatform::app::AppContext;
use baseplatform::config::AppConfig;
use baseplatform::crypto::PasswordEncoder;
use baseplatform::db::DbResult;
use baseplatform::generated::{NewUser, Permission, Role, User};
use baseplatform::models::{PageRequest, PermissionQuery, RoleQuery, SortOrder, UserQuery};
use baseplatform::mq::{Broker, Topology};
use baseplatform::store::{Page, UserRolePermissionStore};
use chrono::Utc;

pub const GENERAL_ROLE: i64 = 1;
pub const ADMIN_ROLE: i64 = 2;
pub const READ_PERMISSION: i64 = 1;
pub const WRITE_PERMISSION: i64 = 2;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    user_roles: BTreeSet<(i64, i64)>,
    role_permissions: BTreeSet<(i64, i64)>,
}

/// In-memory store seeded like `V3__seed_roles_permissions.sql`.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn seeded() -> Self {
        let mut t = Tables::default();
        t.roles = vec![
            Role { id: GENERAL_ROLE, code: "GENERAL".into(), name: "general user".into() },
            Role { id: ADMIN_ROLE, code: "ADMIN".into(), name: "administrator".into() },
        ];
        t.permissions = vec![
            Permission {
                id: READ_PERMISSION,
                code: "READ_USER_ROLE_PERMISSION".into(),
                name: "read users, roles and permissions".into(),
            },
            Permission {
                id: WRITE_PERMISSION,
                code: "WRITE_USER_ROLE_PERMISSION".into(),
                name: "write users, roles and permissions".into(),
            },
        ];
        t.role_permissions.insert((ADMIN_ROLE, READ_PERMISSION));
        t.role_permissions.insert((ADMIN_ROLE, WRITE_PERMISSION));
        Self { tables: Mutex::new(t) }
    }

    pub fn add_user(&self, username: &str, password: &str, enable: bool, roles: &[i64]) -> i64 {
        let hash = PasswordEncoder::default().encode(password).unwrap();
        let mut t = self.tables.lock().unwrap();
        let id = t.users.len() as i64 + 1;
        t.users.push(User {
            id,
            username: username.into(),
            password: hash,
            enable,
            create_time: Utc::now(),
        });
        for role in roles {
            t.user_roles.insert((id, *role));
        }
        id
    }

    pub fn user_by_name(&self, username: &str) -> i64 {
        self.user_by_username(username).unwrap().unwrap().id
    }

    pub fn user_role_ids(&self, user_id: i64) -> Vec<i64> {
        self.role_ids_of_user(user_id).unwrap()
    }
}

fn window<T>(mut rows: Vec<T>, page: &PageRequest) -> Page<T> {
    let total = rows.len() as i64;
    let rows = rows
        .drain(..)
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (total, rows)
}

fn contains(value: &str, needle: &Option<String>) -> bool {
    needle.as_deref().map_or(true, |n| value.contains(n))
}

impl UserRolePermissionStore for MemoryStore {
    fn user_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    fn user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    fn insert_user(&self, new_user: &NewUser, role_ids: &[i64]) -> DbResult<User> {
        let mut t = self.tables.lock().unwrap();
        let user = User {
            id: t.users.len() as i64 + 1,
            username: new_user.username.clone(),
            password: new_user.password.clone(),
            enable: new_user.enable.unwrap_or(true),
            create_time: new_user.create_time.unwrap_or_else(Utc::now),
        };
        for role in role_ids {
            t.user_roles.insert((user.id, *role));
        }
        t.users.push(user.clone());
        Ok(user)
    }

    fn page_users(
        &self,
        page: &PageRequest,
        sort: Option<&SortOrder>,
        query: &UserQuery,
    ) -> DbResult<Page<User>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<User> = t
            .users
            .iter()
            .filter(|u| contains(&u.username, &query.username))
            .cloned()
            .collect();
        if let Some(order) = sort {
            if order.property == "username" {
                rows.sort_by(|a, b| a.username.cmp(&b.username));
            }
            if order.descending {
                rows.reverse();
            }
        }
        Ok(window(rows, page))
    }

    fn roles_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Role>> {
        let t = self.tables.lock().unwrap();
        Ok(t.roles.iter().filter(|r| ids.contains(&r.id)).cloned().collect())
    }

    fn roles_by_codes(&self, codes: &[&str]) -> DbResult<Vec<Role>> {
        let t = self.tables.lock().unwrap();
        Ok(t.roles
            .iter()
            .filter(|r| codes.contains(&r.code.as_str()))
            .cloned()
            .collect())
    }

    fn role_ids_of_user(&self, user_id: i64) -> DbResult<Vec<i64>> {
        let t = self.tables.lock().unwrap();
        Ok(t.user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, r)| *r)
            .collect())
    }

    fn page_roles(
        &self,
        page: &PageRequest,
        _sort: Option<&SortOrder>,
        query: &RoleQuery,
    ) -> DbResult<Page<Role>> {
        let t = self.tables.lock().unwrap();
        let rows = t
            .roles
            .iter()
            .filter(|r| query.role_id_list.as_ref().map_or(true, |ids| ids.contains(&r.id)))
            .filter(|r| query.role_id.map_or(true, |id| id == r.id))
            .filter(|r| contains(&r.name, &query.role_name))
            .filter(|r| contains(&r.code, &query.role_code))
            .cloned()
            .collect();
        Ok(window(rows, page))
    }

    fn permissions_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Permission>> {
        let t = self.tables.lock().unwrap();
        Ok(t.permissions
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    fn permission_ids_of_role(&self, role_id: i64) -> DbResult<Vec<i64>> {
        let t = self.tables.lock().unwrap();
        Ok(t.role_permissions
            .iter()
            .filter(|(r, _)| *r == role_id)
            .map(|(_, p)| *p)
            .collect())
    }

    fn page_permissions(
        &self,
        page: &PageRequest,
        _sort: Option<&SortOrder>,
        query: &PermissionQuery,
    ) -> DbResult<Page<Permission>> {
        let t = self.tables.lock().unwrap();
        let rows = t
            .permissions
            .iter()
            .filter(|p| {
                query
                    .permission_id_list
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&p.id))
            })
            .filter(|p| query.permission_id.map_or(true, |id| id == p.id))
            .filter(|p| contains(&p.name, &query.permission_name))
            .filter(|p| contains(&p.code, &query.permission_code))
            .cloned()
            .collect();
        Ok(window(rows, page))
    }

    fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DbResult<()> {
        let mut t = self.tables.lock().unwrap();
        t.user_roles.retain(|(u, _)| *u != user_id);
        for role in role_ids {
            t.user_roles.insert((user_id, *role));
        }
        Ok(())
    }

    fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> DbResult<()> {
        let mut t = self.tables.lock().unwrap();
        t.role_permissions.retain(|(r, _)| *r != role_id);
        for permission in permission_ids {
            t.role_permissions.insert((role_id, *permission));
        }
        Ok(())
    }
}

pub fn test_config(static_dir: &str) -> AppConfig {
    AppConfig {
        jwt_secret: "integration-test-secret".into(),
        static_resource_location: static_dir.into(),
        ..AppConfig::default()
    }
}

pub fn context(store: Arc<MemoryStore>, static_dir: &str) -> AppContext {
    let broker = Arc::new(Broker::new(Topology::service_default()).unwrap());
    AppContext::new(test_config(static_dir), store, broker).unwrap()
}

/// Session cookie for `user_id`, as sign-in would set it.
pub fn session_cookie(ctx: &AppContext, user_id: i64) -> Cookie<'static> {
    ctx.jwt.build_cookie(&user_id.to_string(), false).unwrap()
}
