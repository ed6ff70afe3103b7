use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub database_pool_size: u32,
    pub migrations: String,
    pub run_migrations: bool,
    pub jwt_secret: String,
    pub jwt_expiration_min: i64,
    pub jwt_cookie_name: String,
    pub cors_allowed_origins: Vec<String>,
    pub cors_allowed_methods: Vec<String>,
    pub cors_allowed_headers: Vec<String>,
    pub static_resource_handler: String,
    pub static_resource_location: String,
    pub email_scheduler_threads: usize,
    pub data_backup_scheduler_threads: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            database_url: String::new(),
            database_pool_size: 10,
            migrations: "migrations/*.sql".to_string(),
            run_migrations: true,
            jwt_secret: "changeme-jwt-secret".to_string(),
            jwt_expiration_min: 60,
            jwt_cookie_name: "jwt".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            cors_allowed_methods: vec!["*".to_string()],
            cors_allowed_headers: vec!["*".to_string()],
            static_resource_handler: "/asset".to_string(),
            static_resource_location: "static".to_string(),
            email_scheduler_threads: 10,
            data_backup_scheduler_threads: 5,
        }
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn text(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn list(key: &str, default: Vec<String>) -> Vec<String> {
    match env::var(key) {
        Ok(v) => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let d = Self::default();
        let database_url = env::var("DATABASE_URL")?;

        Ok(Self {
            server_host: text("SERVER_HOST", d.server_host),
            server_port: parsed("SERVER_PORT", d.server_port),
            database_url,
            database_pool_size: parsed("DATABASE_POOL_SIZE", d.database_pool_size),
            migrations: text("MIGRATIONS", d.migrations),
            run_migrations: parsed("RUN_MIGRATIONS", d.run_migrations),
            jwt_secret: text("JWT_SECRET", d.jwt_secret),
            jwt_expiration_min: parsed("JWT_EXPIRATION_MIN", d.jwt_expiration_min),
            jwt_cookie_name: text("JWT_COOKIE_NAME", d.jwt_cookie_name),
            cors_allowed_origins: list("CORS_ALLOWED_ORIGINS", d.cors_allowed_origins),
            cors_allowed_methods: list("CORS_ALLOWED_METHODS", d.cors_allowed_methods),
            cors_allowed_headers: list("CORS_ALLOWED_HEADERS", d.cors_allowed_headers),
            static_resource_handler: text("STATIC_RESOURCE_HANDLER", d.static_resource_handler),
            static_resource_location: text("STATIC_RESOURCE_LOCATION", d.static_resource_location),
            email_scheduler_threads: parsed("EMAIL_SCHEDULER_THREADS", d.email_scheduler_threads),
            data_backup_scheduler_threads: parsed(
                "DATA_BACKUP_SCHEDULER_THREADS",
                d.data_backup_scheduler_threads,
            ),
        })
    }
}
