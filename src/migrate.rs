//! Versioned migration runner.
//!
//! Scripts named `V<version>__<description>.sql` are applied once each, in the
//! same semantic order the code generator replays them, and recorded in
//! `schema_history`.

use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Integer, Text};
use log::info;

use crate::codegen::{SortOrder, discover_scripts, load_scripts};
use crate::db::PgPool;

const HISTORY_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_history (
    installed_rank INTEGER PRIMARY KEY,
    version VARCHAR(50) NOT NULL UNIQUE,
    description VARCHAR(200) NOT NULL,
    script VARCHAR(1000) NOT NULL,
    installed_on TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    success BOOLEAN NOT NULL
)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationName {
    pub version: String,
    pub description: String,
}

/// Splits `V1_2__add_users.sql` into version `1.2` and description `add users`.
pub fn parse_migration_name(file_name: &str) -> Option<MigrationName> {
    let stem = file_name.strip_suffix(".sql")?;
    let rest = stem.strip_prefix('V').or_else(|| stem.strip_prefix('v'))?;
    let (version, description) = rest.split_once("__")?;
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '_' || c == '.')
    {
        return None;
    }
    Some(MigrationName {
        version: version.replace('_', "."),
        description: description.replace('_', " "),
    })
}

#[derive(QueryableByName)]
struct AppliedVersion {
    #[diesel(sql_type = Text)]
    version: String,
}

/// Applies pending scripts matching `pattern`; returns the applied versions.
pub fn run_migrations(pool: &PgPool, pattern: &str) -> anyhow::Result<Vec<String>> {
    let mut conn = pool.get()?;
    conn.batch_execute(HISTORY_DDL)?;

    let applied: Vec<String> = diesel::sql_query("SELECT version FROM schema_history")
        .load::<AppliedVersion>(&mut conn)?
        .into_iter()
        .map(|row| row.version)
        .collect();

    let paths = discover_scripts(pattern, SortOrder::Semantic)?;
    let scripts = load_scripts(&paths)?;
    let mut rank = applied.len() as i32;
    let mut installed = Vec::new();
    for script in scripts {
        let file_name = script.name();
        let Some(name) = parse_migration_name(&file_name) else {
            anyhow::bail!("{}: not a versioned migration script", script.path.display());
        };
        if applied.contains(&name.version) {
            continue;
        }
        rank += 1;
        conn.transaction::<_, anyhow::Error, _>(|conn| {
            conn.batch_execute(&script.sql)?;
            diesel::sql_query(
                "INSERT INTO schema_history (installed_rank, version, description, script, success) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind::<Integer, _>(rank)
            .bind::<Text, _>(&name.version)
            .bind::<Text, _>(&name.description)
            .bind::<Text, _>(&file_name)
            .bind::<Bool, _>(true)
            .execute(conn)?;
            Ok(())
        })?;
        info!("migrated to version {} ({})", name.version, name.description);
        installed.push(name.version);
    }
    if installed.is_empty() {
        info!("schema is up to date at {} migrations", applied.len());
    }
    Ok(installed)
}

/// True when `dir` holds at least one versioned script.
pub fn has_migrations(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries.flatten().any(|e| {
                parse_migration_name(&e.file_name().to_string_lossy()).is_some()
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versioned_names() {
        assert_eq!(
            parse_migration_name("V1__init_schema.sql"),
            Some(MigrationName {
                version: "1".into(),
                description: "init schema".into()
            })
        );
        assert_eq!(
            parse_migration_name("V2_1__add_index.sql").map(|m| m.version),
            Some("2.1".to_string())
        );
    }

    #[test]
    fn rejects_other_files() {
        assert_eq!(parse_migration_name("R__views.sql"), None);
        assert_eq!(parse_migration_name("V1_init.sql"), None);
        assert_eq!(parse_migration_name("V1__init.txt"), None);
        assert_eq!(parse_migration_name("Vx__init.sql"), None);
    }

    #[test]
    fn repository_migrations_are_versioned() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        assert!(has_migrations(&dir));
        for entry in std::fs::read_dir(dir).expect("migrations dir").flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(parse_migration_name(&name).is_some(), "{name}");
        }
    }
}
