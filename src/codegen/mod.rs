//! Schema-to-code generation.
//!
//! Migration scripts are replayed into an in-memory schema, filtered, mapped
//! to Rust types and rendered as diesel `table!` definitions plus record
//! structs and DAOs in one module.

pub mod config;
pub mod ddl;
pub mod error;
pub mod filter;
pub mod model;
pub mod render;
pub mod scripts;
pub mod types;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

pub use config::{CodegenConfig, ForcedType, NameCase, SortOrder};
pub use ddl::parse_scripts;
pub use error::{CodegenError, CodegenResult};
pub use filter::filter_tables;
pub use model::{Column, Schema, SqlType, Table};
pub use render::{RenderOptions, render};
pub use scripts::{discover_scripts, load_scripts};
pub use types::resolve_types;

/// Result of one generator run.
#[derive(Debug, Clone)]
pub struct Generated {
    pub source: String,
    pub scripts: Vec<PathBuf>,
    pub tables: Vec<String>,
    pub excluded: Vec<String>,
    /// Generated tables that got no DAO for lack of a primary key.
    pub without_dao: Vec<String>,
}

impl Generated {
    /// True when `path` already holds exactly this source.
    pub fn is_current(&self, path: &Path) -> bool {
        fs::read_to_string(path).is_ok_and(|existing| existing == self.source)
    }

    /// Writes the source when it differs from the file; returns whether the
    /// file changed.
    pub fn write(&self, path: &Path) -> CodegenResult<bool> {
        if self.is_current(path) {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CodegenError::io(parent, e))?;
        }
        fs::write(path, &self.source).map_err(|e| CodegenError::io(path, e))?;
        Ok(true)
    }
}

/// discover → parse → filter → resolve → render. Nothing is written.
pub fn generate(config: &CodegenConfig) -> CodegenResult<Generated> {
    config.validate()?;

    let paths = discover_scripts(&config.scripts, config.sort)?;
    if config.log_executed_queries {
        for path in &paths {
            debug!("loading script {}", path.display());
        }
    }
    let scripts = load_scripts(&paths)?;
    let schema = parse_scripts(
        &scripts,
        config.default_name_case,
        config.log_executed_queries,
    )?;
    if config.log_execution_results {
        debug!(
            "reflected {} tables from {} scripts",
            schema.tables.len(),
            scripts.len()
        );
    }

    let (schema, excluded) = filter_tables(schema, &config.includes, &config.excludes)?;
    for name in &excluded {
        debug!("table {name} excluded");
    }
    let tables = resolve_types(schema, &config.forced_types)?;
    if config.log_execution_results {
        for table in &tables {
            for column in table.columns.iter().filter(|c| c.ty.forced.is_some()) {
                debug!(
                    "{}.{}: {} forced to {}",
                    table.table.name,
                    column.column.name,
                    column.column.data_type,
                    column.ty.rust
                );
            }
        }
    }

    let options = RenderOptions {
        records: config.generate.records,
        daos: config.generate.daos,
        serde: config.generate.serde,
        db_module: config.target.db_module.clone(),
        scripts: config.scripts.clone(),
    };
    let rendered = render(&tables, &options);
    let mut names: Vec<String> = tables.iter().map(|t| t.table.name.clone()).collect();
    names.sort();

    info!(
        "generated {} tables into {} ({} excluded)",
        names.len(),
        config.target.module,
        excluded.len()
    );
    Ok(Generated {
        source: rendered.source,
        scripts: paths,
        tables: names,
        excluded,
        without_dao: rendered.without_dao,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(dir: &Path) -> CodegenConfig {
        CodegenConfig {
            scripts: format!("{}/*.sql", dir.display()),
            target: config::TargetOptions {
                path: dir.join("out/generated.rs"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn generates_from_scripts_in_version_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("V10__alter.sql"),
            "ALTER TABLE account ADD COLUMN active TINYINT(1) NOT NULL DEFAULT 1;",
        )
        .expect("write");
        fs::write(
            dir.path().join("V2__init.sql"),
            "CREATE TABLE account (id BIGSERIAL PRIMARY KEY, created TIMESTAMP);
             CREATE TABLE qrtz_locks (sched_name VARCHAR(120) NOT NULL, lock_name VARCHAR(40) NOT NULL,
                 PRIMARY KEY (sched_name, lock_name));",
        )
        .expect("write");

        let generated = generate(&config_for(dir.path())).expect("generate");
        assert_eq!(generated.tables, vec!["account".to_string()]);
        assert_eq!(generated.excluded, vec!["qrtz_locks".to_string()]);
        assert!(generated.source.contains("pub active: bool,"));
        assert!(generated
            .source
            .contains("pub created: Option<chrono::DateTime<chrono::Utc>>,"));
        assert!(!generated.source.contains("qrtz_locks"));
    }

    #[test]
    fn only_scheduler_tables_are_left_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("V1__init.sql"),
            "CREATE TABLE audit_log (message TEXT, at TIMESTAMP);
             CREATE TABLE t (id INT PRIMARY KEY);
             CREATE TABLE qrtz_calendars (sched_name VARCHAR(120) NOT NULL);",
        )
        .expect("write");

        let generated = generate(&config_for(dir.path())).expect("generate");
        assert_eq!(generated.tables, vec!["audit_log".to_string(), "t".to_string()]);
        assert_eq!(generated.excluded, vec!["qrtz_calendars".to_string()]);
        assert_eq!(generated.without_dao, vec!["audit_log".to_string()]);
        assert!(generated.source.contains("pub struct AuditLog {"));
    }

    #[test]
    fn empty_glob_yields_empty_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generated = generate(&config_for(dir.path())).expect("generate");
        assert!(generated.tables.is_empty());
        assert!(generated.source.contains("pub mod schema {"));
    }

    #[test]
    fn write_only_touches_stale_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("V1__init.sql"), "CREATE TABLE t (id INT PRIMARY KEY);")
            .expect("write");
        let config = config_for(dir.path());
        let generated = generate(&config).expect("generate");

        assert!(!generated.is_current(&config.target.path));
        assert!(generated.write(&config.target.path).expect("first write"));
        assert!(generated.is_current(&config.target.path));
        assert!(!generated.write(&config.target.path).expect("second write"));
    }
}
