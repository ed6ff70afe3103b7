use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::{CodegenError, CodegenResult};

/// Order in which discovered migration scripts are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Version-aware natural order: `V2__a.sql` before `V10__b.sql`.
    #[default]
    Semantic,
    Alphanumeric,
    None,
}

/// How unquoted identifiers are folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    #[default]
    Lower,
    Upper,
    AsIs,
}

impl NameCase {
    pub fn apply(self, ident: &str) -> String {
        match self {
            NameCase::Lower => ident.to_lowercase(),
            NameCase::Upper => ident.to_uppercase(),
            NameCase::AsIs => ident.to_string(),
        }
    }
}

/// Override of the generated type for columns matching both expressions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForcedType {
    pub name: String,
    pub include_expression: String,
    pub include_types: String,
}

impl ForcedType {
    pub fn new(name: &str, include_expression: &str, include_types: &str) -> Self {
        Self {
            name: name.to_string(),
            include_expression: include_expression.to_string(),
            include_types: include_types.to_string(),
        }
    }
}

pub fn default_forced_types() -> Vec<ForcedType> {
    vec![
        ForcedType::new("varchar", ".*", "JSONB?"),
        ForcedType::new("varchar", ".*", "INET"),
        ForcedType::new("Boolean", ".*", r"(?i:TINYINT\(1\))"),
        ForcedType::new("OffsetDateTime", ".*", "TIMESTAMP"),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    pub daos: bool,
    pub records: bool,
    pub serde: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            daos: true,
            records: true,
            serde: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TargetOptions {
    /// Module path the generated file is mounted at.
    pub module: String,
    /// File the generated source is written to.
    pub path: PathBuf,
    /// Module providing `PgPool` and `DbResult` to the generated DAOs.
    pub db_module: String,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            module: "crate::generated".to_string(),
            path: PathBuf::from("src/generated.rs"),
            db_module: "crate::db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    pub scripts: String,
    pub sort: SortOrder,
    pub default_name_case: NameCase,
    pub includes: String,
    pub excludes: String,
    pub forced_types: Vec<ForcedType>,
    pub generate: GenerateOptions,
    pub target: TargetOptions,
    pub log_executed_queries: bool,
    pub log_execution_results: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            scripts: "migrations/*.sql".to_string(),
            sort: SortOrder::Semantic,
            default_name_case: NameCase::Lower,
            includes: ".*".to_string(),
            excludes: "qrtz_.*".to_string(),
            forced_types: default_forced_types(),
            generate: GenerateOptions::default(),
            target: TargetOptions::default(),
            log_executed_queries: true,
            log_execution_results: true,
        }
    }
}

impl CodegenConfig {
    pub fn from_toml(text: &str) -> CodegenResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> CodegenResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| CodegenError::io(path, e))?;
        Self::from_toml(&text)
    }

    /// Loads `path` when it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &Path) -> CodegenResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("{} not found, using default codegen configuration", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> CodegenResult<()> {
        if self.generate.daos && !self.generate.records {
            return Err(CodegenError::Config(
                "generate.daos requires generate.records".to_string(),
            ));
        }
        if self.target.module.trim().is_empty() {
            return Err(CodegenError::Config("target.module is empty".to_string()));
        }
        super::types::TypeResolver::new(&self.forced_types)?;
        super::filter::TableFilter::new(&self.includes, &self.excludes)?;
        Ok(())
    }
}
