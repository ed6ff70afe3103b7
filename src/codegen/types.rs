use log::warn;
use regex::Regex;

use super::config::ForcedType;
use super::error::{CodegenError, CodegenResult};
use super::filter::full_match;
use super::model::{Column, Schema, SqlType, Table};

/// Diesel SQL type and Rust field type of a column, before nullability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    pub sql: String,
    pub rust: String,
    pub max_length: Option<u32>,
    /// Name of the forced type that produced this mapping, if any.
    pub forced: Option<String>,
}

impl ColumnType {
    fn mapped(sql: &str, rust: &str) -> Self {
        Self {
            sql: sql.to_string(),
            rust: rust.to_string(),
            max_length: None,
            forced: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub column: Column,
    pub ty: ColumnType,
}

impl ResolvedColumn {
    pub fn sql_type(&self) -> String {
        if self.column.nullable {
            format!("Nullable<{}>", self.ty.sql)
        } else {
            self.ty.sql.clone()
        }
    }

    pub fn field_type(&self) -> String {
        if self.column.nullable {
            format!("Option<{}>", self.ty.rust)
        } else {
            self.ty.rust.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub table: Table,
    pub columns: Vec<ResolvedColumn>,
}

impl ResolvedTable {
    pub fn column(&self, name: &str) -> Option<&ResolvedColumn> {
        self.columns.iter().find(|c| c.column.name == name)
    }
}

/// Rust mapping named by a forced type.
fn forced_target(name: &str) -> Option<ColumnType> {
    let mapped = match name.to_ascii_lowercase().as_str() {
        "varchar" | "string" | "text" | "clob" => ColumnType::mapped("Text", "String"),
        "boolean" | "bool" => ColumnType::mapped("Bool", "bool"),
        "offsetdatetime" | "instant" => {
            ColumnType::mapped("Timestamptz", "chrono::DateTime<chrono::Utc>")
        }
        "localdatetime" => ColumnType::mapped("Timestamp", "chrono::NaiveDateTime"),
        "localdate" => ColumnType::mapped("Date", "chrono::NaiveDate"),
        "short" => ColumnType::mapped("Int2", "i16"),
        "integer" | "int" => ColumnType::mapped("Int4", "i32"),
        "long" | "bigint" => ColumnType::mapped("Int8", "i64"),
        "json" | "jsonb" => ColumnType::mapped("Jsonb", "serde_json::Value"),
        "bytes" | "binary" => ColumnType::mapped("Bytea", "Vec<u8>"),
        _ => return None,
    };
    Some(mapped)
}

/// Built-in mapping from a SQL type to diesel's PostgreSQL types.
fn default_target(ty: &SqlType) -> Option<ColumnType> {
    if let Some(element) = ty.name.strip_suffix("[]") {
        let inner = default_target(&SqlType {
            name: element.to_string(),
            ..ty.clone()
        })?;
        return Some(ColumnType::mapped(
            &format!("Array<{}>", inner.sql),
            &format!("Vec<{}>", inner.rust),
        ));
    }
    let precision = ty.precision.unwrap_or(0);
    let mapped = match ty.name.as_str() {
        "TINYINT" | "SMALLINT" | "INT2" | "SMALLSERIAL" | "SERIAL2" => {
            ColumnType::mapped("Int2", "i16")
        }
        "MEDIUMINT" | "INT" | "INTEGER" | "INT4" | "SERIAL" | "SERIAL4" => {
            ColumnType::mapped("Int4", "i32")
        }
        "BIGINT" | "INT8" | "BIGSERIAL" | "SERIAL8" => ColumnType::mapped("Int8", "i64"),
        "BOOLEAN" | "BOOL" => ColumnType::mapped("Bool", "bool"),
        "BIT" if precision <= 1 => ColumnType::mapped("Bool", "bool"),
        "REAL" | "FLOAT4" => ColumnType::mapped("Float4", "f32"),
        "FLOAT" if precision <= 24 => ColumnType::mapped("Float4", "f32"),
        "FLOAT" | "DOUBLE" | "FLOAT8" => ColumnType::mapped("Float8", "f64"),
        "DECIMAL" | "NUMERIC" | "DEC" => ColumnType::mapped("Numeric", "bigdecimal::BigDecimal"),
        "VARCHAR" | "NVARCHAR" => ColumnType {
            max_length: ty.precision,
            ..ColumnType::mapped("Varchar", "String")
        },
        "CHAR" | "NCHAR" | "BPCHAR" => ColumnType {
            max_length: ty.precision,
            ..ColumnType::mapped("Bpchar", "String")
        },
        "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "CLOB" | "ENUM" | "SET" => {
            ColumnType::mapped("Text", "String")
        }
        "JSON" => ColumnType::mapped("Json", "serde_json::Value"),
        "JSONB" => ColumnType::mapped("Jsonb", "serde_json::Value"),
        "UUID" => ColumnType::mapped("Uuid", "uuid::Uuid"),
        "DATE" => ColumnType::mapped("Date", "chrono::NaiveDate"),
        "TIME" => ColumnType::mapped("Time", "chrono::NaiveTime"),
        "TIMESTAMP" => ColumnType::mapped("Timestamp", "chrono::NaiveDateTime"),
        "TIMESTAMPTZ" => ColumnType::mapped("Timestamptz", "chrono::DateTime<chrono::Utc>"),
        "BYTEA" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            ColumnType::mapped("Bytea", "Vec<u8>")
        }
        "INET" | "CIDR" => ColumnType::mapped("Inet", "ipnetwork::IpNetwork"),
        _ => return None,
    };
    Some(mapped)
}

struct CompiledForcedType {
    name: String,
    expression: Regex,
    types: Regex,
    target: ColumnType,
}

/// Resolves column types: forced types first, in declaration order, then the
/// built-in mapping.
pub struct TypeResolver {
    forced: Vec<CompiledForcedType>,
}

impl TypeResolver {
    pub fn new(forced_types: &[ForcedType]) -> CodegenResult<Self> {
        let forced = forced_types
            .iter()
            .map(|ft| {
                let mut target = forced_target(&ft.name)
                    .ok_or_else(|| CodegenError::UnknownForcedType(ft.name.clone()))?;
                target.forced = Some(ft.name.clone());
                Ok(CompiledForcedType {
                    name: ft.name.clone(),
                    expression: full_match(&ft.include_expression, false)?,
                    types: full_match(&ft.include_types, false)?,
                    target,
                })
            })
            .collect::<CodegenResult<Vec<_>>>()?;
        Ok(Self { forced })
    }

    /// Name of the first forced type matching `table.column`, if any.
    pub fn forced_type_for(&self, table: &str, column: &Column) -> Option<&str> {
        self.matching(table, column).map(|ft| ft.name.as_str())
    }

    fn matching(&self, table: &str, column: &Column) -> Option<&CompiledForcedType> {
        let qualified = format!("{table}.{}", column.name);
        let rendered = column.data_type.rendered();
        self.forced.iter().find(|ft| {
            (ft.expression.is_match(&column.name) || ft.expression.is_match(&qualified))
                && (ft.types.is_match(&rendered) || ft.types.is_match(&column.data_type.name))
        })
    }

    pub fn resolve(&self, table: &str, column: &Column) -> ColumnType {
        if let Some(ft) = self.matching(table, column) {
            return ft.target.clone();
        }
        default_target(&column.data_type).unwrap_or_else(|| {
            warn!(
                "{table}.{}: unsupported type {}, generated as text",
                column.name, column.data_type
            );
            ColumnType::mapped("Text", "String")
        })
    }

    pub fn resolve_table(&self, table: Table) -> ResolvedTable {
        let columns = table
            .columns
            .iter()
            .map(|column| ResolvedColumn {
                ty: self.resolve(&table.name, column),
                column: column.clone(),
            })
            .collect();
        ResolvedTable { table, columns }
    }
}

/// Computes the Rust and diesel type of every column in `schema`.
pub fn resolve_types(
    schema: Schema,
    forced_types: &[ForcedType],
) -> CodegenResult<Vec<ResolvedTable>> {
    let resolver = TypeResolver::new(forced_types)?;
    Ok(schema
        .tables
        .into_iter()
        .map(|t| resolver.resolve_table(t))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::config::default_forced_types;

    fn column(name: &str, ty: SqlType) -> Column {
        Column::new(name, ty)
    }

    fn resolver() -> TypeResolver {
        TypeResolver::new(&default_forced_types()).expect("default forced types")
    }

    #[test]
    fn tinyint_one_is_always_bool() {
        let r = resolver();
        for spelling in ["TINYINT", "tinyint"] {
            let ty = r.resolve("t", &column("flag", SqlType::new(spelling).with_precision(1)));
            assert_eq!(ty.rust, "bool");
            assert_eq!(ty.sql, "Bool");
            assert_eq!(ty.forced.as_deref(), Some("Boolean"));
        }
        let wide = r.resolve("t", &column("n", SqlType::new("TINYINT").with_precision(4)));
        assert_eq!(wide.rust, "i16");
    }

    #[test]
    fn timestamp_is_always_offset_aware() {
        let r = resolver();
        for ty in [SqlType::new("TIMESTAMP"), SqlType::new("TIMESTAMP").with_precision(6)] {
            let resolved = r.resolve("t", &column("created", ty));
            assert_eq!(resolved.rust, "chrono::DateTime<chrono::Utc>");
            assert_eq!(resolved.sql, "Timestamptz");
        }
    }

    #[test]
    fn json_and_inet_become_text() {
        let r = resolver();
        for name in ["JSON", "JSONB", "INET"] {
            let resolved = r.resolve("t", &column("c", SqlType::new(name)));
            assert_eq!(resolved.rust, "String");
            assert_eq!(resolved.forced.as_deref(), Some("varchar"));
        }
        assert_eq!(r.resolve("t", &column("c", SqlType::new("CIDR"))).sql, "Inet");
    }

    #[test]
    fn first_matching_forced_type_wins() {
        let forced = vec![
            ForcedType::new("long", "t\\.big_flag", "TINYINT\\(1\\)"),
            ForcedType::new("Boolean", ".*", "TINYINT\\(1\\)"),
        ];
        let r = TypeResolver::new(&forced).expect("resolver");
        let ty = SqlType::new("TINYINT").with_precision(1);
        assert_eq!(r.resolve("t", &column("big_flag", ty.clone())).rust, "i64");
        assert_eq!(r.resolve("t", &column("flag", ty.clone())).rust, "bool");
        assert_eq!(r.forced_type_for("u", &column("big_flag", ty)), Some("Boolean"));
    }

    #[test]
    fn nullable_columns_are_optional() {
        let r = resolver();
        let mut col = column("name", SqlType::new("VARCHAR").with_precision(64));
        let resolved = ResolvedColumn {
            ty: r.resolve("t", &col),
            column: col.clone(),
        };
        assert_eq!(resolved.field_type(), "Option<String>");
        assert_eq!(resolved.sql_type(), "Nullable<Varchar>");
        assert_eq!(resolved.ty.max_length, Some(64));

        col.nullable = false;
        let resolved = ResolvedColumn {
            ty: r.resolve("t", &col),
            column: col,
        };
        assert_eq!(resolved.field_type(), "String");
    }

    #[test]
    fn unknown_forced_type_is_rejected() {
        let err = TypeResolver::new(&[ForcedType::new("Money", ".*", "MONEY")]).err();
        assert!(matches!(err, Some(CodegenError::UnknownForcedType(_))));
    }

    #[test]
    fn unsupported_types_fall_back_to_text() {
        let ty = resolver().resolve("t", &column("geom", SqlType::new("GEOMETRY")));
        assert_eq!(ty.sql, "Text");
    }
}
