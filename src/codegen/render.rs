use std::collections::HashSet;

use log::warn;

use super::types::{ResolvedColumn, ResolvedTable};

pub const GENERATED_HEADER: &str =
    "// @generated automatically by baseplatform codegen. Do not edit.";

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "try",
];

/// What to emit besides the `table!` definitions.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub records: bool,
    pub daos: bool,
    pub serde: bool,
    /// Module exporting `PgPool` and `DbResult`.
    pub db_module: String,
    /// Script pattern noted in the file header.
    pub scripts: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            records: true,
            daos: true,
            serde: true,
            db_module: "crate::db".to_string(),
            scripts: "migrations/*.sql".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub source: String,
    /// Tables rendered without a DAO because they have no primary key.
    pub without_dao: Vec<String>,
}

/// Rust identifier for a SQL name; the second value is true when it differs
/// from the SQL name and needs a `sql_name` attribute.
pub fn rust_ident(name: &str) -> (String, bool) {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RUST_KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    let renamed = ident != name;
    (ident, renamed)
}

/// `user_role_map` becomes `UserRoleMap`.
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

struct Writer {
    out: String,
    depth: usize,
}

impl Writer {
    fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }
}

/// Naming shared by every emitted item of one table.
struct TableNames {
    module: String,
    record: String,
    new_record: String,
    dao: String,
}

impl TableNames {
    fn of(table: &ResolvedTable) -> Self {
        let (module, _) = rust_ident(&table.table.name);
        let record = pascal_case(&table.table.name);
        Self {
            module: format!("schema::{module}"),
            new_record: format!("New{record}"),
            dao: format!("{record}Dao"),
            record,
        }
    }
}

fn field(column: &ResolvedColumn) -> String {
    rust_ident(&column.column.name).0
}

fn key_columns(table: &ResolvedTable) -> Vec<&ResolvedColumn> {
    table
        .table
        .primary_key
        .iter()
        .filter_map(|name| table.column(name))
        .collect()
}

/// True when every primary key column exists on the table.
fn has_key(table: &ResolvedTable) -> bool {
    !table.table.primary_key.is_empty()
        && key_columns(table).len() == table.table.primary_key.len()
}

fn key_type(keys: &[&ResolvedColumn]) -> String {
    match keys {
        [single] => single.ty.rust.clone(),
        _ => format!(
            "({})",
            keys.iter()
                .map(|k| k.ty.rust.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn render_table(w: &mut Writer, table: &ResolvedTable) {
    let (ident, renamed) = rust_ident(&table.table.name);
    // diesel needs a key; a key-less table is keyed on all of its columns
    let keys = if has_key(table) {
        table
            .table
            .primary_key
            .iter()
            .map(|k| rust_ident(k).0)
            .collect::<Vec<_>>()
    } else {
        table.columns.iter().map(field).collect()
    }
    .join(", ");
    w.open("diesel::table! {");
    if renamed {
        w.line(format!("#[sql_name = \"{}\"]", table.table.name));
    }
    w.open(format!("{ident} ({keys}) {{"));
    for column in &table.columns {
        let (name, renamed) = rust_ident(&column.column.name);
        if renamed {
            w.line(format!("#[sql_name = \"{}\"]", column.column.name));
        }
        if let Some(len) = column.ty.max_length {
            w.line(format!("#[max_length = {len}]"));
        }
        w.line(format!("{name} -> {},", column.sql_type()));
    }
    w.close("}");
    w.close("}");
}

fn render_record(w: &mut Writer, table: &ResolvedTable, options: &RenderOptions) {
    let names = TableNames::of(table);
    let keyed = has_key(table);
    let keys = key_columns(table);
    let changeable = keyed && table.columns.len() > keys.len();

    let mut derives = vec!["Debug", "Clone", "PartialEq", "Queryable", "Selectable"];
    if keyed {
        derives.push("Identifiable");
    }
    derives.push("Insertable");
    if changeable {
        derives.push("AsChangeset");
    }
    if options.serde {
        derives.extend(["Serialize", "Deserialize"]);
    }

    w.line(format!("/// Row of the `{}` table.", table.table.name));
    w.line(format!("#[derive({})]", derives.join(", ")));
    w.line(format!("#[diesel(table_name = {})]", names.module));
    let key_fields: Vec<String> = keys.iter().map(|k| field(k)).collect();
    if keyed && key_fields != ["id"] {
        w.line(format!("#[diesel(primary_key({}))]", key_fields.join(", ")));
    }
    w.line("#[diesel(check_for_backend(diesel::pg::Pg))]");
    w.open(format!("pub struct {} {{", names.record));
    for column in &table.columns {
        render_serde_rename(w, column, options);
        w.line(format!("pub {}: {},", field(column), column.field_type()));
    }
    w.close("}");

    let insertable: Vec<&ResolvedColumn> = table
        .columns
        .iter()
        .filter(|c| !c.column.auto_increment)
        .collect();
    if insertable.is_empty() {
        return;
    }
    w.blank();
    let mut derives = vec!["Debug", "Clone", "Insertable"];
    if options.serde {
        derives.push("Deserialize");
    }
    w.line(format!(
        "/// Insertable `{}` row; `None` leaves the column to its default.",
        table.table.name
    ));
    w.line(format!("#[derive({})]", derives.join(", ")));
    w.line(format!("#[diesel(table_name = {})]", names.module));
    w.open(format!("pub struct {} {{", names.new_record));
    for column in insertable {
        render_serde_rename(w, column, options);
        let ty = if column.column.nullable || column.column.has_default() {
            format!("Option<{}>", column.ty.rust)
        } else {
            column.ty.rust.clone()
        };
        w.line(format!("pub {}: {ty},", field(column)));
    }
    w.close("}");
}

fn render_serde_rename(w: &mut Writer, column: &ResolvedColumn, options: &RenderOptions) {
    if options.serde && rust_ident(&column.column.name).1 {
        w.line(format!("#[serde(rename = \"{}\")]", column.column.name));
    }
}

fn render_dao(w: &mut Writer, table: &ResolvedTable) {
    let names = TableNames::of(table);
    let record = &names.record;
    let module = &names.module;
    let keys = key_columns(table);
    let changeable = table.columns.len() > keys.len();
    let insertable = table.columns.iter().any(|c| !c.column.auto_increment);

    w.line(format!("/// Data access for the `{}` table.", table.table.name));
    w.line("#[derive(Clone)]");
    w.open(format!("pub struct {} {{", names.dao));
    w.line("pool: PgPool,");
    w.close("}");
    w.blank();
    w.open(format!("impl {} {{", names.dao));

    w.open("pub fn new(pool: PgPool) -> Self {");
    w.line("Self { pool }");
    w.close("}");
    w.blank();

    w.open(format!("pub fn find_all(&self) -> DbResult<Vec<{record}>> {{"));
    w.line("let mut conn = self.pool.get()?;");
    w.line(format!(
        "Ok({module}::table.select({record}::as_select()).load(&mut conn)?)"
    ));
    w.close("}");
    w.blank();

    w.open(format!(
        "pub fn find_by_id(&self, id: {}) -> DbResult<Option<{record}>> {{",
        key_type(&keys)
    ));
    w.line("let mut conn = self.pool.get()?;");
    w.open(format!("Ok({module}::table"));
    w.line(".find(id)");
    w.line(format!(".select({record}::as_select())"));
    w.line(".first(&mut conn)");
    w.line(".optional()?)");
    w.depth -= 1;
    w.close("}");

    let single_key = if keys.len() == 1 {
        Some(keys[0].column.name.as_str())
    } else {
        None
    };
    for column in &table.columns {
        if Some(column.column.name.as_str()) == single_key {
            continue;
        }
        let name = field(column);
        let param = if column.ty.rust == "String" {
            "&str".to_string()
        } else {
            column.ty.rust.clone()
        };
        w.blank();
        w.open(format!(
            "pub fn fetch_by_{name}(&self, value: {param}) -> DbResult<Vec<{record}>> {{"
        ));
        w.line("let mut conn = self.pool.get()?;");
        w.open(format!("Ok({module}::table"));
        w.line(format!(".filter({module}::{name}.eq(value))"));
        w.line(format!(".select({record}::as_select())"));
        w.line(".load(&mut conn)?)");
        w.depth -= 1;
        w.close("}");

        if table.table.is_unique(&column.column.name) {
            w.blank();
            w.open(format!(
                "pub fn fetch_one_by_{name}(&self, value: {param}) -> DbResult<Option<{record}>> {{"
            ));
            w.line("let mut conn = self.pool.get()?;");
            w.open(format!("Ok({module}::table"));
            w.line(format!(".filter({module}::{name}.eq(value))"));
            w.line(format!(".select({record}::as_select())"));
            w.line(".first(&mut conn)");
            w.line(".optional()?)");
            w.depth -= 1;
            w.close("}");
        }
    }

    if insertable {
        w.blank();
        w.open(format!(
            "pub fn insert(&self, record: &{}) -> DbResult<{record}> {{",
            names.new_record
        ));
        w.line("let mut conn = self.pool.get()?;");
        w.open(format!("Ok(diesel::insert_into({module}::table)"));
        w.line(".values(record)");
        w.line(format!(".returning({record}::as_returning())"));
        w.line(".get_result(&mut conn)?)");
        w.depth -= 1;
        w.close("}");
    }

    if changeable {
        w.blank();
        w.open(format!(
            "pub fn update(&self, record: &{record}) -> DbResult<usize> {{"
        ));
        w.line("let mut conn = self.pool.get()?;");
        w.line("Ok(diesel::update(record).set(record).execute(&mut conn)?)");
        w.close("}");
    }

    w.blank();
    w.open(format!(
        "pub fn delete_by_id(&self, id: {}) -> DbResult<usize> {{",
        key_type(&keys)
    ));
    w.line("let mut conn = self.pool.get()?;");
    w.line(format!(
        "Ok(diesel::delete({module}::table.find(id)).execute(&mut conn)?)"
    ));
    w.close("}");
    w.close("}");
}

/// `(child, parent, column)` for every single-column foreign key onto a
/// rendered parent's primary key; one per table pair.
fn joins(tables: &[&ResolvedTable]) -> Vec<(String, String, String)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for child in tables {
        for fk in &child.table.foreign_keys {
            if fk.columns.len() != 1 || fk.ref_table == child.table.name {
                continue;
            }
            let Some(parent) = tables.iter().find(|t| t.table.name == fk.ref_table) else {
                continue;
            };
            let onto_key = fk.ref_columns.is_empty() || fk.ref_columns == parent.table.primary_key;
            if parent.table.primary_key.len() != 1 || !onto_key {
                continue;
            }
            if seen.insert((child.table.name.clone(), parent.table.name.clone())) {
                out.push((
                    rust_ident(&child.table.name).0,
                    rust_ident(&parent.table.name).0,
                    rust_ident(&fk.columns[0]).0,
                ));
            }
        }
    }
    out.sort();
    out
}

/// Emits the generated module: `schema` with the `table!` definitions, then
/// records and DAOs per table, ordered by table name.
pub fn render(tables: &[ResolvedTable], options: &RenderOptions) -> Rendered {
    let mut kept: Vec<&ResolvedTable> = tables.iter().collect();
    kept.sort_by(|a, b| a.table.name.cmp(&b.table.name));
    let without_dao: Vec<String> = kept
        .iter()
        .filter(|t| !has_key(t))
        .map(|t| t.table.name.clone())
        .collect();
    for name in &without_dao {
        warn!("table {name} has no primary key, no DAO generated");
    }

    let mut w = Writer::new();
    w.line(GENERATED_HEADER);
    w.line(format!("// Scripts: {}", options.scripts));
    w.blank();
    if options.records {
        w.line("use diesel::prelude::*;");
        if options.serde {
            w.line("use serde::{Deserialize, Serialize};");
        }
        w.blank();
    }
    if options.daos {
        w.line(format!("use {}::{{DbResult, PgPool}};", options.db_module));
        w.blank();
    }

    w.open("pub mod schema {");
    for (i, table) in kept.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        render_table(&mut w, table);
    }
    let joins = joins(&kept);
    if !joins.is_empty() {
        w.blank();
        for (child, parent, column) in &joins {
            w.line(format!("diesel::joinable!({child} -> {parent} ({column}));"));
        }
    }
    if kept.len() > 1 {
        w.blank();
        w.open("diesel::allow_tables_to_appear_in_same_query!(");
        for table in &kept {
            w.line(format!("{},", rust_ident(&table.table.name).0));
        }
        w.close(");");
    }
    w.close("}");

    for table in &kept {
        if options.records {
            w.blank();
            render_record(&mut w, table, options);
        }
        if options.daos && has_key(table) {
            w.blank();
            render_dao(&mut w, table);
        }
    }

    Rendered {
        source: w.out,
        without_dao,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::config::{NameCase, default_forced_types};
    use crate::codegen::ddl::DdlParser;
    use crate::codegen::types::resolve_types;

    fn render_sql(sql: &str, options: &RenderOptions) -> Rendered {
        let mut parser = DdlParser::new(NameCase::Lower);
        parser.parse("V1__test.sql", sql).expect("parse");
        let tables = resolve_types(parser.into_schema(), &default_forced_types()).expect("types");
        render(&tables, options)
    }

    const SCHEMA: &str = r#"
        CREATE TABLE "user" (
            id BIGSERIAL PRIMARY KEY,
            username VARCHAR(64) NOT NULL UNIQUE,
            enable TINYINT(1) NOT NULL DEFAULT 1,
            type VARCHAR(10),
            create_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE role (id BIGSERIAL PRIMARY KEY, code VARCHAR(32) NOT NULL);
        CREATE TABLE user_role_map (
            user_id BIGINT NOT NULL REFERENCES "user" (id),
            role_id BIGINT NOT NULL REFERENCES role,
            PRIMARY KEY (user_id, role_id)
        );
        CREATE TABLE audit_log (message TEXT, at TIMESTAMP);
    "#;

    #[test]
    fn identifiers_and_names() {
        assert_eq!(rust_ident("type"), ("type_".to_string(), true));
        assert_eq!(rust_ident("user"), ("user".to_string(), false));
        assert_eq!(rust_ident("createTime"), ("createTime".to_string(), false));
        assert_eq!(rust_ident("2fa code"), ("_2fa_code".to_string(), true));
        assert_eq!(pascal_case("user_role_map"), "UserRoleMap");
    }

    #[test]
    fn emits_tables_with_forced_types() {
        let out = render_sql(SCHEMA, &RenderOptions::default());
        let src = &out.source;
        assert!(src.starts_with(GENERATED_HEADER));
        assert!(src.contains("        user (id) {\n"));
        assert!(src.contains("            enable -> Bool,\n"));
        assert!(src.contains("            create_time -> Timestamptz,\n"));
        assert!(src.contains(
            "            #[sql_name = \"type\"]\n            #[max_length = 10]\n            type_ -> Nullable<Varchar>,\n"
        ));
        assert!(src.contains("pub enable: bool,"));
        assert!(src.contains("pub create_time: chrono::DateTime<chrono::Utc>,"));
        assert!(src.contains("user_role_map (user_id, role_id) {"));
        assert!(src.contains("diesel::joinable!(user_role_map -> role (role_id));"));
        assert!(src.contains("diesel::joinable!(user_role_map -> user (user_id));"));
        assert_eq!(out.without_dao, vec!["audit_log".to_string()]);
    }

    #[test]
    fn datetime_columns_are_offset_aware() {
        let src = render_sql(
            "CREATE TABLE event (id BIGINT PRIMARY KEY, created DATETIME NOT NULL);",
            &RenderOptions::default(),
        )
        .source;
        assert!(src.contains("pub created: chrono::DateTime<chrono::Utc>,"));
        assert!(src.contains("            created -> Timestamptz,\n"));
    }

    #[test]
    fn keyless_tables_get_a_record_but_no_dao() {
        let src = render_sql(SCHEMA, &RenderOptions::default()).source;
        assert!(src.contains("        audit_log (message, at) {\n"));
        assert!(src.contains("            at -> Nullable<Timestamptz>,\n"));
        assert!(src.contains(
            "#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]\n#[diesel(table_name = schema::audit_log)]\n#[diesel(check_for_backend(diesel::pg::Pg))]\npub struct AuditLog {"
        ));
        assert!(src.contains("pub struct NewAuditLog {"));
        assert!(!src.contains("AuditLogDao"));
        assert!(src.contains("    audit_log,\n"));
    }

    #[test]
    fn emits_records_and_daos() {
        let src = render_sql(SCHEMA, &RenderOptions::default()).source;
        assert!(src.contains("pub struct User {"));
        assert!(src.contains("pub struct NewUser {"));
        assert!(src.contains("pub create_time: Option<chrono::DateTime<chrono::Utc>>,"));
        assert!(src.contains("pub struct UserDao {"));
        assert!(src.contains("pub fn find_by_id(&self, id: i64) -> DbResult<Option<User>> {"));
        assert!(src.contains(
            "pub fn fetch_one_by_username(&self, value: &str) -> DbResult<Option<User>> {"
        ));
        assert!(src.contains("pub fn fetch_by_enable(&self, value: bool) -> DbResult<Vec<User>> {"));
        assert!(src.contains("#[diesel(primary_key(user_id, role_id))]"));
        assert!(src.contains(
            "pub fn find_by_id(&self, id: (i64, i64)) -> DbResult<Option<UserRoleMap>> {"
        ));
        assert!(src.contains("pub fn fetch_by_user_id(&self, value: i64)"));
        // every column of user_role_map is part of its key
        assert!(!src.contains("record: &UserRoleMap"));
        assert!(src.contains("#[serde(rename = \"type\")]"));
    }

    #[test]
    fn records_only_skip_dao_imports() {
        let options = RenderOptions {
            daos: false,
            serde: false,
            ..RenderOptions::default()
        };
        let src = render_sql(SCHEMA, &options).source;
        assert!(!src.contains("PgPool"));
        assert!(!src.contains("Serialize"));
        assert!(src.contains("pub struct Role {"));
    }
}
