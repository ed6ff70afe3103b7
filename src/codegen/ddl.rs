//! DDL interpreter that replays migration scripts into a [`Schema`].
//!
//! Understands the table-shaping subset of PostgreSQL and MySQL DDL:
//! `CREATE TABLE`, `CREATE UNIQUE INDEX`, `ALTER TABLE` (add/drop/modify/change/
//! alter/rename), `DROP TABLE` and `RENAME TABLE`. Every other statement is
//! skipped.

use log::debug;

use super::config::NameCase;
use super::error::{CodegenError, CodegenResult};
use super::model::{Column, ForeignKey, Schema, SqlType, Table};
use super::scripts::Script;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Quoted(String),
    Number(String),
    Str(String),
    Sym(char),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

impl Token {
    fn text(&self) -> String {
        match &self.tok {
            Tok::Word(w) | Tok::Number(w) => w.clone(),
            Tok::Quoted(q) => format!("\"{q}\""),
            Tok::Str(s) => format!("'{s}'"),
            Tok::Sym(c) => c.to_string(),
        }
    }
}

fn tokenize(script: &str, sql: &str) -> CodegenResult<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let len = chars.len();
    let mut out = Vec::new();
    let mut i = 0;
    let mut line = 1;

    let unterminated = |what: &str, line: usize| CodegenError::Parse {
        script: script.to_string(),
        line,
        message: format!("unterminated {what}"),
    };

    while i < len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '-' if next == Some('-') => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            '#' => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                let start = line;
                i += 2;
                loop {
                    if i >= len {
                        return Err(unterminated("comment", start));
                    }
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
            }
            '\'' | '"' | '`' => {
                let start = line;
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    if i >= len {
                        return Err(unterminated("quoted text", start));
                    }
                    let ch = chars[i];
                    if ch == quote {
                        if chars.get(i + 1) == Some(&quote) {
                            text.push(quote);
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    if ch == '\n' {
                        line += 1;
                    }
                    text.push(ch);
                    i += 1;
                }
                let tok = if quote == '\'' {
                    Tok::Str(text)
                } else {
                    Tok::Quoted(text)
                };
                out.push(Token { tok, line: start });
            }
            '$' => {
                let mut j = i + 1;
                while j < len && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                if j < len && chars[j] == '$' {
                    let tag: String = chars[i..=j].iter().collect();
                    let tag_chars: Vec<char> = tag.chars().collect();
                    let start = line;
                    let body_start = j + 1;
                    let mut k = body_start;
                    let end = loop {
                        if k + tag_chars.len() > len {
                            return Err(unterminated("dollar-quoted text", start));
                        }
                        if chars[k..k + tag_chars.len()] == tag_chars[..] {
                            break k;
                        }
                        if chars[k] == '\n' {
                            line += 1;
                        }
                        k += 1;
                    };
                    let body: String = chars[body_start..end].iter().collect();
                    out.push(Token {
                        tok: Tok::Str(body),
                        line: start,
                    });
                    i = end + tag_chars.len();
                } else {
                    out.push(Token {
                        tok: Tok::Sym('$'),
                        line,
                    });
                    i += 1;
                }
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < len && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                out.push(Token {
                    tok: Tok::Number(chars[start..i].iter().collect()),
                    line,
                });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < len && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                out.push(Token {
                    tok: Tok::Word(chars[start..i].iter().collect()),
                    line,
                });
            }
            other => {
                out.push(Token {
                    tok: Tok::Sym(other),
                    line,
                });
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Keywords that end a `DEFAULT` expression inside a column definition.
const MODIFIER_KEYWORDS: &[&str] = &[
    "NOT",
    "NULL",
    "AUTO_INCREMENT",
    "AUTOINCREMENT",
    "PRIMARY",
    "UNIQUE",
    "REFERENCES",
    "COMMENT",
    "CONSTRAINT",
    "CHECK",
    "ON",
    "COLLATE",
    "GENERATED",
];

struct Cursor<'a> {
    script: &'a str,
    toks: &'a [Token],
    pos: usize,
    name_case: NameCase,
}

impl<'a> Cursor<'a> {
    fn new(script: &'a str, toks: &'a [Token], name_case: NameCase) -> Self {
        Self {
            script,
            toks,
            pos: 0,
            name_case,
        }
    }

    fn peek(&self) -> Option<&'a Tok> {
        self.toks.get(self.pos).map(|t| &t.tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Tok> {
        self.toks.get(self.pos + offset).map(|t| &t.tok)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.toks.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn line(&self) -> usize {
        self.toks
            .get(self.pos)
            .or_else(|| self.toks.last())
            .map(|t| t.line)
            .unwrap_or(0)
    }

    fn error(&self, message: impl Into<String>) -> CodegenError {
        CodegenError::Parse {
            script: self.script.to_string(),
            line: self.line(),
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Tok::Word(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn is_kw_at(&self, offset: usize, kw: &str) -> bool {
        matches!(self.peek_at(offset), Some(Tok::Word(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.is_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes the whole keyword sequence or nothing.
    fn eat_seq(&mut self, kws: &[&str]) -> bool {
        if kws.iter().enumerate().all(|(i, kw)| self.is_kw_at(i, kw)) {
            self.pos += kws.len();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> CodegenResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected {kw}")))
        }
    }

    fn is_sym(&self, c: char) -> bool {
        self.peek() == Some(&Tok::Sym(c))
    }

    fn eat_sym(&mut self, c: char) -> bool {
        if self.is_sym(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, c: char) -> CodegenResult<()> {
        if self.eat_sym(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    fn ident(&mut self) -> CodegenResult<String> {
        match self.peek() {
            Some(Tok::Word(w)) => {
                self.pos += 1;
                Ok(self.name_case.apply(w))
            }
            Some(Tok::Quoted(q)) => {
                self.pos += 1;
                Ok(q.clone())
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    /// `schema.table` resolves to `table`.
    fn qualified_ident(&mut self) -> CodegenResult<String> {
        let mut name = self.ident()?;
        while self.eat_sym('.') {
            name = self.ident()?;
        }
        Ok(name)
    }

    /// `(a, b DESC, c(10))`: the leading identifier of every element.
    fn ident_list(&mut self) -> CodegenResult<Vec<String>> {
        self.expect_sym('(')?;
        let mut names = Vec::new();
        loop {
            names.push(self.ident()?);
            self.skip_element();
            if self.eat_sym(',') {
                continue;
            }
            self.expect_sym(')')?;
            return Ok(names);
        }
    }

    fn skip_parens(&mut self) {
        if !self.is_sym('(') {
            return;
        }
        let mut depth = 0usize;
        while let Some(token) = self.advance() {
            match token.tok {
                Tok::Sym('(') => depth += 1,
                Tok::Sym(')') => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// True when the next token closes the current list element.
    fn at_element_end(&self) -> bool {
        self.at_end() || self.is_sym(',') || self.is_sym(')')
    }

    /// Skips to the next top-level `,` or `)` without consuming it.
    fn skip_element(&mut self) {
        while !self.at_element_end() {
            if self.is_sym('(') {
                self.skip_parens();
            } else {
                self.pos += 1;
            }
        }
    }

    /// Source text of an expression, ending at a modifier keyword.
    fn expression_text(&mut self) -> String {
        let mut parts = Vec::new();
        let mut first = true;
        while !self.at_element_end() {
            if !first && MODIFIER_KEYWORDS.iter().any(|kw| self.is_kw(kw)) {
                break;
            }
            first = false;
            if self.is_sym('(') {
                let start = self.pos;
                self.skip_parens();
                parts.extend(self.toks[start..self.pos].iter().map(Token::text));
            } else if let Some(token) = self.advance() {
                parts.push(token.text());
            }
        }
        parts
            .join(" ")
            .replace(" (", "(")
            .replace("( ", "(")
            .replace(" )", ")")
            .replace(" ,", ",")
    }

    fn number(&mut self) -> Option<u32> {
        match self.peek() {
            Some(Tok::Number(n)) => {
                let value = n.parse().ok();
                self.pos += 1;
                value
            }
            _ => None,
        }
    }

    fn statement_text(&self) -> String {
        let text = self
            .toks
            .iter()
            .map(Token::text)
            .collect::<Vec<_>>()
            .join(" ");
        if text.chars().count() > 120 {
            let cut: String = text.chars().take(117).collect();
            format!("{cut}...")
        } else {
            text
        }
    }
}

fn parse_type(c: &mut Cursor<'_>) -> CodegenResult<SqlType> {
    let raw = match c.peek() {
        Some(Tok::Word(w)) | Some(Tok::Quoted(w)) => w.to_ascii_uppercase(),
        _ => return Err(c.error("expected column type")),
    };
    c.pos += 1;

    let mut name = match raw.as_str() {
        "DOUBLE" => {
            c.eat_kw("PRECISION");
            "DOUBLE".to_string()
        }
        "CHARACTER" | "CHAR" => {
            if c.eat_kw("VARYING") {
                "VARCHAR".to_string()
            } else {
                "CHAR".to_string()
            }
        }
        "BIT" if c.eat_kw("VARYING") => "VARBIT".to_string(),
        "DATETIME" => "TIMESTAMP".to_string(),
        _ => raw.clone(),
    };
    let mut data_type = SqlType::new(name.clone());

    if c.is_sym('(') {
        let start = c.pos;
        c.pos += 1;
        match c.number() {
            Some(p) => {
                data_type.precision = Some(p);
                if c.eat_sym(',') {
                    data_type.scale = c.number();
                }
                if !c.eat_sym(')') {
                    c.pos = start;
                    c.skip_parens();
                }
            }
            None => {
                c.pos = start;
                c.skip_parens();
            }
        }
    }

    if name == "TIMESTAMP" || name == "TIME" {
        if c.eat_seq(&["WITH", "TIME", "ZONE"]) {
            name.push_str("TZ");
            data_type.name = name;
        } else {
            c.eat_seq(&["WITHOUT", "TIME", "ZONE"]);
        }
    }

    if c.is_sym('[') {
        while c.eat_sym('[') {
            c.number();
            c.expect_sym(']')?;
        }
        data_type.name.push_str("[]");
    } else if c.eat_kw("ARRAY") {
        data_type.name.push_str("[]");
    }
    Ok(data_type)
}

/// `REFERENCES t [(cols)] [ON DELETE ...]`, after the keyword itself.
///
/// An omitted column list stays empty and means the referenced primary key.
fn parse_references(c: &mut Cursor<'_>) -> CodegenResult<(String, Vec<String>)> {
    let table = c.qualified_ident()?;
    let columns = if c.is_sym('(') {
        c.ident_list()?
    } else {
        Vec::new()
    };
    Ok((table, columns))
}

/// Parses one column definition and adds it to `table`.
fn parse_column(c: &mut Cursor<'_>, table: &mut Table) -> CodegenResult<()> {
    let name = c.ident()?;
    if table.column(&name).is_some() {
        return Err(c.error(format!("duplicate column {name} in {}", table.name)));
    }
    let data_type = parse_type(c)?;
    let mut column = Column::new(name.clone(), data_type);
    if column.data_type.name.ends_with("SERIAL") {
        column.auto_increment = true;
        column.nullable = false;
    }

    let mut primary = false;
    let mut unique = false;
    let mut reference = None;

    while !c.at_element_end() {
        if c.eat_seq(&["NOT", "NULL"]) {
            column.nullable = false;
        } else if c.eat_kw("NULL") {
            column.nullable = true;
        } else if c.eat_kw("DEFAULT") {
            let expr = c.expression_text();
            column.default = if expr.eq_ignore_ascii_case("NULL") {
                None
            } else {
                Some(expr)
            };
        } else if c.eat_kw("AUTO_INCREMENT") || c.eat_kw("AUTOINCREMENT") {
            column.auto_increment = true;
        } else if c.eat_kw("IDENTITY") {
            column.auto_increment = true;
            c.skip_parens();
        } else if c.eat_kw("GENERATED") {
            c.eat_kw("ALWAYS");
            c.eat_seq(&["BY", "DEFAULT"]);
            c.expect_kw("AS")?;
            if c.eat_kw("IDENTITY") {
                column.auto_increment = true;
            }
            c.skip_parens();
            c.eat_kw("STORED");
            c.eat_kw("VIRTUAL");
        } else if c.eat_seq(&["PRIMARY", "KEY"]) {
            primary = true;
        } else if c.eat_kw("UNIQUE") {
            c.eat_kw("KEY");
            unique = true;
        } else if c.eat_kw("REFERENCES") {
            reference = Some(parse_references(c)?);
        } else if c.eat_kw("CONSTRAINT") {
            c.ident()?;
        } else if c.eat_kw("UNSIGNED") {
            column.data_type.unsigned = true;
        } else if c.eat_seq(&["ON", "UPDATE"]) || c.eat_seq(&["ON", "DELETE"]) {
            let action = c.eat_seq(&["SET", "NULL"])
                || c.eat_seq(&["SET", "DEFAULT"])
                || c.eat_seq(&["NO", "ACTION"]);
            if !action {
                c.expression_text();
            }
        } else if c.eat_kw("CHECK") {
            c.skip_parens();
        } else if c.is_sym('(') {
            c.skip_parens();
        } else {
            // COMMENT 'x', COLLATE x, CHARACTER SET x, ZEROFILL and friends
            c.pos += 1;
        }
    }

    table.columns.push(column);
    if primary {
        table.set_primary_key(vec![name.clone()]);
    }
    if unique {
        table.add_unique(vec![name.clone()]);
    }
    if let Some((ref_table, ref_columns)) = reference {
        table.foreign_keys.push(ForeignKey {
            columns: vec![name],
            ref_table,
            ref_columns,
        });
    }
    Ok(())
}

fn is_constraint_start(c: &Cursor<'_>) -> bool {
    const STARTS: &[&str] = &[
        "CONSTRAINT",
        "PRIMARY",
        "UNIQUE",
        "FOREIGN",
        "KEY",
        "INDEX",
        "FULLTEXT",
        "SPATIAL",
        "CHECK",
        "EXCLUDE",
    ];
    STARTS.iter().any(|kw| c.is_kw(kw))
}

/// Table-level constraint or index clause.
fn parse_constraint(c: &mut Cursor<'_>, table: &mut Table) -> CodegenResult<()> {
    if c.eat_kw("CONSTRAINT") && !c.is_kw("PRIMARY") && !c.is_kw("UNIQUE") && !c.is_kw("FOREIGN")
    {
        c.ident()?;
    }
    if c.eat_seq(&["PRIMARY", "KEY"]) {
        let columns = c.ident_list()?;
        table.set_primary_key(columns);
    } else if c.eat_kw("UNIQUE") {
        if !c.eat_kw("KEY") {
            c.eat_kw("INDEX");
        }
        if !c.is_sym('(') {
            c.ident()?;
        }
        let columns = c.ident_list()?;
        table.add_unique(columns);
    } else if c.eat_seq(&["FOREIGN", "KEY"]) {
        if !c.is_sym('(') {
            c.ident()?;
        }
        let columns = c.ident_list()?;
        c.expect_kw("REFERENCES")?;
        let (ref_table, ref_columns) = parse_references(c)?;
        table.foreign_keys.push(ForeignKey {
            columns,
            ref_table,
            ref_columns,
        });
    }
    c.skip_element();
    Ok(())
}

fn parse_element(c: &mut Cursor<'_>, table: &mut Table) -> CodegenResult<()> {
    if is_constraint_start(c) {
        parse_constraint(c, table)
    } else {
        parse_column(c, table)
    }
}

/// Replays DDL statements against an in-memory schema.
pub struct DdlParser {
    name_case: NameCase,
    log_statements: bool,
    schema: Schema,
}

impl DdlParser {
    pub fn new(name_case: NameCase) -> Self {
        Self {
            name_case,
            log_statements: false,
            schema: Schema::default(),
        }
    }

    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    pub fn parse(&mut self, script: &str, sql: &str) -> CodegenResult<()> {
        let tokens = tokenize(script, sql)?;
        for statement in tokens.split(|t| t.tok == Tok::Sym(';')) {
            if statement.is_empty() {
                continue;
            }
            let mut c = Cursor::new(script, statement, self.name_case);
            if self.log_statements {
                debug!("{}:{}: {}", script, c.line(), c.statement_text());
            }
            self.statement(&mut c)?;
        }
        Ok(())
    }

    pub fn into_schema(self) -> Schema {
        self.schema
    }

    fn statement(&mut self, c: &mut Cursor<'_>) -> CodegenResult<()> {
        if c.eat_kw("CREATE") {
            c.eat_seq(&["OR", "REPLACE"]);
            let _ = c.eat_kw("TEMPORARY") || c.eat_kw("TEMP") || c.eat_kw("UNLOGGED");
            if c.eat_kw("TABLE") {
                return self.create_table(c);
            }
            if c.eat_kw("UNIQUE") && c.eat_kw("INDEX") {
                return self.create_unique_index(c);
            }
        } else if c.eat_kw("ALTER") {
            if c.eat_kw("TABLE") {
                return self.alter_table(c);
            }
        } else if c.eat_kw("DROP") {
            if c.eat_kw("TABLE") {
                return self.drop_table(c);
            }
        } else if c.eat_kw("RENAME") && c.eat_kw("TABLE") {
            return self.rename_tables(c);
        }
        Ok(())
    }

    fn create_table(&mut self, c: &mut Cursor<'_>) -> CodegenResult<()> {
        let if_not_exists = c.eat_seq(&["IF", "NOT", "EXISTS"]);
        let line = c.line();
        let name = c.qualified_ident()?;
        if self.schema.contains(&name) {
            if if_not_exists {
                debug!("table {name} already exists, skipped");
                return Ok(());
            }
            return Err(CodegenError::DuplicateTable {
                script: c.script.to_string(),
                line,
                table: name,
            });
        }

        if c.eat_kw("LIKE") {
            let source = c.qualified_ident()?;
            let mut table = self
                .schema
                .table(&source)
                .cloned()
                .ok_or_else(|| unknown_table(c, source))?;
            table.name = name;
            self.schema.tables.push(table);
            return Ok(());
        }
        if !c.is_sym('(') {
            log::warn!("{}:{}: CREATE TABLE {name} without column list ignored", c.script, line);
            return Ok(());
        }

        c.expect_sym('(')?;
        let mut table = Table::new(name);
        loop {
            parse_element(c, &mut table)?;
            if c.eat_sym(',') {
                continue;
            }
            c.expect_sym(')')?;
            break;
        }
        self.schema.tables.push(table);
        Ok(())
    }

    fn create_unique_index(&mut self, c: &mut Cursor<'_>) -> CodegenResult<()> {
        c.eat_kw("CONCURRENTLY");
        c.eat_seq(&["IF", "NOT", "EXISTS"]);
        if !c.is_kw("ON") {
            c.ident()?;
        }
        c.expect_kw("ON")?;
        c.eat_kw("ONLY");
        let table_name = c.qualified_ident()?;
        if c.eat_kw("USING") {
            c.advance();
        }
        let columns = c.ident_list()?;
        let table = match self.schema.table_mut(&table_name) {
            Some(table) => table,
            None => return Err(unknown_table(c, table_name)),
        };
        if columns.iter().all(|col| table.column(col).is_some()) {
            table.add_unique(columns);
        }
        Ok(())
    }

    fn alter_table(&mut self, c: &mut Cursor<'_>) -> CodegenResult<()> {
        let if_exists = c.eat_seq(&["IF", "EXISTS"]);
        c.eat_kw("ONLY");
        let name = c.qualified_ident()?;
        let Some(idx) = self.schema.tables.iter().position(|t| t.name == name) else {
            if if_exists {
                return Ok(());
            }
            return Err(unknown_table(c, name));
        };

        let mut rename_to = None;
        loop {
            let table = &mut self.schema.tables[idx];
            if let Some(new_name) = alter_action(c, table)? {
                rename_to = Some(new_name);
            }
            if !c.eat_sym(',') {
                break;
            }
        }
        if let Some(new_name) = rename_to {
            self.rename(c, &name, new_name)?;
        }
        Ok(())
    }

    fn drop_table(&mut self, c: &mut Cursor<'_>) -> CodegenResult<()> {
        let if_exists = c.eat_seq(&["IF", "EXISTS"]);
        loop {
            let name = c.qualified_ident()?;
            if self.schema.remove(&name).is_none() && !if_exists {
                return Err(unknown_table(c, name));
            }
            if !c.eat_sym(',') {
                return Ok(());
            }
        }
    }

    fn rename_tables(&mut self, c: &mut Cursor<'_>) -> CodegenResult<()> {
        loop {
            let from = c.qualified_ident()?;
            c.expect_kw("TO")?;
            let to = c.qualified_ident()?;
            self.rename(c, &from, to)?;
            if !c.eat_sym(',') {
                return Ok(());
            }
        }
    }

    fn rename(&mut self, c: &Cursor<'_>, from: &str, to: String) -> CodegenResult<()> {
        if self.schema.contains(&to) {
            return Err(CodegenError::DuplicateTable {
                script: c.script.to_string(),
                line: c.line(),
                table: to,
            });
        }
        if !self.schema.rename(from, &to) {
            return Err(unknown_table(c, from.to_string()));
        }
        Ok(())
    }
}

fn unknown_table(c: &Cursor<'_>, table: String) -> CodegenError {
    CodegenError::UnknownTable {
        script: c.script.to_string(),
        line: c.line(),
        table,
    }
}

fn unknown_column(c: &Cursor<'_>, table: &Table, column: String) -> CodegenError {
    CodegenError::UnknownColumn {
        script: c.script.to_string(),
        line: c.line(),
        table: table.name.clone(),
        column,
    }
}

/// Applies one `ALTER TABLE` action; returns the new table name for
/// `RENAME TO`.
fn alter_action(c: &mut Cursor<'_>, table: &mut Table) -> CodegenResult<Option<String>> {
    if c.eat_kw("ADD") {
        if is_constraint_start(c) {
            parse_constraint(c, table)?;
        } else {
            c.eat_kw("COLUMN");
            let if_not_exists = c.eat_seq(&["IF", "NOT", "EXISTS"]);
            let exists = match c.peek() {
                Some(Tok::Word(w)) => table.column(&c.name_case.apply(w)).is_some(),
                Some(Tok::Quoted(q)) => table.column(q).is_some(),
                _ => false,
            };
            if if_not_exists && exists {
                c.skip_element();
            } else {
                parse_column(c, table)?;
            }
        }
    } else if c.eat_kw("DROP") {
        if c.eat_seq(&["PRIMARY", "KEY"]) {
            table.primary_key.clear();
        } else if c.eat_kw("CONSTRAINT")
            || c.eat_kw("INDEX")
            || c.eat_kw("KEY")
            || c.eat_seq(&["FOREIGN", "KEY"])
        {
            // constraint names are not tracked
        } else {
            c.eat_kw("COLUMN");
            let if_exists = c.eat_seq(&["IF", "EXISTS"]);
            let column = c.ident()?;
            if !table.drop_column(&column) && !if_exists {
                return Err(unknown_column(c, table, column));
            }
        }
        c.skip_element();
    } else if c.eat_kw("MODIFY") {
        c.eat_kw("COLUMN");
        let column = match c.peek() {
            Some(Tok::Word(w)) => c.name_case.apply(w),
            Some(Tok::Quoted(q)) => q.clone(),
            _ => return Err(c.error("expected column name")),
        };
        replace_column(c, table, &column)?;
    } else if c.eat_kw("CHANGE") {
        c.eat_kw("COLUMN");
        let column = c.ident()?;
        replace_column(c, table, &column)?;
    } else if c.eat_kw("ALTER") {
        c.eat_kw("COLUMN");
        let name = c.ident()?;
        let Some(column) = table.column_mut(&name) else {
            return Err(unknown_column(c, table, name));
        };
        if c.eat_seq(&["SET", "DATA", "TYPE"]) || c.eat_kw("TYPE") {
            column.data_type = parse_type(c)?;
        } else if c.eat_seq(&["SET", "NOT", "NULL"]) {
            column.nullable = false;
        } else if c.eat_seq(&["DROP", "NOT", "NULL"]) {
            column.nullable = true;
        } else if c.eat_seq(&["SET", "DEFAULT"]) {
            column.default = Some(c.expression_text());
        } else if c.eat_seq(&["DROP", "DEFAULT"]) {
            column.default = None;
        }
        c.skip_element();
    } else if c.eat_kw("RENAME") {
        if c.eat_kw("TO") || c.eat_kw("AS") {
            return Ok(Some(c.qualified_ident()?));
        }
        if c.eat_kw("INDEX") || c.eat_kw("KEY") || c.eat_kw("CONSTRAINT") {
            c.skip_element();
            return Ok(None);
        }
        c.eat_kw("COLUMN");
        let from = c.ident()?;
        c.expect_kw("TO")?;
        let to = c.ident()?;
        if !table.rename_column(&from, &to) {
            return Err(unknown_column(c, table, from));
        }
    } else {
        c.skip_element();
    }
    Ok(None)
}

/// `MODIFY`/`CHANGE`: parse a full column definition and swap it in place of
/// `old`, keeping its position.
fn replace_column(c: &mut Cursor<'_>, table: &mut Table, old: &str) -> CodegenResult<()> {
    let Some(position) = table.columns.iter().position(|col| col.name == old) else {
        return Err(unknown_column(c, table, old.to_string()));
    };
    let mut scratch = Table::new(table.name.clone());
    parse_column(c, &mut scratch)?;
    let Some(column) = scratch.columns.pop() else {
        return Err(c.error("expected column definition"));
    };
    let new_name = column.name.clone();
    if new_name != old {
        table.rename_column(old, &new_name);
    }
    let keyed = table.is_primary_key(&new_name);
    table.columns[position] = column;
    if keyed {
        table.columns[position].nullable = false;
    }
    if !scratch.primary_key.is_empty() {
        table.set_primary_key(scratch.primary_key);
    }
    for unique in scratch.unique {
        table.add_unique(unique);
    }
    table.foreign_keys.extend(scratch.foreign_keys);
    Ok(())
}

/// Replays `scripts` in order.
pub fn parse_scripts(
    scripts: &[Script],
    name_case: NameCase,
    log_statements: bool,
) -> CodegenResult<Schema> {
    let mut parser = DdlParser::new(name_case).log_statements(log_statements);
    for script in scripts {
        parser.parse(&script.name(), &script.sql)?;
    }
    Ok(parser.into_schema())
}
