use std::fmt;

/// Column type as written in the DDL, with aliases folded to one spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlType {
    pub name: String,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub unsigned: bool,
}

impl SqlType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            precision: None,
            scale: None,
            unsigned: false,
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// `NAME`, `NAME(p)` or `NAME(p,s)`.
    pub fn rendered(&self) -> String {
        match (self.precision, self.scale) {
            (Some(p), Some(s)) => format!("{}({},{})", self.name, p, s),
            (Some(p), None) => format!("{}({})", self.name, p),
            _ => self.name.clone(),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered())?;
        if self.unsigned {
            f.write_str(" UNSIGNED")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: SqlType,
    pub nullable: bool,
    pub auto_increment: bool,
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: SqlType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            auto_increment: false,
            default: None,
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.auto_increment
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub unique: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|c| c == column)
    }

    /// True when `column` alone carries a unique or primary key constraint.
    pub fn is_unique(&self, column: &str) -> bool {
        (self.primary_key.len() == 1 && self.primary_key[0] == column)
            || self.unique.iter().any(|u| u.len() == 1 && u[0] == column)
    }

    pub fn set_primary_key(&mut self, columns: Vec<String>) {
        for name in &columns {
            if let Some(col) = self.column_mut(name) {
                col.nullable = false;
            }
        }
        self.primary_key = columns;
    }

    pub fn add_unique(&mut self, columns: Vec<String>) {
        if !self.unique.contains(&columns) {
            self.unique.push(columns);
        }
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        self.primary_key.retain(|c| c != name);
        self.unique.retain(|u| !u.iter().any(|c| c == name));
        self.foreign_keys.retain(|fk| !fk.columns.iter().any(|c| c == name));
        self.columns.len() != before
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        let Some(col) = self.column_mut(from) else {
            return false;
        };
        col.name = to.to_string();
        let rename = |c: &mut String| {
            if c == from {
                *c = to.to_string();
            }
        };
        self.primary_key.iter_mut().for_each(rename);
        self.unique.iter_mut().flatten().for_each(rename);
        self.foreign_keys
            .iter_mut()
            .flat_map(|fk| fk.columns.iter_mut())
            .for_each(rename);
        true
    }
}

/// Tables reflected from the migration scripts, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Table> {
        let idx = self.tables.iter().position(|t| t.name == name)?;
        let table = self.tables.remove(idx);
        for other in &mut self.tables {
            other.foreign_keys.retain(|fk| fk.ref_table != name);
        }
        Some(table)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let Some(table) = self.table_mut(from) else {
            return false;
        };
        table.name = to.to_string();
        for other in &mut self.tables {
            for fk in &mut other.foreign_keys {
                if fk.ref_table == from {
                    fk.ref_table = to.to_string();
                }
            }
        }
        true
    }
}
