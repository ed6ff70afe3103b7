use regex::{Regex, RegexBuilder};

use super::error::{CodegenError, CodegenResult};
use super::model::Schema;

/// Compiles `pattern` so that it must match the whole input.
pub(crate) fn full_match(pattern: &str, case_insensitive: bool) -> CodegenResult<Regex> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|reason| CodegenError::InvalidRegex {
            pattern: pattern.to_string(),
            reason,
        })
}

/// Table selection by `includes`/`excludes` regular expressions.
#[derive(Debug, Clone)]
pub struct TableFilter {
    includes: Regex,
    excludes: Option<Regex>,
}

impl TableFilter {
    /// An empty `excludes` pattern excludes nothing.
    pub fn new(includes: &str, excludes: &str) -> CodegenResult<Self> {
        let includes = full_match(includes, true)?;
        let excludes = if excludes.trim().is_empty() {
            None
        } else {
            Some(full_match(excludes, true)?)
        };
        Ok(Self { includes, excludes })
    }

    pub fn accepts(&self, table: &str) -> bool {
        self.includes.is_match(table)
            && !self.excludes.as_ref().is_some_and(|re| re.is_match(table))
    }

    /// Splits `schema` into kept tables and the names of excluded ones.
    pub fn apply(&self, schema: Schema) -> (Schema, Vec<String>) {
        let mut excluded = Vec::new();
        let mut kept = Schema::default();
        for table in schema.tables {
            if self.accepts(&table.name) {
                kept.tables.push(table);
            } else {
                excluded.push(table.name);
            }
        }
        (kept, excluded)
    }
}

/// Keeps tables fully matching `includes` and not fully matching `excludes`.
pub fn filter_tables(
    schema: Schema,
    includes: &str,
    excludes: &str,
) -> CodegenResult<(Schema, Vec<String>)> {
    Ok(TableFilter::new(includes, excludes)?.apply(schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::model::Table;

    fn schema(names: &[&str]) -> Schema {
        Schema {
            tables: names.iter().map(|n| Table::new(*n)).collect(),
        }
    }

    #[test]
    fn excludes_scheduler_tables_only() {
        let (kept, excluded) = filter_tables(
            schema(&["user", "qrtz_triggers", "role", "qrtz_locks", "my_qrtz_notes"]),
            ".*",
            "qrtz_.*",
        )
        .expect("filter");
        let kept: Vec<_> = kept.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(kept, vec!["user", "role", "my_qrtz_notes"]);
        assert_eq!(excluded, vec!["qrtz_triggers", "qrtz_locks"]);
    }

    #[test]
    fn matching_is_anchored_and_ignores_case() {
        let filter = TableFilter::new("user|role", "qrtz_.*").expect("filter");
        assert!(filter.accepts("user"));
        assert!(!filter.accepts("user_role_map"));
        assert!(!TableFilter::new(".*", "qrtz_.*").expect("filter").accepts("QRTZ_LOCKS"));
    }

    #[test]
    fn empty_excludes_keep_everything() {
        let filter = TableFilter::new(".*", "").expect("filter");
        assert!(filter.accepts("qrtz_locks"));
    }
}
