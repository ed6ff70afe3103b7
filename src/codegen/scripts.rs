use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use super::config::SortOrder;
use super::error::{CodegenError, CodegenResult};

/// A migration script loaded from disk.
#[derive(Debug, Clone)]
pub struct Script {
    pub path: PathBuf,
    pub sql: String,
}

impl Script {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Expands `pattern` and returns the matching files in `order`.
///
/// A pattern that matches nothing yields an empty list.
pub fn discover_scripts(pattern: &str, order: SortOrder) -> CodegenResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().to_path_buf();
                return Err(CodegenError::io(path, e.into_error()));
            }
        }
    }
    sort_scripts(&mut files, order);
    Ok(files)
}

pub fn sort_scripts(files: &mut [PathBuf], order: SortOrder) {
    match order {
        SortOrder::Semantic => files.sort_by(|a, b| semantic_cmp(&path_key(a), &path_key(b))),
        SortOrder::Alphanumeric => files.sort_by_key(|p| path_key(p)),
        SortOrder::None => {}
    }
}

pub fn load_scripts(paths: &[PathBuf]) -> CodegenResult<Vec<Script>> {
    paths
        .iter()
        .map(|path| {
            let sql = fs::read_to_string(path).map_err(|e| CodegenError::io(path, e))?;
            Ok(Script {
                path: path.clone(),
                sql,
            })
        })
        .collect()
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Natural ordering: digit runs compare by numeric value, everything else
/// compares character by character.
pub fn semantic_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => cmp_numeric(x, y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_order_is_version_aware() {
        let mut names = vec![
            "V10__add_index.sql",
            "V2__seed.sql",
            "V003__zero_padded.sql",
            "V1__init.sql",
        ];
        names.sort_by(|a, b| semantic_cmp(a, b));
        assert_eq!(
            names,
            vec![
                "V1__init.sql",
                "V2__seed.sql",
                "V003__zero_padded.sql",
                "V10__add_index.sql",
            ]
        );
    }

    #[test]
    fn alphanumeric_order_is_plain() {
        let mut files = vec![PathBuf::from("V10__b.sql"), PathBuf::from("V2__a.sql")];
        sort_scripts(&mut files, SortOrder::Alphanumeric);
        assert_eq!(files[0], PathBuf::from("V10__b.sql"));
        sort_scripts(&mut files, SortOrder::Semantic);
        assert_eq!(files[0], PathBuf::from("V2__a.sql"));
    }

    #[test]
    fn discovers_only_matching_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["V10__c.sql", "V2__b.sql", "V1__a.sql", "notes.txt"] {
            fs::write(dir.path().join(name), "").expect("write");
        }
        let pattern = format!("{}/*.sql", dir.path().display());
        let files = discover_scripts(&pattern, SortOrder::Semantic).expect("discover");
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["V1__a.sql", "V2__b.sql", "V10__c.sql"]);
    }

    #[test]
    fn pattern_without_matches_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pattern = format!("{}/*.sql", dir.path().display());
        assert!(discover_scripts(&pattern, SortOrder::Semantic)
            .expect("discover")
            .is_empty());
    }
}
