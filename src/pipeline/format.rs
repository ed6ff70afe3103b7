//! Whitespace formatting for non-Rust files: tabs in indentation become four
//! spaces, trailing whitespace is trimmed and files end with one newline.

use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;

use super::error::{PipelineError, PipelineResult};

pub const MISC_PATTERNS: &[&str] = &["*.md", "*.toml", ".gitignore", "migrations/*.sql"];
const INDENT: &str = "    ";

pub fn format_misc(text: &str) -> String {
    let mut lines: Vec<String> = text
        .lines()
        .map(|line| {
            let body = line.trim_start_matches(['\t', ' ']);
            let indent = &line[..line.len() - body.len()];
            let indent = indent.replace('\t', INDENT);
            format!("{indent}{body}").trim_end().to_string()
        })
        .collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn misc_files(root: &Path, patterns: &[&str]) -> PipelineResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let full = root.join(pattern);
        files.extend(glob(&full.to_string_lossy())?.flatten().filter(|p| p.is_file()));
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Files under `root` whose formatting would change.
pub fn check_misc(root: &Path, patterns: &[&str]) -> PipelineResult<Vec<PathBuf>> {
    let mut dirty = Vec::new();
    for file in misc_files(root, patterns)? {
        let text = fs::read_to_string(&file).map_err(|e| PipelineError::io(&file, e))?;
        if format_misc(&text) != text {
            dirty.push(file);
        }
    }
    Ok(dirty)
}

/// Rewrites the files that need it and returns them.
pub fn apply_misc(root: &Path, patterns: &[&str]) -> PipelineResult<Vec<PathBuf>> {
    let dirty = check_misc(root, patterns)?;
    for file in &dirty {
        let text = fs::read_to_string(file).map_err(|e| PipelineError::io(file, e))?;
        fs::write(file, format_misc(&text)).map_err(|e| PipelineError::io(file, e))?;
    }
    Ok(dirty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace() {
        let input = "a  \n\tb\t\n \tc\n\n\n";
        assert_eq!(format_misc(input), "a\n    b\n     c\n");
    }

    #[test]
    fn inner_tabs_are_kept() {
        assert_eq!(format_misc("key\tvalue"), "key\tvalue\n");
    }

    #[test]
    fn formatted_text_is_stable() {
        let once = format_misc("x \r\n\ty\n");
        assert_eq!(format_misc(&once), once);
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(format_misc(""), "");
        assert_eq!(format_misc("\n\n"), "");
    }

    #[test]
    fn check_and_apply() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("README.md"), "title \n").expect("write");
        fs::write(dir.path().join("clean.md"), "ok\n").expect("write");

        let dirty = check_misc(dir.path(), MISC_PATTERNS).expect("check");
        assert_eq!(dirty, vec![dir.path().join("README.md")]);
        apply_misc(dir.path(), MISC_PATTERNS).expect("apply");
        assert!(check_misc(dir.path(), MISC_PATTERNS).expect("recheck").is_empty());
        assert_eq!(
            fs::read_to_string(dir.path().join("README.md")).expect("read"),
            "title\n"
        );
    }
}
