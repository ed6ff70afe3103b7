//! Project lint ruleset: line-level regex rules with PMD-style priorities.
//!
//! Rules come from `lint-rules.toml`. Only rules at or above the configured
//! threshold (1 is the most severe, 5 the least) are reported.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use regex::Regex;
use serde::Deserialize;

use super::error::{PipelineError, PipelineResult};

pub const DEFAULT_THRESHOLD: u8 = 5;
const TEST_MODULE_MARKER: &str = "#[cfg(test)]";

#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    name: String,
    priority: u8,
    pattern: String,
    message: String,
    #[serde(default = "default_files")]
    files: String,
    #[serde(default)]
    skip_tests: bool,
}

fn default_files() -> String {
    "src/**/*.rs".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct RawRuleset {
    #[serde(default = "default_threshold")]
    threshold: u8,
    #[serde(default = "default_console")]
    console_output: bool,
    #[serde(default, rename = "rule")]
    rules: Vec<RawRule>,
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

fn default_console() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct LintRule {
    pub name: String,
    pub priority: u8,
    pub pattern: Regex,
    pub message: String,
    pub files: String,
    /// Stop scanning a file at its `#[cfg(test)]` module.
    pub skip_tests: bool,
}

#[derive(Debug, Clone)]
pub struct LintRuleset {
    pub threshold: u8,
    pub console_output: bool,
    pub rules: Vec<LintRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub rule: String,
    pub priority: u8,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}: {}",
            self.path.display(),
            self.line,
            self.priority,
            self.rule,
            self.message
        )
    }
}

fn check_priority(what: &str, value: u8) -> PipelineResult<()> {
    if (1..=5).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::Ruleset(format!(
            "{what} must be between 1 and 5, got {value}"
        )))
    }
}

impl LintRuleset {
    pub fn from_toml(text: &str) -> PipelineResult<Self> {
        let raw: RawRuleset = toml::from_str(text)?;
        check_priority("threshold", raw.threshold)?;

        let mut rules = Vec::with_capacity(raw.rules.len());
        for rule in raw.rules {
            check_priority(&format!("priority of '{}'", rule.name), rule.priority)?;
            let pattern = Regex::new(&rule.pattern).map_err(|reason| PipelineError::RulePattern {
                rule: rule.name.clone(),
                reason,
            })?;
            rules.push(LintRule {
                name: rule.name,
                priority: rule.priority,
                pattern,
                message: rule.message,
                files: rule.files,
                skip_tests: rule.skip_tests,
            });
        }
        Ok(Self {
            threshold: raw.threshold,
            console_output: raw.console_output,
            rules,
        })
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_toml(&text)
    }

    /// Rules severe enough to report.
    pub fn active_rules(&self) -> impl Iterator<Item = &LintRule> {
        self.rules.iter().filter(|r| r.priority <= self.threshold)
    }

    /// Checks one file's text against every active rule whose glob matches.
    pub fn check_source(&self, path: &Path, text: &str) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in self.active_rules() {
            let applies = glob::Pattern::new(&rule.files)
                .map(|p| p.matches_path(path))
                .unwrap_or(false);
            if !applies {
                continue;
            }
            for (index, line) in text.lines().enumerate() {
                if rule.skip_tests && line.trim_start().starts_with(TEST_MODULE_MARKER) {
                    break;
                }
                if rule.pattern.is_match(line) {
                    violations.push(Violation {
                        path: path.to_path_buf(),
                        line: index + 1,
                        rule: rule.name.clone(),
                        priority: rule.priority,
                        message: rule.message.clone(),
                    });
                }
            }
        }
        violations.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
        violations
    }

    /// Runs the ruleset over the files under `root`.
    pub fn check(&self, root: &Path) -> PipelineResult<Vec<Violation>> {
        let mut patterns: Vec<&str> = self.active_rules().map(|r| r.files.as_str()).collect();
        patterns.sort_unstable();
        patterns.dedup();

        let mut files = Vec::new();
        for pattern in patterns {
            let full = root.join(pattern);
            for entry in glob(&full.to_string_lossy())?.flatten() {
                if entry.is_file() {
                    files.push(entry);
                }
            }
        }
        files.sort();
        files.dedup();

        let mut violations = Vec::new();
        for file in files {
            let text = fs::read_to_string(&file).map_err(|e| PipelineError::io(&file, e))?;
            let relative = file.strip_prefix(root).unwrap_or(&file);
            violations.extend(self.check_source(relative, &text));
        }
        if self.console_output {
            for violation in &violations {
                eprintln!("{violation}");
            }
        }
        Ok(violations)
    }
}
