//! Build pipeline used by the `xtask` binary.

pub mod error;
pub mod format;
pub mod graph;
pub mod lint;

use std::path::{Path, PathBuf};

pub use error::{PipelineError, PipelineResult};
pub use format::{MISC_PATTERNS, apply_misc, check_misc, format_misc};
pub use graph::{Task, TaskGraph, default_graph};
pub use lint::{LintRuleset, Violation};

/// The packaged server binary keeps this name whatever the version or branch.
pub const ARTIFACT_NAME: &str = "baseplatform";

pub fn artifact_file_name() -> String {
    format!("{ARTIFACT_NAME}{}", std::env::consts::EXE_SUFFIX)
}

/// Where `package` copies the release binary.
pub fn artifact_path(root: &Path) -> PathBuf {
    root.join("dist").join(artifact_file_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_carries_no_version() {
        let name = artifact_file_name();
        assert!(name.starts_with(ARTIFACT_NAME));
        assert!(!name.contains(env!("CARGO_PKG_VERSION")));
        assert_eq!(
            artifact_path(Path::new("/w")),
            Path::new("/w/dist").join(name)
        );
    }
}
