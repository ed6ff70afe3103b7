//! Build pipeline runner.
//!
//! ```bash
//! xtask [--list] [--dry-run] [--fix] <task>...
//! ```

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{Context, anyhow};
use baseplatform::pipeline::graph::{FORMAT, LINT, PACKAGE};
use baseplatform::pipeline::{
    ARTIFACT_NAME, LintRuleset, MISC_PATTERNS, PipelineError, Task, apply_misc, artifact_path,
    check_misc, default_graph,
};
use clap::Parser;
use log::{error, info, warn};

#[derive(Parser, Debug)]
#[clap(name = "xtask")]
#[clap(about = "Run build pipeline tasks in dependency order")]
struct Args {
    /// Tasks to run
    #[clap(default_value = "build")]
    tasks: Vec<String>,

    /// Print the registered tasks
    #[clap(long)]
    list: bool,

    /// Print the plan without running it
    #[clap(long)]
    dry_run: bool,

    /// Rewrite misc files instead of failing on them
    #[clap(long)]
    fix: bool,

    /// Lint ruleset
    #[clap(long, default_value = "lint-rules.toml")]
    rules: PathBuf,
}

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn spawn(task: &Task, root: &Path) -> anyhow::Result<()> {
    let Some((program, args)) = task.command.split_first() else {
        return Ok(());
    };
    info!("> {}", task.command.join(" "));
    let status = Command::new(program)
        .args(args)
        .current_dir(root)
        .status()
        .with_context(|| format!("failed to spawn {program}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(PipelineError::TaskFailed {
            task: task.name.clone(),
            status: status.to_string(),
        }
        .into())
    }
}

fn package(root: &Path) -> anyhow::Result<()> {
    let built = root
        .join("target/release")
        .join(format!("{ARTIFACT_NAME}{}", env::consts::EXE_SUFFIX));
    let dest = artifact_path(root);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&built, &dest)
        .with_context(|| format!("copy {} to {}", built.display(), dest.display()))?;
    info!("packaged {}", dest.display());
    Ok(())
}

fn lint(root: &Path, rules: &Path) -> anyhow::Result<()> {
    let ruleset = LintRuleset::load(&root.join(rules))?;
    let violations = ruleset.check(root)?;
    if violations.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} lint violations at priority {} or above",
            violations.len(),
            ruleset.threshold
        ))
    }
}

fn format(root: &Path, fix: bool) -> anyhow::Result<()> {
    if fix {
        for file in apply_misc(root, MISC_PATTERNS)? {
            info!("formatted {}", file.display());
        }
        return Ok(());
    }
    let dirty = check_misc(root, MISC_PATTERNS)?;
    for file in &dirty {
        warn!("needs formatting: {}", file.display());
    }
    if dirty.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} files need formatting, run with --fix", dirty.len()))
    }
}

fn execute(task: &Task, root: &Path, args: &Args) -> anyhow::Result<()> {
    if !(task.name == FORMAT && args.fix) {
        spawn(task, root)?;
    }
    match task.name.as_str() {
        PACKAGE => package(root),
        LINT => lint(root, &args.rules),
        FORMAT => format(root, args.fix),
        _ => Ok(()),
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let graph = default_graph();
    if args.list {
        for task in graph.tasks() {
            println!("{:<10} {}", task.name, task.description);
        }
        return Ok(());
    }

    let requested: Vec<&str> = args.tasks.iter().map(String::as_str).collect();
    let plan = graph.plan(&requested)?;
    info!("plan: {}", plan.join(", "));
    if args.dry_run {
        return Ok(());
    }

    let root = workspace_root();
    let mut ran: Vec<&Task> = Vec::new();
    let mut failure: Option<anyhow::Error> = None;
    for name in &plan {
        let task = graph
            .task(name)
            .ok_or_else(|| PipelineError::UnknownTask(name.clone()))?;
        if failure.is_some() {
            // After a failure only finalizers of tasks that ran still execute.
            let finalizes: HashSet<&str> = ran
                .iter()
                .flat_map(|t| t.finalized_by.iter().map(String::as_str))
                .collect();
            if !finalizes.contains(name.as_str()) {
                warn!("skipping {name}");
                continue;
            }
        }
        info!(":{name}");
        ran.push(task);
        if let Err(e) = execute(task, &root, &args) {
            error!(":{name} failed: {e:#}");
            failure.get_or_insert(e);
        }
    }
    failure.map_or(Ok(()), Err)
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
