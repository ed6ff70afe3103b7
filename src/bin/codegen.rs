//! Regenerates the diesel schema, records and DAOs from the migration scripts.
//!
//! ```bash
//! codegen [--config codegen.toml] [--scripts 'migrations/*.sql'] [--out src/generated.rs] [--check]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use baseplatform::codegen::{CodegenConfig, generate};
use clap::Parser;
use dotenvy::dotenv;
use log::{error, info};

/// Schema-to-code generator
#[derive(Parser, Debug)]
#[clap(name = "codegen")]
#[clap(about = "Generate diesel tables, records and DAOs from SQL migration scripts")]
struct Args {
    /// Generator configuration
    #[clap(long, default_value = "codegen.toml")]
    config: PathBuf,

    /// Override the script glob
    #[clap(long)]
    scripts: Option<String>,

    /// Override the output file
    #[clap(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Fail instead of writing when the output file is stale
    #[clap(long)]
    check: bool,
}

fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = CodegenConfig::load_or_default(&args.config)?;
    if let Some(scripts) = args.scripts {
        config.scripts = scripts;
    }
    if let Some(out) = args.out {
        config.target.path = out;
    }

    let generated = generate(&config)?;
    let path = &config.target.path;
    if args.check {
        if generated.is_current(path) {
            info!("{} is up to date", path.display());
            return Ok(true);
        }
        error!("{} is stale, run codegen", path.display());
        return Ok(false);
    }

    if generated.write(path)? {
        info!("wrote {}", path.display());
    } else {
        info!("{} unchanged", path.display());
    }
    for table in &generated.without_dao {
        info!("{table} has no primary key, record only");
    }
    Ok(true)
}

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
