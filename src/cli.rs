// ============================================================================
// CLI — headless pipeline rendering
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rand::Rng;

use crate::error::{Error, Result};
use crate::io::{export_png, load_pipeline};
use crate::ops::{OpContext, OpKind};
use crate::sprites::SpriteRepository;
use crate::{log_err, log_info};

#[derive(Parser, Debug)]
#[command(
    name = "texforge",
    version,
    about = "Procedural texture generator: renders a persisted operation pipeline to PNG"
)]
pub struct Cli {
    /// Pipeline document (JSON) to render
    #[arg(short, long, value_name = "FILE")]
    pub pipeline: Option<PathBuf>,

    /// Output PNG path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Canvas resolution (square, pixels)
    #[arg(short, long, default_value_t = 1024)]
    pub resolution: u32,

    /// Session seed used by operations that keep their default Seed
    /// (derived from entropy when unset)
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Directory of sprite images for scatter operations
    #[arg(long, value_name = "DIR")]
    pub sprites: Option<PathBuf>,

    /// List the available operation kinds and their parameters
    #[arg(long)]
    pub list_ops: bool,

    /// Print per-layer descriptions while rendering
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_ops {
        list_operations(&cli);
        return ExitCode::SUCCESS;
    }

    match render(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("{}", e);
            eprintln!("error: {}", e);
            if let Some(path) = crate::logger::log_path() {
                eprintln!("see session log: {}", path.display());
            }
            ExitCode::FAILURE
        }
    }
}

fn render(cli: &Cli) -> Result<()> {
    let pipeline = cli.pipeline.as_ref().ok_or_else(|| Error::Config {
        name: "pipeline".into(),
        reason: "no pipeline file given (see --help)".into(),
    })?;
    let output = cli.output.as_ref().ok_or_else(|| Error::Config {
        name: "output".into(),
        reason: "no output path given (see --help)".into(),
    })?;
    if cli.resolution == 0 {
        return Err(Error::Config {
            name: "resolution".into(),
            reason: "must be at least 1".into(),
        });
    }

    let sprites = match &cli.sprites {
        Some(dir) => {
            let repo = SpriteRepository::load_dir(dir)?;
            log_info!("loaded {} sprites from {}", repo.len(), dir.display());
            Arc::new(repo)
        }
        None => Arc::new(SpriteRepository::new()),
    };

    let seed = cli.seed.unwrap_or_else(|| rand::rng().random());
    log_info!("session seed {}", seed);

    let ctx = OpContext {
        resolution: cli.resolution,
        seed,
    };
    let mut stack = load_pipeline(pipeline, ctx, sprites)?;
    if stack.is_empty() {
        return Err(Error::EmptyPipeline);
    }
    stack.select(stack.len() - 1)?;

    if cli.verbose {
        for (i, layer) in stack.layers().enumerate() {
            println!("  [{}] {}", i, layer.describe());
        }
    }

    let pair = stack.apply()?;
    export_png(&pair, output)?;
    println!(
        "rendered {} layers at {}x{} -> {}",
        stack.len(),
        cli.resolution,
        cli.resolution,
        output.display()
    );
    Ok(())
}

fn list_operations(cli: &Cli) {
    let ctx = OpContext {
        resolution: cli.resolution,
        seed: cli.seed.unwrap_or(0),
    };
    let sprites = Arc::new(SpriteRepository::new());
    println!("available operations:");
    for kind in OpKind::ALL {
        let op = crate::ops::instantiate(kind, ctx, &sprites);
        let defaults = op.defaults();
        let params = if defaults.is_empty() {
            "(no parameters)".to_string()
        } else {
            defaults
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("  {:<12} {:<14} {}", kind.name(), kind.title(), params);
    }
}
