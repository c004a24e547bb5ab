use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use vivarium::runner::Runner;
use vivarium_core::metrics::init_logging;
use vivarium_core::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Number of full generations to simulate
    #[arg(short, long, default_value_t = 10)]
    generations: u64,

    /// RNG seed override for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks per generation override
    #[arg(long)]
    ticks: Option<u64>,

    /// Starting carnivore count override
    #[arg(long)]
    carnivores: Option<usize>,

    /// Starting herbivore count override
    #[arg(long)]
    herbivores: Option<usize>,

    /// Starting scavenger count override
    #[arg(long)]
    scavengers: Option<usize>,

    /// Directory to archive genomes into
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Resume brains from the newest archived generation
    #[arg(long, default_value_t = false)]
    resume: bool,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.world.seed = Some(seed);
    }
    if let Some(ticks) = args.ticks {
        config.schedule.generation_ticks = ticks.max(1);
    }
    if let Some(carnivores) = args.carnivores {
        config.world.carnivores = carnivores;
    }
    if let Some(herbivores) = args.herbivores {
        config.world.herbivores = herbivores;
    }
    if let Some(scavengers) = args.scavengers {
        config.world.scavengers = scavengers;
    }

    let mut runner = Runner::build(config, args.archive.as_deref(), args.resume)?;
    runner.run(args.generations)?;
    Ok(())
}
