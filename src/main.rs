use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, trace};
use std::path::PathBuf;
use std::time::Instant;
use tumor_common::{ModelParams, RunConfig};
use tumor_engine::output::{save_history, write_day_outputs};
use tumor_engine::Environment;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tumor/immune agent-based simulation")]
struct Args {
    /// Path to the run configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the random seed from the configuration
    #[arg(short, long)]
    seed: Option<u64>,

    /// Override the output directory from the configuration
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting tumor engine...");

    // --- Load Configuration ---
    let mut config = RunConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.initial_conditions.seed = seed;
    }
    if let Some(output) = args.output {
        config.output.directory = output;
    }

    let params = ModelParams::load(&config.parameters.directory).with_context(|| {
        format!("Failed to load parameters from '{}'", config.parameters.directory.display())
    })?;
    info!("Parameters loaded from {}", config.parameters.directory.display());
    debug!("Model parameters: {:#?}", params);

    let sim_params = config.get_sim_params(&params.environment);
    debug!("Simulation parameters: {:#?}", sim_params);

    let output_dir = config.output.directory.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Environment ---
    let total_steps = sim_params.total_steps;
    let mut env = Environment::new(params, sim_params)?;
    write_day_outputs(&env, &output_dir)?;

    // --- Simulation Loop ---
    info!(
        "Starting simulation loop for {} steps ({:.1} days)...",
        total_steps,
        env.params().environment.duration_days
    );
    let start_time = Instant::now();

    while !env.is_finished() {
        let step_start_time = Instant::now();
        let report = match env.step() {
            Ok(report) => report,
            Err(e) => {
                error!("Error during simulation step {}: {}", env.steps() + 1, e);
                return Err(e.into());
            }
        };
        trace!(
            "Step [{}/{}] completed in {:.2} ms",
            env.steps(),
            total_steps,
            step_start_time.elapsed().as_secs_f64() * 1000.0
        );

        if report.day_completed {
            if let Err(e) = write_day_outputs(&env, &output_dir) {
                error!("Error writing outputs at step {}: {}", env.steps(), e);
                return Err(e);
            }
            info!(
                "Step [{}/{}] | Cells: {} | Elapsed: {:.2} s",
                env.steps(),
                total_steps,
                env.cells().len(),
                start_time.elapsed().as_secs_f64()
            );
        }
    }

    if env.cancer_count() == 0 {
        info!("Tumor eliminated at day {:.2}.", env.sim_params().day_at(env.steps()));
    }
    env.finish();
    write_day_outputs(&env, &output_dir)?;

    let total_duration = start_time.elapsed().as_secs_f64();
    info!(
        "Simulation finished in {:.3} seconds ({:.3} minutes).",
        total_duration,
        total_duration / 60.0
    );

    // --- Save History ---
    if config.output.save_history {
        let format = config.output.format.as_deref().unwrap_or("json");
        save_history(env.history(), &output_dir, format)?;
    } else {
        info!("Skipping history output as per config (save_history is false).");
    }

    info!("Simulation Complete.");
    Ok(())
}
