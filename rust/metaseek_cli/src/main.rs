mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use metaseek::rt_prediction::{
    NullRtModel,
    RtPredictor,
};
use metaseek::scoring::Scorer;
use metaseek::{
    CandidateGenerator,
    PropertyJoiner,
};
use tracing::level_filters::LevelFilter;
use tracing::{
    info,
    warn,
};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;
use errors::CliError;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn load_config(args: &Cli) -> Result<Config, CliError> {
    let conf = std::fs::read_to_string(&args.config).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(args.config.to_string_lossy().to_string()),
    })?;
    let mut config = Config::from_json(&conf)?;
    config.apply_cli_args(args);
    config.validate()?;
    Ok(config)
}

fn main() -> std::result::Result<(), CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    let args = Cli::parse();
    let config = load_config(&args)?;
    let inputs = config.resolved_inputs()?;
    let output_config = config.output_config()?;
    info!("Parsed configuration: {:#?}", config);

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| CliError::Config {
                source: e.to_string(),
            })?;
    }

    // Everything that can fail on a bad definition is checked before reading data.
    let adducts = config.analysis.adduct_table()?;
    let priors = config.analysis.adduct_priors(&adducts)?;
    let rt_model: Box<dyn RtPredictor> = match &config.rt_model {
        Some(x) => x.load()?,
        None => {
            warn!("No retention time model configured, all candidates get the neutral rt score");
            Box::new(NullRtModel)
        }
    };

    std::fs::create_dir_all(&output_config.directory).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(output_config.directory.to_string_lossy().to_string()),
    })?;

    let run_inputs = processing::load_inputs(&inputs)?;

    let mut generator = CandidateGenerator::new(
        run_inputs.library.as_slice(),
        &adducts,
        config.analysis.tolerance_ppm,
    )?;
    if config.analysis.use_mz_index {
        let st = std::time::Instant::now();
        generator = generator.with_index();
        info!("Built m/z index in {:?}", st.elapsed());
    }
    let scorer = Scorer::new(
        config.analysis.tolerance_ppm,
        priors,
        PropertyJoiner::new(run_inputs.properties.clone()),
    )?
    .with_neutral_rt_score(config.analysis.neutral_rt_score)?;

    processing::process(
        &run_inputs,
        &generator,
        &scorer,
        rt_model.as_ref(),
        &config.analysis.weights,
        config.analysis.chunk_size,
        &output_config,
    )?;

    Ok(())
}
