use std::path::Path;

use log::info;
use mcspectra_core::{
    BinnedEngine, DirStore, MaskingConfig, ModelConfig, RunConfig, RunOptions, RunSummary,
    SpectraPipeline, StoreEnsemble,
};

pub struct RunCommandConfig<'a> {
    pub data_path: &'a Path,
    pub model_path: &'a Path,
    pub masking_path: &'a Path,
    pub estimate_noise: bool,
    pub seed: Option<u64>,
    pub sequential: bool,
    pub json: bool,
}

pub fn run(cfg: RunCommandConfig<'_>) -> mcspectra_core::Result<()> {
    let mut data = RunConfig::load(cfg.data_path)?;
    if cfg.estimate_noise {
        data.estimate_noise = true;
    }
    if cfg.seed.is_some() {
        data.seed = cfg.seed;
    }
    if cfg.sequential {
        data.parallel = false;
    }
    let model = ModelConfig::load(cfg.model_path)?;
    let masking = MaskingConfig::load(cfg.masking_path)?;
    let engine = BinnedEngine::new(super::common_bins(&masking)?)?;

    info!(
        "Running {} ({} realizations, {} components, {} bands) into {}",
        data.identifier,
        data.nmc,
        model.components.len(),
        engine.n_modes(),
        data.store_path.display()
    );

    let store = DirStore::open(&data.store_path)?;
    let ensemble = StoreEnsemble::new(&store, model.identifier.clone());
    let pipeline = SpectraPipeline::new(
        &engine,
        &masking,
        &model,
        &ensemble,
        &store,
        RunOptions::from(&data),
    );
    let summary = pipeline.run(&mut data.rng())?;

    if cfg.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to serialize summary: {e}"),
        }
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=".repeat(60));
    println!(
        "{} mask(s) × {} fitting scheme(s)",
        summary.masks, summary.fitting_schemes
    );
    println!("{}", "-".repeat(60));
    println!("  {:<28} {:>8}", "spectra written", summary.spectra_written);
    println!("  {:<28} {:>8}", "realization pairs", summary.pairs_computed);
    println!("  {:<28} {:>8}", "noise-bias sets", summary.noise_sets_written);
    if summary.noise_skipped > 0 {
        println!("  {:<28} {:>8}", "no noise model (skipped)", summary.noise_skipped);
    }
    println!("{}", "=".repeat(60));
}
