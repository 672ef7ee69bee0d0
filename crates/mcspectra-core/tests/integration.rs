//! Integration tests for mcspectra-core.
//!
//! These tests drive the full pipeline:
//! configuration → realization pairing → spectrum estimation → noise bias → store.

use std::sync::Mutex;

use mcspectra_core::{
    ArrayStore, BinnedEngine, CoupledSpectrum, DirStore, EnsembleSource, MaskingConfig,
    MemoryStore, ModelConfig, N_SPECTRA, RunConfig, RunOptions, SpectraPipeline, SpectralType,
    SpectrumEngine, StoreEnsemble,
};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand::rngs::StdRng;

const NPIX: usize = 16;
const N_BANDS: usize = 4;

/// Engine that records which realizations were crossed. Each amplitude map
/// carries its realization index in pixel 0 of the first row.
#[derive(Default)]
struct CountingEngine {
    crossed: Mutex<Vec<(f64, f64)>>,
}

impl CountingEngine {
    fn calls(&self) -> usize {
        self.crossed.lock().unwrap().len()
    }
}

impl SpectrumEngine for CountingEngine {
    type Field = Array2<f64>;

    fn field(
        &self,
        map: ArrayView2<'_, f64>,
        _mask: ArrayView1<'_, f64>,
        purify_b: bool,
    ) -> mcspectra_core::Result<Self::Field> {
        assert!(purify_b, "fields must request B-mode purification");
        Ok(map.to_owned())
    }

    fn coupled_spectrum(
        &self,
        a: &Self::Field,
        b: &Self::Field,
    ) -> mcspectra_core::Result<CoupledSpectrum> {
        self.crossed.lock().unwrap().push((a[[0, 0]], b[[0, 0]]));
        let level = a[[0, 0]] * 10.0 + b[[0, 0]];
        Ok(CoupledSpectrum(Array2::from_elem((N_SPECTRA, N_BANDS), level)))
    }
}

fn masking_json(masks: &[&str], schemes: &[&str]) -> String {
    let weights = vec!["1.0"; NPIX].join(", ");
    let masks: Vec<String> = masks
        .iter()
        .map(|m| {
            format!(
                r#"{{"name": "{m}", "weights": [{weights}], "bins": {N_BANDS}, "beam": [1.0, 0.95, 0.9, 0.8]}}"#
            )
        })
        .collect();
    let schemes: Vec<String> = schemes
        .iter()
        .map(|s| format!(r#"{{"name": "{s}"}}"#))
        .collect();
    format!(
        r#"{{"fitting_schemes": [{}], "masks": [{}]}}"#,
        schemes.join(", "),
        masks.join(", ")
    )
}

/// Amplitude ensemble whose realization `i` has value `i` at pixel 0.
fn seed_amplitudes(store: &dyn ArrayStore, path: &str, nmc: usize) {
    let amps = Array3::from_shape_fn((nmc, 2, NPIX), |(i, j, k)| {
        if j == 0 && k == 0 {
            i as f64
        } else {
            ((i * 7 + j * 3 + k) % 11) as f64 * 0.1 - 0.5
        }
    });
    store.put(path, &amps.into_dyn()).unwrap();
}

#[test]
fn scenario_a_single_dust_component() {
    let store = MemoryStore::new();
    seed_amplitudes(&store, "modelA/scheme1/dust_T_bar", 4);
    let masking = MaskingConfig::from_json(&masking_json(&["maskX"], &["scheme1"])).unwrap();
    let model =
        ModelConfig::from_json(r#"{"identifier": "modelA", "components": ["dust"]}"#).unwrap();
    let ensemble = StoreEnsemble::new(&store, "modelA");
    let engine = CountingEngine::default();

    let mut options = RunOptions::new(4);
    options.parallel = false;
    let summary = SpectraPipeline::new(&engine, &masking, &model, &ensemble, &store, options)
        .run(&mut StdRng::seed_from_u64(1))
        .unwrap();

    assert_eq!(engine.calls(), 2);
    assert_eq!(*engine.crossed.lock().unwrap(), vec![(0.0, 1.0), (2.0, 3.0)]);

    let spectra = store.read("modelA/scheme1/spectra/maskX/dust").unwrap();
    assert_eq!(spectra.shape(), &[2, N_SPECTRA, N_BANDS]);
    assert_eq!(spectra[[0, 3, 0]], 1.0);
    assert_eq!(spectra[[1, 3, 0]], 23.0);

    assert_eq!(summary.spectra_written, 1);
    assert_eq!(summary.pairs_computed, 2);
    assert_eq!(summary.noise_sets_written, 0);
}

#[test]
fn scenario_b_cmb_noise_bias() {
    let store = MemoryStore::new();
    seed_amplitudes(&store, "modelA/scheme1/cmb_T_bar", 2);
    store
        .put(
            "modelA/scheme1/cmb_N_T",
            &Array2::from_elem((2, NPIX), 0.25).into_dyn(),
        )
        .unwrap();
    let masking = MaskingConfig::from_json(&masking_json(&["maskX"], &["scheme1"])).unwrap();
    let model =
        ModelConfig::from_json(r#"{"identifier": "modelA", "components": ["cmb"]}"#).unwrap();
    let ensemble = StoreEnsemble::new(&store, "modelA");
    let engine = CountingEngine::default();

    let mut options = RunOptions::new(2);
    options.estimate_noise = true;
    let summary = SpectraPipeline::new(&engine, &masking, &model, &ensemble, &store, options)
        .run(&mut StdRng::seed_from_u64(2))
        .unwrap();

    // One realization pair plus 30 noise realization pairs.
    assert_eq!(engine.calls(), 1 + 30);
    assert_eq!(summary.noise_sets_written, 1);

    assert_eq!(
        store.shape("modelA/scheme1/spectra/maskX/cmb").unwrap(),
        vec![1, N_SPECTRA, N_BANDS]
    );
    assert_eq!(
        store.shape("modelA/scheme1/spectra/maskX/cmb_cln_mean").unwrap(),
        vec![N_BANDS]
    );
    assert_eq!(
        store.shape("modelA/scheme1/spectra/maskX/cmb_cln_cov").unwrap(),
        vec![N_BANDS, N_BANDS]
    );
}

/// Engine whose coupled spectra carry `row + 1` in every mode of each row.
struct RowTaggedEngine;

impl SpectrumEngine for RowTaggedEngine {
    type Field = ();

    fn field(
        &self,
        _map: ArrayView2<'_, f64>,
        _mask: ArrayView1<'_, f64>,
        _purify_b: bool,
    ) -> mcspectra_core::Result<Self::Field> {
        Ok(())
    }

    fn coupled_spectrum(&self, _a: &(), _b: &()) -> mcspectra_core::Result<CoupledSpectrum> {
        Ok(CoupledSpectrum(Array2::from_shape_fn(
            (N_SPECTRA, N_BANDS),
            |(row, _)| (row + 1) as f64,
        )))
    }
}

#[test]
fn noise_bias_is_taken_from_bb_row() {
    let store = MemoryStore::new();
    seed_amplitudes(&store, "m/f/cmb_T_bar", 2);
    store
        .put("m/f/cmb_N_T", &Array2::from_elem((2, NPIX), 1.0).into_dyn())
        .unwrap();
    let masking = MaskingConfig::from_json(&masking_json(&["k"], &["f"])).unwrap();
    let model = ModelConfig::from_json(r#"{"identifier": "m", "components": ["cmb"]}"#).unwrap();
    let ensemble = StoreEnsemble::new(&store, "m");

    let mut options = RunOptions::new(2);
    options.estimate_noise = true;
    SpectraPipeline::new(&RowTaggedEngine, &masking, &model, &ensemble, &store, options)
        .run(&mut StdRng::seed_from_u64(4))
        .unwrap();

    let bb = (SpectralType::BB.row() + 1) as f64;
    let mean = store.read("m/f/spectra/k/cmb_cln_mean").unwrap();
    assert!(mean.iter().all(|v| *v == bb), "{mean:?}");
    let cov = store.read("m/f/spectra/k/cmb_cln_cov").unwrap();
    assert!(cov.iter().all(|v| *v == 0.0), "{cov:?}");
    // The stored spectra keep all four rows.
    let spectra = store.read("m/f/spectra/k/cmb").unwrap();
    assert_eq!(spectra[[0, 0, 0]], 1.0);
    assert_eq!(spectra[[0, 3, 0]], 4.0);
}

#[test]
fn noise_bias_of_white_noise_is_centred() {
    let store = MemoryStore::new();
    seed_amplitudes(&store, "m/f/cmb_T_bar", 2);
    let npix_noise = NPIX;
    store
        .put("m/f/cmb_N_T", &Array2::from_elem((2, npix_noise), 1.0).into_dyn())
        .unwrap();
    let masking = MaskingConfig::from_json(&masking_json(&["k"], &["f"])).unwrap();
    let model = ModelConfig::from_json(r#"{"identifier": "m", "components": ["cmb"]}"#).unwrap();
    let ensemble = StoreEnsemble::new(&store, "m");
    let engine = BinnedEngine::new(N_BANDS).unwrap();

    let mut options = RunOptions::new(2);
    options.estimate_noise = true;
    SpectraPipeline::new(&engine, &masking, &model, &ensemble, &store, options)
        .run(&mut StdRng::seed_from_u64(3))
        .unwrap();

    let cov = store.read("m/f/spectra/k/cmb_cln_cov").unwrap();
    for b in 0..N_BANDS {
        assert!(cov[[b, b]] >= 0.0);
        for c in 0..N_BANDS {
            assert!((cov[[b, c]] - cov[[c, b]]).abs() < 1e-12);
        }
    }
    let mean = store.read("m/f/spectra/k/cmb_cln_mean").unwrap();
    // Cross power of independent unit-variance noise: zero mean, per-band
    // scatter 1/sqrt(4 pixels), averaged over 30 draws.
    for b in 0..N_BANDS {
        assert!(mean[[b]].abs() < 0.5, "band {b}: {}", mean[[b]]);
    }
}

#[test]
fn path_scheme_is_exact() {
    let store = MemoryStore::new();
    seed_amplitudes(&store, "modelA/scheme1/dust_T_bar", 2);
    let masking = MaskingConfig::from_json(&masking_json(&["maskX"], &["scheme1"])).unwrap();
    let model =
        ModelConfig::from_json(r#"{"identifier": "modelA", "components": ["dust"]}"#).unwrap();
    let ensemble = StoreEnsemble::new(&store, "modelA");
    let engine = BinnedEngine::new(N_BANDS).unwrap();

    SpectraPipeline::new(&engine, &masking, &model, &ensemble, &store, RunOptions::new(2))
        .run(&mut StdRng::seed_from_u64(0))
        .unwrap();

    assert_eq!(
        store.list_datasets("modelA/scheme1/spectra").unwrap(),
        vec![
            "modelA/scheme1/spectra/maskX/beam".to_string(),
            "modelA/scheme1/spectra/maskX/bpw_window_function".to_string(),
            "modelA/scheme1/spectra/maskX/dust".to_string(),
        ]
    );
}

#[test]
fn nested_iteration_covers_every_triple() {
    let store = MemoryStore::new();
    for scheme in ["s1", "s2"] {
        for component in ["cmb", "dust", "synchrotron"] {
            seed_amplitudes(&store, &format!("m/{scheme}/{component}_T_bar"), 4);
        }
    }
    let masking = MaskingConfig::from_json(&masking_json(&["a", "b"], &["s1", "s2"])).unwrap();
    let model = ModelConfig::from_json(
        r#"{"identifier": "m", "components": ["cmb", "dust", "synchrotron"]}"#,
    )
    .unwrap();
    let ensemble = StoreEnsemble::new(&store, "m");
    let engine = BinnedEngine::new(N_BANDS).unwrap();

    let summary =
        SpectraPipeline::new(&engine, &masking, &model, &ensemble, &store, RunOptions::new(4))
            .run(&mut StdRng::seed_from_u64(0))
            .unwrap();

    assert_eq!(summary.masks, 2);
    assert_eq!(summary.fitting_schemes, 2);
    assert_eq!(summary.spectra_written, 2 * 2 * 3);
    assert_eq!(summary.pairs_computed, 2 * 2 * 3 * 2);
    // Write order follows mask → scheme → component.
    let spectra: Vec<&str> = summary
        .datasets
        .iter()
        .map(String::as_str)
        .filter(|p| !p.ends_with("beam") && !p.ends_with("bpw_window_function"))
        .collect();
    assert_eq!(
        spectra,
        vec![
            "m/s1/spectra/a/cmb",
            "m/s1/spectra/a/dust",
            "m/s1/spectra/a/synchrotron",
            "m/s2/spectra/a/cmb",
            "m/s2/spectra/a/dust",
            "m/s2/spectra/a/synchrotron",
            "m/s1/spectra/b/cmb",
            "m/s1/spectra/b/dust",
            "m/s1/spectra/b/synchrotron",
            "m/s2/spectra/b/cmb",
            "m/s2/spectra/b/dust",
            "m/s2/spectra/b/synchrotron",
        ]
    );
}

#[test]
fn odd_realization_count_fails_before_writing() {
    let store = MemoryStore::new();
    seed_amplitudes(&store, "m/f/dust_T_bar", 3);
    let masking = MaskingConfig::from_json(&masking_json(&["k"], &["f"])).unwrap();
    let model = ModelConfig::from_json(r#"{"identifier": "m", "components": ["dust"]}"#).unwrap();
    let ensemble = StoreEnsemble::new(&store, "m");
    let engine = BinnedEngine::new(N_BANDS).unwrap();

    let err = SpectraPipeline::new(&engine, &masking, &model, &ensemble, &store, RunOptions::new(3))
        .run(&mut StdRng::seed_from_u64(0))
        .unwrap_err();
    assert!(matches!(err, mcspectra_core::SpectraError::Configuration(_)));
    assert!(!store.exists("m/f/spectra"));
}

#[test]
fn shape_mismatch_between_maps_and_mask_aborts() {
    let store = MemoryStore::new();
    let wrong = Array3::<f64>::zeros((2, 2, NPIX + 1));
    store.put("m/f/dust_T_bar", &wrong.into_dyn()).unwrap();
    let masking = MaskingConfig::from_json(&masking_json(&["k"], &["f"])).unwrap();
    let model = ModelConfig::from_json(r#"{"identifier": "m", "components": ["dust"]}"#).unwrap();
    let ensemble = StoreEnsemble::new(&store, "m");
    let engine = BinnedEngine::new(N_BANDS).unwrap();

    let err = SpectraPipeline::new(&engine, &masking, &model, &ensemble, &store, RunOptions::new(2))
        .run(&mut StdRng::seed_from_u64(0))
        .unwrap_err();
    assert!(matches!(
        err,
        mcspectra_core::SpectraError::ShapeMismatch { .. }
    ));
    assert!(!store.exists("m/f/spectra/k/dust"));
}

#[test]
fn rerun_against_populated_dir_store_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let data = format!(
        r#"{{"identifier": "sim", "monte_carlo": 4, "hdf5_path": "{}", "seed": 99, "estimate_noise": true}}"#,
        tmp.path().join("store").display()
    );
    let run = RunConfig::from_json(&data).unwrap();
    let masking = MaskingConfig::from_json(&masking_json(&["k"], &["f"])).unwrap();
    let model =
        ModelConfig::from_json(r#"{"identifier": "m", "components": ["cmb", "dust"]}"#).unwrap();
    let engine = BinnedEngine::new(N_BANDS).unwrap();

    let store = DirStore::open(&run.store_path).unwrap();
    seed_amplitudes(&store, "m/f/cmb_T_bar", 4);
    seed_amplitudes(&store, "m/f/dust_T_bar", 4);
    store
        .put("m/f/cmb_N_T", &Array2::from_elem((2, NPIX), 0.5).into_dyn())
        .unwrap();

    let snapshot = |store: &DirStore| {
        store
            .list_datasets("m/f/spectra")
            .unwrap()
            .into_iter()
            .map(|p| {
                let data = store.read(&p).unwrap();
                (p, data)
            })
            .collect::<Vec<_>>()
    };

    let ensemble = StoreEnsemble::new(&store, model.identifier.clone());
    let first = SpectraPipeline::new(
        &engine,
        &masking,
        &model,
        &ensemble,
        &store,
        RunOptions::from(&run),
    )
    .run(&mut run.rng())
    .unwrap();
    let before = snapshot(&store);

    // Fresh handle on the already-populated store.
    let store = DirStore::open(&run.store_path).unwrap();
    let ensemble = StoreEnsemble::new(&store, model.identifier.clone());
    let second = SpectraPipeline::new(
        &engine,
        &masking,
        &model,
        &ensemble,
        &store,
        RunOptions::from(&run),
    )
    .run(&mut run.rng())
    .unwrap();
    let after = snapshot(&store);

    assert_eq!(first, second);
    assert_eq!(before, after);
    assert_eq!(
        before.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
        vec![
            "m/f/spectra/k/beam",
            "m/f/spectra/k/bpw_window_function",
            "m/f/spectra/k/cmb",
            "m/f/spectra/k/cmb_cln_cov",
            "m/f/spectra/k/cmb_cln_mean",
            "m/f/spectra/k/dust",
        ]
    );
}

#[test]
fn ensemble_source_trait_object_reads_realizations() {
    let store = MemoryStore::new();
    seed_amplitudes(&store, "m/f/dust_T_bar", 2);
    let ensemble = StoreEnsemble::new(&store, "m");
    let source: &dyn EnsembleSource = &ensemble;
    assert_eq!(source.read_amplitude("f", "dust", 1).unwrap()[[0, 0]], 1.0);
}
