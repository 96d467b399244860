use immoprix::correction::PriceCorrector;
use immoprix::dataset::{CleaningConfig, IngestConfig, PropertyType};
use immoprix::features::EstimateQuery;
use immoprix::inference::Estimator;
use immoprix::model::{EnsembleConfig, ForestConfig};
use immoprix::persistence::{bundle_exists, ModelBundle};
use immoprix::presentation::{EstimateReport, FormInput};
use immoprix::trainer::{Trainer, TrainingConfig, TrainingOutcome};
use immoprix::EstimatorError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEADER: &str = "Date mutation,Valeur fonciere,Code postal,Type local,Surface reelle bati,Nombre pieces principales,Surface terrain";

/// Department, sample postal code and price per m².
const MARKETS: [(&str, f64); 5] = [
    ("75011", 9500.0),
    ("69003", 4300.0),
    ("13008", 3600.0),
    ("33000", 3900.0),
    ("23000", 1600.0),
];

fn synthetic_csv(n: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::from(HEADER);
    out.push('\n');
    for i in 0..n {
        let (code, rate) = MARKETS[i % MARKETS.len()];
        let house = rng.gen_bool(0.3);
        let surface: f64 = if house {
            rng.gen_range(70.0..180.0)
        } else {
            rng.gen_range(18.0..130.0)
        };
        let rooms = ((surface / 22.0).round() as u32).clamp(1, 8);
        let plot = if house { rng.gen_range(200.0..900.0) } else { 0.0 };
        let factor = if house { 1.05 } else { 1.0 };
        let noise = rng.gen_range(0.9..1.1);
        let price = surface * rate * factor * noise;
        let year = rng.gen_range(2021..=2024);
        let month = rng.gen_range(1..=12);
        let _ = writeln!(
            out,
            "15/{month:02}/{year},\"{}\",{code},{},{:.0},{rooms},{}",
            format!("{price:.2}").replace('.', ","),
            if house { "Maison" } else { "Appartement" },
            surface,
            if house { format!("{plot:.0}") } else { String::new() },
        );
    }
    out
}

fn trainer() -> Trainer {
    let ensemble = EnsembleConfig::default()
        .with_random_forest(ForestConfig::random_forest().with_n_trees(20))
        .with_extra_trees(ForestConfig::extra_trees().with_n_trees(20));
    Trainer::new(TrainingConfig::default().with_ensemble(ensemble))
        .with_ingest(IngestConfig::default().with_chunk_size(250))
        .with_cleaning(CleaningConfig::default().with_min_department_count(50))
}

struct Workspace {
    _tmp: TempDir,
    data: PathBuf,
    model_dir: PathBuf,
}

fn workspace() -> Workspace {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("dvf_clean.csv");
    std::fs::write(&data, synthetic_csv(1000, 7)).unwrap();
    let model_dir = tmp.path().join("model");
    Workspace {
        _tmp: tmp,
        data,
        model_dir,
    }
}

fn train(ws: &Workspace) -> TrainingOutcome {
    trainer().run(&ws.data, &ws.model_dir).unwrap()
}

fn paris_form() -> FormInput {
    FormInput {
        postal_code: "75011".to_string(),
        surface: 60.0,
        rooms: 3,
        plot: 0.0,
        property_type: PropertyType::Apartment,
        year: 2024,
    }
}

#[test]
fn trains_saves_and_estimates_paris_apartment() {
    let ws = workspace();
    let outcome = train(&ws);
    assert!(outcome.is_saved(), "r2_test = {}", outcome.metrics().r2_test);
    assert!(bundle_exists(&ws.model_dir));

    let estimator = Estimator::load(&ws.model_dir).unwrap();
    let report = EstimateReport::build(&estimator, &paris_form()).unwrap();

    assert!(
        (7000.0..=13000.0).contains(&report.price_per_m2),
        "price per m² = {}",
        report.price_per_m2
    );
    assert!((report.price_per_m2 - report.price / 60.0).abs() < 1e-9);
    assert_eq!(report.location, "Paris 11e");
    assert!((report.low - report.price * 0.8).abs() < 1e-6);
    assert!((report.high - report.price * 1.2).abs() < 1e-6);
    assert!(report.plot.is_none());
}

#[test]
fn paris_outprices_the_creuse() {
    let ws = workspace();
    train(&ws);
    let estimator = Estimator::load(&ws.model_dir).unwrap();

    let paris = estimator.estimate(&EstimateQuery::new(60.0, 3, "75")).unwrap();
    let creuse = estimator.estimate(&EstimateQuery::new(60.0, 3, "23")).unwrap();
    assert!(paris > 2.0 * creuse, "paris {paris}, creuse {creuse}");
}

#[test]
fn unknown_department_uses_sentinel() {
    let ws = workspace();
    train(&ws);
    let estimator = Estimator::load(&ws.model_dir).unwrap();
    let price = estimator.estimate(&EstimateQuery::new(60.0, 3, "2B")).unwrap();
    assert!(price.is_finite() && price > 0.0);
}

#[test]
fn same_seed_same_predictions() {
    let ws = workspace();
    let (records, _) = trainer().load_records(&ws.data).unwrap();
    let first = trainer().fit_records(&records).unwrap();
    let second = trainer().fit_records(&records).unwrap();

    let dir_a = ws.model_dir.join("a");
    let dir_b = ws.model_dir.join("b");
    first.save(&dir_a).unwrap();
    second.save(&dir_b).unwrap();

    let a = Estimator::load(&dir_a).unwrap();
    let b = Estimator::load(&dir_b).unwrap();
    for query in [
        EstimateQuery::new(60.0, 3, "75"),
        EstimateQuery::new(120.0, 5, "33")
            .with_property_type(PropertyType::House)
            .with_plot(400.0),
        EstimateQuery::new(25.0, 1, "13").with_recent(false),
    ] {
        assert_eq!(a.raw_estimate(&query).unwrap(), b.raw_estimate(&query).unwrap());
    }
    assert_eq!(first.metadata().bias_factor, second.metadata().bias_factor);
}

#[test]
fn missing_bundle_is_unavailable() {
    let ws = workspace();
    let err = Estimator::load(&ws.model_dir).unwrap_err();
    assert!(matches!(err, EstimatorError::ModelUnavailable { .. }));
    assert!(ModelBundle::load(Path::new("/definitely/not/here"))
        .unwrap_err()
        .is_model_unavailable());
}

#[test]
fn reload_picks_up_new_bundle() {
    let ws = workspace();
    let estimator = Estimator::unloaded(&ws.model_dir);
    let query = EstimateQuery::new(60.0, 3, "69");
    assert!(estimator.estimate(&query).unwrap_err().is_model_unavailable());

    train(&ws);
    estimator.reload().unwrap();
    assert!(estimator.estimate(&query).unwrap() > 0.0);

    // a broken bundle on disk leaves the loaded one in place
    std::fs::remove_file(ws.model_dir.join("ensemble.bin")).unwrap();
    assert!(estimator.reload().is_err());
    assert!(estimator.estimate(&query).is_ok());
}

#[test]
fn shared_across_threads() {
    let ws = workspace();
    train(&ws);
    let estimator = Estimator::load(&ws.model_dir).unwrap();
    let expected = estimator.estimate(&EstimateQuery::new(45.0, 2, "13")).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let price = estimator.estimate(&EstimateQuery::new(45.0, 2, "13")).unwrap();
                assert_eq!(price, expected);
            });
        }
    });
}

#[test]
fn invalid_form_is_rejected_before_estimating() {
    let ws = workspace();
    let estimator = Estimator::unloaded(&ws.model_dir);
    let form = FormInput {
        postal_code: "7501".to_string(),
        ..paris_form()
    };
    let err = EstimateReport::build(&estimator, &form).unwrap_err();
    assert!(matches!(err, EstimatorError::InvalidInput(_)));
}

#[test]
fn report_applies_presentation_correction() {
    let ws = workspace();
    train(&ws);
    let estimator = Estimator::load(&ws.model_dir).unwrap();
    let form = FormInput {
        postal_code: "33000".to_string(),
        surface: 110.0,
        rooms: 4,
        plot: 500.0,
        property_type: PropertyType::House,
        year: 2022,
    };
    let report = EstimateReport::build(&estimator, &form).unwrap();
    let expected = PriceCorrector::presentation().correct_price(
        report.model_price,
        110.0,
        "33000",
        PropertyType::House,
        500.0,
    );
    assert_eq!(report.price, expected);
    assert!((report.correction_factor - report.price / report.model_price).abs() < 1e-12);
    let plot = report.plot.expect("house with a plot");
    assert!((plot.share - 0.3).abs() < 1e-12);
    assert_eq!(report.location, "Département 33");
}
