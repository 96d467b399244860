use benchmarks::SyntheticMarket;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use immoprix::correction::PriceCorrector;
use immoprix::dataset::{CleaningConfig, PropertyType};
use immoprix::features::EstimateQuery;
use immoprix::inference::Estimator;
use immoprix::model::{EnsembleConfig, ForestConfig, InferenceModel};
use immoprix::trainer::{Trainer, TrainingConfig};

fn trainer(n_trees: usize) -> Trainer {
    let ensemble = EnsembleConfig::default()
        .with_random_forest(ForestConfig::random_forest().with_n_trees(n_trees))
        .with_extra_trees(ForestConfig::extra_trees().with_n_trees(n_trees));
    Trainer::new(TrainingConfig::default().with_ensemble(ensemble))
        .with_cleaning(CleaningConfig::default().with_min_department_count(20))
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_records");
    group.sample_size(10);
    for n in [1_000, 5_000] {
        let records = SyntheticMarket::default().records(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &records, |b, records| {
            b.iter(|| trainer(20).fit_records(black_box(records)));
        });
    }
    group.finish();
}

fn bench_estimate(c: &mut Criterion) {
    let records = SyntheticMarket::default().records(5_000);
    let bundle = trainer(50)
        .fit_records(&records)
        .expect("training on synthetic data");
    let x = ndarray::Array2::<f64>::zeros((10_000, bundle.columns().len()));
    c.bench_function("ensemble_predict_batch_10k", |b| {
        b.iter(|| bundle.ensemble().predict_batch(black_box(&x)));
    });

    let estimator = Estimator::from_bundle(std::env::temp_dir(), bundle);
    let query = EstimateQuery::new(60.0, 3, "75");
    c.bench_function("estimate_single", |b| {
        b.iter(|| estimator.estimate(black_box(&query)));
    });
}

fn bench_correction(c: &mut Criterion) {
    let presentation = PriceCorrector::presentation();
    let inference = PriceCorrector::inference();
    c.bench_function("presentation_correction", |b| {
        b.iter(|| {
            presentation.correct_price(
                black_box(650_000.0),
                black_box(60.0),
                black_box("75011"),
                PropertyType::Apartment,
                0.0,
            )
        });
    });
    c.bench_function("inference_correction", |b| {
        b.iter(|| {
            inference.correct_price(
                black_box(350_000.0),
                black_box(120.0),
                black_box("33"),
                PropertyType::House,
                black_box(400.0),
            )
        });
    });
}

criterion_group!(benches, bench_fit, bench_estimate, bench_correction);
criterion_main!(benches);
