//! Stage timings of the training pipeline and estimator latency on synthetic data.

use benchmarks::{time_fn, LatencyStats, SyntheticMarket, Timer};
use immoprix::dataset::CleaningConfig;
use immoprix::features::EstimateQuery;
use immoprix::inference::Estimator;
use immoprix::trainer::{Trainer, TrainingConfig};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    immoprix::logging::init_tracing();
    println!("immoprix benchmark suite");
    println!("  cargo bench --package benchmarks --bench pipeline");
    println!("  cargo bench --package benchmarks --bench metrics");
    println!();

    let trainer = Trainer::new(TrainingConfig::default())
        .with_cleaning(CleaningConfig::default().with_min_department_count(20));
    let dir = std::env::temp_dir().join("immoprix-bench-model");

    for n in [2_000, 10_000, 50_000] {
        let records = SyntheticMarket::default().records(n);
        let mut timer = Timer::new();

        timer.start();
        let bundle = trainer.fit_records(&records)?;
        let fit = timer.stop();
        let (saved, save) = time_fn(|| bundle.save(&dir));
        saved?;

        let estimator = Estimator::load(&dir)?;
        let query = EstimateQuery::new(60.0, 3, "75");
        let latency = LatencyStats::measure(100, 2_000, || estimator.estimate(&query));

        let metrics = bundle.metadata().metrics;
        println!(
            "{n:>6} records: fit {:>8.1} ms, save {:>6.1} ms, r2_test {:.3}",
            fit.as_secs_f64() * 1000.0,
            save.as_secs_f64() * 1000.0,
            metrics.r2_test
        );
        if let Some(stats) = latency {
            println!(
                "        estimate: mean {:.3} ms, median {:.3} ms, p95 {:.3} ms",
                stats.mean_ms, stats.median_ms, stats.p95_ms
            );
        }
    }
    Ok(())
}
