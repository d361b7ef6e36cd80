//! Whole-file fitting: validate, two passes, then the battery.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use distfit_core::{
    FileReader, FirstPass, FirstPassResult, FitConfig, ProcessorPool, Result, SecondPass,
    SecondPassResult, Watchdog,
};

use crate::runner::{Outcome, TestRunner, Verdict};

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub path: PathBuf,
    /// Whole records in the file, valid or not.
    pub records: u64,
    pub trailing_bytes: u64,
    pub first_pass: FirstPassResult,
    pub second_pass: SecondPassResult,
    /// Regular histogram intervals.
    pub intervals: usize,
    pub critical_p_value: f64,
    /// Stalls the watchdog observed; `None` when it was disabled.
    pub stalls: Option<u64>,
    pub outcomes: Vec<Outcome>,
    pub verdict: Verdict,
}

/// Fit `path` on the CPU with `config.threads.threads` processors.
pub fn fit_file(path: impl AsRef<Path>, config: &FitConfig) -> Result<FitReport> {
    let pool = ProcessorPool::cpu(config.threads.threads);
    fit_file_with_pool(path, config, &pool)
}

/// Fit `path` using processors leased from `pool`.
pub fn fit_file_with_pool(
    path: impl AsRef<Path>,
    config: &FitConfig,
    pool: &ProcessorPool,
) -> Result<FitReport> {
    config.validate()?;
    let started = Instant::now();
    let reader = FileReader::open(path.as_ref())?;
    log::info!(
        "{}: {} records, {} processors, {} threads",
        reader.path().display(),
        reader.record_count(),
        pool.processor_count(),
        config.threads.threads
    );

    let watchdog = config
        .stall_policy
        .map(|policy| Watchdog::new(config.threads.watchdog_interval, policy));
    if let Some(w) = &watchdog {
        w.start()?;
    }

    let mut first = FirstPass::new(&reader, pool, &config.threads);
    if let Some(w) = &watchdog {
        first = first.with_watchdog(w);
    }
    let first = first.run()?;

    let mut second = SecondPass::new(&reader, pool, &config.threads, &first, config.max_intervals);
    if let Some(w) = &watchdog {
        second = second.with_watchdog(w);
    }
    let second = second.run()?;

    let stalls = watchdog.as_ref().map(|w| {
        w.stop();
        w.stall_count()
    });

    let outcomes = TestRunner::new(config.critical_p_value).run(&first, &second);
    let verdict = Verdict::from_outcomes(&outcomes);
    log::info!("{verdict} ({:.2?})", started.elapsed());

    Ok(FitReport {
        path: reader.path().to_path_buf(),
        records: reader.record_count(),
        trailing_bytes: reader.trailing_bytes(),
        intervals: second.histogram.intervals(),
        first_pass: first,
        second_pass: second,
        critical_p_value: config.critical_p_value,
        stalls,
        outcomes,
        verdict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use distfit_core::{Error, write_records};
    use tempfile::NamedTempFile;

    fn sample_file(values: &[f64]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        write_records(&mut f, values).unwrap();
        f
    }

    #[test]
    fn test_invalid_config_is_rejected_before_open() {
        let config = FitConfig {
            critical_p_value: 1.5,
            ..FitConfig::default()
        };
        let err = fit_file("/definitely/not/here.bin", &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_an_open_error() {
        let err = fit_file("/definitely/not/here.bin", &FitConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
    }

    #[test]
    fn test_single_value_is_insufficient() {
        let f = sample_file(&[4.0]);
        let err = fit_file(f.path(), &FitConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { needed: 2, got: 1 }));
    }

    #[test]
    fn test_range_wider_than_f64_max_is_not_tested() {
        let values: Vec<f64> = (0..300)
            .map(|i| match i % 3 {
                0 => -1e308,
                1 => (i % 17) as f64,
                _ => 1e308,
            })
            .collect();
        let f = sample_file(&values);
        let report = fit_file(f.path(), &FitConfig::default()).unwrap();
        assert!(report.second_pass.histogram.interval_size().is_finite());
        for outcome in &report.outcomes {
            assert!(outcome.result().is_none(), "{outcome:?}");
        }
        assert_eq!(report.verdict, crate::runner::Verdict::Unavailable);
    }

    #[test]
    fn test_report_geometry_and_rows() {
        let values: Vec<f64> = (0..2_000).map(|i| (i % 50) as f64 * 0.5).collect();
        let f = sample_file(&values);
        let mut config = FitConfig::default();
        config.threads.threads = 3;
        config.threads.elements_per_read = 97;
        let report = fit_file(f.path(), &config).unwrap();
        assert_eq!(report.records, 2_000);
        assert_eq!(report.trailing_bytes, 0);
        assert_eq!(report.first_pass.count, 2_000);
        assert_eq!(report.second_pass.histogram.total_count(), 2_000);
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.stalls, Some(0));
        // Half-integer values rule out Poisson.
        assert!(matches!(report.outcomes[3], Outcome::Skipped { .. }));
    }

    #[test]
    fn test_watchdog_can_be_disabled() {
        let values: Vec<f64> = (1..=500).map(f64::from).collect();
        let f = sample_file(&values);
        let config = FitConfig {
            stall_policy: None,
            ..FitConfig::default()
        };
        let report = fit_file(f.path(), &config).unwrap();
        assert_eq!(report.stalls, None);
        assert_eq!(report.first_pass.count, 500);
    }
}
