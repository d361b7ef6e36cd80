use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use distfit_core::{FitConfig, StallPolicy};
use distfit_tests::{FitReport, Outcome};

use super::{EXIT_FAILURE, report_error};

pub struct FitCommandConfig<'a> {
    pub path: &'a Path,
    pub alpha: f64,
    pub block_size: Option<usize>,
    pub watchdog_interval_secs: Option<u64>,
    pub threads: Option<usize>,
    pub strict_watchdog: bool,
    pub no_watchdog: bool,
    pub output_path: Option<&'a str>,
}

/// Command-line flags layered over the defaults.
pub fn build_config(cmd: &FitCommandConfig<'_>) -> FitConfig {
    let mut config = FitConfig {
        critical_p_value: cmd.alpha,
        ..FitConfig::default()
    };
    if let Some(n) = cmd.block_size {
        config.threads.elements_per_read = n;
    }
    if let Some(secs) = cmd.watchdog_interval_secs {
        config.threads.watchdog_interval = Duration::from_secs(secs);
    }
    if let Some(n) = cmd.threads {
        config.threads.threads = n;
    }
    config.stall_policy = if cmd.no_watchdog {
        None
    } else if cmd.strict_watchdog {
        Some(StallPolicy::Abort)
    } else {
        Some(StallPolicy::Warn)
    };
    config
}

pub fn run(cmd: FitCommandConfig<'_>) -> i32 {
    let config = build_config(&cmd);
    let report = match distfit_tests::fit_file(cmd.path, &config) {
        Ok(report) => report,
        Err(e) => return report_error(&cmd.path.display().to_string(), &e),
    };

    print!("{}", render_summary(&report));
    println!();
    print!("{}", render_table(&report));
    println!();
    println!("{}", report.verdict);

    if let Some(path) = cmd.output_path {
        let json = match serde_json::to_string_pretty(&report) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                return EXIT_FAILURE;
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("Failed to write report to {path}: {e}");
            return EXIT_FAILURE;
        }
        println!("\nReport saved to: {path}");
    }
    0
}

/// Header block: file geometry and pass statistics.
pub fn render_summary(report: &FitReport) -> String {
    let first = &report.first_pass;
    let second = &report.second_pass;
    let mut out = String::new();
    let _ = writeln!(out, "File:       {}", report.path.display());
    let _ = writeln!(
        out,
        "Records:    {} ({} valid, {} trailing bytes ignored)",
        report.records, first.count, report.trailing_bytes
    );
    let _ = writeln!(out, "Range:      [{}, {}]", first.min, first.max);
    let _ = writeln!(
        out,
        "Mean:       {:.6}   SD: {:.6}   Integers: {}",
        first.mean,
        second.sd,
        if first.all_integers { "yes" } else { "no" }
    );
    let _ = writeln!(out, "Intervals:  {}", report.intervals);
    if let Some(stalls) = report.stalls.filter(|&s| s > 0) {
        let _ = writeln!(out, "Stalls:     {stalls}");
    }
    out
}

/// One row per hypothesis.
pub fn render_table(report: &FitReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<14} {:>14} {:>6} {:>10} {:>9}",
        "Distribution", "Chi-square", "df", "p-value", "Accepted"
    );
    let _ = writeln!(out, "{}", "-".repeat(57));
    for outcome in &report.outcomes {
        let name = outcome.hypothesis().name();
        match outcome {
            Outcome::Tested { result, .. } => {
                let _ = writeln!(
                    out,
                    "{:<14} {:>14.4} {:>6} {:>10.6} {:>9}",
                    name,
                    result.statistic,
                    result.degrees_of_freedom,
                    result.p_value,
                    if result.accepted { "yes" } else { "no" }
                );
            }
            Outcome::Skipped { reason, .. } => {
                let _ = writeln!(out, "{name:<14} skipped: {reason}");
            }
            Outcome::Unavailable { reason, .. } => {
                let _ = writeln!(out, "{name:<14} unavailable: {reason}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use distfit_core::write_records;
    use tempfile::NamedTempFile;

    fn command(path: &Path) -> FitCommandConfig<'_> {
        FitCommandConfig {
            path,
            alpha: 0.05,
            block_size: None,
            watchdog_interval_secs: None,
            threads: None,
            strict_watchdog: false,
            no_watchdog: false,
            output_path: None,
        }
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    #[test]
    fn test_defaults_warn_on_stall() {
        let path = Path::new("x.bin");
        let config = build_config(&command(path));
        assert_eq!(config.stall_policy, Some(StallPolicy::Warn));
        assert_eq!(config.critical_p_value, 0.05);
    }

    #[test]
    fn test_flags_override_defaults() {
        let path = Path::new("x.bin");
        let cmd = FitCommandConfig {
            alpha: 0.01,
            block_size: Some(4096),
            watchdog_interval_secs: Some(10),
            threads: Some(3),
            strict_watchdog: true,
            ..command(path)
        };
        let config = build_config(&cmd);
        assert_eq!(config.critical_p_value, 0.01);
        assert_eq!(config.threads.elements_per_read, 4096);
        assert_eq!(config.threads.watchdog_interval, Duration::from_secs(10));
        assert_eq!(config.threads.threads, 3);
        assert_eq!(config.stall_policy, Some(StallPolicy::Abort));
    }

    #[test]
    fn test_no_watchdog() {
        let path = Path::new("x.bin");
        let cmd = FitCommandConfig {
            no_watchdog: true,
            ..command(path)
        };
        assert_eq!(build_config(&cmd).stall_policy, None);
    }

    // -----------------------------------------------------------------------
    // Exit codes
    // -----------------------------------------------------------------------

    #[test]
    fn test_run_exit_codes() {
        let missing = Path::new("/definitely/not/here.bin");
        assert_eq!(run(command(missing)), super::super::EXIT_OPEN);

        let bad_alpha = FitCommandConfig {
            alpha: 2.0,
            ..command(missing)
        };
        assert_eq!(run(bad_alpha), super::super::EXIT_CONFIG);

        let mut f = NamedTempFile::new().unwrap();
        write_records(&mut f, &[1.0]).unwrap();
        assert_eq!(run(command(f.path())), super::super::EXIT_INSUFFICIENT_DATA);
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    #[test]
    fn test_table_and_json_output() {
        let values: Vec<f64> = (0..3_000).map(|i| ((i * 37) % 1000) as f64).collect();
        let mut f = NamedTempFile::new().unwrap();
        write_records(&mut f, &values).unwrap();
        let out = NamedTempFile::new().unwrap();
        let out_path = out.path().to_str().unwrap().to_string();

        let cmd = FitCommandConfig {
            threads: Some(2),
            output_path: Some(&out_path),
            ..command(f.path())
        };
        assert_eq!(run(cmd), 0);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
        assert_eq!(json["first_pass"]["count"], 3_000);
        assert_eq!(json["outcomes"].as_array().unwrap().len(), 4);

        let report = distfit_tests::fit_file(f.path(), &build_config(&command(f.path()))).unwrap();
        let table = render_table(&report);
        for name in ["Normal", "Uniform", "Exponential", "Poisson"] {
            assert!(table.contains(name), "{table}");
        }
        let summary = render_summary(&report);
        assert!(summary.contains("3000 valid"));
        assert!(summary.contains("Integers: yes"));
    }
}
