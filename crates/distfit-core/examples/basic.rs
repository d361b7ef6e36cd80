//! Basic two-pass summary example.
//!
//! Runs both streaming passes over a file of little-endian doubles and
//! prints the summary statistics and histogram shape.
//!
//! Run: `cargo run --example basic -- samples.bin`

use distfit_core::{
    FileReader, FirstPass, ProcessorPool, SecondPass, StallPolicy, ThreadConfig, Watchdog,
};

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: basic <FILE>");
        std::process::exit(2);
    };

    let reader = match FileReader::open(&path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(3);
        }
    };
    let config = ThreadConfig::default();
    let pool = ProcessorPool::cpu(config.threads);
    let watchdog = Watchdog::new(config.watchdog_interval, StallPolicy::Warn);
    if let Err(e) = watchdog.start() {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let first = FirstPass::new(&reader, &pool, &config)
        .with_watchdog(&watchdog)
        .run();
    let first = match first {
        Ok(f) => f,
        Err(e) => {
            eprintln!("first pass: {e}");
            std::process::exit(4);
        }
    };
    println!(
        "records={} valid={} min={} max={} mean={} integers={}",
        reader.record_count(),
        first.count,
        first.min,
        first.max,
        first.mean,
        first.all_integers
    );

    match SecondPass::new(&reader, &pool, &config, &first, 1 << 16)
        .with_watchdog(&watchdog)
        .run()
    {
        Ok(second) => println!(
            "variance={} sd={} bins={} (width {})",
            second.variance,
            second.sd,
            second.histogram.len(),
            second.histogram.interval_size()
        ),
        Err(e) => eprintln!("second pass: {e}"),
    }
    watchdog.stop();
}
