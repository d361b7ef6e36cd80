use std::path::Path;

use distfit_core::{DataBlock, FileReader, RECORD_SIZE};

use super::{EXIT_IO, report_error};

/// How many leading values to preview.
const PREVIEW: usize = 8;

pub fn run(path: &Path) -> i32 {
    let reader = match FileReader::open(path) {
        Ok(reader) => reader,
        Err(e) => return report_error(&path.display().to_string(), &e),
    };

    println!("File:           {}", reader.path().display());
    println!(
        "Size:           {} bytes",
        reader.record_count() * RECORD_SIZE as u64 + reader.trailing_bytes()
    );
    println!("Records:        {}", reader.record_count());
    println!("Trailing bytes: {}", reader.trailing_bytes());

    match reader.read_block(PREVIEW) {
        DataBlock::Ok(values) => {
            let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            println!("First values:   {}", shown.join(", "));
        }
        DataBlock::Eof => println!("First values:   (empty)"),
        DataBlock::Error(e) => {
            eprintln!("{}: {e}", path.display());
            return EXIT_IO;
        }
    }
    0
}
