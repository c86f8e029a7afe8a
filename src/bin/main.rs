use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;

use rust_vcf::DocumentBuilder;

const USAGE: &str = "usage: vcf-validate [--validation basic|relaxed|strict] [--fail-fast] [--check-unique-ids] FILE";

fn main() -> Result<()> {
    env_logger::init();
    let args = std::env::args().skip(1).collect_vec();

    let mut builder = DocumentBuilder::new();
    let mut path = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--validation" => {
                let level = args.next().ok_or_else(|| anyhow!(USAGE))?;
                builder = builder.validation(level);
            }
            "--fail-fast" => builder = builder.fail_fast(true),
            "--check-unique-ids" => builder = builder.check_unique_ids(true),
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            file => path = Some(file.to_owned()),
        }
    }
    let path = path.ok_or_else(|| anyhow!(USAGE))?;

    let now = Instant::now();
    let document = builder
        .file(&path)
        .build()
        .with_context(|| format!("{} is not valid", path))?;
    for error in document.errors() {
        println!("{}", error);
    }
    eprintln!(
        "{}: {} records valid, {} rejected ({} level, {:?})",
        path,
        document.len(),
        document.errors().len(),
        document.options().validation(),
        now.elapsed()
    );
    if !document.errors().is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
