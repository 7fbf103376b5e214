//! Main entry point for the apkarch CLI application.
//!
//! Prints, for every package given, the native libraries it contains with
//! their word size and target machine.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use apkarch::{Cli, InspectOptions, InspectionReport, PackageInspector, PackageSource};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging goes to stderr so stdout carries only the report.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut sources: Vec<PackageSource> = cli
        .files
        .iter()
        .map(String::as_str)
        .map(PackageSource::parse)
        .collect();
    if let Some(dir) = &cli.dir {
        sources.extend(list_directory(dir).await?);
    }

    let inspector = PackageInspector::new(InspectOptions {
        max_member_size: cli.max_member_size,
    });
    let results = inspector.inspect_many(sources.clone(), cli.jobs).await;

    let mut failed = 0usize;
    for (source, result) in sources.iter().zip(results) {
        println!("Processing {}", source.label());
        match result {
            Ok(report) => print_report(&report),
            Err(e) => {
                failed += 1;
                if cli.quiet < 2 {
                    eprintln!("Error: {e}");
                }
                println!();
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} packages could not be read", sources.len());
    }

    Ok(())
}

/// Print one package's libraries followed by the count line.
fn print_report(report: &InspectionReport) {
    for lib in &report.libraries {
        println!("{}\t{}\t{}", lib.name, lib.word_size, lib.machine);
    }
    println!("{} Library files", report.count());
    println!();
}

/// Regular files directly inside `dir`, sorted by name.
async fn list_directory(dir: &Path) -> Result<Vec<PackageSource>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot read directory {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        // Follow symlinks; a broken one is left for the inspector to report.
        let path = entry.path();
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
            continue;
        }
        files.push(path);
    }
    files.sort();

    Ok(files.into_iter().map(PackageSource::Path).collect())
}
