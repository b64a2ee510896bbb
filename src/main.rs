//! Main entry point for the otazip CLI application.
//!
//! This binary extracts partition images from OTA packages or bare
//! payloads, on the local filesystem or behind an HTTP URL.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use otazip::logging::{init_logging, level_for};
use otazip::session::open_source;
use otazip::{Cli, ExtractEvent, ExtractionSession, PartitionImage, Payload};

/// Application entry point.
///
/// Opens the source once, decodes the manifest, then either lists it or
/// hands it to an extraction session and writes each image as it arrives.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(level_for(cli.quiet, cli.verbose));

    let config = cli.config();
    let fetcher = open_source(&cli.request(Vec::new()), &config).await?;
    let payload = Arc::new(Payload::open(fetcher, &config).await?);

    if cli.list {
        list_partitions(&payload);
    } else {
        extract_partitions(payload.clone(), &cli, ExtractionSession::new(config)).await?;
    }

    // Display network transfer statistics for HTTP sources
    if cli.is_http_url() && !cli.is_quiet() {
        let transferred = payload.fetcher().transferred_bytes();
        eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
    }

    Ok(())
}

/// Print the manifest as a table of size, absolute offset and name.
fn list_partitions(payload: &Payload) {
    println!("{:>12}  {:>12}  Name", "Size", "Offset");
    println!("{}", "-".repeat(40));

    let mut total = 0u64;
    for entry in payload.manifest().iter() {
        println!("{:>12}  {:>12}  {}", entry.size, entry.offset, entry.name);
        total += entry.size;
    }

    println!("{}", "-".repeat(40));
    println!(
        "{:>12}  {:>12}  {} partitions",
        total,
        "",
        payload.manifest().len()
    );
}

/// Run one session over the requested partitions (all when none are named)
/// and write every image to `<dir>/<name>.img`.
async fn extract_partitions(
    payload: Arc<Payload>,
    cli: &Cli,
    session: ExtractionSession,
) -> Result<()> {
    let partitions = if cli.partitions.is_empty() {
        payload.manifest().names().map(str::to_owned).collect()
    } else {
        cli.partitions.clone()
    };

    let mut events = session.start_with_payload(payload, partitions)?;

    while let Some(event) = events.recv().await {
        match event {
            ExtractEvent::Progress(image) => write_image(&image, cli).await?,
            ExtractEvent::Success => return Ok(()),
            ExtractEvent::Error { message, .. } => bail!(message),
        }
    }

    bail!("Extraction ended without a result")
}

/// Write one image, honouring the overwrite options.
async fn write_image(image: &PartitionImage, cli: &Cli) -> Result<()> {
    let output_path = output_path(&cli.extract_dir, &image.name);

    // Handle existing files based on overwrite options
    if fs::try_exists(&output_path).await? {
        if cli.never_overwrite {
            // -n flag: never overwrite, skip silently (unless quiet)
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", output_path.display());
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", output_path.display());
            }
            return Ok(());
        }
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }

    if !cli.is_quiet() {
        println!(
            "  extracting: {} ({})",
            output_path.display(),
            format_size(image.data.len() as u64)
        );
    }

    fs::write(&output_path, &image.data).await?;

    Ok(())
}

/// Image file path for a partition. Path separators in the name are
/// flattened so images always land directly in `dir`.
fn output_path(dir: &str, name: &str) -> PathBuf {
    let file_name: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    Path::new(dir).join(format!("{file_name}.img"))
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
