//! Command-line interface definitions and command handlers.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use flashinst::{
    DEFAULT_TARGET, FixedTimeProvider, FlashContentInstaller, FlashVolume, InstallOptions,
    InstallOutcome, InstallPhase, MountOptions, Payload,
};

use crate::image::FlashImage;
use crate::path_parser::PathSpec;

/// Pages in a new image: the 256KB partition of a 4MB part.
const DEFAULT_PAGES: u32 = 64;

#[derive(Parser, Debug)]
#[command(name = "flashinst")]
#[command(about = "Prepare and inspect flash partition images", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an erased image and format it
    Format {
        /// Image file to create or overwrite
        image: PathBuf,
        /// Size in 4KB pages
        #[arg(long, default_value_t = DEFAULT_PAGES)]
        pages: u32,
        /// Volume label
        #[arg(long, default_value = "FLASHINST")]
        label: String,
    },
    /// Install a payload the way the device does at startup
    Install {
        /// Image file; created erased if missing
        image: PathBuf,
        /// File to install instead of the bundled game script
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Path on the volume
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,
        /// Size in 4KB pages when the image is created
        #[arg(long, default_value_t = DEFAULT_PAGES)]
        pages: u32,
        /// Volume label used if formatting is needed
        #[arg(long, default_value = "FLASHINST")]
        label: String,
        /// Fail instead of formatting an unusable volume
        #[arg(long)]
        no_format: bool,
        /// Create missing parent directories
        #[arg(long)]
        parents: bool,
        /// Fixed RFC 3339 timestamp for entries, for reproducible images
        #[arg(long)]
        timestamp: Option<DateTime<FixedOffset>>,
    },
    /// Print a file from an image (image:path)
    Cat {
        /// File spec, e.g. flash.bin:/game.js
        spec: String,
    },
    /// List a directory in an image (image[:dir])
    Ls {
        /// Directory spec, e.g. flash.bin or flash.bin:/www
        spec: String,
    },
    /// Show volume usage
    Info {
        /// Image file
        image: PathBuf,
    },
}

/// Runs a command, printing to stdout.
pub fn run(cli: Cli) -> Result<()> {
    let stdout = io::stdout();
    run_to(cli, &mut stdout.lock())
}

/// Runs a command, printing to `out`.
pub fn run_to<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    match cli.command {
        Command::Format {
            image,
            pages,
            label,
        } => cmd_format(&image, pages, &label, out),
        Command::Install {
            image,
            payload,
            target,
            pages,
            label,
            no_format,
            parents,
            timestamp,
        } => {
            let mut options = MountOptions::new()
                .format_on_mount_failure(!no_format)
                .volume_label(&label);
            if let Some(ts) = timestamp {
                options = options
                    .time_provider(FixedTimeProvider::from_naive(ts.naive_local()).leak());
            }
            let install = InstallOptions::new().create_parents(parents);
            cmd_install(
                &image,
                payload.as_deref(),
                &target,
                pages,
                options,
                install,
                out,
            )
        }
        Command::Cat { spec } => cmd_cat(&spec, out),
        Command::Ls { spec } => cmd_ls(&spec, out),
        Command::Info { image } => cmd_info(&image, out),
    }
}

fn cmd_format<W: Write>(path: &Path, pages: u32, label: &str, out: &mut W) -> Result<()> {
    let mut image = FlashImage::create(path, pages)?;
    let options = MountOptions::new().volume_label(label);
    {
        let mut device = image.device()?;
        FlashVolume::format(&mut device, &options).context("Format failed")?;
    }
    let info = {
        let volume = FlashVolume::mount(image.device()?, &options.format_on_mount_failure(false))?;
        volume.stats()?
    };
    image.save()?;
    writeln!(out, "Formatted {}: {}", path.display(), info)?;
    Ok(())
}

fn cmd_install<W: Write>(
    path: &Path,
    payload_file: Option<&Path>,
    target: &str,
    pages: u32,
    options: MountOptions,
    install: InstallOptions,
    out: &mut W,
) -> Result<()> {
    let contents = match payload_file {
        Some(p) => {
            std::fs::read(p).with_context(|| format!("Failed to read payload {}", p.display()))?
        }
        None => flashinst::GAME_JS.to_vec(),
    };
    let payload = Payload::new(target, contents);

    let mut image = FlashImage::open_or_create(path, pages)?;
    let (outcome, diagnostics) = {
        let device = image.device()?;
        let mut installer =
            FlashContentInstaller::with_sink(options, Vec::new()).install_options(install);
        let startup = installer.setup(device, &payload);
        if let Some(volume) = startup.volume {
            volume.unmount()?;
        }
        (startup.outcome, installer.into_sink())
    };

    // a failed install may still have formatted the volume, but an image
    // that never got mounted has nothing worth keeping
    if outcome.phase() == InstallPhase::NotMounted && image.is_new() {
        log::debug!("{} not created", path.display());
    } else if image.save()? {
        log::info!("Wrote {}", path.display());
    }

    match outcome {
        InstallOutcome::Installed(report) => {
            writeln!(
                out,
                "Installed {} ({} bytes) into {}",
                report.path,
                report.bytes_written,
                path.display()
            )?;
            Ok(())
        }
        InstallOutcome::Failed(_) => anyhow::bail!("{}", diagnostics.join("; ")),
    }
}

fn cmd_cat<W: Write>(spec: &str, out: &mut W) -> Result<()> {
    let (image_path, inner) = PathSpec::parse(spec)?.into_image_path()?;
    let mut image = FlashImage::open(&image_path)?;
    let volume = mount_existing(&mut image)?;
    let data = volume
        .read_file(&inner)
        .with_context(|| format!("Failed to read {}", inner))?;
    out.write_all(&data)?;
    Ok(())
}

fn cmd_ls<W: Write>(spec: &str, out: &mut W) -> Result<()> {
    let (image_path, dir) = PathSpec::parse_image(spec, "/")?.into_image_path()?;
    let mut image = FlashImage::open(&image_path)?;
    let volume = mount_existing(&mut image)?;
    let entries = volume
        .list_dir(&dir)
        .with_context(|| format!("Failed to list {}", dir))?;
    for entry in entries {
        if entry.is_dir {
            writeln!(out, "{:>10}  {}/", "<DIR>", entry.name)?;
        } else {
            writeln!(out, "{:>10}  {}", entry.len, entry.name)?;
        }
    }
    Ok(())
}

fn cmd_info<W: Write>(path: &Path, out: &mut W) -> Result<()> {
    let mut image = FlashImage::open(path)?;
    let len = image.len();
    let volume = mount_existing(&mut image)?;
    let info = volume.stats()?;
    writeln!(out, "Image:    {} ({} pages)", path.display(), len / 4096)?;
    writeln!(out, "Type:     {:?}", info.fat_type)?;
    writeln!(out, "Label:    {}", info.label)?;
    writeln!(out, "Cluster:  {} bytes", info.cluster_size)?;
    writeln!(out, "Total:    {} bytes", info.total_bytes())?;
    writeln!(out, "Free:     {} bytes", info.free_bytes())?;
    Ok(())
}

/// Mounts an image for reading; never formats.
fn mount_existing(
    image: &mut FlashImage,
) -> Result<FlashVolume<flashinst::FlashDevice<&mut flashinst_adapters::MemoryFlash>>> {
    let path = image.path().display().to_string();
    let options = MountOptions::new().format_on_mount_failure(false);
    FlashVolume::mount(image.device()?, &options)
        .with_context(|| format!("No flash volume in {}", path))
}
