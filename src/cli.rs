use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::asset_discovery::{CHECKSUM_SUFFIX, DEFAULT_BASE_URL};
use crate::asset_patterns::PatternTable;
use crate::manifest::{
    DEFAULT_ASSETS_DIR, DEFAULT_NOTES, DEFAULT_OUTPUT, GeneratorConfig, ManifestGenerator,
    PlatformAssets, UpdateManifest, parse_pub_date, read_manifest, to_json, validate_manifest,
    write_manifest,
};
use crate::version::ReleaseVersion;

#[derive(Parser)]
#[command(name = "release-manifest")]
#[command(about = "Generate the JSON update manifest for a directory of release packages")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the release assets and write the update manifest
    Generate(GenerateArgs),

    /// Read an existing manifest and check it for consistency
    Check {
        /// Manifest file to check
        #[arg(default_value = DEFAULT_OUTPUT)]
        manifest: PathBuf,

        /// Also check sizes against the files in this directory
        #[arg(long)]
        assets_dir: Option<PathBuf>,
    },

    /// Show which filename patterns map to which platform
    Patterns,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Release version stamped into the manifest and download URLs
    #[arg(long, env = "VERSION")]
    pub version_tag: Option<String>,

    /// Directory holding the packages and their checksum files
    #[arg(long, env = "ASSETS_DIR", default_value = DEFAULT_ASSETS_DIR)]
    pub assets_dir: PathBuf,

    /// Where to write the manifest
    #[arg(long, env = "MANIFEST_OUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Download URL prefix; files are served from <base-url>/v<version>/
    #[arg(long, env = "DOWNLOAD_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Release notes text
    #[arg(long, default_value = DEFAULT_NOTES)]
    pub notes: String,

    /// Publication time (YYYY-MM-DDThh:mm:ssZ) [default: now]
    #[arg(long)]
    pub pub_date: Option<String>,

    /// Print the manifest instead of writing it
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate_command(args),
        Commands::Check {
            manifest,
            assets_dir,
        } => check_command(&manifest, assets_dir.as_deref()),
        Commands::Patterns => patterns_command(),
    }
}

fn generate_command(args: GenerateArgs) -> Result<()> {
    let output = args.output.clone();

    match render_or_write(args)? {
        GenerateOutcome::DryRun(json) => print!("{}", json),
        GenerateOutcome::Written { platforms } => println!(
            "Manifest generated: {} ({} platforms)",
            output.display(),
            platforms
        ),
    }

    Ok(())
}

enum GenerateOutcome {
    /// `--dry-run`: the rendered manifest, nothing written.
    DryRun(String),
    Written { platforms: usize },
}

fn render_or_write(args: GenerateArgs) -> Result<GenerateOutcome> {
    let version = ReleaseVersion::try_from(args.version_tag.unwrap_or_default())
        .context("Set the release version with --version-tag or the VERSION environment variable")?;

    let config = GeneratorConfig {
        version,
        assets_dir: args.assets_dir,
        base_url: args.base_url,
        notes: args.notes,
    };
    let assets_dir = config.assets_dir.clone();
    let generator = ManifestGenerator::new(config, PatternTable::default());

    let manifest = match args.pub_date {
        Some(ts) => {
            let at = parse_pub_date(&ts)
                .with_context(|| format!("Invalid --pub-date '{}', expected YYYY-MM-DDThh:mm:ssZ", ts))?;
            generator.build_manifest_at(at)
        }
        None => generator.build_manifest(),
    }
    .with_context(|| format!("Failed to build manifest from {}", assets_dir.display()))?;

    if args.dry_run {
        return Ok(GenerateOutcome::DryRun(to_json(&manifest)?));
    }

    write_manifest(&manifest, &args.output)
        .with_context(|| format!("Failed to write manifest to {}", args.output.display()))?;

    Ok(GenerateOutcome::Written {
        platforms: manifest.platforms.len(),
    })
}

fn check_command(manifest_path: &Path, assets_dir: Option<&Path>) -> Result<()> {
    let manifest = read_manifest(manifest_path)
        .with_context(|| format!("Failed to read manifest {}", manifest_path.display()))?;

    validate_manifest(&manifest, assets_dir)
        .with_context(|| format!("Manifest {} failed validation", manifest_path.display()))?;

    print_summary(&manifest);
    println!("\n✓ {} is valid", manifest_path.display());

    Ok(())
}

fn print_summary(manifest: &UpdateManifest) {
    println!("Version {} published {}", manifest.version, manifest.pub_date);

    if manifest.platforms.is_empty() {
        println!("  (no platforms)");
        return;
    }

    for (key, assets) in &manifest.platforms {
        match assets {
            PlatformAssets::Package(entry) => {
                println!("  {:<18} {} ({} bytes)", key, entry.url, entry.size);
            }
            PlatformAssets::Formats(formats) => {
                println!("  {}", key);
                for (format, entry) in formats {
                    println!("    {:<16} {} ({} bytes)", format, entry.url, entry.size);
                }
            }
        }
    }
}

fn patterns_command() -> Result<()> {
    print!("{}", render_patterns(&PatternTable::default()));
    Ok(())
}

fn render_patterns(table: &PatternTable) -> String {
    let mut out = format!("Asset patterns (each needs a matching *{} file):\n\n", CHECKSUM_SUFFIX);
    for (label, pattern) in table.all_patterns() {
        out.push_str(&format!("  {:<24} {}\n", label, pattern));
    }
    out
}
