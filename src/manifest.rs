use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::asset_discovery::{AssetDiscovery, DEFAULT_BASE_URL, package_type};
use crate::asset_patterns::{PatternTable, PlatformLayout};
use crate::error::{ManifestError, Result};
use crate::version::ReleaseVersion;

pub const DEFAULT_NOTES: &str = "See release notes on GitHub";
pub const DEFAULT_ASSETS_DIR: &str = "release-assets";
pub const DEFAULT_OUTPUT: &str = "latest.json";

/// `pub_date` layout: ISO 8601, UTC, second precision, trailing `Z`.
pub const PUB_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The update manifest consumed by the desktop updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateManifest {
    pub version: String,
    pub notes: String,
    pub pub_date: String,
    pub platforms: BTreeMap<String, PlatformAssets>,
}

/// What a platform key maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlatformAssets {
    Package(PlatformEntry),
    Formats(BTreeMap<String, PlatformEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformEntry {
    pub url: String,
    pub sha256: String,
    pub size: u64,
    pub package_type: String,
}

impl UpdateManifest {
    /// Every entry in the manifest, labelled `platform` or `platform.format`.
    pub fn entries(&self) -> Vec<(String, &PlatformEntry)> {
        let mut out = Vec::new();
        for (key, assets) in &self.platforms {
            match assets {
                PlatformAssets::Package(entry) => out.push((key.clone(), entry)),
                PlatformAssets::Formats(formats) => {
                    for (format, entry) in formats {
                        out.push((format!("{key}.{format}"), entry));
                    }
                }
            }
        }
        out
    }
}

/// Inputs for a manifest run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub version: ReleaseVersion,
    pub assets_dir: PathBuf,
    pub base_url: String,
    pub notes: String,
}

impl GeneratorConfig {
    pub fn new(version: ReleaseVersion) -> Self {
        Self {
            version,
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            base_url: DEFAULT_BASE_URL.to_string(),
            notes: DEFAULT_NOTES.to_string(),
        }
    }
}

pub struct ManifestGenerator {
    discovery: AssetDiscovery,
    patterns: PatternTable,
    version: ReleaseVersion,
    notes: String,
}

impl ManifestGenerator {
    pub fn new(config: GeneratorConfig, patterns: PatternTable) -> Self {
        Self {
            discovery: AssetDiscovery::new(&config.assets_dir, &config.base_url, config.version.clone()),
            patterns,
            version: config.version,
            notes: config.notes,
        }
    }

    /// Build the manifest stamped with the current UTC time.
    pub fn build_manifest(&self) -> Result<UpdateManifest> {
        self.build_manifest_at(Utc::now())
    }

    /// Build the manifest with an explicit `pub_date`.
    pub fn build_manifest_at(&self, pub_date: DateTime<Utc>) -> Result<UpdateManifest> {
        let mut platforms = BTreeMap::new();

        for platform in self.patterns.platforms() {
            let assets = match &platform.layout {
                PlatformLayout::Single(pattern) => self
                    .discovery
                    .resolve_asset(pattern)?
                    .map(PlatformAssets::Package),
                PlatformLayout::Formats(formats) => {
                    let mut found = BTreeMap::new();
                    for (format, pattern) in formats {
                        if let Some(entry) = self.discovery.resolve_asset(pattern)? {
                            found.insert(format.clone(), entry);
                        }
                    }
                    (!found.is_empty()).then_some(PlatformAssets::Formats(found))
                }
            };

            match assets {
                Some(assets) => {
                    platforms.insert(platform.key.clone(), assets);
                }
                None => debug!(platform = %platform.key, "no assets for platform"),
            }
        }

        Ok(UpdateManifest {
            version: self.version.to_string(),
            notes: self.notes.clone(),
            pub_date: format_pub_date(pub_date),
            platforms,
        })
    }
}

pub fn format_pub_date(at: DateTime<Utc>) -> String {
    at.format(PUB_DATE_FORMAT).to_string()
}

/// Parse a `pub_date` value written by [`format_pub_date`].
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, PUB_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serialize to two-space indented JSON with a trailing newline.
pub fn to_json(manifest: &UpdateManifest) -> Result<String> {
    let mut json = serde_json::to_string_pretty(manifest).map_err(ManifestError::Serialize)?;
    json.push('\n');
    Ok(json)
}

/// Write the manifest to `path`, replacing whatever is there.
pub fn write_manifest(manifest: &UpdateManifest, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ManifestError::io(parent, e))?;
    }

    let json = to_json(manifest)?;
    fs::write(path, json).map_err(|e| ManifestError::io(path, e))?;

    info!(path = %path.display(), platforms = manifest.platforms.len(), "wrote manifest");
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<UpdateManifest> {
    let content = fs::read_to_string(path).map_err(|e| ManifestError::io(path, e))?;

    serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Check a parsed manifest for internal consistency.
///
/// With `assets_dir`, every referenced file must also exist there with the
/// recorded size.
pub fn validate_manifest(manifest: &UpdateManifest, assets_dir: Option<&Path>) -> Result<()> {
    if manifest.version.trim().is_empty() {
        return Err(ManifestError::EmptyVersion);
    }

    if parse_pub_date(&manifest.pub_date).is_none() {
        return Err(ManifestError::invalid(format!(
            "pub_date '{}' is not a UTC timestamp like 2024-01-31T12:00:00Z",
            manifest.pub_date
        )));
    }

    for (key, assets) in &manifest.platforms {
        if let PlatformAssets::Formats(formats) = assets {
            if formats.is_empty() {
                return Err(ManifestError::invalid(format!("platform '{key}' has no packages")));
            }
        }
    }

    for (label, entry) in manifest.entries() {
        validate_entry(&label, entry, assets_dir)?;
    }

    Ok(())
}

fn validate_entry(label: &str, entry: &PlatformEntry, assets_dir: Option<&Path>) -> Result<()> {
    if entry.sha256.trim().is_empty() {
        return Err(ManifestError::invalid(format!("{label}: empty sha256")));
    }

    let file_name = entry.url.rsplit('/').next().unwrap_or_default();
    if matches!(file_name, "" | "." | "..") {
        return Err(ManifestError::invalid(format!("{label}: url '{}' has no file name", entry.url)));
    }

    let expected_type = package_type(file_name);
    if entry.package_type != expected_type {
        return Err(ManifestError::invalid(format!(
            "{label}: package_type '{}' does not match '{file_name}'",
            entry.package_type
        )));
    }

    let Some(dir) = assets_dir else {
        return Ok(());
    };

    let path = dir.join(file_name);
    let size = match fs::metadata(&path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ManifestError::invalid(format!(
                "{label}: {} does not exist",
                path.display()
            )));
        }
        Err(e) => return Err(ManifestError::io(&path, e)),
    };

    if size != entry.size {
        return Err(ManifestError::invalid(format!(
            "{label}: size {} recorded but {} is {size} bytes",
            entry.size,
            path.display()
        )));
    }

    Ok(())
}
