use glob::Pattern;
use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ManifestError, Result};
use crate::manifest::PlatformEntry;
use crate::version::ReleaseVersion;

/// Suffix appended to an asset's filename to locate its checksum file.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Download host the release assets are published under.
pub const DEFAULT_BASE_URL: &str = "https://downloads.cook.md/sync-agent";

/// Finds release assets in a single directory and turns them into manifest
/// entries.
pub struct AssetDiscovery {
    assets_dir: PathBuf,
    base_url: String,
    version: ReleaseVersion,
}

/// An asset file that matched a pattern and has a checksum sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAsset {
    pub file_name: String,
    pub path: PathBuf,
    pub sha256: String,
}

impl AssetDiscovery {
    pub fn new(assets_dir: impl AsRef<Path>, base_url: &str, version: ReleaseVersion) -> Self {
        Self {
            assets_dir: assets_dir.as_ref().to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
            version,
        }
    }

    /// Resolve `pattern` to a manifest entry.
    ///
    /// Returns `Ok(None)` when nothing matches or when the matched file has
    /// no checksum sidecar. I/O failures on files that do exist are errors.
    pub fn resolve_asset(&self, pattern: &str) -> Result<Option<PlatformEntry>> {
        let Some(asset) = self.discover(pattern)? else {
            return Ok(None);
        };

        let size = fs::metadata(&asset.path)
            .map_err(|e| ManifestError::io(&asset.path, e))?
            .len();

        debug!(pattern, file = %asset.file_name, size, "resolved asset");

        Ok(Some(PlatformEntry {
            url: self.download_url(&asset.file_name),
            sha256: asset.sha256,
            size,
            package_type: package_type(&asset.file_name),
        }))
    }

    /// Find the asset for `pattern` and pair it with its checksum.
    pub fn discover(&self, pattern: &str) -> Result<Option<DiscoveredAsset>> {
        let Some(path) = self.find_match(pattern)? else {
            debug!(pattern, "no asset matched");
            return Ok(None);
        };

        let sidecar = checksum_path(&path);
        let Some(sha256) = read_checksum(&sidecar)? else {
            debug!(asset = %path.display(), "no checksum file, skipping asset");
            return Ok(None);
        };

        let file_name = file_name_of(&path).unwrap_or_default().to_string();

        Ok(Some(DiscoveredAsset {
            file_name,
            path,
            sha256,
        }))
    }

    pub fn download_url(&self, file_name: &str) -> String {
        format!("{}/v{}/{}", self.base_url, self.version, file_name)
    }

    fn find_match(&self, pattern: &str) -> Result<Option<PathBuf>> {
        let matcher = Pattern::new(pattern).map_err(|source| ManifestError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let entries =
            fs::read_dir(&self.assets_dir).map_err(|e| ManifestError::io(&self.assets_dir, e))?;

        let mut matches = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ManifestError::io(&self.assets_dir, e))?.path();
            let Some(name) = file_name_of(&path) else {
                continue;
            };
            if matcher.matches(name) && path.is_file() {
                matches.push(path);
            }
        }

        if matches.len() > 1 {
            warn!(
                pattern,
                count = matches.len(),
                "several assets match, using the highest version"
            );
        }

        Ok(matches.into_iter().max_by(|a, b| {
            natural_cmp(
                file_name_of(a).unwrap_or_default(),
                file_name_of(b).unwrap_or_default(),
            )
        }))
    }
}

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Path of the checksum file that accompanies `asset`.
pub fn checksum_path(asset: &Path) -> PathBuf {
    let mut name = asset.as_os_str().to_os_string();
    name.push(CHECKSUM_SUFFIX);
    PathBuf::from(name)
}

/// Read the digest from a `<hex>  <filename>` checksum file.
///
/// A missing file yields `Ok(None)`; a file with no digest in it is an error.
pub fn read_checksum(path: &Path) -> Result<Option<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ManifestError::io(path, e)),
    };

    match content.split_whitespace().next() {
        Some(digest) => Ok(Some(digest.to_string())),
        None => Err(ManifestError::EmptyChecksum {
            path: path.to_path_buf(),
        }),
    }
}

/// Lower-cased text after the final `.` of `file_name`.
pub fn package_type(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(_, ext)| ext)
        .to_lowercase()
}

/// Compare filenames treating runs of ASCII digits as numbers, so that
/// `CookSync-1.10.dmg` sorts after `CookSync-1.9.dmg`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (run_a, rest_a) = split_digit_run(a);
                let (run_b, rest_b) = split_digit_run(b);
                let ord = compare_digit_runs(run_a, run_b);
                if ord != Ordering::Equal {
                    return ord;
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a = &a[x.len_utf8()..];
                b = &b[y.len_utf8()..];
            }
        }
    }
}

fn split_digit_run(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        // "01" and "1" are equal numerically; keep the order total.
        .then_with(|| a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn discovery(dir: &Path) -> AssetDiscovery {
        AssetDiscovery::new(dir, DEFAULT_BASE_URL, ReleaseVersion::try_from("1.0").unwrap())
    }

    fn write_asset(dir: &Path, name: &str, body: &[u8], checksum: Option<&str>) {
        fs::write(dir.join(name), body).unwrap();
        if let Some(checksum) = checksum {
            fs::write(dir.join(format!("{name}{CHECKSUM_SUFFIX}")), checksum).unwrap();
        }
    }

    #[test]
    fn test_resolve_asset_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "CookSync-1.0.dmg", b"0123456789", Some("abc123  CookSync-1.0.dmg\n"));

        let entry = discovery(dir.path())
            .resolve_asset("CookSync-*.dmg")
            .unwrap()
            .expect("asset should resolve");

        assert_eq!(entry.url, "https://downloads.cook.md/sync-agent/v1.0/CookSync-1.0.dmg");
        assert_eq!(entry.sha256, "abc123");
        assert_eq!(entry.size, 10);
        assert_eq!(entry.package_type, "dmg");
    }

    #[test]
    fn test_no_match_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "cook-sync_1.0_amd64.deb", b"deb", Some("aa"));

        let entry = discovery(dir.path()).resolve_asset("CookSync-*.dmg").unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_missing_sidecar_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "CookSync-1.0.dmg", b"dmg", None);

        let entry = discovery(dir.path()).resolve_asset("CookSync-*.dmg").unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_empty_sidecar_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "CookSync-1.0.dmg", b"dmg", Some("  \n"));

        let err = discovery(dir.path()).resolve_asset("CookSync-*.dmg").unwrap_err();
        assert!(matches!(err, ManifestError::EmptyChecksum { .. }));
    }

    #[test]
    fn test_unreadable_sidecar_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "CookSync-1.0.dmg", b"dmg", None);
        // A directory where the checksum file should be cannot be read as text.
        fs::create_dir(dir.path().join("CookSync-1.0.dmg.sha256")).unwrap();

        let err = discovery(dir.path()).resolve_asset("CookSync-*.dmg").unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn test_missing_assets_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = discovery(&dir.path().join("nope"))
            .resolve_asset("CookSync-*.dmg")
            .unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let err = discovery(dir.path()).resolve_asset("CookSync-[.dmg").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidPattern { .. }));
    }

    #[test]
    fn test_directories_are_not_assets() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("CookSync-1.0.dmg")).unwrap();
        fs::write(dir.path().join("CookSync-1.0.dmg.sha256"), "abc").unwrap();

        let entry = discovery(dir.path()).resolve_asset("CookSync-*.dmg").unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_multiple_matches_pick_highest_version() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "CookSync-1.9.dmg", b"old", Some("old"));
        write_asset(dir.path(), "CookSync-1.10.dmg", b"newer", Some("new"));
        write_asset(dir.path(), "CookSync-1.2.dmg", b"older", Some("older"));

        let asset = discovery(dir.path())
            .discover("CookSync-*.dmg")
            .unwrap()
            .unwrap();
        assert_eq!(asset.file_name, "CookSync-1.10.dmg");
        assert_eq!(asset.sha256, "new");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let discovery = AssetDiscovery::new(
            "/tmp",
            "https://example.com/dl/",
            ReleaseVersion::try_from("2.3.4").unwrap(),
        );
        assert_eq!(
            discovery.download_url("app.msi"),
            "https://example.com/dl/v2.3.4/app.msi"
        );
    }

    #[test]
    fn test_checksum_path() {
        assert_eq!(
            checksum_path(Path::new("release-assets/CookSync-1.0.dmg")),
            PathBuf::from("release-assets/CookSync-1.0.dmg.sha256")
        );
    }

    #[rstest]
    #[case::dmg("CookSync-1.0.dmg", "dmg")]
    #[case::appimage("CookSync-1.0.AppImage", "appimage")]
    #[case::rpm("cook-sync-1.0-1.x86_64.rpm", "rpm")]
    #[case::upper("SETUP.MSI", "msi")]
    #[case::no_dot("README", "readme")]
    fn test_package_type(#[case] file_name: &str, #[case] expected: &str) {
        assert_eq!(package_type(file_name), expected);
    }

    #[rstest]
    #[case("CookSync-1.10.dmg", "CookSync-1.9.dmg", Ordering::Greater)]
    #[case("CookSync-1.0.dmg", "CookSync-1.0.dmg", Ordering::Equal)]
    #[case("CookSync-2.0.dmg", "CookSync-10.0.dmg", Ordering::Less)]
    #[case("a01", "a1", Ordering::Greater)]
    #[case("abc", "abd", Ordering::Less)]
    #[case("abc", "ab", Ordering::Greater)]
    fn test_natural_cmp(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(natural_cmp(a, b), expected);
    }
}
