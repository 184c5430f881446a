/// How a platform's packages are laid out in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformLayout {
    /// One package, emitted directly under the platform key.
    Single(String),
    /// Several package formats, emitted as a nested `format -> entry` map.
    Formats(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPatterns {
    pub key: String,
    pub layout: PlatformLayout,
}

/// Immutable table of platform key -> filename glob pattern(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTable {
    platforms: Vec<PlatformPatterns>,
}

impl PatternTable {
    pub fn new(platforms: Vec<PlatformPatterns>) -> Self {
        Self { platforms }
    }

    /// The naming convention used by the CookSync release pipeline.
    pub fn cook_sync() -> Self {
        Self::new(vec![
            PlatformPatterns::single("macos-universal", "CookSync-*.dmg"),
            PlatformPatterns::single("windows-x86_64", "CookSync-*-windows-x86_64.msi"),
            PlatformPatterns::formats(
                "linux-x86_64",
                &[
                    ("deb", "cook-sync_*_amd64.deb"),
                    ("rpm", "cook-sync-*.x86_64.rpm"),
                    ("appimage", "CookSync-*.AppImage"),
                ],
            ),
        ])
    }

    pub fn platforms(&self) -> &[PlatformPatterns] {
        &self.platforms
    }

    /// Every pattern in the table, flattened as `(label, pattern)` pairs.
    pub fn all_patterns(&self) -> Vec<(String, &str)> {
        let mut out = Vec::new();
        for platform in &self.platforms {
            match &platform.layout {
                PlatformLayout::Single(pattern) => out.push((platform.key.clone(), pattern.as_str())),
                PlatformLayout::Formats(formats) => {
                    for (format, pattern) in formats {
                        out.push((format!("{}.{}", platform.key, format), pattern.as_str()));
                    }
                }
            }
        }
        out
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::cook_sync()
    }
}

impl PlatformPatterns {
    pub fn single(key: &str, pattern: &str) -> Self {
        Self {
            key: key.to_string(),
            layout: PlatformLayout::Single(pattern.to_string()),
        }
    }

    pub fn formats(key: &str, formats: &[(&str, &str)]) -> Self {
        Self {
            key: key.to_string(),
            layout: PlatformLayout::Formats(
                formats
                    .iter()
                    .map(|(format, pattern)| (format.to_string(), pattern.to_string()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cook_sync_table() {
        let table = PatternTable::cook_sync();
        let platforms = table.platforms();

        let keys: Vec<&str> = platforms.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["macos-universal", "windows-x86_64", "linux-x86_64"]);

        assert_eq!(
            platforms[0].layout,
            PlatformLayout::Single("CookSync-*.dmg".to_string())
        );
        assert_eq!(
            platforms[1].layout,
            PlatformLayout::Single("CookSync-*-windows-x86_64.msi".to_string())
        );

        match &platforms[2].layout {
            PlatformLayout::Formats(formats) => {
                let keys: Vec<&str> = formats.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["deb", "rpm", "appimage"]);
            }
            other => panic!("expected nested formats, got {:?}", other),
        }
    }

    #[test]
    fn test_default_is_cook_sync() {
        assert_eq!(PatternTable::default(), PatternTable::cook_sync());
    }

    #[test]
    fn test_all_patterns_flattens_formats() {
        let labels: Vec<String> = PatternTable::cook_sync()
            .all_patterns()
            .into_iter()
            .map(|(label, _)| label)
            .collect();

        assert_eq!(
            labels,
            [
                "macos-universal",
                "windows-x86_64",
                "linux-x86_64.deb",
                "linux-x86_64.rpm",
                "linux-x86_64.appimage",
            ]
        );
    }
}
