pub mod error;
pub mod version;
pub mod asset_patterns;
pub mod asset_discovery;
pub mod manifest;
pub mod cli;

pub use error::ManifestError;
pub use manifest::{ManifestGenerator, UpdateManifest};
