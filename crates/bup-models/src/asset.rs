//! Emitted build assets.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Asset collection handed over by the build pipeline, keyed by logical
/// asset name.
pub type AssetCollection = BTreeMap<String, Asset>;

/// One emitted build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Where the asset was written on disk
    pub physical_path: PathBuf,
    /// Inline content, when the pipeline still holds the bytes
    pub content: Option<Vec<u8>>,
    /// Name to publish under instead of the path-derived one
    pub logical_name: Option<String>,
}

impl Asset {
    /// Asset whose bytes are read from disk at upload time.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            physical_path: path.into(),
            content: None,
            logical_name: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_logical_name(mut self, name: impl Into<String>) -> Self {
        self.logical_name = Some(name.into());
        self
    }

    /// Physical path as a string, used for pattern matching.
    pub fn match_target(&self) -> String {
        self.physical_path.to_string_lossy().into_owned()
    }

    /// Name the asset is published under.
    ///
    /// The logical name is used verbatim when present. Otherwise the name is
    /// the physical path relative to `output_root`, with `/` separators.
    pub fn published_name(&self, output_root: &Path) -> String {
        if let Some(name) = &self.logical_name {
            return name.clone();
        }

        let relative = self
            .physical_path
            .strip_prefix(output_root)
            .unwrap_or(&self.physical_path);

        let joined = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        // Windows-style separators survive on non-Windows hosts as part of
        // a single component.
        joined.replace('\\', "/")
    }
}
