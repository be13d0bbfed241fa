use quick_xml::de::from_str;
use serde::Deserialize;

use crate::core::error::PackResult;

/// Minimal `maven-metadata.xml` model: only the version listing.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MavenMetadata {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub versioning: Versioning,
}

#[derive(Debug, Deserialize, Default)]
pub struct Versioning {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub versions: Versions,
}

#[derive(Debug, Deserialize, Default)]
pub struct Versions {
    #[serde(default, rename = "version")]
    pub items: Vec<String>,
}

impl MavenMetadata {
    pub fn parse(xml: &str) -> PackResult<Self> {
        Ok(from_str(xml)?)
    }

    pub fn contains(&self, version: &str) -> bool {
        self.versioning.versions.items.iter().any(|v| v == version)
    }

    /// Release version, falling back to `latest`, then to the last listed entry.
    pub fn release(&self) -> Option<&str> {
        self.versioning
            .release
            .as_deref()
            .or(self.versioning.latest.as_deref())
            .or(self.versioning.versions.items.last().map(String::as_str))
    }
}
