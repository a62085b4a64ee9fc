//! os-release parsing
//!
//! Reads the standard key=value identification file. Only the fields the
//! diagnosis rules and device header look at are kept.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identification fields from os-release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRelease {
    /// `ID`, with the first letter upper-cased (debian -> Debian)
    pub id: String,
    /// `NAME`
    pub name: String,
    /// `PRETTY_NAME`
    pub pretty_name: String,
    /// `VERSION_ID`
    pub version_id: String,
    /// `VERSION_CODENAME`
    pub version_codename: String,
}

impl OsRelease {
    /// Parse os-release content
    pub fn parse(content: &str) -> Self {
        let mut release = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim_matches(|c| c == '"' || c == '\'').to_string();
            match key {
                "ID" => release.id = value,
                "NAME" => release.name = value,
                "PRETTY_NAME" => release.pretty_name = value,
                "VERSION_ID" => release.version_id = value,
                "VERSION_CODENAME" => release.version_codename = value,
                _ => {}
            }
        }

        release.id = capitalize(&release.id);
        // "NAME=Debian GNU/Linux" keeps ID; "NAME=Raspbian" with "ID=raspbian" adopts the name
        if !release.name.is_empty() && release.id.eq_ignore_ascii_case(&release.name) {
            release.id = release.name.clone();
        }
        release
    }

    /// Load from the first existing candidate under `root`.
    ///
    /// Order: `$LSB_OS_RELEASE`, `/usr/lib/os-release`, `/etc/os-release`.
    pub fn load(root: &Path) -> Self {
        let mut candidates: Vec<std::path::PathBuf> = Vec::new();
        if let Ok(path) = std::env::var("LSB_OS_RELEASE") {
            candidates.push(path.into());
        }
        candidates.push(root.join("usr/lib/os-release"));
        candidates.push(root.join("etc/os-release"));

        for path in candidates {
            if let Ok(content) = std::fs::read_to_string(&path) {
                return Self::parse(&content);
            }
        }
        Self::default()
    }

    /// Major component of `VERSION_ID` (13 for "13"), if numeric
    pub fn major_version(&self) -> Option<u32> {
        self.version_id.split('.').next()?.parse().ok()
    }
}

/// Codename from `/etc/debian_version` when os-release has none
pub fn codename_from_debian_version(content: &str) -> Option<&'static str> {
    let version = content.trim();
    if version.starts_with("11") {
        Some("bullseye")
    } else if version.starts_with("10") {
        Some("buster")
    } else if version.starts_with('9') {
        Some("stretch")
    } else {
        None
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
