//! Diagnosis - the single output record of a classification run
//!
//! - `category` is overwritten by every matching rule (last match wins)
//! - `captions` only ever grow, one entry per finding
//! - an unset category resolves to `unknown` before the record leaves the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse cause of a failure, used to gate error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// No rule has fired yet
    #[default]
    Unset,
    /// Host misconfiguration the user must fix
    System,
    /// A specific package is at fault
    Package,
    /// Network trouble
    Internet,
    /// Nothing conclusive
    Unknown,
    /// Informational notice about the running OS release
    OsReleaseNotice,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::System => "system",
            Self::Package => "package",
            Self::Internet => "internet",
            Self::Unknown => "unknown",
            Self::OsReleaseNotice => "os-release-notice",
        }
    }

    /// Parse from the wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" => Some(Self::Unset),
            "system" => Some(Self::System),
            "package" => Some(Self::Package),
            "internet" => Some(Self::Internet),
            "unknown" => Some(Self::Unknown),
            "os-release-notice" => Some(Self::OsReleaseNotice),
            _ => None,
        }
    }

    /// Whether a log with this category may be offered for upload.
    ///
    /// `system` means the user has to fix their machine first.
    pub fn allows_report(&self) -> bool {
        !matches!(self, Self::System)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one classification call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Category assigned by the last matching rule
    pub category: Category,
    /// Every caption emitted, in catalog order
    pub captions: Vec<String>,
}

impl Diagnosis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding: append the caption, overwrite the category
    pub fn record(&mut self, category: Category, caption: impl Into<String>) {
        self.captions.push(caption.into());
        self.category = category;
    }

    /// Append a caption without touching the category
    pub fn note(&mut self, caption: impl Into<String>) {
        self.captions.push(caption.into());
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = category;
    }

    /// Whether any rule has assigned a category yet
    pub fn is_unset(&self) -> bool {
        self.category == Category::Unset
    }

    /// Resolve an unset category to `unknown`
    pub fn finalize(mut self) -> Self {
        if self.category == Category::Unset {
            self.category = Category::Unknown;
        }
        self
    }

    pub fn allows_report(&self) -> bool {
        self.category.allows_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_category_wins_captions_accumulate() {
        let mut d = Diagnosis::new();
        d.record(Category::System, "first");
        d.record(Category::Internet, "second");
        assert_eq!(d.category, Category::Internet);
        assert_eq!(d.captions, vec!["first", "second"]);
    }

    #[test]
    fn test_finalize_defaults_to_unknown() {
        let d = Diagnosis::new().finalize();
        assert_eq!(d.category, Category::Unknown);
        assert!(d.captions.is_empty());
        assert!(d.allows_report());
    }

    #[test]
    fn test_finalize_keeps_assigned() {
        let mut d = Diagnosis::new();
        d.record(Category::System, "x");
        assert_eq!(d.finalize().category, Category::System);
    }

    #[test]
    fn test_note_keeps_category() {
        let mut d = Diagnosis::new();
        d.note("informational");
        assert!(d.is_unset());
    }

    #[test]
    fn test_category_wire_names() {
        for cat in [
            Category::Unset,
            Category::System,
            Category::Package,
            Category::Internet,
            Category::Unknown,
            Category::OsReleaseNotice,
        ] {
            assert_eq!(Category::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(Category::parse("Operating_System_Release"), None);
    }

    #[test]
    fn test_report_gate_by_category() {
        assert!(!Category::System.allows_report());
        assert!(Category::Package.allows_report());
        assert!(Category::Unknown.allows_report());
        assert!(Category::OsReleaseNotice.allows_report());
    }

    #[test]
    fn test_serializes_kebab_case() {
        let mut d = Diagnosis::new();
        d.record(Category::OsReleaseNotice, "notice");
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"os-release-notice\""));
    }
}
