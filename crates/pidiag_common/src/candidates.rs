//! Dependency candidate extraction
//!
//! Pulls package names out of apt "unmet dependencies" blocks. Three line
//! shapes are recognised and all of them are scanned independently:
//!
//! ```text
//!  pkgA : Depends: pkgB (>= 1.0) but it is not going to be installed   (A)
//!         Depends: pkgC but it is not installable                     (B)
//! Depends: pkgD (>= 2), pkgE | pkgF:any                               (C)
//! ```

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static SHAPE_A: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ .* : Depends:").unwrap());
static SHAPE_B: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ +Depends:").unwrap());
static VERSION_CONSTRAINT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());
static ARCH_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(armhf|arm64|amd64|riscv64|i686|all)").unwrap());

/// Which line shape produced a candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// ` pkg : Depends: dep ...`
    PackageDepends,
    /// `   Depends: dep ...` continuation lines
    IndentedDepends,
    /// `Depends: a, b | c` control-field lines
    ControlField,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::PackageDepends,
        Strategy::IndentedDepends,
        Strategy::ControlField,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PackageDepends => "package-depends",
            Self::IndentedDepends => "indented-depends",
            Self::ControlField => "control-field",
        }
    }

    /// Raw names found by this strategy, unsorted and possibly repeated
    pub fn scan(&self, log: &str) -> Vec<String> {
        match self {
            Self::PackageDepends => scan_package_depends(log),
            Self::IndentedDepends => scan_indented_depends(log),
            Self::ControlField => scan_control_field(log),
        }
    }
}

/// Candidates from one strategy, ready for package-manager queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    /// Sorted, deduplicated names as they appeared (arch suffixes kept)
    pub names: Vec<String>,
    /// `names` plus an `:arm64` sibling for every `:armhf` entry
    pub probe: Vec<String>,
    /// Names with every architecture suffix stripped, sorted and deduplicated
    pub clean: Vec<String>,
}

impl CandidateSet {
    pub fn from_raw(raw: Vec<String>) -> Self {
        let names: Vec<String> = raw
            .into_iter()
            .filter(|n| !n.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut probe = Vec::with_capacity(names.len());
        for name in &names {
            probe.push(name.clone());
            if name.contains(":armhf") {
                probe.push(name.replacen(":armhf", ":arm64", 1));
            }
        }

        let clean: Vec<String> = names
            .iter()
            .map(|n| strip_arch_suffix(n))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            names,
            probe,
            clean,
        }
    }

    pub fn extract(strategy: Strategy, log: &str) -> Self {
        Self::from_raw(strategy.scan(log))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Remove `:armhf`, `:arm64`, `:amd64`, `:riscv64`, `:i686` and `:all`
pub fn strip_arch_suffix(name: &str) -> String {
    ARCH_SUFFIX.replace_all(name, "").into_owned()
}

/// Union of the clean names of every strategy
pub fn all_clean_candidates(log: &str) -> Vec<String> {
    Strategy::ALL
        .iter()
        .flat_map(|s| CandidateSet::extract(*s, log).clean)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn scan_package_depends(log: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in log.lines().filter(|l| SHAPE_A.is_match(l)) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() >= 4 {
            out.push(fields[0].to_string());
            out.push(fields[3].to_string());
        }
    }
    out
}

fn scan_indented_depends(log: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in log.lines().filter(|l| SHAPE_B.is_match(l)) {
        if let Some(name) = line.split_whitespace().nth(1) {
            out.push(name.to_string());
        }
    }
    out
}

fn scan_control_field(log: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in log.lines() {
        let Some(rest) = line.strip_prefix("Depends:") else {
            continue;
        };
        let specs = rest.replace(", ", "\n").replace("| ", "\n");
        let specs = VERSION_CONSTRAINT.replace_all(&specs, "");
        for spec in specs.split('\n') {
            let name = spec.trim().replace(":any", "");
            if !name.is_empty() {
                out.push(name);
            }
        }
    }
    out
}
