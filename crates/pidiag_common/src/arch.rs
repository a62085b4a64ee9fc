//! Architecture heuristics
//!
//! - Native dpkg architecture, with a `uname -m` translation fallback
//! - CPU op-mode detection (can this host execute 32-bit code?)
//! - Compatibility matrix between the host and foreign dpkg architectures
//! - Extraction of architectures named by failing index downloads

use crate::command_exec::CommandRunner;
use regex::Regex;
use std::sync::LazyLock;

/// Architectures dpkg may list as foreign
pub const KNOWN_ARCHITECTURES: &[&str] = &["i386", "amd64", "armhf", "arm64", "riscv64"];

/// Kernel machine name -> dpkg architecture
const UNAME_TO_DPKG: &[(&str, &str)] = &[
    ("x86_64", "amd64"),
    ("i386", "i386"),
    ("i686", "i386"),
    ("aarch64", "arm64"),
    ("armv7l", "armhf"),
    ("armv6l", "armhf"),
    ("riscv64", "riscv64"),
];

/// Index download failures naming an architecture
static FOREIGN_ARCH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:404.*Not Found.*|(?:Ign|Err):.*/\S*) (i386|amd64|armhf|arm64|riscv64) Packages",
    )
    .unwrap()
});

static OP_MODES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CPU op-mode\(s\):\s+(.*)").unwrap());

/// Which instruction-set widths the CPU can execute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuOpModes {
    pub bits32: bool,
    pub bits64: bool,
}

impl CpuOpModes {
    /// Parse `lscpu` output
    pub fn parse_lscpu(output: &str) -> Self {
        let Some(caps) = OP_MODES.captures(output) else {
            return Self::default();
        };
        let modes = &caps[1];
        Self {
            bits32: modes.contains("32-bit"),
            bits64: modes.contains("64-bit"),
        }
    }

    pub fn detect(runner: &dyn CommandRunner) -> Self {
        Self::parse_lscpu(&runner.output("lscpu", &[]))
    }
}

/// Translate a kernel machine name to its dpkg architecture
pub fn dpkg_arch_from_uname(machine: &str) -> String {
    UNAME_TO_DPKG
        .iter()
        .find(|(uname, _)| *uname == machine)
        .map(|(_, dpkg)| dpkg.to_string())
        .unwrap_or_else(|| machine.to_string())
}

/// Native architecture of the host, if it can be determined
pub fn native_architecture(runner: &dyn CommandRunner) -> Option<String> {
    let dpkg = runner.stdout("dpkg", &["--print-architecture"]);
    if !dpkg.is_empty() {
        return Some(dpkg);
    }
    let machine = runner.stdout("uname", &["-m"]);
    if machine.is_empty() {
        None
    } else {
        Some(dpkg_arch_from_uname(&machine))
    }
}

/// Whether packages built for `foreign` can run on a `native` host.
///
/// 64-bit ARM hosts only run armhf when the CPU still has AArch32.
pub fn is_supported(native: &str, foreign: &str, modes: CpuOpModes) -> bool {
    if native == foreign {
        return true;
    }
    match native {
        "amd64" => foreign == "i386",
        "arm64" => foreign == "armhf" && modes.bits32,
        _ => false,
    }
}

/// Distinct architectures named by failing index lines, in first-seen order
pub fn extract_foreign_architectures(log: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in FOREIGN_ARCH_LINE.captures_iter(log) {
        let arch = caps[1].to_string();
        if !found.contains(&arch) {
            found.push(arch);
        }
    }
    found
}

/// Whether the log mentions a failing foreign-architecture index at all
pub fn mentions_foreign_index(log: &str) -> bool {
    FOREIGN_ARCH_LINE.is_match(log)
}

/// Architectures from `candidates` the host cannot run
pub fn unsupported_architectures(
    native: &str,
    candidates: &[String],
    modes: CpuOpModes,
) -> Vec<String> {
    candidates
        .iter()
        .filter(|arch| !is_supported(native, arch, modes))
        .cloned()
        .collect()
}

/// One `dpkg --remove-architecture` line per architecture
pub fn remove_architecture_commands(archs: &[String]) -> String {
    archs
        .iter()
        .map(|arch| format!("sudo dpkg --remove-architecture {}", arch))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::ScriptedRunner;

    const NO_32: CpuOpModes = CpuOpModes {
        bits32: false,
        bits64: true,
    };
    const BOTH: CpuOpModes = CpuOpModes {
        bits32: true,
        bits64: true,
    };

    #[test]
    fn test_uname_translation() {
        assert_eq!(dpkg_arch_from_uname("x86_64"), "amd64");
        assert_eq!(dpkg_arch_from_uname("aarch64"), "arm64");
        assert_eq!(dpkg_arch_from_uname("armv7l"), "armhf");
        assert_eq!(dpkg_arch_from_uname("armv6l"), "armhf");
        assert_eq!(dpkg_arch_from_uname("i686"), "i386");
        assert_eq!(dpkg_arch_from_uname("mips"), "mips");
    }

    #[test]
    fn test_native_prefers_dpkg() {
        let runner = ScriptedRunner::new()
            .respond("dpkg --print-architecture", "armhf\n")
            .respond("uname -m", "aarch64\n");
        assert_eq!(native_architecture(&runner).as_deref(), Some("armhf"));
    }

    #[test]
    fn test_native_falls_back_to_uname() {
        let runner = ScriptedRunner::new().respond("uname -m", "aarch64\n");
        assert_eq!(native_architecture(&runner).as_deref(), Some("arm64"));
    }

    #[test]
    fn test_matrix() {
        assert!(is_supported("amd64", "amd64", NO_32));
        assert!(is_supported("amd64", "i386", NO_32));
        assert!(!is_supported("amd64", "armhf", BOTH));
        assert!(!is_supported("arm64", "armhf", NO_32));
        assert!(is_supported("arm64", "armhf", BOTH));
        assert!(!is_supported("arm64", "i386", BOTH));
        assert!(!is_supported("armhf", "arm64", BOTH));
        assert!(!is_supported("riscv64", "amd64", BOTH));
    }

    #[test]
    fn test_lscpu_parsing() {
        let out = "Architecture:            aarch64\n  CPU op-mode(s):        32-bit, 64-bit\n";
        assert_eq!(CpuOpModes::parse_lscpu(out), BOTH);
        let out = "CPU op-mode(s):        64-bit\n";
        assert_eq!(CpuOpModes::parse_lscpu(out), NO_32);
        assert_eq!(CpuOpModes::parse_lscpu(""), CpuOpModes::default());
    }

    #[test]
    fn test_extract_foreign_architectures() {
        let log = "Ign:5 http://deb.debian.org/debian bookworm/main i386 Packages\n\
                   Err:6 http://deb.debian.org/debian bookworm/main amd64 Packages\n\
                   Ign:7 http://deb.debian.org/debian bookworm/contrib i386 Packages\n";
        assert_eq!(extract_foreign_architectures(log), vec!["i386", "amd64"]);
        assert!(mentions_foreign_index(log));
        assert!(!mentions_foreign_index("Hit:1 http://deb.debian.org bookworm InRelease"));
    }

    #[test]
    fn test_remove_commands() {
        let archs = vec!["i386".to_string(), "amd64".to_string()];
        assert_eq!(
            remove_architecture_commands(&archs),
            "sudo dpkg --remove-architecture i386\nsudo dpkg --remove-architecture amd64"
        );
    }
}
