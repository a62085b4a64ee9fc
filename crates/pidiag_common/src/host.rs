//! Host facts consulted by the rule catalogs.
//!
//! Computed once per diagnosis. Every path is resolved under `root` so tests
//! can point the engine at a scratch directory instead of the live system.

use crate::arch::{self, CpuOpModes};
use crate::command_exec::CommandRunner;
use crate::os_release::{codename_from_debian_version, OsRelease};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fallback codename when nothing on the host names one
const DEFAULT_CODENAME: &str = "bullseye";

#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Filesystem root all host paths are resolved against
    pub root: PathBuf,
    /// Parsed os-release
    pub os: OsRelease,
    /// Native dpkg architecture, if known
    pub native_arch: Option<String>,
    /// CPU execution widths
    pub cpu_modes: CpuOpModes,
    /// Userland word size from `getconf LONG_BIT`
    pub long_bit: Option<u32>,
    /// `$USER`, or the literal `$USER`
    pub user: String,
    /// `$HOME`, or the literal `$HOME`
    pub home: String,
}

impl HostInfo {
    /// Probe the live host
    pub fn detect(runner: &dyn CommandRunner, root: &Path) -> Self {
        let os = OsRelease::load(root);
        let native_arch = arch::native_architecture(runner);
        let cpu_modes = CpuOpModes::detect(runner);
        let long_bit = runner.stdout("getconf", &["LONG_BIT"]).parse().ok();

        let host = Self {
            root: root.to_path_buf(),
            os,
            native_arch,
            cpu_modes,
            long_bit,
            user: std::env::var("USER").unwrap_or_else(|_| "$USER".to_string()),
            home: std::env::var("HOME").unwrap_or_else(|_| "$HOME".to_string()),
        };
        debug!(
            "host: id={} version={} arch={:?} modes={:?} long_bit={:?}",
            host.os.id, host.os.version_id, host.native_arch, host.cpu_modes, host.long_bit
        );
        host
    }

    /// A host with nothing known, rooted at `root`
    pub fn blank(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            os: OsRelease::default(),
            native_arch: None,
            cpu_modes: CpuOpModes::default(),
            long_bit: None,
            user: "$USER".to_string(),
            home: "$HOME".to_string(),
        }
    }

    /// Resolve an absolute host path under `root`
    pub fn path(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }

    pub fn exists(&self, absolute: &str) -> bool {
        self.path(absolute).exists()
    }

    pub fn read(&self, absolute: &str) -> Option<String> {
        std::fs::read_to_string(self.path(absolute)).ok()
    }

    /// Raspberry Pi OS images ship `/etc/rpi-issue`
    pub fn is_raspberry_pi_os(&self) -> bool {
        self.exists("/etc/rpi-issue")
    }

    /// Distribution id, reporting Raspberry Pi OS as Raspbian
    pub fn distro_id(&self) -> String {
        if self.os.id == "Debian" && self.is_raspberry_pi_os() {
            "Raspbian".to_string()
        } else {
            self.os.id.clone()
        }
    }

    /// Release codename with the Debian fallbacks applied
    pub fn codename(&self) -> String {
        if !self.os.version_codename.is_empty() {
            return self.os.version_codename.clone();
        }
        self.read("/etc/debian_version")
            .and_then(|v| codename_from_debian_version(&v))
            .unwrap_or(DEFAULT_CODENAME)
            .to_string()
    }

    /// Whether the release is Debian 13 (trixie) or newer
    pub fn is_deb822_era(&self) -> bool {
        self.os.major_version().map(|v| v >= 13).unwrap_or(false)
    }
}
