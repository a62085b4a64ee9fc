//! Package-manager backends.
//!
//! One shared rule runner is parameterised by a small capability object:
//! which catalog to run, which commands to recommend, and which queries the
//! enrichment pass may issue.

use crate::command_exec::CommandRunner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// No package-manager specific knowledge
    Generic,
    /// Debian family (apt/dpkg)
    Apt,
    /// Arch family (pacman)
    Pacman,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Apt => "apt",
            Self::Pacman => "pacman",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generic" | "dummy" | "none" => Some(Self::Generic),
            "apt" | "dpkg" | "debian" => Some(Self::Apt),
            "pacman" | "arch" => Some(Self::Pacman),
            _ => None,
        }
    }

    /// Pick the backend from the package manager present under `root`
    pub fn detect(root: &Path) -> Self {
        if root.join("usr/bin/apt-get").exists() || root.join("usr/bin/dpkg").exists() {
            Self::Apt
        } else if root.join("usr/bin/pacman").exists() {
            Self::Pacman
        } else {
            Self::Generic
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation text that differs between backends
#[derive(Debug, Clone, Copy)]
pub struct Remedies {
    /// Reinstall the Raspberry Pi kernel and firmware
    pub kernel_reinstall: &'static str,
    /// Install the appmenu GTK modules
    pub appmenu: &'static str,
    /// Restore /usr/share/i18n/SUPPORTED
    pub locales: &'static str,
    /// Install xz
    pub xz: &'static str,
    /// Reinstall the aria2 library
    pub aria2: &'static str,
    /// Reinstall lsb_release
    pub lsb_release: &'static str,
}

const DEBIAN_REMEDIES: Remedies = Remedies {
    kernel_reinstall: "sudo apt install --reinstall raspberrypi-bootloader raspberrypi-kernel",
    appmenu: "sudo apt install appmenu-gtk2-module appmenu-gtk3-module",
    locales: "sudo apt install --reinstall locales",
    xz: "sudo apt-get install xz-utils",
    aria2: "sudo apt install --reinstall libaria2-0",
    lsb_release: "sudo apt install --reinstall lsb-release",
};

const ARCH_REMEDIES: Remedies = Remedies {
    kernel_reinstall: "sudo pacman -S linux linux-firmware",
    appmenu: "sudo pacman -S appmenu-gtk-module libdbusmenu-gtk2 libdbusmenu-gtk3",
    locales: "sudo pacman -S glibc",
    xz: "sudo pacman -S xz",
    aria2: "sudo pacman -S aria2",
    lsb_release: "sudo pacman -S lsb-release",
};

/// Capability object handed to every rule
#[derive(Debug, Clone, Copy)]
pub struct Backend {
    pub kind: BackendKind,
    pub remedies: Remedies,
}

impl Backend {
    pub fn new(kind: BackendKind) -> Self {
        let remedies = match kind {
            BackendKind::Pacman => ARCH_REMEDIES,
            BackendKind::Apt | BackendKind::Generic => DEBIAN_REMEDIES,
        };
        Self { kind, remedies }
    }

    pub fn is_apt(&self) -> bool {
        self.kind == BackendKind::Apt
    }

    /// Live package-manager queries, if this backend supports enrichment
    pub fn queries(&self) -> Option<AptQueries> {
        match self.kind {
            BackendKind::Apt => Some(AptQueries),
            _ => None,
        }
    }
}

/// The apt query surface used by enrichment
#[derive(Debug, Clone, Copy)]
pub struct AptQueries;

impl AptQueries {
    pub fn show(&self, runner: &dyn CommandRunner, pkgs: &[String]) -> String {
        run_with(runner, "apt-cache", &["show"], pkgs)
    }

    pub fn policy(&self, runner: &dyn CommandRunner, pkgs: &[String]) -> String {
        run_with(runner, "apt-cache", &["policy"], pkgs)
    }

    pub fn list_all_versions(&self, runner: &dyn CommandRunner, pkgs: &[String]) -> String {
        run_with(runner, "apt", &["list", "-a"], pkgs)
    }

    pub fn list_installed(&self, runner: &dyn CommandRunner, pkg: &str) -> String {
        runner.output("apt", &["list", "--installed", pkg])
    }

    /// Simulated full install with downgrades allowed and no recommends
    pub fn dry_run_install(&self, runner: &dyn CommandRunner, pkgs: &[String]) -> String {
        run_with(
            runner,
            "apt-get",
            &[
                "install",
                "-fy",
                "--no-install-recommends",
                "--allow-downgrades",
                "--dry-run",
            ],
            pkgs,
        )
    }

    /// Configured index targets, one line per target
    pub fn index_targets(&self, runner: &dyn CommandRunner, with_arch: bool) -> String {
        let format = if with_arch {
            "$(SITE) $(RELEASE) $(COMPONENT) $(TARGET_OF) $(ARCHITECTURE)"
        } else {
            "$(SITE) $(RELEASE) $(COMPONENT) $(TARGET_OF)"
        };
        runner.output(
            "apt-get",
            &["indextargets", "--no-release-info", "--format", format],
        )
    }

    pub fn foreign_architectures(&self, runner: &dyn CommandRunner) -> String {
        runner.output("dpkg", &["--print-foreign-architectures"])
    }

    pub fn debsums(&self, runner: &dyn CommandRunner, pkgs: &[String]) -> String {
        run_with(runner, "debsums", &[], pkgs)
    }
}

fn run_with(runner: &dyn CommandRunner, program: &str, fixed: &[&str], pkgs: &[String]) -> String {
    let mut args: Vec<&str> = fixed.to_vec();
    args.extend(pkgs.iter().map(String::as_str));
    runner.output(program, &args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::ScriptedRunner;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(BackendKind::parse("APT"), Some(BackendKind::Apt));
        assert_eq!(BackendKind::parse("dummy"), Some(BackendKind::Generic));
        assert_eq!(BackendKind::parse("pacman"), Some(BackendKind::Pacman));
        assert_eq!(BackendKind::parse("apk"), None);
    }

    #[test]
    fn test_detect_by_binaries() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(BackendKind::detect(dir.path()), BackendKind::Generic);
        std::fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
        std::fs::write(dir.path().join("usr/bin/pacman"), "").unwrap();
        assert_eq!(BackendKind::detect(dir.path()), BackendKind::Pacman);
        std::fs::write(dir.path().join("usr/bin/dpkg"), "").unwrap();
        assert_eq!(BackendKind::detect(dir.path()), BackendKind::Apt);
    }

    #[test]
    fn test_remedies_follow_backend() {
        assert!(Backend::new(BackendKind::Pacman).remedies.locales.contains("pacman"));
        assert!(Backend::new(BackendKind::Generic).remedies.locales.contains("apt"));
    }

    #[test]
    fn test_only_apt_enriches() {
        assert!(Backend::new(BackendKind::Apt).queries().is_some());
        assert!(Backend::new(BackendKind::Pacman).queries().is_none());
        assert!(Backend::new(BackendKind::Generic).queries().is_none());
    }

    #[test]
    fn test_dry_run_arguments() {
        let runner = ScriptedRunner::new();
        AptQueries.dry_run_install(&runner, &["foo".to_string(), "bar:armhf".to_string()]);
        assert_eq!(
            runner.calls(),
            vec!["apt-get install -fy --no-install-recommends --allow-downgrades --dry-run foo bar:armhf"]
        );
    }
}
