//! End-to-end classification tests through the public entry points.
//!
//! No test touches the network or a real package manager: host facts come
//! from a scratch root and every command is answered by a ScriptedRunner.

use pidiag_common::preprocess::strip_ansi;
use pidiag_common::{
    diagnose_file, diagnose_text, BackendKind, Category, Diagnosis, DiagnoseOptions, HostInfo,
    NullRunner, ScriptedRunner,
};
use std::fs;

fn make_host() -> (tempfile::TempDir, HostInfo) {
    let dir = tempfile::tempdir().unwrap();
    let host = HostInfo::blank(dir.path());
    (dir, host)
}

fn make_arm64_host(lscpu_modes: &str) -> (tempfile::TempDir, HostInfo) {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .respond("dpkg --print-architecture", "arm64\n")
        .respond("lscpu", &format!("Architecture: aarch64\nCPU op-mode(s): {lscpu_modes}\n"))
        .respond("getconf LONG_BIT", "64\n");
    let host = HostInfo::detect(&runner, dir.path());
    (dir, host)
}

fn apt_diagnosis(log: &str, host: &HostInfo) -> Diagnosis {
    let opts = DiagnoseOptions::new(host, &NullRunner)
        .with_backend(BackendKind::Apt)
        .with_enrichment(false);
    diagnose_text(log, &opts).0
}

#[test]
fn test_unrecognised_log_is_unknown() {
    let (_dir, host) = make_host();
    for kind in [BackendKind::Apt, BackendKind::Pacman, BackendKind::Generic] {
        let opts = DiagnoseOptions::new(&host, &NullRunner).with_backend(kind);
        let (d, _) = diagnose_text("Compiling foo v1.0\nFinished in 3s\n", &opts);
        assert_eq!(d.category, Category::Unknown, "{kind}");
        assert!(d.captions.is_empty(), "{kind}");
        assert!(d.allows_report());
    }
}

#[test]
fn test_lock_error_alone() {
    let (_dir, host) = make_host();
    let d = apt_diagnosis("E: Could not get lock", &host);
    assert_eq!(d.category, Category::System);
    assert_eq!(d.captions.len(), 1);
    assert!(d.captions[0].contains("Could not get lock"));
    assert!(!d.allows_report());
}

#[test]
fn test_multiarch_break_from_dry_run() {
    let (_dir, host) = make_host();
    let log = "The following packages have unmet dependencies:\n pkgA : Depends: pkgB but it is not going to be installed\n";
    let runner = ScriptedRunner::new().respond(
        "apt-get install",
        "Reading package lists...\npkgA : Breaks: pkgA:armhf\n",
    );
    let opts = DiagnoseOptions::new(&host, &runner).with_backend(BackendKind::Apt);
    let (d, appendix) = diagnose_text(log, &opts);

    assert_eq!(d.category, Category::Package);
    assert_eq!(d.captions.len(), 1);
    assert!(d.captions[0].contains("pkgA does not have a multiarch (armhf) compatible version"));
    assert!(runner.was_called("apt-get install -fy --no-install-recommends --allow-downgrades --dry-run pkgA pkgB"));
    assert!(appendix
        .sections()
        .iter()
        .any(|s| s.starts_with("foreign architectures: ")));
}

#[test]
fn test_unmet_without_enrichment_falls_back() {
    let (_dir, host) = make_host();
    let log = "The following packages have unmet dependencies:\n pkgA : Depends: pkgB but it is not going to be installed\n\nmore\n";
    let d = apt_diagnosis(log, &host);
    assert_eq!(d.category, Category::System);
    assert_eq!(d.captions.len(), 1);
    assert!(d.captions[0].contains("pkgA : Depends: pkgB"));
}

#[test]
fn test_foreign_architecture_matrix() {
    let log = "Err:7 http://deb.debian.org/debian bookworm/main armhf Packages\n  404  Not Found\n";

    let (_dir, no_aarch32) = make_arm64_host("64-bit");
    assert_eq!(no_aarch32.native_arch.as_deref(), Some("arm64"));
    let d = apt_diagnosis(log, &no_aarch32);
    assert_eq!(d.category, Category::System);
    assert!(d.captions[0].contains("sudo dpkg --remove-architecture armhf"));

    let (_dir, with_aarch32) = make_arm64_host("32-bit, 64-bit");
    let d = apt_diagnosis(log, &with_aarch32);
    assert!(d
        .captions
        .iter()
        .all(|c| !c.contains("--remove-architecture armhf")));
}

#[test]
fn test_strip_is_idempotent() {
    let samples = [
        "",
        "plain text",
        "\x1b[1;31mred\x1b[0m and \x1b[Kerase",
        "progress\r50%\r100%\n",
        "truncated \x1b[12",
        "lone \x1b escape",
        "\x1b\x1b[[0m",
    ];
    for s in samples {
        let once = strip_ansi(s);
        assert_eq!(strip_ansi(&once), once, "{:?}", s);
        assert!(!once.contains('\x1b'));
    }
}

// Category resolution is last match in catalog order. These cases pin it.

#[test]
fn test_later_rule_sets_category() {
    let (_dir, host) = make_host();
    let log = "E: Could not get lock /var/lib/dpkg/lock\n\
               fatal: unable to access 'https://github.com/x/y/': Could not resolve host: github.com\n";
    let d = apt_diagnosis(log, &host);
    assert_eq!(d.captions.len(), 2);
    assert!(d.captions[0].contains("Could not get lock"));
    assert!(d.captions[1].contains("Failed to connect to github.com"));
    assert_eq!(d.category, Category::Internet);
}

#[test]
fn test_lock_and_disk_space_both_reported() {
    let (_dir, host) = make_host();
    let log = "E: Could not get lock /var/lib/dpkg/lock\nwrite error: No space left on device\n";
    let d = apt_diagnosis(log, &host);
    assert_eq!(d.captions.len(), 2);
    assert!(d.captions[1].contains("insufficient disk space"));
    assert_eq!(d.category, Category::System);
}

#[test]
fn test_user_error_has_final_word() {
    let (_dir, host) = make_host();
    let log = "E: Could not get lock /var/lib/dpkg/lock\n\
               User error (reporting allowed): The upstream mirror is down.\n\
               Failed to install Foo!\n";
    let d = apt_diagnosis(log, &host);
    assert_eq!(d.captions.last().map(String::as_str), Some("The upstream mirror is down."));
    assert_eq!(d.category, Category::Unknown);
}

#[test]
fn test_pacman_backend_uses_its_own_catalog() {
    let (_dir, host) = make_host();
    let opts = DiagnoseOptions::new(&host, &NullRunner).with_backend(BackendKind::Pacman);
    let log = "error: failed to init transaction (unable to lock database)\n\
               error: could not lock database: File exists\n";
    let (d, appendix) = diagnose_text(log, &opts);
    assert_eq!(d.category, Category::System);
    assert_eq!(d.captions.len(), 1);
    assert!(appendix.is_empty());

    let (apt, _) = diagnose_text(log, &opts.with_backend(BackendKind::Apt));
    assert!(apt.captions.is_empty());
}

#[test]
fn test_diagnose_file_appends_appendix() {
    let (dir, host) = make_host();
    let log = dir.path().join("install-fail.log");
    let text = "The following packages have unmet dependencies:\n pkgA : Depends: pkgB but it is not going to be installed\n";
    fs::write(&log, text).unwrap();

    let runner = ScriptedRunner::new()
        .respond("apt-cache show", "Package: pkgA\nStatus: hold ok installed\n")
        .respond("dpkg --print-foreign-architectures", "armhf\n");
    let opts = DiagnoseOptions::new(&host, &runner).with_backend(BackendKind::Apt);
    let d = diagnose_file(&log, true, &opts).unwrap();

    assert_eq!(d.category, Category::System);
    assert!(d.captions[0].contains("sudo apt-mark unhold pkgA pkgB"));
    let written = fs::read_to_string(&log).unwrap();
    assert!(written.contains("\nAdditional log diagnosis for developers below:\n\n"));
    assert!(written.contains("foreign architectures: armhf"));
}
