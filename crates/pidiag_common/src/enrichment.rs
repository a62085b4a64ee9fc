//! Enrichment - live package-manager queries behind the apt findings
//!
//! Every query goes through the scope's [`CommandRunner`]; a failed or
//! timed-out query is just empty output. Raw output is collected into an
//! [`Appendix`] so developers can read what the host reported.
//!
//! [`CommandRunner`]: crate::command_exec::CommandRunner

use crate::candidates::{all_clean_candidates, CandidateSet, Strategy};
use crate::diagnosis::Category;
use crate::rules::{Finding, Scope};
use tracing::{debug, info};

/// Marker apt prints before dependency resolution failures
pub const UNMET_MARKER: &str = "The following packages have unmet dependencies:";

/// Status line apt-cache shows for a held package
const HELD_STATUS: &str = "Status: hold ok installed";

const FORCE_OVERWRITE_CAPTION: &str =
    "Two packages which share the same files are having a problem with different file versions.\n\
     Try running this command to fix it:\n\
     sudo apt --fix-broken install -o Dpkg::Options::='--force-overwrite'";

/// Raw query output collected while diagnosing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Appendix {
    sections: Vec<String>,
}

impl Appendix {
    /// Heading written above the appendix when it is appended to a log
    pub const HEADER: &'static str = "\nAdditional log diagnosis for developers below:\n\n";

    pub fn record(&mut self, output: impl Into<String>) {
        self.sections.push(output.into());
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Text appended to the log: heading, then every section on its own line
    pub fn render(&self) -> String {
        let mut out = String::from(Self::HEADER);
        for section in &self.sections {
            out.push_str(section);
            out.push('\n');
        }
        out
    }
}

/// Query apt about every candidate strategy of an unmet-dependencies block.
///
/// Returns the specific findings (multiarch break, held packages). An empty
/// finding means the generic fallbacks should apply.
pub fn investigate_unmet(scope: &mut Scope) -> Finding {
    let mut finding = Finding::default();
    if !scope.enrich {
        return finding;
    }
    let Some(apt) = scope.backend.queries() else {
        return finding;
    };

    let mut held_reported = false;
    for strategy in Strategy::ALL {
        let set = CandidateSet::extract(strategy, scope.log);
        if set.is_empty() {
            continue;
        }
        info!(
            "enriching {} candidates from {} lines",
            set.names.len(),
            strategy.as_str()
        );

        let show = apt.show(scope.runner, &set.probe);
        scope.appendix.record(show.clone());
        scope.appendix.record(apt.policy(scope.runner, &set.probe));
        scope
            .appendix
            .record(apt.list_all_versions(scope.runner, &set.clean));
        let dry_run = apt.dry_run_install(scope.runner, &set.probe);
        scope.appendix.record(dry_run.clone());

        for pkg in &set.clean {
            if dry_run.contains(&format!("{pkg} : Breaks: {pkg}:armhf")) {
                debug!("{} has no multiarch compatible version", pkg);
                finding.push(Category::Package, multiarch_caption(pkg));
            }
        }

        if !held_reported && show.contains(HELD_STATUS) {
            debug!("held package among {:?}", set.names);
            finding.push(Category::System, held_caption(&set.names));
            held_reported = true;
        }
    }

    let targets = apt.index_targets(scope.runner, true);
    if !targets.is_empty() {
        scope.appendix.record(targets);
    }
    let foreign = apt.foreign_architectures(scope.runner);
    scope
        .appendix
        .record(format!("foreign architectures: {}", foreign));

    finding
}

fn multiarch_caption(pkg: &str) -> String {
    format!(
        "Packages failed to install because {pkg} does not have a multiarch (armhf) compatible version.\n\
         This issue does not occur on Ubuntu/Debian (where every package is multiarch compatible). \
         Contact your distro maintainer or the packager of {pkg} to have this issue resolved."
    )
}

fn held_caption(names: &[String]) -> String {
    format!(
        "Packages failed to install because you manually marked at least one of the following packages as held:\n\n\
         {}\n\n\
         You will need to unmark the packages with the following command before installation can proceed:\n\
         sudo apt-mark unhold {}",
        names.join("\n"),
        names.join(" ")
    )
}

/// Package names from `trying to overwrite shared ...` lines (last field)
pub fn overwrite_candidates(log: &str, line_pattern: &regex::Regex) -> CandidateSet {
    let raw = log
        .lines()
        .filter(|line| line_pattern.is_match(line))
        .filter_map(|line| line.split_whitespace().last())
        .map(str::to_string)
        .collect();
    CandidateSet::from_raw(raw)
}

/// Decide between "system files overwritten" and the force-overwrite remedy
pub fn investigate_overwrite(scope: &mut Scope, line_pattern: &regex::Regex) -> Finding {
    let fallback = Finding::new(Category::System, FORCE_OVERWRITE_CAPTION);
    if !scope.enrich {
        return fallback;
    }
    let Some(apt) = scope.backend.queries() else {
        return fallback;
    };

    let set = overwrite_candidates(scope.log, line_pattern);
    if set.is_empty() {
        return fallback;
    }
    scope.appendix.record(apt.show(scope.runner, &set.probe));
    scope
        .appendix
        .record(apt.list_all_versions(scope.runner, &set.clean));
    let debsums = apt.debsums(scope.runner, &set.probe);
    scope.appendix.record(debsums.clone());

    if debsums.contains("FAILED") {
        Finding::new(
            Category::System,
            format!(
                "You have overwritten system files which prevent packages that share files from being able to install.\n\
                 You need to reinstall the following packages to restore the integrity of your apt managed system packages:\n\n\
                 {}",
                set.probe.join("\n")
            ),
        )
    } else {
        fallback
    }
}

/// Whether `<codename>-backports main` is among the configured index targets
pub fn backports_enabled(targets: &str, codename: &str) -> bool {
    let suite = format!("{}-backports", codename);
    targets.lines().any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        fields.len() >= 4
            && fields[3] == "deb"
            && fields[0].contains("debian.org/debian")
            && fields[1].contains(&suite)
            && fields[2] == "main"
    })
}

/// Candidates currently installed from the backports suite
pub fn investigate_backports(scope: &mut Scope) -> Option<Finding> {
    if !scope.enrich {
        return None;
    }
    let apt = scope.backend.queries()?;
    let distro = scope.host.distro_id();
    if distro != "Debian" && distro != "Raspbian" {
        return None;
    }

    let codename = scope.host.codename();
    if !backports_enabled(&apt.index_targets(scope.runner, false), &codename) {
        debug!("{}-backports not configured", codename);
        return None;
    }

    let conflicts: Vec<String> = all_clean_candidates(scope.log)
        .into_iter()
        .filter(|pkg| {
            apt.list_installed(scope.runner, pkg)
                .contains("-backports,now")
        })
        .collect();
    if conflicts.is_empty() {
        return None;
    }

    Some(Finding::new(
        Category::Package,
        format!(
            "The debian {codename}-backports repo is enabled on your system and packages installed from it are causing conflicts.\n\
             You will need to revert to the stable version of the packages or manually upgrade all dependent packages to the {codename}-backports version.\n\n\
             The packages that should be reverted to the stable versions that are causing conflicts are:\n\
             {}\n\n\
             For more information refer to the debian documentation: https://backports.debian.org/Instructions/",
            conflicts.join("\n")
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, BackendKind};
    use crate::command_exec::ScriptedRunner;
    use crate::host::HostInfo;
    use regex::Regex;
    use std::path::Path;

    const DRY_RUN: &str = "apt-get install -fy --no-install-recommends --allow-downgrades --dry-run";

    fn scope<'a>(log: &'a str, host: &'a HostInfo, runner: &'a ScriptedRunner) -> Scope<'a> {
        Scope::new(log, host, Backend::new(BackendKind::Apt), runner, true)
    }

    #[test]
    fn test_multiarch_break() {
        let host = HostInfo::blank(Path::new("/nonexistent-root"));
        let runner = ScriptedRunner::new().respond(DRY_RUN, "pkgA : Breaks: pkgA:armhf\n");
        let log = " pkgA : Depends: pkgB but it is not going to be installed\n";
        let mut s = scope(log, &host, &runner);
        let finding = investigate_unmet(&mut s);
        assert_eq!(finding.category, Some(Category::Package));
        assert_eq!(finding.captions.len(), 1);
        assert!(finding.captions[0].contains("because pkgA does not have a multiarch"));
        assert!(runner.was_called("apt-cache show pkgA pkgB"));
        assert!(s.appendix.sections().iter().any(|l| l.starts_with("foreign architectures: ")));
    }

    #[test]
    fn test_held_packages() {
        let host = HostInfo::blank(Path::new("/nonexistent-root"));
        let runner = ScriptedRunner::new().respond("apt-cache show", "Package: libfoo\nStatus: hold ok installed\n");
        let log = "          Depends: libfoo (>= 2) but it is not going to be installed\n";
        let mut s = scope(log, &host, &runner);
        let finding = investigate_unmet(&mut s);
        assert_eq!(finding.category, Some(Category::System));
        assert!(finding.captions[0].ends_with("sudo apt-mark unhold libfoo"));
    }

    #[test]
    fn test_no_queries_without_enrichment() {
        let host = HostInfo::blank(Path::new("/nonexistent-root"));
        let runner = ScriptedRunner::new();
        let log = " pkgA : Depends: pkgB\n";
        let mut s = Scope::new(log, &host, Backend::new(BackendKind::Apt), &runner, false);
        assert!(investigate_unmet(&mut s).is_empty());
        assert!(runner.calls().is_empty());
        assert!(s.appendix.is_empty());
    }

    #[test]
    fn test_overwrite_debsums_failed() {
        let host = HostInfo::blank(Path::new("/nonexistent-root"));
        let runner = ScriptedRunner::new().respond("debsums", "/usr/lib/libx.so FAILED\n");
        let line = Regex::new(r"trying to overwrite shared .*, which is different from other instances of package").unwrap();
        let log = "dpkg: error processing archive x.deb: trying to overwrite shared '/usr/share/doc/x', which is different from other instances of package libx:armhf\n";
        let mut s = scope(log, &host, &runner);
        let finding = investigate_overwrite(&mut s, &line);
        assert!(finding.captions[0].ends_with("libx:armhf\nlibx:arm64"));

        let runner = ScriptedRunner::new().respond("debsums", "/usr/lib/libx.so OK\n");
        let mut s = scope(log, &host, &runner);
        assert_eq!(investigate_overwrite(&mut s, &line).captions[0], FORCE_OVERWRITE_CAPTION);
    }

    #[test]
    fn test_backports_enabled() {
        let targets = "http://deb.debian.org/debian bookworm-backports main deb\n\
                       http://deb.debian.org/debian bookworm main deb\n";
        assert!(backports_enabled(targets, "bookworm"));
        assert!(!backports_enabled(targets, "trixie"));
        assert!(!backports_enabled("http://deb.debian.org/debian bookworm-backports contrib deb", "bookworm"));
    }

    const BACKPORTS_TARGETS: &str = "http://deb.debian.org/debian bookworm-backports main deb\n\
                                     http://deb.debian.org/debian bookworm main deb\n";
    const UNMET_LOG: &str = " pkgA : Depends: pkgB but it is not going to be installed\n";

    fn bookworm_host(id: &str) -> HostInfo {
        let mut host = HostInfo::blank(Path::new("/nonexistent-root"));
        host.os.id = id.to_string();
        host.os.version_codename = "bookworm".to_string();
        host
    }

    fn backports_runner(targets: &str) -> ScriptedRunner {
        ScriptedRunner::new()
            .respond("apt-get indextargets", targets)
            .respond(
                "apt list --installed pkgA",
                "Listing...\npkgA/bookworm-backports,now 2.0-1~bpo12+1 arm64 [installed]\n",
            )
            .respond("apt list --installed pkgB", "Listing...\npkgB/bookworm,now 1.0-1 arm64 [installed]\n")
    }

    #[test]
    fn test_backports_conflict_names_packages() {
        for id in ["Debian", "Raspbian"] {
            let host = bookworm_host(id);
            let runner = backports_runner(BACKPORTS_TARGETS);
            let mut s = scope(UNMET_LOG, &host, &runner);
            let finding = investigate_backports(&mut s).expect("backports finding");
            assert_eq!(finding.category, Some(Category::Package), "{id}");
            assert!(finding.captions[0].starts_with("The debian bookworm-backports repo is enabled"));
            assert!(finding.captions[0].contains("causing conflicts are:\npkgA\n\n"));
            assert!(!finding.captions[0].contains("pkgB"));
        }
    }

    #[test]
    fn test_backports_conflict_needs_debian_host() {
        let host = bookworm_host("Ubuntu");
        let runner = backports_runner(BACKPORTS_TARGETS);
        let mut s = scope(UNMET_LOG, &host, &runner);
        assert!(investigate_backports(&mut s).is_none());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_backports_conflict_needs_backports_target() {
        let host = bookworm_host("Debian");
        let runner = backports_runner("http://deb.debian.org/debian bookworm main deb\n");
        let mut s = scope(UNMET_LOG, &host, &runner);
        assert!(investigate_backports(&mut s).is_none());
        assert!(!runner.was_called("apt list"));
    }

    #[test]
    fn test_appendix_render() {
        let mut appendix = Appendix::default();
        appendix.record("one");
        appendix.record("foreign architectures: ");
        assert_eq!(
            appendix.render(),
            "\nAdditional log diagnosis for developers below:\n\none\nforeign architectures: \n"
        );
    }
}
