//! pacman rule table
//!
//! Arch-family failures. Several captions name the package pacman
//! complained about, and NVIDIA legacy drivers get AUR migration steps.

use super::{capture, pattern, Rule, Scope, Trigger};
use crate::diagnosis::Category;

const CONFLICTING_FILES: &str = r"error: failed to commit transaction.*conflicting files.*?:\s*(.*?)\n";
const MISSING_DEPENDENCY: &str =
    r"error:.*could not satisfy dependencies.*?:\s*(.*?)\n|error:.*dependency.*?:\s*(.*?)\s+not found";
const MISSING_TARGET: &str =
    r#"error: target not found: (\S+)|error:.*package ['"]?([^'"]+)['"]?.*not found|error:.*target ['"]?([^'"]+)['"]?.*not found"#;
const AUR_MIGRATION: &str = r"(nvidia[^\s]*).*?(nvidia[^\s]*-xx-dkms|nvidia[^\s]*-aur)";

const AUR_NEWS: &str = "Check the Arch Linux news page (https://archlinux.org/news/)";

/// First participating, non-empty capture group of any alternative
fn any_group(source: &'static str, text: &str) -> Option<String> {
    let caps = pattern(source)?.captures(text)?;
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Legacy NVIDIA series that moved to the AUR under a `-NNNxx-dkms` name
fn legacy_nvidia_package(pkg: &str) -> Option<&'static str> {
    let pkg = pkg.to_lowercase();
    if !pkg.contains("nvidia") {
        return None;
    }
    [
        ("580", "nvidia-580xx-dkms"),
        ("390", "nvidia-390xx-dkms"),
        ("340", "nvidia-340xx-dkms"),
    ]
    .into_iter()
    .find(|(series, _)| pkg.contains(series))
    .map(|(_, aur)| aur)
}

fn is_nvidia(pkg: &str) -> bool {
    pkg.to_lowercase().contains("nvidia")
}

fn conflicts_caption(s: &Scope) -> String {
    let listed: Vec<&str> = s
        .log
        .lines()
        .filter(|line| line.contains(" exists in filesystem"))
        .collect();
    let files = if listed.is_empty() {
        capture(CONFLICTING_FILES, s.log)
    } else {
        Some(listed.join(", "))
    }
    .map(|f| format!("\n\nConflicting files: {}", f))
    .unwrap_or_default();
    format!(
        "Pacman reported file conflicts during package installation.{files}\n\n\
         This happens when files from different packages would overwrite each other.\n\n\
         It's possible that this issue has been announced on the official Arch Linux page if intervention is needed, \
         so check the Arch Linux' news page for more information.\n\n\
         Options:\n\
         1. Remove the conflicting package first: sudo pacman -R <conflicting-package>\n\
         2. Force overwrite (use with caution): sudo pacman -S --overwrite='*' <package>\n\
         3. Check if the package is available from AUR instead"
    )
}

fn dependencies_caption(s: &Scope) -> String {
    let suggestion = match any_group(MISSING_DEPENDENCY, s.log) {
        Some(pkg) if is_nvidia(&pkg) => {
            let (aur, example) = match legacy_nvidia_package(&pkg) {
                Some(aur) => (aur.to_string(), format!("yay -S {}", aur)),
                None => (
                    format!("{pkg}-dkms or {pkg}-xx-dkms"),
                    "yay -S <aur-package-name>".to_string(),
                ),
            };
            format!(
                "\n\nNote: NVIDIA driver packages (especially older series like 580, 390, 340) have been moved to AUR with different names.\n\n\
                 Important: According to Arch Linux news, you MUST uninstall the old package before installing the AUR replacement!\n\n\
                 Steps:\n\
                 1. Uninstall the old package: sudo pacman -R {pkg}\n\
                 2. Search for the AUR replacement: yay -Ss nvidia-*xx-dkms\n\
                 3. Install from AUR (example: {example}, likely package: {aur})\n\n\
                 {AUR_NEWS} for the exact package name and migration instructions.\n\n\
                 If yay is not installed, you can install it from AUR manually."
            )
        }
        Some(pkg) => format!(
            "\n\nThis package might be available from AUR. Try searching for it:\nyay -Ss {pkg}"
        ),
        None => String::new(),
    };
    format!(
        "Pacman reported missing or conflicting dependencies.{suggestion}\n\n\
         To resolve:\n\
         1. Update your package database: sudo pacman -Sy\n\
         2. Check if the package exists: pacman -Ss <package-name>\n\
         3. If not found in official repos, check AUR: yay -Ss <package-name>\n\
         4. Some packages may have been moved to AUR (like older NVIDIA drivers)\n\
         5. Check Arch Linux news (https://archlinux.org/news/) for migration announcements"
    )
}

fn target_not_found_caption(s: &Scope) -> String {
    let advice = match any_group(MISSING_TARGET, s.log) {
        Some(pkg) if is_nvidia(&pkg) => match legacy_nvidia_package(&pkg) {
            Some(aur) => format!(
                "\n\nThis NVIDIA driver package has been moved to AUR with a different name.\n\n\
                 Important: You MUST uninstall the old package before installing the AUR replacement!\n\n\
                 Steps:\n\
                 1. Uninstall the old package: sudo pacman -R {pkg}\n\
                 2. Install from AUR: yay -S {aur}\n\n\
                 {AUR_NEWS} for the exact package name and migration instructions."
            ),
            None => format!(
                "\n\nThis NVIDIA driver package may have been moved to AUR with a different name.\n\n\
                 Important: If migrating from an official package, uninstall it first before installing the AUR replacement!\n\n\
                 Steps:\n\
                 1. Search for the AUR replacement: yay -Ss nvidia-*xx-dkms\n\
                 2. Uninstall the old package if installed: sudo pacman -R {pkg}\n\
                 3. Install from AUR: yay -S <aur-package-name>\n\n\
                 {AUR_NEWS} for migration announcements."
            ),
        },
        Some(pkg) => format!(
            "\n\nThis package is not in the official repositories. It may be available from AUR (Arch User Repository).\n\n\
             To install from AUR, you'll need an AUR helper like yay:\n\
             1. Install yay if not already installed\n\
             2. Search for the package: yay -Ss {pkg}\n\
             3. Install it: yay -S {pkg}\n\n\
             Note: Some packages (like older NVIDIA drivers) have been moved from official repos to AUR."
        ),
        None => "\n\nThis package is not in the official repositories. It may be available from AUR (Arch User Repository). \
                 Try searching with: yay -Ss <package-name>"
            .to_string(),
    };
    format!("Pacman could not find the requested package in the official repositories.{advice}")
}

fn aur_migration_caption(s: &Scope) -> String {
    let migration = pattern(AUR_MIGRATION)
        .and_then(|re| re.captures(s.log))
        .map(|caps| match (caps.get(1), caps.get(2)) {
            (Some(old), Some(new)) => format!(
                "\n\nDetected migration: {} → {}\n\n",
                old.as_str(),
                new.as_str()
            ),
            (Some(old), None) => format!("\n\nOld package: {}\n\n", old.as_str()),
            _ => String::new(),
        })
        .unwrap_or_default();
    format!(
        "A package that was previously in the official repositories has been moved to AUR.{migration}\
         This commonly happens with:\n\
         - Older NVIDIA driver versions (nvidia-580xx-dkms, nvidia-390xx-dkms, nvidia-340xx-dkms, etc.)\n\
         - Packages that are no longer maintained in official repos\n\
         - Legacy or deprecated packages\n\n\
         Important: According to Arch Linux news, you MUST uninstall the old package before installing the AUR replacement!\n\n\
         Steps:\n\
         1. Check Arch Linux news (https://archlinux.org/news/) for the exact migration instructions\n\
         2. Uninstall the old package: sudo pacman -R <old-package-name>\n\
         3. Install from AUR: yay -S <new-aur-package-name>\n\n\
         If you don't have yay installed, you can install it from AUR manually or use makepkg directly."
    )
}

pub fn rules() -> Vec<Rule> {
    vec![
        Rule::caption(
            "pacman-sync",
            Trigger::Pattern(
                r"error: failed to synchronize all databases|error: failed retrieving file.*from|error: failed to update|error: failed to download",
            ),
            Category::Internet,
            "Pacman failed to synchronize package databases.\n\n\
             This could be due to:\n\
             1. Network connectivity issues\n\
             2. Repository server problems\n\
             3. Incorrect repository configuration\n\n\
             Try running: sudo pacman -Sy\n\n\
             If the problem persists, check your internet connection and review /etc/pacman.conf for any misconfigured repositories.",
        ),
        Rule::caption(
            "pacman-repo-not-found",
            Trigger::Pattern(r"error:.*repository.*not found|error:.*404.*Not Found|error:.*failed to retrieve.*404"),
            Category::System,
            "Pacman reported a repository that could not be found.\n\n\
             This usually means:\n\
             1. The repository URL is incorrect\n\
             2. The repository has been moved or removed\n\
             3. Your system architecture is not supported by the repository\n\n\
             Check /etc/pacman.conf and /etc/pacman.d/ for misconfigured repositories and remove or fix them.",
        ),
        Rule::caption(
            "pacman-signature",
            Trigger::Pattern(
                r"error:.*signature from.*is unknown trust|error:.*signature.*is invalid|error:.*key.*is unknown|error:.*required signature missing",
            ),
            Category::System,
            "Pacman reported a signature verification error.\n\n\
             This means a package signature could not be verified. To fix this:\n\n\
             1. Update the keyring: sudo pacman -Sy archlinux-keyring\n\
             2. If that doesn't work, try: sudo pacman-key --refresh-keys\n\
             3. For specific keys, you may need to manually import them\n\n\
             If this is for a custom repository, you may need to add its key manually.",
        ),
        Rule::caption(
            "pacman-lock",
            Trigger::Pattern(r"error:.*failed to lock database|error:.*could not lock database|error:.*database.*locked"),
            Category::System,
            "Pacman database is locked, likely because another pacman process is running.\n\n\
             Wait for any other pacman operations to complete, or if you're sure no other pacman process is running:\n\n\
             sudo rm /var/lib/pacman/db.lck\n\n\
             Only do this if you're absolutely certain no other pacman process is active!",
        ),
        Rule::render(
            "pacman-file-conflicts",
            Trigger::Pattern(r"error: failed to commit transaction.*conflicting files|error:.*conflicts with|error:.*file conflicts"),
            Category::Package,
            conflicts_caption,
        ),
        Rule::render(
            "pacman-dependencies",
            Trigger::Pattern(
                r"error: failed to prepare transaction.*could not satisfy dependencies|error:.*unresolvable package conflicts|error:.*dependency.*not found|error:.*failed to prepare transaction.*conflicts",
            ),
            Category::Package,
            dependencies_caption,
        ),
        Rule::render(
            "pacman-target-not-found",
            Trigger::Pattern(r"error:.*package.*not found|error:.*target not found|error:.*no package found"),
            Category::Package,
            target_not_found_caption,
        ),
        Rule::caption(
            "pacman-broken-package",
            Trigger::Pattern(r"error:.*broken|error:.*unresolvable|error:.*invalid package"),
            Category::Package,
            "Pacman reported broken or invalid packages.\n\n\
             To fix:\n\
             1. Update package database: sudo pacman -Sy\n\
             2. Try to fix broken packages: sudo pacman -Syu\n\
             3. If that doesn't work, you may need to reinstall the problematic package\n\
             4. Check for partial upgrades - make sure all packages are up to date",
        ),
        Rule::render(
            "pacman-aur-migration",
            Trigger::Pattern(
                r"warning:.*is being replaced by.*-aur|warning:.*replacing.*with.*from.*aur|nvidia.*moved to.*aur|package.*moved to.*aur|nvidia.*moved to.*AUR",
            ),
            Category::Package,
            aur_migration_caption,
        ),
        Rule::caption(
            "pacman-dkms",
            Trigger::Pattern(r"error:.*dkms.*failed|error:.*kernel.*module.*failed|error:.*make.*failed.*dkms"),
            Category::Package,
            "A kernel module (DKMS) failed to compile.\n\n\
             This often happens when:\n\
             1. The kernel was updated but the module hasn't been rebuilt\n\
             2. The module is incompatible with the current kernel version\n\n\
             To fix:\n\
             1. Rebuild the module: sudo dkms install <module>/<version> -k $(uname -r)\n\
             2. Or remove the problematic module and reinstall it\n\
             3. Some modules may need to be installed from AUR if they're not compatible with the latest kernel",
        ),
        Rule::caption(
            "pacman-partial-upgrade",
            Trigger::Pattern(r"warning:.*partial upgrade|error:.*partial upgrade"),
            Category::Package,
            "Pacman detected a partial upgrade, which can cause dependency issues.\n\n\
             On Arch Linux, it's important to keep all packages up to date together.\n\n\
             To fix:\n\
             1. Update all packages: sudo pacman -Syu\n\
             2. Never use -Sy (sync without upgrade) - always use -Syu\n\
             3. If you have AUR packages, update them too: yay -Syu",
        ),
        Rule::caption(
            "pacman-corrupted-database",
            Trigger::Pattern(r"error:.*database.*corrupt|error:.*invalid.*database|error:.*failed to read.*database"),
            Category::System,
            "Pacman database appears to be corrupted.\n\n\
             To fix:\n\
             1. Try to fix the database: sudo pacman-db-upgrade\n\
             2. If that doesn't work, remove the local database and resync:\n   \
             sudo rm -rf /var/lib/pacman/sync\n   \
             sudo pacman -Sy\n\
             3. As a last resort, you may need to restore from backup",
        ),
        Rule::caption(
            "pacman-disk-space",
            Trigger::Pattern(r"error:.*not enough.*space|error:.*insufficient.*space|error:.*failed.*extract.*space"),
            Category::System,
            "Pacman failed due to insufficient disk space.\n\n\
             To free up space:\n\
             1. Clean package cache: sudo pacman -Sc\n\
             2. Remove unused packages: sudo pacman -Rns $(pacman -Qtdq)\n\
             3. Check disk usage: df -h\n\
             4. Consider cleaning AUR build cache if using yay: yay -Sc",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, BackendKind};
    use crate::command_exec::NullRunner;
    use crate::diagnosis::Diagnosis;
    use crate::host::HostInfo;
    use crate::rules::evaluate;
    use std::path::Path;

    fn diagnose(log: &str) -> Diagnosis {
        let host = HostInfo::blank(Path::new("/nonexistent-root"));
        let mut scope = Scope::new(log, &host, Backend::new(BackendKind::Pacman), &NullRunner, false);
        evaluate(&rules(), &mut scope);
        scope.diagnosis
    }

    #[test]
    fn test_sync_failure_is_internet() {
        let d = diagnose("error: failed to synchronize all databases (unexpected error)\n");
        assert_eq!(d.captions.len(), 1);
        assert_eq!(d.category, Category::Internet);
    }

    #[test]
    fn test_conflicting_files_named() {
        let d = diagnose(
            "error: failed to commit transaction (conflicting files)\nfoo: /usr/bin/foo exists in filesystem\n",
        );
        assert!(d.captions[0].contains("Conflicting files: foo: /usr/bin/foo exists in filesystem"));
        assert_eq!(d.category, Category::Package);
    }

    #[test]
    fn test_legacy_nvidia_series() {
        assert_eq!(legacy_nvidia_package("nvidia-580-utils"), Some("nvidia-580xx-dkms"));
        assert_eq!(legacy_nvidia_package("NVIDIA-390"), Some("nvidia-390xx-dkms"));
        assert_eq!(legacy_nvidia_package("nvidia-open"), None);
        assert_eq!(legacy_nvidia_package("mesa-340"), None);
    }

    #[test]
    fn test_target_not_found_aur_advice() {
        let d = diagnose("error: target not found: spotify\n");
        assert!(d.captions.iter().any(|c| c.contains("yay -Ss spotify")));

        let d = diagnose("error: target not found: nvidia-390xx\n");
        assert!(d.captions.iter().any(|c| c.contains("yay -S nvidia-390xx-dkms")));
    }

    #[test]
    fn test_missing_dependency_generic_advice() {
        let d = diagnose("error: failed to prepare transaction (could not satisfy dependencies)\n:: installing foo breaks bar\n");
        assert!(d.captions[0].starts_with("Pacman reported missing or conflicting dependencies."));
        assert_eq!(d.category, Category::Package);
    }

    #[test]
    fn test_disk_space_is_system() {
        let d = diagnose("error: Partition / too full: not enough free disk space\n");
        assert_eq!(d.category, Category::System);
    }
}
