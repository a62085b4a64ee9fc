//! Multi-line passthrough rules
//!
//! - user errors: diagnoses injected by upstream install scripts
//! - unmet dependencies: enrichment first, then a generic fallback caption

use super::{Finding, Rule, Scope, Trigger};
use crate::diagnosis::Category;
use crate::enrichment::{self, UNMET_MARKER};

const USER_ERROR: &str = "User error: ";
const USER_ERROR_REPORTABLE: &str = "User error (reporting allowed): ";

/// Lines that end an injected message
const BOILERPLATE: &[&str] = &[
    "Failed to install",
    "Need help?",
    "Please ask on Github:",
    "Or on Discord:",
];

/// Message following the first line that starts with `prefix`
pub fn extract_user_error(log: &str, prefix: &str) -> Option<String> {
    let mut lines = log.lines();
    let first = lines.by_ref().find_map(|line| line.strip_prefix(prefix))?;

    let mut message = vec![first];
    for line in lines {
        if line.is_empty() || BOILERPLATE.iter().any(|b| line.starts_with(b)) {
            break;
        }
        message.push(line);
    }
    Some(message.join("\n"))
}

/// Reporting-blocking user error first, then the reportable one
pub fn user_error_rules() -> Vec<Rule> {
    vec![
        Rule::probe("user-error", Trigger::Pattern(r"(?m)^User error: "), |s| {
            extract_user_error(s.log, USER_ERROR).map(|m| Finding::new(Category::System, m))
        }),
        Rule::probe(
            "user-error-reporting-allowed",
            Trigger::Pattern(r"(?m)^User error \(reporting allowed\): "),
            |s| {
                extract_user_error(s.log, USER_ERROR_REPORTABLE)
                    .map(|m| Finding::new(Category::Unknown, m))
            },
        ),
    ]
}

/// The unmet-dependency block, from the marker to the first blank or `E:` line
pub fn unmet_section(log: &str) -> String {
    let mut section = String::new();
    let mut capturing = false;
    for line in log.lines() {
        if line.contains(UNMET_MARKER) {
            capturing = true;
            section = format!("{}\n", line);
            continue;
        }
        if capturing {
            if line.is_empty() || line.contains("E:") {
                capturing = false;
            } else {
                section.push_str(line);
                section.push('\n');
            }
        }
    }
    section
}

/// Generic caption picked by what apt said about the dependencies
pub fn unmet_fallback(log: &str) -> String {
    let section = unmet_section(log);
    if log.contains("not going to be installed") {
        format!(
            "Packages failed to install because the package manager requires you to install some dependencies manually.\n\n\
             {section}\n\
             Either your APT repositories are broken, or you need to run:\n\
             sudo apt update && sudo apt full-upgrade"
        )
    } else if log.contains("but it is not installable") {
        format!(
            "Packages failed to install because at least one dependency is not available in your repositories:\n\n\
             {section}\n\
             This might be fixed by enabling additional repositories or by running:\n\
             sudo apt update && sudo apt full-upgrade"
        )
    } else if log.contains("has no installation candidate") {
        format!(
            "Packages failed to install because one or more packages are not available in your repositories:\n\n\
             {section}\n\
             This might be fixed by enabling additional repositories."
        )
    } else if log.contains("is to be installed") || log.contains("Depends:") {
        format!(
            "Packages failed to install due to unmet dependencies:\n\n\
             {section}\n\
             This might be fixed by running:\n\
             sudo apt --fix-broken install"
        )
    } else {
        format!(
            "Packages failed to install due to unresolved dependency issues:\n\n\
             {section}\n\
             Try running these commands to resolve the issue:\n\
             sudo apt update\n\
             sudo apt --fix-broken install\n\
             sudo apt full-upgrade"
        )
    }
}

fn unmet_dependencies(scope: &mut Scope) -> Option<Finding> {
    let finding = enrichment::investigate_unmet(scope);
    if !finding.is_empty() {
        return Some(finding);
    }
    Some(Finding::new(Category::System, unmet_fallback(scope.log)))
}

pub fn unmet_rule() -> Rule {
    Rule::probe(
        "unmet-dependencies",
        Trigger::Any(&[UNMET_MARKER]),
        unmet_dependencies,
    )
}
