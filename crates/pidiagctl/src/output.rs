//! Terminal output, ASCII only

use owo_colors::OwoColorize;
use pidiag_common::{Category, Diagnosis, ReportOutcome};

/// Bracketed label shown above the captions
pub fn category_label(category: Category) -> &'static str {
    match category {
        Category::System => "[SYSTEM]",
        Category::Package => "[PACKAGE]",
        Category::Internet => "[INTERNET]",
        Category::OsReleaseNotice => "[OS RELEASE]",
        Category::Unknown | Category::Unset => "[UNKNOWN]",
    }
}

fn colored_label(category: Category) -> String {
    let label = category_label(category);
    match category {
        Category::System => label.bright_red().to_string(),
        Category::Package => label.yellow().to_string(),
        Category::Internet => label.cyan().to_string(),
        Category::OsReleaseNotice => label.bright_blue().to_string(),
        Category::Unknown | Category::Unset => label.dimmed().to_string(),
    }
}

/// Captions under a coloured category header
pub fn display_diagnosis(diagnosis: &Diagnosis) {
    println!("{}  {}", colored_label(diagnosis.category), diagnosis.category);
    if diagnosis.captions.is_empty() {
        println!("No known cause found in this log.");
    }
    for (i, caption) in diagnosis.captions.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", caption);
    }
    println!();
    if diagnosis.allows_report() {
        println!("{}", "Reporting this error is allowed.".dimmed());
    } else {
        println!(
            "{}",
            "This error is caused by your system; an error report would not help.".dimmed()
        );
    }
}

pub fn display_report_outcome(outcome: &ReportOutcome) {
    match outcome {
        ReportOutcome::Sent(m) => display_success(m),
        ReportOutcome::NotSent(m) => display_warning(m),
    }
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".bright_red(), message);
}

pub fn display_success(message: &str) {
    println!("{} {}", "[OK]".bright_green(), message);
}

pub fn display_warning(message: &str) {
    println!("{} {}", "[WARNING]".yellow(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_ascii() {
        for category in [
            Category::System,
            Category::Package,
            Category::Internet,
            Category::Unknown,
            Category::OsReleaseNotice,
        ] {
            assert!(category_label(category).is_ascii());
        }
        assert_eq!(category_label(Category::Unset), "[UNKNOWN]");
    }
}
