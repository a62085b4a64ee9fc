//! Text preprocessing for captured install logs.
//!
//! Terminal output carries cursor movement, colour codes and wget-style
//! progress bars. All of it is removed before a log is stored or uploaded.

use regex::Regex;
use std::sync::LazyLock;

/// Escape sequence shapes, applied in order
static ESCAPE_PASSES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\x1b\[?[0-9;]*[a-zA-Z]").unwrap(),
        Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap(),
        Regex::new(r"\x1b\[[0-9;]*").unwrap(),
        // Lone escape bytes left behind by truncated sequences
        Regex::new(r"\x1b").unwrap(),
    ]
});

/// wget dot progress: `.......... .......... .......... .......... .........`
static PROGRESS_BAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{10} \.{10} \.{10} \.{10} \.{9}").unwrap());

/// Remove terminal control sequences.
///
/// Carriage returns become newlines so that progress output overwritten in a
/// terminal shows up as separate lines.
pub fn strip_ansi(text: &str) -> String {
    let mut out = text.replace('\r', "\n");
    for pass in ESCAPE_PASSES.iter() {
        out = pass.replace_all(&out, "").into_owned();
    }
    out
}

/// Drop lines that are pure download-progress noise
pub fn drop_progress_lines(text: &str) -> String {
    let kept: Vec<&str> = text
        .split('\n')
        .filter(|line| !PROGRESS_BAR.is_match(line))
        .collect();
    kept.join("\n")
}

/// Full cleanup pass used by the formatter
pub fn clean_log(text: &str) -> String {
    drop_progress_lines(&strip_ansi(text))
}
