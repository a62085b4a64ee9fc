//! Rule catalogs - ordered pattern-to-finding tables
//!
//! Every backend runs one ordered list of [`Rule`]s through [`evaluate`]:
//! - every rule is tested against the full log, there is no early exit
//! - a match appends its caption(s) to the diagnosis
//! - a match with a category overwrites the category (last match wins)
//!
//! Catalogs are assembled by [`catalog`] from the backend-specific tables
//! and the shared tail every backend ends with.

pub mod apt;
pub mod generic;
pub mod pacman;
pub mod passthrough;
pub mod shared;

use crate::backend::{Backend, BackendKind};
use crate::command_exec::CommandRunner;
use crate::diagnosis::{Category, Diagnosis};
use crate::enrichment::Appendix;
use crate::host::HostInfo;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use tracing::{debug, warn};

/// Compiled trigger patterns, keyed by source
static PATTERN_CACHE: LazyLock<Mutex<HashMap<&'static str, Option<Regex>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Compile (once) and return a catalog pattern
pub fn pattern(source: &'static str) -> Option<Regex> {
    let mut cache = match PATTERN_CACHE.lock() {
        Ok(cache) => cache,
        Err(poisoned) => poisoned.into_inner(),
    };
    cache
        .entry(source)
        .or_insert_with(|| match Regex::new(source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("invalid rule pattern {:?}: {}", source, e);
                None
            }
        })
        .clone()
}

/// First capture group of `source` in `text`
pub fn capture(source: &'static str, text: &str) -> Option<String> {
    pattern(source)?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Everything a rule may look at while it runs
pub struct Scope<'a> {
    /// Full log text
    pub log: &'a str,
    /// Host facts
    pub host: &'a HostInfo,
    /// Backend capabilities
    pub backend: Backend,
    /// External command seam
    pub runner: &'a dyn CommandRunner,
    /// Whether live package-manager queries are allowed
    pub enrich: bool,
    /// Diagnosis built so far
    pub diagnosis: Diagnosis,
    /// Raw query output for developers
    pub appendix: Appendix,
}

impl<'a> Scope<'a> {
    pub fn new(
        log: &'a str,
        host: &'a HostInfo,
        backend: Backend,
        runner: &'a dyn CommandRunner,
        enrich: bool,
    ) -> Self {
        Self {
            log,
            host,
            backend,
            runner,
            enrich,
            diagnosis: Diagnosis::new(),
            appendix: Appendix::default(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.log.contains(needle)
    }

    fn apply(&mut self, finding: Finding) {
        for caption in finding.captions {
            self.diagnosis.note(caption);
        }
        if let Some(category) = finding.category {
            self.diagnosis.set_category(category);
        }
    }
}

/// Output of a probe: captions plus an optional category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finding {
    pub captions: Vec<String>,
    pub category: Option<Category>,
}

impl Finding {
    pub fn new(category: Category, caption: impl Into<String>) -> Self {
        Self {
            captions: vec![caption.into()],
            category: Some(category),
        }
    }

    /// Caption that leaves the category alone
    pub fn note(caption: impl Into<String>) -> Self {
        Self {
            captions: vec![caption.into()],
            category: None,
        }
    }

    /// Add another caption and take its category
    pub fn push(&mut self, category: Category, caption: impl Into<String>) {
        self.captions.push(caption.into());
        self.category = Some(category);
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    /// `Some(self)` when anything was found
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// When a rule applies
#[derive(Clone, Copy)]
pub enum Trigger {
    /// Any of the substrings occurs in the log
    Any(&'static [&'static str]),
    /// Every substring occurs in the log
    All(&'static [&'static str]),
    /// Regular expression matches the log
    Pattern(&'static str),
    /// Host-state check, independent of the log
    Host(fn(&HostInfo) -> bool),
    /// Anything else
    When(fn(&Scope) -> bool),
}

impl Trigger {
    pub fn matches(&self, scope: &Scope) -> bool {
        match self {
            Self::Any(needles) => needles.iter().any(|n| scope.log.contains(n)),
            Self::All(needles) => needles.iter().all(|n| scope.log.contains(n)),
            Self::Pattern(source) => pattern(source)
                .map(|re| re.is_match(scope.log))
                .unwrap_or(false),
            Self::Host(check) => check(scope.host),
            Self::When(check) => check(scope),
        }
    }
}

/// What a matching rule contributes
#[derive(Clone, Copy)]
pub enum Action {
    /// Fixed caption
    Caption(Category, &'static str),
    /// Caption interpolated from the scope
    Render(Category, fn(&Scope) -> String),
    /// May run commands and may find nothing
    Probe(fn(&mut Scope) -> Option<Finding>),
}

/// One catalog entry
#[derive(Clone, Copy)]
pub struct Rule {
    /// Stable identifier, unique within a catalog
    pub id: &'static str,
    pub trigger: Trigger,
    pub action: Action,
}

impl Rule {
    pub const fn caption(
        id: &'static str,
        trigger: Trigger,
        category: Category,
        text: &'static str,
    ) -> Self {
        Self {
            id,
            trigger,
            action: Action::Caption(category, text),
        }
    }

    pub const fn render(
        id: &'static str,
        trigger: Trigger,
        category: Category,
        render: fn(&Scope) -> String,
    ) -> Self {
        Self {
            id,
            trigger,
            action: Action::Render(category, render),
        }
    }

    pub const fn probe(
        id: &'static str,
        trigger: Trigger,
        probe: fn(&mut Scope) -> Option<Finding>,
    ) -> Self {
        Self {
            id,
            trigger,
            action: Action::Probe(probe),
        }
    }

    /// Regex sources used by this rule's trigger
    pub fn pattern_source(&self) -> Option<&'static str> {
        match self.trigger {
            Trigger::Pattern(source) => Some(source),
            _ => None,
        }
    }
}

/// Run every rule in order against the scope
pub fn evaluate(rules: &[Rule], scope: &mut Scope) {
    for rule in rules {
        if !rule.trigger.matches(scope) {
            continue;
        }
        let finding = match rule.action {
            Action::Caption(category, text) => Some(Finding::new(category, text)),
            Action::Render(category, render) => Some(Finding::new(category, render(scope))),
            Action::Probe(probe) => probe(scope),
        };
        match finding {
            Some(finding) => {
                debug!(
                    "rule {} matched: {} caption(s), category {:?}",
                    rule.id,
                    finding.captions.len(),
                    finding.category.map(|c| c.as_str())
                );
                scope.apply(finding);
            }
            None => debug!("rule {} triggered without a finding", rule.id),
        }
    }
}

/// Full ordered catalog for a backend
pub fn catalog(kind: BackendKind) -> Vec<Rule> {
    let mut rules = match kind {
        BackendKind::Apt => apt::rules(),
        BackendKind::Pacman => pacman::rules(),
        BackendKind::Generic => generic::rules(),
    };
    rules.extend(shared::rules());
    if kind == BackendKind::Apt {
        rules.push(apt::release_notice());
    }
    rules.extend(passthrough::user_error_rules());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::NullRunner;
    use std::collections::HashSet;
    use std::path::Path;

    fn run(rules: &[Rule], log: &str) -> Diagnosis {
        let host = HostInfo::blank(Path::new("/nonexistent-root"));
        let mut scope = Scope::new(log, &host, Backend::new(BackendKind::Generic), &NullRunner, false);
        evaluate(rules, &mut scope);
        scope.diagnosis
    }

    const FIRST: Rule = Rule::caption("first", Trigger::Any(&["alpha"]), Category::System, "A");
    const SECOND: Rule = Rule::caption("second", Trigger::Pattern(r"be+ta"), Category::Internet, "B");
    const SILENT: Rule = Rule::probe("silent", Trigger::Any(&["alpha"]), |_| None);

    #[test]
    fn test_all_matches_contribute_last_category_wins() {
        let d = run(&[FIRST, SILENT, SECOND], "alpha and beeeta");
        assert_eq!(d.captions, vec!["A", "B"]);
        assert_eq!(d.category, Category::Internet);

        let d = run(&[SECOND, FIRST], "alpha and beta");
        assert_eq!(d.captions, vec!["B", "A"]);
        assert_eq!(d.category, Category::System);
    }

    #[test]
    fn test_probe_without_finding_changes_nothing() {
        let d = run(&[SILENT], "alpha");
        assert!(d.captions.is_empty());
        assert!(d.is_unset());
    }

    #[test]
    fn test_all_trigger_needs_every_needle() {
        let rule = Rule::caption("both", Trigger::All(&["x1", "y2"]), Category::Package, "C");
        assert!(run(&[rule], "x1 only").captions.is_empty());
        assert_eq!(run(&[rule], "x1 and y2").captions, vec!["C"]);
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let rule = Rule::caption("bad", Trigger::Pattern("(unclosed"), Category::System, "X");
        assert!(run(&[rule], "(unclosed").captions.is_empty());
    }

    #[test]
    fn test_every_catalog_pattern_compiles_and_ids_unique() {
        for kind in [BackendKind::Apt, BackendKind::Pacman, BackendKind::Generic] {
            let rules = catalog(kind);
            let mut ids = HashSet::new();
            for rule in &rules {
                assert!(ids.insert(rule.id), "duplicate rule id {} in {}", rule.id, kind);
                if let Some(source) = rule.pattern_source() {
                    assert!(Regex::new(source).is_ok(), "rule {} pattern does not compile", rule.id);
                }
            }
        }
    }

    #[test]
    fn test_catalogs_end_with_user_error_passthroughs() {
        for kind in [BackendKind::Apt, BackendKind::Pacman, BackendKind::Generic] {
            let rules = catalog(kind);
            let tail: Vec<&str> = rules.iter().rev().take(2).map(|r| r.id).collect();
            assert_eq!(tail, vec!["user-error-reporting-allowed", "user-error"]);
        }
    }
}
