//! Auto-link inflation estimates.
//!
//! Slack rewrites URLs, bare domains, phone numbers and mail addresses into
//! `<...>` link markup after the message is posted, and that markup counts
//! against the per-message limit. Each [`LinkEstimator`] predicts the extra
//! characters for one kind of link; [`AutoLinkEstimator`] sums them.

use std::sync::LazyLock;

use regex::Regex;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[-\w\d:#@%/;$()~_?+=.&]*").unwrap());

static DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:[\w\d][-\w\d]+?\.)+\w{2,4}\b").unwrap());

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{3}-\d{3}-\d{4}|\d{4}-\d{3}-\d{4})\b").unwrap());

static MAILTO_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<mailto:[^>]+>").unwrap());

/// Predicts how many characters link markup will add to `text`.
pub trait LinkEstimator: Send + Sync {
    fn name(&self) -> &'static str;

    fn inflation(&self, text: &str) -> usize;
}

/// `https://x` becomes `<https://x>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlLinks;

impl LinkEstimator for UrlLinks {
    fn name(&self) -> &'static str {
        "url"
    }

    fn inflation(&self, text: &str) -> usize {
        URL.find_iter(text).count() * "<>".len()
    }
}

/// `example.com` becomes `<http://example.com|example.com>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainLinks;

impl LinkEstimator for DomainLinks {
    fn name(&self) -> &'static str {
        "domain"
    }

    fn inflation(&self, text: &str) -> usize {
        DOMAIN
            .find_iter(text)
            .map(|m| m.as_str().chars().count() + "<http://|>".len())
            .sum()
    }
}

/// `555-123-4567` becomes `<callto:555-123-4567>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneLinks;

impl LinkEstimator for PhoneLinks {
    fn name(&self) -> &'static str {
        "callto"
    }

    fn inflation(&self, text: &str) -> usize {
        PHONE.find_iter(text).count() * "<callto:>".len()
    }
}

/// `a@b.c` becomes `<mailto:a@b.c|a@b.c>`. Existing `<mailto:...>` links
/// are already expanded and cost nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailLinks;

impl LinkEstimator for MailLinks {
    fn name(&self) -> &'static str {
        "mailto"
    }

    fn inflation(&self, text: &str) -> usize {
        let stripped = MAILTO_LINK.replace_all(text, "");
        stripped
            .split_whitespace()
            .filter(|token| token.chars().position(|c| c == '@').is_some_and(|at| at > 1))
            .map(|token| token.trim_matches(|c| "<>()[]{},;:\"'".contains(c)))
            .filter(|addr| !addr.is_empty())
            .map(|addr| addr.chars().count() + "<mailto:|>".len())
            .sum()
    }
}

/// A named set of estimators whose results are summed.
pub struct AutoLinkEstimator {
    estimators: Vec<Box<dyn LinkEstimator>>,
}

impl AutoLinkEstimator {
    /// No estimators; every text inflates by zero.
    pub fn empty() -> Self {
        Self {
            estimators: Vec::new(),
        }
    }

    /// The four link kinds Slack expands.
    pub fn slack() -> Self {
        Self::empty()
            .with(UrlLinks)
            .with(DomainLinks)
            .with(PhoneLinks)
            .with(MailLinks)
    }

    pub fn with(mut self, estimator: impl LinkEstimator + 'static) -> Self {
        self.estimators.push(Box::new(estimator));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.estimators.iter().map(|e| e.name()).collect()
    }

    pub fn inflation(&self, text: &str) -> usize {
        self.estimators.iter().map(|e| e.inflation(text)).sum()
    }
}

impl Default for AutoLinkEstimator {
    fn default() -> Self {
        Self::slack()
    }
}

impl std::fmt::Debug for AutoLinkEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoLinkEstimator")
            .field("estimators", &self.names())
            .finish()
    }
}
