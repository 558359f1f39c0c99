//! Line-based splitting of an over-budget body.
//!
//! The budget of each chunk depends on the heading that precedes it, and
//! lines are never broken.

use std::iter::Peekable;
use std::vec::IntoIter;

use crate::pipeline::autolink::AutoLinkEstimator;
use crate::pipeline::builder::{budget, escape};

/// One post worth of body lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Escaped heading: the preamble for the first chunk, then
    /// `continued: <subject>`.
    pub heading: String,
    /// Escaped lines, each terminated by `\n`.
    pub body: String,
}

impl Chunk {
    pub fn text(&self) -> String {
        format!("{}```{}```", self.heading, self.body)
    }
}

/// Lazily packs lines into chunks.
///
/// Each line costs its escaped length plus its auto-link inflation plus one
/// for the newline, and a chunk takes lines while the running total stays
/// strictly below its budget. A line that does not fit an empty chunk is
/// emitted alone, untruncated.
pub struct Chunker<'e> {
    lines: Peekable<IntoIter<String>>,
    estimator: &'e AutoLinkEstimator,
    heading: String,
    budget: usize,
    continued_heading: String,
    continued_budget: usize,
}

impl<'e> Chunker<'e> {
    pub fn new(
        body: &str,
        preamble: &str,
        subject: &str,
        limit: usize,
        estimator: &'e AutoLinkEstimator,
    ) -> Self {
        let continued = format!("continued: {subject}\n");
        Self {
            lines: body
                .lines()
                .map(str::to_owned)
                .collect::<Vec<_>>()
                .into_iter()
                .peekable(),
            estimator,
            heading: escape(preamble),
            budget: budget(limit, preamble, estimator),
            continued_heading: escape(&continued),
            continued_budget: budget(limit, &continued, estimator),
        }
    }
}

fn line_cost(line: &str, estimator: &AutoLinkEstimator) -> usize {
    escape(line).chars().count() + estimator.inflation(line) + 1
}

impl Iterator for Chunker<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let mut lines: Vec<String> = Vec::new();
        let mut used = 0;

        let estimator = self.estimator;
        while let Some(line) = self.lines.peek() {
            let cost = line_cost(line, estimator);
            let fits = used + cost < self.budget;
            if !fits && !lines.is_empty() {
                break;
            }
            used += cost;
            lines.extend(self.lines.next().map(|line| escape(&line)));
            if !fits {
                break;
            }
        }

        if lines.is_empty() {
            return None;
        }

        let heading = std::mem::replace(&mut self.heading, self.continued_heading.clone());
        self.budget = self.continued_budget;

        let mut body = lines.join("\n");
        body.push('\n');
        Some(Chunk { heading, body })
    }
}
