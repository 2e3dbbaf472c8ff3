//! Pattern scoring of a single response.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::cases::EvalCase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Required,
    Forbidden,
}

/// Result of one pattern against one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub kind: CheckKind,
    pub pattern: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Score {
    pub passed: bool,
    pub checks: Vec<CheckOutcome>,
}

/// A case with its patterns compiled once.
#[derive(Debug, Clone)]
pub struct CompiledCase {
    pub case: EvalCase,
    required: Vec<Regex>,
    forbidden: Vec<Regex>,
}

impl CompiledCase {
    pub fn compile(case: EvalCase) -> Result<Self, regex::Error> {
        Ok(Self {
            required: compile_all(case.required)?,
            forbidden: compile_all(case.forbidden)?,
            case,
        })
    }

    /// Passes iff every required pattern matches and no forbidden one does.
    pub fn score(&self, response: &str) -> Score {
        let mut checks = Vec::with_capacity(self.required.len() + self.forbidden.len());

        for re in &self.required {
            checks.push(CheckOutcome {
                kind: CheckKind::Required,
                pattern: re.as_str().to_string(),
                passed: re.is_match(response),
            });
        }
        for re in &self.forbidden {
            checks.push(CheckOutcome {
                kind: CheckKind::Forbidden,
                pattern: re.as_str().to_string(),
                passed: !re.is_match(response),
            });
        }

        Score {
            passed: checks.iter().all(|c| c.passed),
            checks,
        }
    }
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect()
}
