//! Per-resource outcomes and the overall check verdict

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Severity of a degraded resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Critical,
}

/// Result of evaluating one subject (a resource or one of its containers)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Healthy {
        subject: String,
    },
    Degraded {
        subject: String,
        severity: Severity,
        reason: String,
    },
    Unknown {
        subject: String,
        reason: String,
    },
}

impl Outcome {
    pub fn healthy(subject: impl Into<String>) -> Self {
        Outcome::Healthy {
            subject: subject.into(),
        }
    }

    pub fn critical(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Outcome::Degraded {
            subject: subject.into(),
            severity: Severity::Critical,
            reason: reason.into(),
        }
    }

    pub fn warning(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Outcome::Degraded {
            subject: subject.into(),
            severity: Severity::Warning,
            reason: reason.into(),
        }
    }

    pub fn unknown(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Outcome::Unknown {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            Outcome::Healthy { subject }
            | Outcome::Degraded { subject, .. }
            | Outcome::Unknown { subject, .. } => subject,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Outcome::Healthy { .. })
    }

    /// `subject (reason)` for non-healthy outcomes
    pub fn describe(&self) -> String {
        match self {
            Outcome::Healthy { subject } => subject.clone(),
            Outcome::Degraded {
                subject, reason, ..
            }
            | Outcome::Unknown { subject, reason } => format!("{} ({})", subject, reason),
        }
    }
}

/// Monitoring status of a whole check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// Process exit code understood by monitoring agents
    pub fn exit_code(&self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Warning => write!(f, "WARNING"),
            Status::Critical => write!(f, "CRITICAL"),
            Status::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// How degraded outcomes map onto the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeverityPolicy {
    /// Every degraded outcome is critical
    #[default]
    Single,
    /// Degraded outcomes keep their own severity
    Graded,
}

/// Fixed wording of a check's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckText {
    /// Name printed in front of the status, e.g. `NodesReady`
    pub name: &'static str,
    /// Message when everything is healthy
    pub ok: &'static str,
    /// Prefix for the list of failing subjects
    pub failure: &'static str,
}

/// Final result of one check invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: Status,
    pub message: String,
    /// One entry per reported subject, in evaluation order
    pub reasons: Vec<String>,
}

impl Verdict {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            reasons: Vec::new(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::Ok, message)
    }

    /// The single output line, e.g. `NodesReady OK: All nodes are ready`
    pub fn render(&self, check: &str) -> String {
        format!("{} {}: {}", check, self.status, self.message)
    }
}

/// Fold outcomes into a verdict
///
/// Critical beats warning, warning beats unknown. Under
/// [`SeverityPolicy::Single`] every degraded outcome counts as critical.
pub fn aggregate(outcomes: &[Outcome], policy: SeverityPolicy, text: &CheckText) -> Verdict {
    let effective = |severity: Severity| match policy {
        SeverityPolicy::Single => Severity::Critical,
        SeverityPolicy::Graded => severity,
    };

    let at = |wanted: Severity| -> Vec<String> {
        outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Degraded { severity, .. } if effective(*severity) == wanted))
            .map(Outcome::describe)
            .collect()
    };

    let critical = at(Severity::Critical);
    if !critical.is_empty() {
        return failure(Status::Critical, text, critical);
    }

    let warning = at(Severity::Warning);
    if !warning.is_empty() {
        return failure(Status::Warning, text, warning);
    }

    let unknown: Vec<String> = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Unknown { .. }))
        .map(Outcome::describe)
        .collect();
    if !unknown.is_empty() {
        return Verdict {
            status: Status::Unknown,
            message: format!("Unable to determine status: {}", unknown.join(", ")),
            reasons: unknown,
        };
    }

    Verdict::ok(text.ok)
}

fn failure(status: Status, text: &CheckText, reasons: Vec<String>) -> Verdict {
    Verdict {
        status,
        message: format!("{}: {}", text.failure, reasons.join(", ")),
        reasons,
    }
}

/// Collects outcomes while tracking which requested names were seen
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    policy: SeverityPolicy,
    requested: BTreeSet<String>,
    seen: BTreeSet<String>,
    matched: usize,
    outcomes: Vec<Outcome>,
}

impl Aggregator {
    pub fn new(policy: SeverityPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Names that must be present, or the check fails
    pub fn require(mut self, names: BTreeSet<String>) -> Self {
        self.requested = names;
        self
    }

    /// Mark a resource as having passed the filter
    pub fn record(&mut self, name: &str) {
        self.matched += 1;
        self.seen.insert(name.to_string());
    }

    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.outcomes.extend(outcomes);
    }

    /// Requested names that never passed the filter
    pub fn missing(&self) -> Vec<String> {
        self.requested.difference(&self.seen).cloned().collect()
    }

    /// Produce the verdict
    ///
    /// `no_match` is the message reported as unknown when nothing passed a
    /// restrictive filter; pass `None` when an empty result is acceptable.
    pub fn finish(mut self, text: &CheckText, no_match: Option<String>) -> Verdict {
        for name in self.missing() {
            self.outcomes
                .push(Outcome::critical(name, "could not be checked"));
        }

        let verdict = aggregate(&self.outcomes, self.policy, text);
        match no_match {
            Some(message) if self.matched == 0 && verdict.status == Status::Ok => {
                Verdict::new(Status::Unknown, message)
            }
            _ => verdict,
        }
    }
}
