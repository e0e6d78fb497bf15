// Check framework: check metadata, the enabled-check registry and the
// hierarchical record of check outcomes produced while handling a request

pub mod trace_checks;

use std::collections::HashSet;
use std::fmt::{self, Write};

use serde::Serialize;
use tracing::{debug, warn};

/// Static description of a check.
/// Checks are unit structs; their `check` functions take a `CheckOutcome`
/// to report failures into, plus whatever input the check needs.
pub trait Check {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    const DEFAULT_ENABLED: bool = true;
}

/// Serializable summary of a check, used by the `/test/checks` endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CheckInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub default_enabled: bool,
}

impl CheckInfo {
    pub fn of<C: Check>() -> Self {
        Self {
            name: C::NAME,
            description: C::DESCRIPTION,
            default_enabled: C::DEFAULT_ENABLED,
        }
    }
}

/// Every check the agent knows about, in execution order
pub fn registered_checks() -> Vec<CheckInfo> {
    use crate::span_validation::{SpanTagRulesCheck, SpanTagValidation};
    use trace_checks::*;

    vec![
        CheckInfo::of::<TraceCountHeader>(),
        CheckInfo::of::<MetaTracerVersionHeader>(),
        CheckInfo::of::<TraceContentLength>(),
        CheckInfo::of::<TraceStall>(),
        CheckInfo::of::<HttpSpanStructure>(),
        CheckInfo::of::<SpanTagValidation>(),
        CheckInfo::of::<SpanTagRulesCheck>(),
    ]
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of running one check: its name and the failures it reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub failures: Vec<String>,
}

impl CheckOutcome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failures: Vec::new(),
        }
    }

    /// Records a failure. A check may fail more than once.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message: String = message.into();
        debug!(check = %self.name, "check failed: {}", message);
        self.failures.push(message);
    }

    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameItem {
    Check(CheckOutcome),
    Frame(Frame),
}

/// Named group of outcomes and nested frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub name: String,
    pub items: Vec<FrameItem>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Opens a child frame and returns it for recording
    pub fn add_frame(&mut self, name: impl Into<String>) -> &mut Frame {
        self.items.push(FrameItem::Frame(Frame::new(name)));
        match self.items.last_mut() {
            Some(FrameItem::Frame(frame)) => frame,
            _ => unreachable!("frame was just pushed"),
        }
    }

    /// Registers a check outcome in this frame and returns it for recording
    pub fn add_check(&mut self, name: impl Into<String>) -> &mut CheckOutcome {
        self.items.push(FrameItem::Check(CheckOutcome::new(name)));
        match self.items.last_mut() {
            Some(FrameItem::Check(outcome)) => outcome,
            _ => unreachable!("check was just pushed"),
        }
    }

    pub fn has_fails(&self) -> bool {
        self.items.iter().any(|item: &FrameItem| match item {
            FrameItem::Check(outcome) => outcome.failed(),
            FrameItem::Frame(frame) => frame.has_fails(),
        })
    }

    /// All failed outcomes in this frame and below, depth first
    pub fn failed_checks(&self) -> Vec<&CheckOutcome> {
        let mut failed: Vec<&CheckOutcome> = Vec::new();
        self.collect_failed(&mut failed);
        failed
    }

    fn collect_failed<'a>(&'a self, failed: &mut Vec<&'a CheckOutcome>) {
        for item in &self.items {
            match item {
                FrameItem::Check(outcome) if outcome.failed() => failed.push(outcome),
                FrameItem::Check(_) => {}
                FrameItem::Frame(frame) => frame.collect_failed(failed),
            }
        }
    }

    fn render(&self, depth: usize, out: &mut String) -> fmt::Result {
        let indent: String = "  ".repeat(depth);
        writeln!(out, "{indent}{}", self.name)?;
        for item in &self.items {
            match item {
                FrameItem::Frame(frame) => frame.render(depth + 1, out)?,
                FrameItem::Check(outcome) => {
                    let status: &str = if outcome.failed() { "FAILED" } else { "passed" };
                    writeln!(out, "{indent}  - {} {status}", outcome.name)?;
                    for failure in &outcome.failures {
                        writeln!(out, "{indent}      {failure}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out: String = String::new();
        self.render(0, &mut out)?;
        f.write_str(&out)
    }
}

/// Record of every check run while handling one request
pub type CheckTrace = Frame;

// =============================================================================
// REGISTRY
// =============================================================================

/// The set of checks enabled for this agent
#[derive(Debug, Clone)]
pub struct Checks {
    enabled: HashSet<String>,
}

impl Checks {
    /// Builds the registry from an explicit list of check names.
    /// `None` enables every check that is on by default.
    pub fn new(enabled: Option<&[String]>) -> Self {
        let known: Vec<CheckInfo> = registered_checks();

        let enabled: HashSet<String> = match enabled {
            Some(names) => {
                for name in names {
                    if !known.iter().any(|info: &CheckInfo| info.name == name.as_str()) {
                        warn!("Unknown check '{}' in enabled checks, ignoring", name);
                    }
                }
                names.iter().cloned().collect()
            }
            None => known
                .iter()
                .filter(|info: &&CheckInfo| info.default_enabled)
                .map(|info: &CheckInfo| info.name.to_string())
                .collect(),
        };

        Self { enabled }
    }

    pub fn is_enabled<C: Check>(&self) -> bool {
        self.enabled.contains(C::NAME)
    }

    pub fn is_enabled_by_name(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// Names of the enabled checks, in no particular order
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }

    /// Runs `check` into a new outcome in `frame` when `C` is enabled
    pub fn run<C, F>(&self, frame: &mut Frame, check: F)
    where
        C: Check,
        F: FnOnce(&mut CheckOutcome),
    {
        if !self.is_enabled::<C>() {
            debug!("Check '{}' is disabled, skipping", C::NAME);
            return;
        }
        check(frame.add_check(C::NAME));
    }
}

impl Default for Checks {
    fn default() -> Self {
        Self::new(None)
    }
}
