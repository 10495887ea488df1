//! Collections of severity-tagged issues.
//!
//! Checks over a design produce many independent findings. Rather than
//! stopping at the first one, checkers push every finding into an
//! [`IssueSet`] and callers decide what is fatal.

#![warn(missing_docs)]

#[cfg(test)]
pub(crate) mod tests;

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

/// An issue that should be reported to users.
pub trait Diagnostic: Debug + Display {
    /// An optional hint describing how to resolve the issue.
    fn help(&self) -> Option<Box<dyn Display>> {
        None
    }

    /// The severity of this issue.
    ///
    /// The default implementation returns [`Severity::default`].
    fn severity(&self) -> Severity {
        Default::default()
    }
}

/// Severity levels, ordered from least to most severe.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning. The operation went ahead, possibly with a fallback.
    #[default]
    Warning,
    /// An error. The affected data is inconsistent or was rejected.
    Error,
}

impl Severity {
    const ALL: [Severity; 3] = [Severity::Info, Severity::Warning, Severity::Error];

    #[inline]
    const fn index(&self) -> usize {
        match *self {
            Self::Info => 0,
            Self::Warning => 1,
            Self::Error => 2,
        }
    }

    /// Returns the log level corresponding to this severity.
    #[inline]
    pub const fn as_tracing_level(&self) -> tracing::Level {
        match *self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Returns `true` if the severity is [`Severity::Error`].
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(*self, Self::Error)
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A collection of issues with running counts per severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    counts: [usize; 3],
}

impl<T> IssueSet<T> {
    /// Creates a new, empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            counts: [0; 3],
        }
    }

    /// Returns an iterator over all issues, in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    /// The number of issues in this set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if this set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// The number of issues with the given severity.
    #[inline]
    pub fn count(&self, severity: Severity) -> usize {
        self.counts[severity.index()]
    }

    /// The number of errors in this set.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.count(Severity::Error)
    }

    /// The number of warnings in this set.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Returns `true` if this set contains an error.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.num_errors() > 0
    }

    /// Returns `true` if this set contains a warning.
    #[inline]
    pub fn has_warning(&self) -> bool {
        self.num_warnings() > 0
    }

    /// The highest severity present, or [`None`] if the set is empty.
    pub fn worst(&self) -> Option<Severity> {
        Severity::ALL
            .iter()
            .rev()
            .copied()
            .find(|s| self.count(*s) > 0)
    }
}

impl<T: Diagnostic> IssueSet<T> {
    /// Adds the given issue to the set.
    #[inline]
    pub fn add(&mut self, issue: T) {
        self.counts[issue.severity().index()] += 1;
        self.issues.push(issue);
    }

    /// Moves every issue from `other` into this set.
    pub fn append(&mut self, other: IssueSet<T>) {
        for issue in other {
            self.add(issue);
        }
    }

    /// Iterates over the issues with exactly the given severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &T> {
        self.issues
            .iter()
            .filter(move |issue| issue.severity() == severity)
    }

    /// Emits one tracing event per issue at the level matching its severity.
    pub fn log(&self) {
        for issue in self.issues.iter() {
            match issue.severity() {
                Severity::Info => tracing::info!("{issue}"),
                Severity::Warning => tracing::warn!("{issue}"),
                Severity::Error => tracing::error!("{issue}"),
            }
        }
    }

    /// Returns `Ok(self)` if there are no errors, or `Err(self)` otherwise.
    pub fn into_result(self) -> Result<Self, Self> {
        if self.has_error() {
            Err(self)
        } else {
            Ok(self)
        }
    }
}

impl<T: Diagnostic> Extend<T> for IssueSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for issue in iter {
            self.add(issue);
        }
    }
}

impl<T: Diagnostic> FromIterator<T> for IssueSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = <std::vec::Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Diagnostic> Display for IssueSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{}: {}", issue.severity(), issue)?;
            if let Some(help) = issue.help() {
                writeln!(f, "  help: {}", help)?;
            }
        }
        Ok(())
    }
}
