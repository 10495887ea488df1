use crate::*;

#[derive(Debug, Clone)]
pub struct TestIssue {
    severity: Severity,
    hint: bool,
}

impl Display for TestIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} issue", self.severity)
    }
}

impl Diagnostic for TestIssue {
    fn severity(&self) -> Severity {
        self.severity
    }

    fn help(&self) -> Option<Box<dyn Display>> {
        if self.hint {
            Some(Box::new("rename the chip") as Box<dyn Display>)
        } else {
            None
        }
    }
}

impl From<Severity> for TestIssue {
    fn from(severity: Severity) -> Self {
        Self {
            severity,
            hint: false,
        }
    }
}

#[test]
fn issue_set_counters() {
    let mut issues: IssueSet<TestIssue> = IssueSet::new();
    issues.add(Severity::Info.into());
    assert_eq!(issues.count(Severity::Info), 1);
    assert!(!issues.has_error());
    assert!(!issues.has_warning());
    assert_eq!(issues.worst(), Some(Severity::Info));
    issues.add(Severity::Warning.into());
    issues.add(Severity::Warning.into());
    assert_eq!(issues.num_warnings(), 2);
    assert_eq!(issues.worst(), Some(Severity::Warning));
    issues.add(Severity::Error.into());
    assert_eq!(issues.num_errors(), 1);
    assert!(issues.has_error());
    assert_eq!(issues.worst(), Some(Severity::Error));
    assert_eq!(issues.len(), 4);
    assert_eq!(issues.with_severity(Severity::Warning).count(), 2);
}

#[test]
fn empty_set_has_no_worst_severity() {
    let issues: IssueSet<TestIssue> = IssueSet::default();
    assert!(issues.is_empty());
    assert_eq!(issues.worst(), None);
    assert!(issues.into_result().is_ok());
}

#[test]
fn append_and_collect_keep_counts() {
    let mut a: IssueSet<TestIssue> = [Severity::Warning, Severity::Info]
        .into_iter()
        .map(TestIssue::from)
        .collect();
    let b: IssueSet<TestIssue> = [Severity::Error].into_iter().map(TestIssue::from).collect();
    a.append(b);
    assert_eq!(a.len(), 3);
    assert_eq!(a.num_errors(), 1);
    assert!(a.into_result().is_err());
}

#[test]
fn severities_are_ordered() {
    assert!(Severity::Error > Severity::Warning);
    assert!(Severity::Warning > Severity::Info);
    assert_eq!(Severity::default(), Severity::Warning);
}

#[test]
fn severity_as_tracing_level() {
    assert_eq!(Severity::Info.as_tracing_level(), tracing::Level::INFO);
    assert_eq!(Severity::Warning.as_tracing_level(), tracing::Level::WARN);
    assert_eq!(Severity::Error.as_tracing_level(), tracing::Level::ERROR);
}

#[test_log::test]
fn display_includes_help() {
    let mut issues = IssueSet::new();
    issues.add(TestIssue {
        severity: Severity::Error,
        hint: true,
    });
    issues.log();
    let text = issues.to_string();
    assert_eq!(text, "error: error issue\n  help: rename the chip\n");
}
