use super::line_parser::{LogLine, leading_segment};
use super::types::{
    ApexLog, DebugLevel, EventId, EventKind, IssueKind, LogEvent, LogIssue,
};

/// Exit tokens recognized for entry/exit matching
fn is_exit_token(token: &str) -> bool {
    matches!(
        token,
        "EXECUTION_FINISHED"
            | "CODE_UNIT_FINISHED"
            | "METHOD_EXIT"
            | "CONSTRUCTOR_EXIT"
            | "SYSTEM_METHOD_EXIT"
            | "DML_END"
            | "SOQL_EXECUTE_END"
            | "FLOW_START_INTERVIEW_END"
    )
}

/// Builds the rooted call tree from the ordered stream of tokenized
/// records. A stack of open events drives entry/exit matching; all
/// anomalies are collected as issues, never raised.
pub struct TreeBuilder {
    events: Vec<LogEvent>,
    stack: Vec<EventId>,
    issues: Vec<LogIssue>,
    last_stamp: u64,
    truncated: bool,
}

impl TreeBuilder {
    pub fn new() -> Self {
        let root = LogEvent::new(0, EventKind::Root, 0, String::new());
        Self {
            events: vec![root],
            stack: vec![0],
            issues: Vec::new(),
            last_stamp: 0,
            truncated: false,
        }
    }

    fn current_parent(&self) -> EventId {
        *self.stack.last().unwrap_or(&0)
    }

    fn attach(&mut self, mut event: LogEvent) -> EventId {
        let id = self.events.len();
        let parent = self.current_parent();
        event.id = id;
        event.parent = Some(parent);
        self.events[parent].children.push(id);
        self.events.push(event);
        id
    }

    /// Consume one tokenized event record
    pub fn push_event(&mut self, line_number: usize, line: &LogLine) {
        self.last_stamp = self.last_stamp.max(line.nanos);

        if let Some(kind) = EventKind::from_token(&line.token) {
            let is_entry = kind.is_entry();
            let is_fatal = kind == EventKind::FatalError;
            let mut event = LogEvent::new(0, kind, line.nanos, line.payload().to_string());
            event.line_number = line_number;
            let id = self.attach(event);
            if is_entry {
                self.stack.push(id);
            }
            if is_fatal {
                self.issues.push(LogIssue {
                    kind: IssueKind::FatalError,
                    summary: "Fatal error".to_string(),
                    description: line.payload().to_string(),
                    start_time: Some(line.nanos),
                });
            }
        } else if is_exit_token(&line.token) {
            self.close_entry(line_number, line);
        } else {
            // Unsupported type: keep the raw line as a leaf event
            let mut event = LogEvent::new(
                0,
                EventKind::Unsupported(line.token.clone()),
                line.nanos,
                line.payload().to_string(),
            );
            event.line_number = line_number;
            self.attach(event);
            self.issues.push(LogIssue {
                kind: IssueKind::UnsupportedType,
                summary: format!("Unsupported event type {}", line.token),
                description: line.payload().to_string(),
                start_time: Some(line.nanos),
            });
        }
    }

    /// Match an exit record against the open-event stack. The deepest
    /// open event expecting this token wins; anything opened after it is
    /// force-closed at the exit's timestamp.
    fn close_entry(&mut self, line_number: usize, line: &LogLine) {
        let matched = self
            .stack
            .iter()
            .rposition(|&id| self.events[id].kind.exit_token() == Some(line.token.as_str()));

        let Some(pos) = matched else {
            log::debug!("line {}: unmatched exit {}", line_number, line.token);
            self.issues.push(LogIssue {
                kind: IssueKind::UnmatchedExit,
                summary: format!("Unexpected exit {}", line.token),
                description: format!("line {}: {}", line_number, line.payload()),
                start_time: Some(line.nanos),
            });
            return;
        };

        while self.stack.len() > pos + 1 {
            let open = self.stack.pop().expect("stack is non-empty above pos");
            self.events[open].exit_stamp = Some(line.nanos);
            self.issues.push(LogIssue {
                kind: IssueKind::UnclosedEntry,
                summary: format!("Incomplete entry {}", self.events[open].kind.label()),
                description: self.events[open].text.clone(),
                start_time: Some(self.events[open].timestamp),
            });
        }

        let id = self.stack.pop().expect("matched frame is on the stack");
        self.events[id].exit_stamp = Some(line.nanos);
    }

    /// Record a `*** Skipped N bytes ...` section
    pub fn push_skipped(&mut self, bytes: u64) {
        self.issues.push(LogIssue {
            kind: IssueKind::SkippedSection,
            summary: format!("Skipped {} bytes of detailed log", bytes),
            description: "The org truncated a section of the log".to_string(),
            start_time: Some(self.last_stamp),
        });
    }

    /// Record the maximum-size truncation marker
    pub fn push_truncated(&mut self) {
        self.truncated = true;
        self.issues.push(LogIssue {
            kind: IssueKind::UnexpectedEnd,
            summary: "Maximum debug log size reached".to_string(),
            description: "The log was cut off at the size limit".to_string(),
            start_time: Some(self.last_stamp),
        });
    }

    /// Record a line that could not be tokenized
    pub fn push_unparseable(&mut self, line_number: usize, text: &str) {
        self.issues.push(LogIssue {
            kind: IssueKind::UnparseableLine,
            summary: "Unparseable line".to_string(),
            description: format!("line {}: {}", line_number, text),
            start_time: None,
        });
    }

    /// Close the stream: force-close open entries, compute durations and
    /// namespaces, and hand over the aggregate.
    pub fn finish(mut self, size_bytes: u64, debug_levels: Vec<DebugLevel>) -> ApexLog {
        // Events still open at end-of-stream close at the last seen
        // timestamp
        let had_open = self.stack.len() > 1;
        while self.stack.len() > 1 {
            let open = self.stack.pop().expect("non-root frame");
            self.events[open].exit_stamp = Some(self.last_stamp);
            self.issues.push(LogIssue {
                kind: IssueKind::UnclosedEntry,
                summary: format!("Incomplete entry {}", self.events[open].kind.label()),
                description: self.events[open].text.clone(),
                start_time: Some(self.events[open].timestamp),
            });
        }
        if had_open && !self.truncated {
            self.issues.push(LogIssue {
                kind: IssueKind::UnexpectedEnd,
                summary: "Log ended unexpectedly".to_string(),
                description: "Events were still open at end of stream".to_string(),
                start_time: Some(self.last_stamp),
            });
        }

        self.events[0].exit_stamp = Some(self.last_stamp);

        compute_durations(&mut self.events, &mut self.issues, 0);
        tag_namespaces(&mut self.events, 0, &mut Vec::new());

        ApexLog {
            events: self.events,
            root: 0,
            size_bytes,
            duration_ns: self.last_stamp,
            issues: self.issues,
            debug_levels,
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Bottom-up total/net duration computation. Returns the node's total so
/// the parent can subtract it.
fn compute_durations(events: &mut Vec<LogEvent>, issues: &mut Vec<LogIssue>, id: EventId) -> u64 {
    let (start, end) = events[id].span();
    let total = end.saturating_sub(start);

    let children = events[id].children.clone();
    let mut children_total: u64 = 0;
    for child in children {
        children_total += compute_durations(events, issues, child);
    }

    let net = if children_total > total {
        issues.push(LogIssue {
            kind: IssueKind::NegativeNetDuration,
            summary: format!("Negative self time in {}", events[id].kind.label()),
            description: events[id].text.clone(),
            start_time: Some(start),
        });
        0
    } else {
        total - children_total
    };

    events[id].duration.total = total;
    events[id].duration.net = net;
    total
}

/// Second pass: namespace tagging. An ENTERING_MANAGED_PKG child opens a
/// scope visible to the rest of its parent's subtree; entry-like events
/// whose leading dotted segment matches an active scope get that segment
/// as their namespace. Runs after structural parsing because the scope
/// is determined by ancestor context, not token order alone.
fn tag_namespaces(events: &mut Vec<LogEvent>, id: EventId, active: &mut Vec<String>) {
    let scopes_before = active.len();
    let children = events[id].children.clone();

    for child in children {
        if events[child].kind == EventKind::ManagedPkg {
            let ns = events[child].text.trim().to_string();
            if !ns.is_empty() {
                events[child].namespace = Some(ns.clone());
                active.push(ns);
            }
            continue;
        }

        if events[child].kind.is_namespace_taggable()
            && let Some(segment) = leading_segment(&events[child].text)
            && active.iter().any(|ns| ns == segment)
        {
            events[child].namespace = Some(segment.to_string());
        }

        tag_namespaces(events, child, active);
    }

    active.truncate(scopes_before);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::line_parser::parse_event_line;

    fn feed(builder: &mut TreeBuilder, lines: &[&str]) {
        for (idx, line) in lines.iter().enumerate() {
            let parsed = parse_event_line(line).unwrap();
            builder.push_event(idx + 1, &parsed);
        }
    }

    #[test]
    fn test_entry_exit_durations() {
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &[
                "09:00:00.0 (100)|METHOD_ENTRY|[1]|id|Outer.run()",
                "09:00:00.0 (200)|METHOD_ENTRY|[2]|id|Inner.step()",
                "09:00:00.0 (500)|METHOD_EXIT|[2]|id|Inner.step()",
                "09:00:00.0 (1000)|METHOD_EXIT|[1]|id|Outer.run()",
            ],
        );
        let log = builder.finish(0, Vec::new());

        let outer = log.event(log.top_level()[0]);
        assert_eq!(outer.timestamp, 100);
        assert_eq!(outer.exit_stamp, Some(1000));
        assert_eq!(outer.duration.total, 900);
        // net = 900 - inner's 300
        assert_eq!(outer.duration.net, 600);

        let inner = log.event(outer.children[0]);
        assert_eq!(inner.duration.total, 300);
        assert_eq!(inner.duration.net, 300);
        assert_eq!(inner.parent, Some(outer.id));
        assert!(log.issues.is_empty());
    }

    #[test]
    fn test_children_sorted_and_non_overlapping() {
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &[
                "09:00:00.0 (0)|CODE_UNIT_STARTED|[EXTERNAL]|Anon",
                "09:00:00.0 (10)|METHOD_ENTRY|[1]|id|A.a()",
                "09:00:00.0 (20)|METHOD_EXIT|[1]|id|A.a()",
                "09:00:00.0 (30)|METHOD_ENTRY|[2]|id|B.b()",
                "09:00:00.0 (40)|METHOD_EXIT|[2]|id|B.b()",
                "09:00:00.0 (50)|CODE_UNIT_FINISHED|Anon",
            ],
        );
        let log = builder.finish(0, Vec::new());

        let unit = log.event(log.top_level()[0]);
        let spans: Vec<(u64, u64)> = unit
            .children
            .iter()
            .map(|&c| log.event(c).span())
            .collect();
        assert_eq!(spans, vec![(10, 20), (30, 40)]);
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "siblings must not overlap");
        }
    }

    #[test]
    fn test_unmatched_exit_reported_and_ignored() {
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &["09:00:00.0 (100)|METHOD_EXIT|[1]|id|Nobody.home()"],
        );
        let log = builder.finish(0, Vec::new());

        assert!(log.top_level().is_empty());
        assert_eq!(log.issues.len(), 1);
        assert_eq!(log.issues[0].kind, IssueKind::UnmatchedExit);
    }

    #[test]
    fn test_unclosed_entry_closed_at_last_stamp() {
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &[
                "09:00:00.0 (100)|METHOD_ENTRY|[1]|id|Open.forever()",
                "09:00:00.0 (400)|USER_DEBUG|[2]|DEBUG|still here",
            ],
        );
        let log = builder.finish(0, Vec::new());

        let open = log.event(log.top_level()[0]);
        assert_eq!(open.exit_stamp, Some(400));
        assert!(
            log.issues
                .iter()
                .any(|i| i.kind == IssueKind::UnclosedEntry)
        );
        assert!(
            log.issues
                .iter()
                .any(|i| i.kind == IssueKind::UnexpectedEnd)
        );
    }

    #[test]
    fn test_mismatched_exit_force_closes_inner() {
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &[
                "09:00:00.0 (0)|CODE_UNIT_STARTED|[EXTERNAL]|Anon",
                "09:00:00.0 (10)|METHOD_ENTRY|[1]|id|A.a()",
                "09:00:00.0 (90)|CODE_UNIT_FINISHED|Anon",
            ],
        );
        let log = builder.finish(0, Vec::new());

        let unit = log.event(log.top_level()[0]);
        assert_eq!(unit.exit_stamp, Some(90));
        let method = log.event(unit.children[0]);
        assert_eq!(method.exit_stamp, Some(90));
        assert!(
            log.issues
                .iter()
                .any(|i| i.kind == IssueKind::UnclosedEntry)
        );
    }

    #[test]
    fn test_namespace_tagging_inside_scope() {
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &[
                "09:00:00.0 (0)|CODE_UNIT_STARTED|[EXTERNAL]|Anon",
                "09:00:00.0 (10)|ENTERING_MANAGED_PKG|acme",
                "09:00:00.0 (20)|METHOD_ENTRY|[1]|id|acme.Billing.run()",
                "09:00:00.0 (30)|METHOD_ENTRY|[2]|id|Local.helper()",
                "09:00:00.0 (40)|METHOD_EXIT|[2]|id|Local.helper()",
                "09:00:00.0 (50)|METHOD_EXIT|[1]|id|acme.Billing.run()",
                "09:00:00.0 (60)|CODE_UNIT_FINISHED|Anon",
            ],
        );
        let log = builder.finish(0, Vec::new());

        let unit = log.event(log.top_level()[0]);
        let managed = log.event(unit.children[1]);
        assert_eq!(managed.namespace.as_deref(), Some("acme"));
        let local = log.event(managed.children[0]);
        assert_eq!(local.namespace, None);
    }

    #[test]
    fn test_namespace_not_visible_outside_boundary() {
        // The acme scope lives inside the first code unit; the second
        // code unit's method must not pick it up.
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &[
                "09:00:00.0 (0)|CODE_UNIT_STARTED|[EXTERNAL]|First",
                "09:00:00.0 (10)|ENTERING_MANAGED_PKG|acme",
                "09:00:00.0 (20)|CODE_UNIT_FINISHED|First",
                "09:00:00.0 (30)|CODE_UNIT_STARTED|[EXTERNAL]|Second",
                "09:00:00.0 (40)|METHOD_ENTRY|[1]|id|acme.Billing.run()",
                "09:00:00.0 (50)|METHOD_EXIT|[1]|id|acme.Billing.run()",
                "09:00:00.0 (60)|CODE_UNIT_FINISHED|Second",
            ],
        );
        let log = builder.finish(0, Vec::new());

        let second = log.event(log.top_level()[1]);
        let method = log.event(second.children[0]);
        assert_eq!(method.namespace, None);
    }

    #[test]
    fn test_unsupported_type_kept_as_raw_event() {
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &["09:00:00.0 (100)|HEAP_ALLOCATE|[5]|Bytes:12"],
        );
        let log = builder.finish(0, Vec::new());

        let event = log.event(log.top_level()[0]);
        assert_eq!(
            event.kind,
            EventKind::Unsupported("HEAP_ALLOCATE".to_string())
        );
        assert_eq!(log.issues.len(), 1);
        assert_eq!(log.issues[0].kind, IssueKind::UnsupportedType);
    }

    #[test]
    fn test_fatal_error_becomes_issue() {
        let mut builder = TreeBuilder::new();
        feed(
            &mut builder,
            &["09:00:00.0 (100)|FATAL_ERROR|System.LimitException: Too many SOQL queries"],
        );
        let log = builder.finish(0, Vec::new());

        assert_eq!(log.issues.len(), 1);
        assert_eq!(log.issues[0].kind, IssueKind::FatalError);
        assert_eq!(log.issues[0].start_time, Some(100));
    }
}
