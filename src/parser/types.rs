use serde::{Deserialize, Serialize};

/// Stable identifier of an event in the log's arena. The root is always 0.
pub type EventId = usize;

/// The kind of a parsed log event. Entry-like kinds open a span that is
/// closed by the matching exit record; the others are instantaneous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Synthetic root owning the whole tree
    Root,
    ExecutionStarted,
    CodeUnitStarted,
    MethodEntry,
    ConstructorEntry,
    SystemMethodEntry,
    DmlBegin,
    SoqlBegin,
    FlowInterviewBegin,
    ExceptionThrown,
    FatalError,
    UserDebug,
    /// ENTERING_MANAGED_PKG namespace boundary
    ManagedPkg,
    /// Event type we do not model; the raw line is kept as text
    Unsupported(String),
}

/// Rendering category for an event. Seven fixed keys, matching the theme
/// color maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    CodeUnit,
    Workflow,
    Method,
    Flow,
    Dml,
    Soql,
    SystemMethod,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::CodeUnit,
        Category::Workflow,
        Category::Method,
        Category::Flow,
        Category::Dml,
        Category::Soql,
        Category::SystemMethod,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Category::CodeUnit => "Code Unit",
            Category::Workflow => "Workflow",
            Category::Method => "Method",
            Category::Flow => "Flow",
            Category::Dml => "DML",
            Category::Soql => "SOQL",
            Category::SystemMethod => "System Method",
        }
    }

    pub fn from_key(key: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.key() == key)
    }
}

impl EventKind {
    /// Map an entry-like or standalone event token to its kind.
    /// Exit tokens are not mapped here; they are matched against the
    /// open-event stack during tree building.
    pub fn from_token(token: &str) -> Option<EventKind> {
        Some(match token {
            "EXECUTION_STARTED" => EventKind::ExecutionStarted,
            "CODE_UNIT_STARTED" => EventKind::CodeUnitStarted,
            "METHOD_ENTRY" => EventKind::MethodEntry,
            "CONSTRUCTOR_ENTRY" => EventKind::ConstructorEntry,
            "SYSTEM_METHOD_ENTRY" => EventKind::SystemMethodEntry,
            "DML_BEGIN" => EventKind::DmlBegin,
            "SOQL_EXECUTE_BEGIN" => EventKind::SoqlBegin,
            "FLOW_START_INTERVIEW_BEGIN" => EventKind::FlowInterviewBegin,
            "EXCEPTION_THROWN" => EventKind::ExceptionThrown,
            "FATAL_ERROR" => EventKind::FatalError,
            "USER_DEBUG" => EventKind::UserDebug,
            "ENTERING_MANAGED_PKG" => EventKind::ManagedPkg,
            _ => return None,
        })
    }

    /// The exit token that closes this kind, if it opens a span
    pub fn exit_token(&self) -> Option<&'static str> {
        Some(match self {
            EventKind::ExecutionStarted => "EXECUTION_FINISHED",
            EventKind::CodeUnitStarted => "CODE_UNIT_FINISHED",
            EventKind::MethodEntry => "METHOD_EXIT",
            EventKind::ConstructorEntry => "CONSTRUCTOR_EXIT",
            EventKind::SystemMethodEntry => "SYSTEM_METHOD_EXIT",
            EventKind::DmlBegin => "DML_END",
            EventKind::SoqlBegin => "SOQL_EXECUTE_END",
            EventKind::FlowInterviewBegin => "FLOW_START_INTERVIEW_END",
            _ => return None,
        })
    }

    pub fn is_entry(&self) -> bool {
        self.exit_token().is_some()
    }

    /// Entry-like kinds whose payload text may carry a leading managed
    /// package namespace segment
    pub fn is_namespace_taggable(&self) -> bool {
        matches!(
            self,
            EventKind::MethodEntry
                | EventKind::ConstructorEntry
                | EventKind::ExceptionThrown
                | EventKind::CodeUnitStarted
        )
    }

    pub fn category(&self, text: &str) -> Category {
        match self {
            EventKind::CodeUnitStarted if text.starts_with("Workflow:") => Category::Workflow,
            EventKind::Root | EventKind::ExecutionStarted | EventKind::CodeUnitStarted => {
                Category::CodeUnit
            }
            EventKind::FlowInterviewBegin => Category::Flow,
            EventKind::DmlBegin => Category::Dml,
            EventKind::SoqlBegin => Category::Soql,
            EventKind::SystemMethodEntry | EventKind::ManagedPkg => Category::SystemMethod,
            _ => Category::Method,
        }
    }

    /// Event-type token as written in the log, used for display and
    /// type-based search
    pub fn label(&self) -> &str {
        match self {
            EventKind::Root => "ROOT",
            EventKind::ExecutionStarted => "EXECUTION_STARTED",
            EventKind::CodeUnitStarted => "CODE_UNIT_STARTED",
            EventKind::MethodEntry => "METHOD_ENTRY",
            EventKind::ConstructorEntry => "CONSTRUCTOR_ENTRY",
            EventKind::SystemMethodEntry => "SYSTEM_METHOD_ENTRY",
            EventKind::DmlBegin => "DML_BEGIN",
            EventKind::SoqlBegin => "SOQL_EXECUTE_BEGIN",
            EventKind::FlowInterviewBegin => "FLOW_START_INTERVIEW_BEGIN",
            EventKind::ExceptionThrown => "EXCEPTION_THROWN",
            EventKind::FatalError => "FATAL_ERROR",
            EventKind::UserDebug => "USER_DEBUG",
            EventKind::ManagedPkg => "ENTERING_MANAGED_PKG",
            EventKind::Unsupported(token) => token,
        }
    }
}

/// Wall time attributed to an event, in nanoseconds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EventDuration {
    /// Total wall time including children
    pub total: u64,

    /// Self time: total minus the children's totals, clamped at zero
    pub net: u64,
}

/// A node in the call tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Arena index; stable for the lifetime of the log
    pub id: EventId,

    /// Event kind
    pub kind: EventKind,

    /// Start, in nanoseconds since log start
    pub timestamp: u64,

    /// End, None if the event was never closed in the stream
    pub exit_stamp: Option<u64>,

    /// Total/net wall time
    pub duration: EventDuration,

    /// Managed package namespace active for this event, if any
    pub namespace: Option<String>,

    /// Free-form payload text (signature, SOQL text, message, ...)
    pub text: String,

    /// Source line number the event came from
    pub line_number: usize,

    /// Weak back-reference for ancestor walks; ownership flows
    /// parent -> children only
    pub parent: Option<EventId>,

    /// Children in source order, sorted by timestamp
    pub children: Vec<EventId>,
}

impl LogEvent {
    pub fn new(id: EventId, kind: EventKind, timestamp: u64, text: String) -> Self {
        Self {
            id,
            kind,
            timestamp,
            exit_stamp: None,
            duration: EventDuration::default(),
            namespace: None,
            text,
            line_number: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// The `[timestamp, exitStamp ?? timestamp]` interval
    pub fn span(&self) -> (u64, u64) {
        (self.timestamp, self.exit_stamp.unwrap_or(self.timestamp))
    }

    pub fn category(&self) -> Category {
        self.kind.category(&self.text)
    }
}

/// Severity rank of a parse issue, ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Skip,
    Unexpected,
    Error,
}

/// Kinds of parse-time anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// Line could not be tokenized; skipped
    UnparseableLine,
    /// Exit record with no matching open entry; ignored
    UnmatchedExit,
    /// Entry still open at end of stream; force-closed
    UnclosedEntry,
    /// Children's totals exceeded the parent's; net clamped to zero
    NegativeNetDuration,
    /// Event type not modeled; line retained as raw text
    UnsupportedType,
    /// `*** Skipped N bytes ...` section in the log
    SkippedSection,
    /// Log ended mid-execution (truncation or open events at EOF)
    UnexpectedEnd,
    /// FATAL_ERROR record
    FatalError,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::FatalError => Severity::Error,
            IssueKind::UnexpectedEnd | IssueKind::UnclosedEntry | IssueKind::UnmatchedExit => {
                Severity::Unexpected
            }
            IssueKind::SkippedSection => Severity::Skip,
            IssueKind::UnparseableLine
            | IssueKind::NegativeNetDuration
            | IssueKind::UnsupportedType => Severity::Info,
        }
    }
}

/// A parse-time anomaly collected on the aggregate, never thrown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogIssue {
    pub kind: IssueKind,

    /// One-line summary for lists and markers
    pub summary: String,

    /// Longer description, usually carrying the offending text
    pub description: String,

    /// Position in the log, if the issue is time-anchored
    pub start_time: Option<u64>,
}

impl LogIssue {
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

/// One debug-level setting active during capture, from the header line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLevel {
    /// e.g. "APEX_CODE"
    pub key: String,

    /// e.g. "FINEST"
    pub level: String,
}

/// Root aggregate owning the full tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApexLog {
    /// Event arena; ids index into this vector
    pub events: Vec<LogEvent>,

    /// Id of the synthetic root
    pub root: EventId,

    /// Raw log size in bytes
    pub size_bytes: u64,

    /// Total duration in nanoseconds (last seen timestamp)
    pub duration_ns: u64,

    /// Parse-time anomalies, in discovery order
    pub issues: Vec<LogIssue>,

    /// Debug-level settings from the header line
    pub debug_levels: Vec<DebugLevel>,
}

impl ApexLog {
    pub fn event(&self, id: EventId) -> &LogEvent {
        &self.events[id]
    }

    /// Children of the root, i.e. the top-level sibling sequence
    pub fn top_level(&self) -> &[EventId] {
        &self.events[self.root].children
    }

    /// Depth of every event, indexed by id. Top-level events are depth 0
    /// so the first timeline row is the outermost call sequence.
    pub fn depths(&self) -> Vec<usize> {
        let mut depths = vec![0usize; self.events.len()];
        let mut stack: Vec<(EventId, usize)> =
            self.top_level().iter().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            depths[id] = depth;
            for &child in &self.events[id].children {
                stack.push((child, depth + 1));
            }
        }
        depths
    }

    pub fn summary(&self) -> SummaryStats {
        let depths = self.depths();
        SummaryStats {
            total_events: self.events.len().saturating_sub(1),
            issue_count: self.issues.len(),
            max_depth: depths.iter().copied().max().unwrap_or(0),
            duration_ns: self.duration_ns,
            size_bytes: self.size_bytes,
        }
    }
}

/// Summary statistics about the parsed log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Number of events, excluding the synthetic root
    pub total_events: usize,

    /// Number of collected parse issues
    pub issue_count: usize,

    /// Deepest nesting level
    pub max_depth: usize,

    /// Total duration in nanoseconds
    pub duration_ns: u64,

    /// Raw log size in bytes
    pub size_bytes: u64,
}
