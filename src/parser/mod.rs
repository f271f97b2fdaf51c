mod index;
mod line_parser;
mod tree;
mod types;

pub use index::{TimestampMatch, find_event_by_timestamp};
pub use line_parser::{LogLine, RawLine, leading_segment, parse_event_line, parse_log_line};
pub use tree::TreeBuilder;
pub use types::*;

use std::fs;
use std::path::Path;

/// Parse errors that can occur while reading a log
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid line format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Single-pass parser turning raw log text into an [`ApexLog`] aggregate.
/// Individual bad lines never abort the parse; they are collected as
/// issues on the aggregate.
#[derive(Debug, Default)]
pub struct LogParser {
    line_number: usize,
}

impl LogParser {
    pub fn new() -> Self {
        Self { line_number: 0 }
    }

    /// Parse an entire log file
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> ParseResult<ApexLog> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ParseError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        self.parse_text(&text)
    }

    /// Parse raw log text
    pub fn parse_text(&mut self, text: &str) -> ParseResult<ApexLog> {
        let mut builder = TreeBuilder::new();
        let mut debug_levels = Vec::new();

        for line in text.lines() {
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            match parse_log_line(line) {
                Ok(RawLine::Event(event)) => builder.push_event(self.line_number, &event),
                Ok(RawLine::DebugHeader(levels)) => debug_levels = levels,
                Ok(RawLine::SkippedSection { bytes }) => builder.push_skipped(bytes),
                Ok(RawLine::Truncated) => builder.push_truncated(),
                Err(_) => builder.push_unparseable(self.line_number, line),
            }
        }

        Ok(builder.finish(text.len() as u64, debug_levels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_deterministic() {
        let text = "\
64.0 APEX_CODE,FINEST;DB,INFO
09:00:00.0 (0)|EXECUTION_STARTED
09:00:00.0 (100)|METHOD_ENTRY|[1]|id|A.run()
garbage line that does not tokenize
09:00:00.0 (900)|METHOD_EXIT|[1]|id|A.run()
09:00:00.0 (1000)|EXECUTION_FINISHED
";
        let first = LogParser::new().parse_text(text).unwrap();
        let second = LogParser::new().parse_text(text).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.debug_levels.len(), 2);
        assert_eq!(first.duration_ns, 1000);
        assert_eq!(first.issues.len(), 1);
        assert_eq!(first.issues[0].kind, IssueKind::UnparseableLine);
    }

    #[test]
    fn test_empty_input() {
        let log = LogParser::new().parse_text("").unwrap();
        assert!(log.top_level().is_empty());
        assert_eq!(log.duration_ns, 0);
        assert!(log.issues.is_empty());
    }
}
