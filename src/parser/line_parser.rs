use nom::{
    IResult, Parser,
    character::complete::{char, digit1, space1},
    combinator::{opt, recognize},
    sequence::delimited,
};

use super::{DebugLevel, ParseError, ParseResult};

/// One tokenized event record:
/// `HH:MM:SS.fff (nanoseconds)|EVENT_TYPE|field|field|...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Wall-clock-of-day stamp as written; display only
    pub wall_clock: String,

    /// Monotonic nanosecond offset; authoritative for all duration math
    pub nanos: u64,

    /// Raw event-type token (e.g. "METHOD_ENTRY")
    pub token: String,

    /// Remaining `|`-separated payload fields
    pub fields: Vec<String>,
}

impl LogLine {
    /// The payload text of this record: the last field for entry-like
    /// records carries the signature / SOQL text / message.
    pub fn payload(&self) -> &str {
        self.fields.last().map(String::as_str).unwrap_or("")
    }
}

/// A classified raw line from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawLine {
    /// A timestamped event record
    Event(LogLine),

    /// The debug-level header line (`64.0 APEX_CODE,FINE;...`)
    DebugHeader(Vec<DebugLevel>),

    /// `*** Skipped N bytes of detailed log`
    SkippedSection { bytes: u64 },

    /// `*** MAXIMUM DEBUG LOG SIZE REACHED ***`
    Truncated,
}

/// Parse a complete log line into a classified record
pub fn parse_log_line(line: &str) -> ParseResult<RawLine> {
    let trimmed = line.trim_end();

    // Out-of-band markers first
    if trimmed.contains("MAXIMUM DEBUG LOG SIZE REACHED") {
        return Ok(RawLine::Truncated);
    }
    if let Some(rest) = trimmed.strip_prefix("*** Skipped") {
        let bytes = rest
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        return Ok(RawLine::SkippedSection { bytes });
    }

    if let Ok(event) = parse_event_line(trimmed) {
        return Ok(RawLine::Event(event));
    }

    if let Some(levels) = parse_debug_header(trimmed) {
        return Ok(RawLine::DebugHeader(levels));
    }

    Err(ParseError::InvalidFormat(trimmed.to_string()))
}

/// Parse a timestamped event record
pub fn parse_event_line(line: &str) -> ParseResult<LogLine> {
    let (rest, (wall_clock, nanos)) = parse_timestamp_prefix(line)
        .map_err(|e| ParseError::InvalidFormat(format!("bad timestamp prefix: {}", e)))?;

    let mut parts = rest.split('|');
    // First split element is the empty string before the leading '|'
    match parts.next() {
        Some("") => {}
        _ => return Err(ParseError::InvalidFormat(line.to_string())),
    }
    let token = parts
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ParseError::InvalidFormat(line.to_string()))?;

    Ok(LogLine {
        wall_clock: wall_clock.to_string(),
        nanos,
        token: token.to_string(),
        fields: parts.map(str::to_string).collect(),
    })
}

/// Parse `HH:MM:SS.fff (nanoseconds)` from the start of the line
fn parse_timestamp_prefix(input: &str) -> IResult<&str, (&str, u64)> {
    let (rest, wall_clock) = parse_wall_clock(input)?;
    let (rest, _) = space1(rest)?;
    let (rest, nanos) = delimited(char('('), digit1, char(')')).parse(rest)?;

    Ok((rest, (wall_clock, nanos.parse().unwrap_or(0))))
}

/// Wall clock in HH:MM:SS[.fff] format
fn parse_wall_clock(input: &str) -> IResult<&str, &str> {
    recognize((
        digit1,
        char(':'),
        digit1,
        char(':'),
        digit1,
        opt((char('.'), digit1)),
    ))
    .parse(input)
}

/// Parse the debug-level header line, e.g.
/// `64.0 APEX_CODE,FINEST;APEX_PROFILING,INFO;DB,INFO`
pub fn parse_debug_header(line: &str) -> Option<Vec<DebugLevel>> {
    let (version, rest) = line.split_once(' ')?;

    // The version is a bare decimal like "64.0"
    let version_ok = recognize((digit1::<&str, nom::error::Error<&str>>, char('.'), digit1))
        .parse(version)
        .map(|(rest, _)| rest.is_empty())
        .unwrap_or(false);
    if !version_ok {
        return None;
    }

    let mut levels = Vec::new();
    for pair in rest.split(';') {
        let (key, level) = pair.split_once(',')?;
        if key.is_empty() || level.is_empty() {
            return None;
        }
        levels.push(DebugLevel {
            key: key.trim().to_string(),
            level: level.trim().to_string(),
        });
    }

    if levels.is_empty() { None } else { Some(levels) }
}

/// The leading dotted segment of a payload text, used for namespace
/// matching (`"ns.MyClass.myMethod()"` -> `Some("ns")`)
pub fn leading_segment(text: &str) -> Option<&str> {
    let (head, _) = text.split_once('.')?;
    if !head.chars().next().is_some_and(char::is_alphabetic) {
        return None;
    }
    head.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        .then_some(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_entry() {
        let line = "09:18:22.6 (6574780)|METHOD_ENTRY|[15]|01p4x00000NWEgP|MyClass.myMethod()";
        let RawLine::Event(event) = parse_log_line(line).unwrap() else {
            panic!("expected event line");
        };

        assert_eq!(event.wall_clock, "09:18:22.6");
        assert_eq!(event.nanos, 6574780);
        assert_eq!(event.token, "METHOD_ENTRY");
        assert_eq!(event.fields.len(), 3);
        assert_eq!(event.payload(), "MyClass.myMethod()");
    }

    #[test]
    fn test_parse_exit_record() {
        let line = "09:18:22.6 (7000000)|METHOD_EXIT|[15]|01p4x00000NWEgP|MyClass.myMethod()";
        let RawLine::Event(event) = parse_log_line(line).unwrap() else {
            panic!("expected event line");
        };

        assert_eq!(event.token, "METHOD_EXIT");
        assert_eq!(event.nanos, 7000000);
    }

    #[test]
    fn test_parse_soql_with_pipe_free_text() {
        let line =
            "06:22:49.9 (9425219)|SOQL_EXECUTE_BEGIN|[3]|Aggregations:0|SELECT Id FROM Account";
        let RawLine::Event(event) = parse_log_line(line).unwrap() else {
            panic!("expected event line");
        };

        assert_eq!(event.token, "SOQL_EXECUTE_BEGIN");
        assert_eq!(event.payload(), "SELECT Id FROM Account");
    }

    #[test]
    fn test_parse_no_fractional_seconds() {
        let line = "09:18:22 (100)|EXECUTION_STARTED";
        let RawLine::Event(event) = parse_log_line(line).unwrap() else {
            panic!("expected event line");
        };

        assert_eq!(event.wall_clock, "09:18:22");
        assert_eq!(event.token, "EXECUTION_STARTED");
        assert!(event.fields.is_empty());
    }

    #[test]
    fn test_parse_debug_header() {
        let line = "64.0 APEX_CODE,FINEST;APEX_PROFILING,INFO;DB,INFO";
        let RawLine::DebugHeader(levels) = parse_log_line(line).unwrap() else {
            panic!("expected debug header");
        };

        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].key, "APEX_CODE");
        assert_eq!(levels[0].level, "FINEST");
        assert_eq!(levels[2].key, "DB");
    }

    #[test]
    fn test_parse_skipped_section() {
        let line = "*** Skipped 8504 bytes of detailed log";
        assert_eq!(
            parse_log_line(line).unwrap(),
            RawLine::SkippedSection { bytes: 8504 }
        );
    }

    #[test]
    fn test_parse_truncation_marker() {
        let line = "*** MAXIMUM DEBUG LOG SIZE REACHED ***";
        assert_eq!(parse_log_line(line).unwrap(), RawLine::Truncated);
    }

    #[test]
    fn test_parse_garbage_line() {
        let err = parse_log_line("this is not a log line").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_leading_segment() {
        assert_eq!(leading_segment("ns.MyClass.myMethod()"), Some("ns"));
        assert_eq!(leading_segment("MyClass"), None);
        assert_eq!(leading_segment(".oops"), None);
        assert_eq!(leading_segment("Workflow:Case"), None);
    }
}
