//! Salesforce Apex debug log analyzer: a parser that turns raw log
//! text into a call tree with durations and collected issues, and a
//! terminal timeline for exploring it.

pub mod host;
pub mod parser;
pub mod tui;

pub use parser::{ApexLog, LogParser, ParseError, ParseResult};
