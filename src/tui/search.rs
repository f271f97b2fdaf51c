use super::viewport::Viewport;
use crate::parser::{ApexLog, EventId};

/// What part of the event matched the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Text,
    EventType,
}

/// Pre-computed screen geometry of a match: column span at the match's
/// depth row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRect {
    pub x: u16,
    pub width: u16,
    pub row: u16,
}

/// One search hit over the tree. Produced fresh per query; never
/// mutates the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub event: EventId,
    /// Start timestamp of the matched event, for centering
    pub timestamp: u64,
    pub rect: MatchRect,
    pub depth: usize,
    pub kind: MatchKind,
}

/// Build the ordered match set for a query. Case-insensitive substring
/// match over payload text, or exact event-type token match. Events
/// outside the viewport still match; their rect is clamped to the
/// window edge so navigation can center on them.
pub fn build_matches(log: &ApexLog, viewport: &Viewport, query: &str) -> Vec<SearchMatch> {
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    let depths = log.depths();
    let mut matches = Vec::new();

    let mut ids: Vec<EventId> = (0..log.events.len()).filter(|&id| id != log.root).collect();
    ids.sort_by_key(|&id| (log.event(id).timestamp, depths[id]));

    for id in ids {
        let event = log.event(id);
        let kind = if event.kind.label().eq_ignore_ascii_case(query) {
            MatchKind::EventType
        } else if event.text.to_lowercase().contains(&needle) {
            MatchKind::Text
        } else {
            continue;
        };

        let (start, end) = event.span();
        let (x, last) = viewport.span_to_cols(start, end).unwrap_or((0, 0));
        matches.push(SearchMatch {
            event: id,
            timestamp: event.timestamp,
            rect: MatchRect {
                x,
                width: last.saturating_sub(x) + 1,
                row: depths[id].min(u16::MAX as usize) as u16,
            },
            depth: depths[id],
            kind,
        });
    }

    matches
}

/// Stateful navigation over an ordered match set. The position is
/// `None` before the first move; all movement operations return the
/// match at the new position or `None` for an out-of-bounds move, which
/// leaves the position untouched.
pub trait MatchNavigator {
    fn next(&mut self) -> Option<&SearchMatch>;
    fn prev(&mut self) -> Option<&SearchMatch>;
    fn first(&mut self) -> Option<&SearchMatch>;
    fn last(&mut self) -> Option<&SearchMatch>;
    fn seek(&mut self, index: usize) -> Option<&SearchMatch>;

    /// Side-effect-free read of the current match
    fn current(&self) -> Option<&SearchMatch>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pure cursor over the match set, free of any rendering concern so it
/// is reusable by non-visual consumers.
#[derive(Debug, Default)]
pub struct SearchCursor {
    matches: Vec<SearchMatch>,
    position: Option<usize>,
}

impl SearchCursor {
    pub fn new(matches: Vec<SearchMatch>) -> Self {
        Self {
            matches,
            position: None,
        }
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

impl MatchNavigator for SearchCursor {
    fn next(&mut self) -> Option<&SearchMatch> {
        let target = match self.position {
            None => 0,
            Some(idx) => idx + 1,
        };
        if target >= self.matches.len() {
            return None;
        }
        self.position = Some(target);
        self.matches.get(target)
    }

    fn prev(&mut self) -> Option<&SearchMatch> {
        let idx = self.position?;
        if idx == 0 {
            return None;
        }
        self.position = Some(idx - 1);
        self.matches.get(idx - 1)
    }

    fn first(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }
        self.position = Some(0);
        self.matches.first()
    }

    fn last(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }
        let idx = self.matches.len() - 1;
        self.position = Some(idx);
        self.matches.get(idx)
    }

    fn seek(&mut self, index: usize) -> Option<&SearchMatch> {
        if index >= self.matches.len() {
            return None;
        }
        self.position = Some(index);
        self.matches.get(index)
    }

    fn current(&self) -> Option<&SearchMatch> {
        self.matches.get(self.position?)
    }

    fn len(&self) -> usize {
        self.matches.len()
    }
}

/// Decorator layering navigation side effects (viewport centering, a
/// host navigation callback) over an inner cursor by composition. The
/// inner cursor never learns about rendering.
pub struct NavigatedCursor<F: FnMut(&SearchMatch)> {
    inner: SearchCursor,
    on_move: F,
}

impl<F: FnMut(&SearchMatch)> NavigatedCursor<F> {
    pub fn new(inner: SearchCursor, on_move: F) -> Self {
        Self { inner, on_move }
    }

    pub fn into_inner(self) -> SearchCursor {
        self.inner
    }

    fn fire<'a>(on_move: &mut F, result: Option<&'a SearchMatch>) -> Option<&'a SearchMatch> {
        if let Some(found) = result {
            on_move(found);
            Some(found)
        } else {
            None
        }
    }
}

impl<F: FnMut(&SearchMatch)> MatchNavigator for NavigatedCursor<F> {
    fn next(&mut self) -> Option<&SearchMatch> {
        Self::fire(&mut self.on_move, self.inner.next())
    }

    fn prev(&mut self) -> Option<&SearchMatch> {
        Self::fire(&mut self.on_move, self.inner.prev())
    }

    fn first(&mut self) -> Option<&SearchMatch> {
        Self::fire(&mut self.on_move, self.inner.first())
    }

    fn last(&mut self) -> Option<&SearchMatch> {
        Self::fire(&mut self.on_move, self.inner.last())
    }

    fn seek(&mut self, index: usize) -> Option<&SearchMatch> {
        Self::fire(&mut self.on_move, self.inner.seek(index))
    }

    fn current(&self) -> Option<&SearchMatch> {
        self.inner.current()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LogParser;

    fn sample_matches() -> Vec<SearchMatch> {
        let text = "\
09:00:00.0 (0)|METHOD_ENTRY|[1]|id|Billing.charge()
09:00:00.0 (100)|METHOD_EXIT|[1]|id|Billing.charge()
09:00:00.0 (200)|SOQL_EXECUTE_BEGIN|[2]|Aggregations:0|SELECT Id FROM Billing__c
09:00:00.0 (300)|SOQL_EXECUTE_END|[2]|Rows:1
09:00:00.0 (400)|METHOD_ENTRY|[3]|id|Other.run()
09:00:00.0 (500)|METHOD_EXIT|[3]|id|Other.run()
";
        let log = LogParser::new().parse_text(text).unwrap();
        let viewport = Viewport::new(log.duration_ns, 50);
        build_matches(&log, &viewport, "billing")
    }

    #[test]
    fn test_build_matches_orders_by_timestamp() {
        let matches = sample_matches();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].timestamp < matches[1].timestamp);
        assert_eq!(matches[0].kind, MatchKind::Text);
    }

    #[test]
    fn test_type_match() {
        let text = "\
09:00:00.0 (0)|DML_BEGIN|[1]|Op:Insert|Type:Account|Rows:1
09:00:00.0 (100)|DML_END|[1]
";
        let log = LogParser::new().parse_text(text).unwrap();
        let viewport = Viewport::new(log.duration_ns, 50);
        let matches = build_matches(&log, &viewport, "DML_BEGIN");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, MatchKind::EventType);
    }

    #[test]
    fn test_empty_set_returns_none_without_moving() {
        let mut cursor = SearchCursor::new(Vec::new());
        assert!(cursor.next().is_none());
        assert!(cursor.prev().is_none());
        assert!(cursor.first().is_none());
        assert!(cursor.last().is_none());
        assert_eq!(cursor.position(), None);
    }

    #[test]
    fn test_next_prev_bounds() {
        let mut cursor = SearchCursor::new(sample_matches());
        assert!(cursor.prev().is_none(), "prev before first is None");
        assert_eq!(cursor.position(), None);

        assert!(cursor.next().is_some());
        assert!(cursor.next().is_some());
        assert_eq!(cursor.position(), Some(1));

        assert!(cursor.next().is_none(), "next at last is None");
        assert_eq!(cursor.position(), Some(1), "failed move does not move");

        assert!(cursor.prev().is_some());
        assert_eq!(cursor.position(), Some(0));
        assert!(cursor.prev().is_none());
        assert_eq!(cursor.position(), Some(0));
    }

    #[test]
    fn test_seek_out_of_bounds() {
        let mut cursor = SearchCursor::new(sample_matches());
        cursor.first();
        assert!(cursor.seek(99).is_none());
        assert_eq!(cursor.position(), Some(0));
        assert!(cursor.seek(1).is_some());
        assert_eq!(cursor.position(), Some(1));
    }

    #[test]
    fn test_current_is_side_effect_free() {
        let mut cursor = SearchCursor::new(sample_matches());
        assert!(cursor.current().is_none());
        cursor.first();
        let a = cursor.current().cloned();
        let b = cursor.current().cloned();
        assert_eq!(a, b);
        assert_eq!(cursor.position(), Some(0));
    }

    #[test]
    fn test_decorator_fires_only_on_success() {
        let mut moves = 0usize;
        let mut nav = NavigatedCursor::new(SearchCursor::new(sample_matches()), |_| moves += 1);

        assert!(nav.prev().is_none());
        assert!(nav.next().is_some());
        assert!(nav.last().is_some());
        assert!(nav.next().is_none());
        nav.current();

        drop(nav);
        assert_eq!(moves, 2);
    }
}
