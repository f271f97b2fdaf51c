use super::types::{ApexLog, EventId};

/// Result of a temporal lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampMatch {
    pub event: EventId,
    pub depth: usize,
}

/// Find the deepest event whose span contains `target`, starting from an
/// ordered sibling sequence.
///
/// Siblings are sorted by timestamp and mutually non-overlapping, but
/// they are span-sorted rather than point-sorted: when the target lies
/// past a sibling's end the search continues using the span end as the
/// ordering key. A target equal to an event's exact start timestamp is
/// an immediate match at the current depth.
///
/// Cost is O(depth * log(branching factor)) per lookup.
pub fn find_event_by_timestamp(
    log: &ApexLog,
    siblings: &[EventId],
    target: u64,
    depth: usize,
) -> Option<TimestampMatch> {
    let mut lo = 0usize;
    let mut hi = siblings.len();

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let event = log.event(siblings[mid]);
        let (start, end) = event.span();

        if target < start {
            hi = mid;
        } else if target > end {
            lo = mid + 1;
        } else {
            if target == start {
                return Some(TimestampMatch {
                    event: event.id,
                    depth,
                });
            }
            // Inside the span: prefer the most specific containing child
            return find_event_by_timestamp(log, &event.children, target, depth + 1).or(Some(
                TimestampMatch {
                    event: event.id,
                    depth,
                },
            ));
        }
    }

    None
}
