use crate::event::Event;
use crate::input::SourceLines;
use crate::parser::parse_line;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

/// Ordered, append-only collection of the Events of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
    dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub total_entries: usize,
    pub distinct_users: usize,
    pub event_types: usize,
    pub unique_ips: usize,
    pub first_seen: Option<i64>,
    pub last_seen: Option<i64>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every line of every source, keeping encounter order.
    ///
    /// Lines are parsed in parallel; results are concatenated in the order the
    /// sources and their lines were given.
    pub fn from_sources(sources: &[SourceLines]) -> Self {
        let mut store = Self::new();
        for source in sources {
            let parsed: Vec<Option<Event>> = source
                .lines
                .par_iter()
                .map(|line| parse_line(line, &source.format))
                .collect();

            let before = store.events.len();
            for event in parsed {
                match event {
                    Some(event) => store.events.push(event),
                    None => store.dropped += 1,
                }
            }
            debug!(
                "Source {}: kept {} of {} lines",
                source.format,
                store.events.len() - before,
                source.lines.len()
            );
        }

        info!(
            "Parsed {} events, dropped {} lines without a timestamp",
            store.events.len(),
            store.dropped
        );
        store
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Lines rejected during construction because they had no time.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Stable sort by time, for callers that need deterministic ordering.
    pub fn sort_by_time(&mut self) {
        self.events.sort_by_key(|event| event.time);
    }

    pub fn time_range(&self) -> Option<(i64, i64)> {
        let min = self.events.iter().map(|e| e.time).min()?;
        let max = self.events.iter().map(|e| e.time).max()?;
        Some((min, max))
    }

    /// Distinct IPs present on stored events, sorted. This is the lookup key
    /// set handed to the geolocation collaborator.
    pub fn ip_keys(&self) -> BTreeSet<String> {
        self.events.iter().filter_map(|e| e.ip.clone()).collect()
    }

    pub fn summary(&self) -> StoreSummary {
        let range = self.time_range();

        StoreSummary {
            total_entries: self.events.len(),
            distinct_users: count_distinct(self.events.iter().map(|e| e.user.as_ref())),
            event_types: count_distinct(self.events.iter().map(|e| e.event.as_ref())),
            unique_ips: count_distinct(self.events.iter().map(|e| e.ip.as_ref())),
            first_seen: range.map(|(min, _)| min),
            last_seen: range.map(|(_, max)| max),
        }
    }
}

fn count_distinct<'a>(values: impl Iterator<Item = Option<&'a String>>) -> usize {
    values.flatten().collect::<HashSet<_>>().len()
}

impl From<Vec<Event>> for EventStore {
    fn from(events: Vec<Event>) -> Self {
        Self { events, dropped: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sources() -> Vec<SourceLines> {
        vec![
            SourceLines::from_text(
                "TXT",
                "[ts:30] EVNT:XR-LOGIN usr:alice IP:10.0.0.1\n\
                 IP:10.9.9.9\n\
                 [ts:10] EVNT:XR-READ usr:bob IP:10.0.0.2\n",
            ),
            SourceLines::from_text(
                "VLOG",
                "[ts:20] EVNT:XR-LOGIN usr:alice IP:10.0.0.1 pid7\nnothing here\n",
            ),
        ]
    }

    #[test]
    fn test_from_sources_keeps_encounter_order() {
        let store = EventStore::from_sources(&sample_sources());

        assert_eq!(store.len(), 3);
        assert_eq!(store.dropped(), 2);
        let times: Vec<i64> = store.events().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![30, 10, 20]);
        assert_eq!(store.events()[2].format, "VLOG");
    }

    #[test]
    fn test_sort_by_time() {
        let mut store = EventStore::from_sources(&sample_sources());
        store.sort_by_time();
        let times: Vec<i64> = store.events().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_untimed_ip_never_reaches_key_set() {
        let store = EventStore::from_sources(&sample_sources());
        let keys = store.ip_keys();

        assert!(!keys.contains("10.9.9.9"));
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_summary() {
        let summary = EventStore::from_sources(&sample_sources()).summary();

        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.distinct_users, 2);
        assert_eq!(summary.event_types, 2);
        assert_eq!(summary.unique_ips, 2);
        assert_eq!(summary.first_seen, Some(10));
        assert_eq!(summary.last_seen, Some(30));
    }

    #[test]
    fn test_empty_store() {
        let store = EventStore::from_sources(&[SourceLines::from_text("TXT", "no time\n")]);
        assert!(store.is_empty());
        assert_eq!(store.time_range(), None);
        assert_eq!(store.summary().first_seen, None);
    }
}
