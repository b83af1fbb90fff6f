//! In-memory time-series store — the read-only collaborator the engines
//! borrow their input rows from. Concurrent inserts are safe; reads return
//! date-ordered snapshots.

use crate::types::{DailyChannelRecord, DateRange};
use dashmap::DashMap;
use tracing::debug;

pub struct TimeSeriesStore {
    /// channel -> records sorted by date
    records: DashMap<String, Vec<DailyChannelRecord>>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Insert one record, replacing any existing record for the same
    /// (date, channel) pair and keeping the channel's rows date-ordered.
    pub fn insert(&self, record: DailyChannelRecord) {
        let mut rows = self.records.entry(record.channel.clone()).or_default();
        match rows.binary_search_by_key(&record.date, |r| r.date) {
            Ok(idx) => rows[idx] = record,
            Err(idx) => rows.insert(idx, record),
        }
    }

    pub fn extend(&self, records: impl IntoIterator<Item = DailyChannelRecord>) {
        let mut count = 0usize;
        for record in records {
            self.insert(record);
            count += 1;
        }
        debug!(records = count, channels = self.records.len(), "store loaded");
    }

    /// All channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Date-ordered rows for one channel inside the window. Missing dates
    /// are simply absent; the store never gap-fills.
    pub fn records_in_range(&self, channel: &str, range: &DateRange) -> Vec<DailyChannelRecord> {
        self.records
            .get(channel)
            .map(|rows| {
                rows.iter()
                    .filter(|r| range.contains(r.date))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rows for every channel inside the window, ordered by date then
    /// channel name.
    pub fn all_in_range(&self, range: &DateRange) -> Vec<DailyChannelRecord> {
        let mut rows: Vec<DailyChannelRecord> = self
            .records
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|r| range.contains(r.date))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.channel.cmp(&b.channel)));
        rows
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}
