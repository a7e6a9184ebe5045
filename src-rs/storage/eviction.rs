use chrono::{DateTime, Duration, Utc};

use super::types::{HistoryEntry, StorageConfig};

pub const COMPRESSION_MARKER: &str = "…[compressed]…";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub expired: usize,
    pub trimmed: usize,
    pub compressed: usize,
}

impl EvictionReport {
    pub fn changed(&self) -> bool {
        self.expired + self.trimmed + self.compressed > 0
    }
}

/// Applies age, count and compression rules in that order.
///
/// `reserve` is the number of entries about to be appended; a pre-write pass
/// trims to `keep_recent_on_clean - reserve` so the list lands on
/// `keep_recent_on_clean` once the write completes.
pub fn evict(
    mut entries: Vec<HistoryEntry>,
    cfg: &StorageConfig,
    now: DateTime<Utc>,
    reserve: usize,
) -> (Vec<HistoryEntry>, EvictionReport) {
    let mut report = EvictionReport::default();

    if cfg.max_age_days > 0 {
        let cutoff = now - Duration::days(i64::from(cfg.max_age_days));
        let before = entries.len();
        entries.retain(|entry| entry.timestamp >= cutoff);
        report.expired = before - entries.len();
    }

    if entries.len() > cfg.clean_threshold {
        entries.sort_by_key(|entry| entry.timestamp);
        let keep = cfg.keep_recent_on_clean.saturating_sub(reserve);
        let drop = entries.len() - keep.min(entries.len());
        entries.drain(..drop);
        report.trimmed = drop;
    }

    if cfg.compression_enabled {
        report.compressed = compress_entries(&mut entries, cfg.compress_above_chars);
    }

    (entries, report)
}

pub fn compress_entries(entries: &mut [HistoryEntry], limit: usize) -> usize {
    let mut count = 0;
    for entry in entries.iter_mut() {
        if entry.compressed || entry.content.chars().count() <= limit {
            continue;
        }
        entry.content = compress_content(&entry.content, limit);
        entry.compressed = true;
        count += 1;
    }
    count
}

/// Keeps the head and tail of `content`, replacing the middle with a marker.
pub fn compress_content(content: &str, limit: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= limit {
        return content.to_string();
    }
    let budget = limit.saturating_sub(COMPRESSION_MARKER.chars().count() + 2);
    let head = budget / 2;
    let tail = budget - head;
    let mut out: String = chars[..head].iter().collect();
    out.push('\n');
    out.push_str(COMPRESSION_MARKER);
    out.push('\n');
    out.extend(chars[chars.len() - tail..].iter());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn entry(content: &str, age_days: i64, now: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry::at(Role::Assistant, content, now - Duration::days(age_days))
    }

    #[test]
    fn drops_entries_past_max_age() {
        let now = Utc::now();
        let cfg = StorageConfig {
            max_age_days: 7,
            ..StorageConfig::default()
        };
        let entries = vec![entry("old", 10, now), entry("fresh", 1, now)];
        let (kept, report) = evict(entries, &cfg, now, 0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "fresh");
        assert_eq!(report.expired, 1);
    }

    #[test]
    fn zero_max_age_keeps_everything() {
        let now = Utc::now();
        let cfg = StorageConfig {
            max_age_days: 0,
            ..StorageConfig::default()
        };
        let (kept, _) = evict(vec![entry("ancient", 4000, now)], &cfg, now, 0);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn over_threshold_keeps_most_recent() {
        let now = Utc::now();
        let cfg = StorageConfig {
            max_entries: 10,
            clean_threshold: 8,
            keep_recent_on_clean: 3,
            ..StorageConfig::default()
        }
        .validated();
        // inserted out of order on purpose
        let entries: Vec<HistoryEntry> = (0..9).rev().map(|d| entry(&d.to_string(), d, now)).collect();
        let (kept, report) = evict(entries, &cfg, now, 0);
        let contents: Vec<&str> = kept.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["2", "1", "0"]);
        assert_eq!(report.trimmed, 6);
        assert!(kept.len() <= cfg.max_entries);
    }

    #[test]
    fn reserve_leaves_room_for_incoming() {
        let now = Utc::now();
        let cfg = StorageConfig {
            max_entries: 4,
            clean_threshold: 4,
            keep_recent_on_clean: 2,
            ..StorageConfig::default()
        }
        .validated();
        let entries: Vec<HistoryEntry> = (0..5).map(|i| entry(&i.to_string(), 0, now)).collect();
        let (kept, _) = evict(entries, &cfg, now, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "4");
    }

    #[test]
    fn compression_flags_and_shortens_once() {
        let now = Utc::now();
        let cfg = StorageConfig {
            compression_enabled: true,
            compress_above_chars: 100,
            ..StorageConfig::default()
        }
        .validated();
        let long = format!("{}{}", "a".repeat(150), "z".repeat(150));
        let (kept, report) = evict(vec![entry(&long, 0, now)], &cfg, now, 0);
        assert_eq!(report.compressed, 1);
        assert!(kept[0].compressed);
        assert!(kept[0].content.chars().count() <= 100);
        assert!(kept[0].content.starts_with('a'));
        assert!(kept[0].content.ends_with('z'));
        assert!(kept[0].content.contains(COMPRESSION_MARKER));

        let (again, report) = evict(kept.clone(), &cfg, now, 0);
        assert_eq!(report.compressed, 0);
        assert_eq!(again, kept);
    }
}
