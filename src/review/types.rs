//! Review group state and the spaced-repetition schedule.

use std::ops::Range;

use chrono::{Days, NaiveDate};
use serde::Serialize;

/// Records per review group.
pub const GROUP_SIZE: usize = 7;

/// Days until the next review after the 1st, 2nd, 3rd and every later review.
pub const INTERVAL_TABLE_DAYS: [u64; 4] = [1, 2, 7, 20];

/// Interval after `reviews_count` completed reviews. `None` for a group that
/// was never reviewed.
pub fn interval_for(reviews_count: u32) -> Option<u64> {
    let k = reviews_count.checked_sub(1)? as usize;
    Some(INTERVAL_TABLE_DAYS[k.min(INTERVAL_TABLE_DAYS.len() - 1)])
}

/// Number of groups covering `record_count` records.
pub fn group_count(record_count: usize) -> usize {
    record_count.div_ceil(GROUP_SIZE)
}

/// A contiguous block of up to [`GROUP_SIZE`] records of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewGroup {
    pub id: i64,
    pub topic: String,
    pub group_index: usize,
    pub last_review_date: Option<NaiveDate>,
    pub next_review_date: Option<NaiveDate>,
    pub reviews_count: u32,
}

impl ReviewGroup {
    /// Never reviewed; due immediately.
    pub fn is_fresh(&self) -> bool {
        self.reviews_count == 0
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.is_fresh() || self.next_review_date.map_or(true, |next| next <= today)
    }

    /// Positions of this group's records in a topic of `record_count` records.
    pub fn record_positions(&self, record_count: usize) -> Range<usize> {
        let start = (self.group_index * GROUP_SIZE).min(record_count);
        let end = (start + GROUP_SIZE).min(record_count);
        start..end
    }

    /// Apply a completed review on `today`.
    pub fn complete_review(&mut self, today: NaiveDate) {
        self.reviews_count = self.reviews_count.saturating_add(1);
        self.last_review_date = Some(today);
        self.next_review_date = interval_for(self.reviews_count).map(|days| today + Days::new(days));
    }

    /// Sort key for due listings: fresh groups first by `(topic, index)`, then
    /// scheduled groups by next date, fewer reviews, topic and index.
    pub fn due_order_key(&self) -> (bool, Option<NaiveDate>, u32, &str, usize) {
        (
            !self.is_fresh(),
            self.next_review_date,
            self.reviews_count,
            &self.topic,
            self.group_index,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fresh(topic: &str, group_index: usize) -> ReviewGroup {
        ReviewGroup {
            id: 0,
            topic: topic.into(),
            group_index,
            last_review_date: None,
            next_review_date: None,
            reviews_count: 0,
        }
    }

    #[test]
    fn intervals_follow_table_then_repeat_last() {
        assert_eq!(interval_for(0), None);
        let intervals: Vec<u64> = (1..=6).filter_map(interval_for).collect();
        assert_eq!(intervals, vec![1, 2, 7, 20, 20, 20]);
    }

    #[test]
    fn group_count_rounds_up() {
        assert_eq!(group_count(0), 0);
        assert_eq!(group_count(1), 1);
        assert_eq!(group_count(7), 1);
        assert_eq!(group_count(8), 2);
        assert_eq!(group_count(16), 3);
    }

    #[test]
    fn record_positions_are_contiguous_and_clamped() {
        assert_eq!(fresh("t", 0).record_positions(16), 0..7);
        assert_eq!(fresh("t", 1).record_positions(16), 7..14);
        assert_eq!(fresh("t", 2).record_positions(16), 14..16);
        assert!(fresh("t", 3).record_positions(16).is_empty());
    }

    #[test]
    fn fresh_group_reviewed_today_is_due_tomorrow() {
        let today = date(2026, 10, 19);
        let mut group = fresh("bash", 0);
        assert!(group.is_due(today));

        group.complete_review(today);
        assert_eq!(group.reviews_count, 1);
        assert_eq!(group.last_review_date, Some(today));
        assert_eq!(group.next_review_date, Some(date(2026, 10, 20)));
        assert!(!group.is_due(today));
        assert!(group.is_due(date(2026, 10, 20)));
    }

    #[test]
    fn schedule_law_holds_across_reviews() {
        let mut group = fresh("bash", 0);
        let mut day = date(2026, 1, 1);
        for k in 1..=6u32 {
            group.complete_review(day);
            let last = group.last_review_date.unwrap();
            let next = group.next_review_date.unwrap();
            let expected = INTERVAL_TABLE_DAYS[(k as usize - 1).min(3)];
            assert_eq!((next - last).num_days() as u64, expected, "after review {k}");
            day = next;
        }
    }

    #[test]
    fn fresh_groups_sort_before_scheduled() {
        let today = date(2026, 10, 19);
        let mut scheduled = fresh("aaa", 0);
        scheduled.complete_review(date(2026, 10, 1));
        let mut groups = [scheduled, fresh("curl", 0), fresh("bash", 1), fresh("bash", 0)];
        groups.sort_by(|a, b| a.due_order_key().cmp(&b.due_order_key()));
        let order: Vec<(&str, usize)> = groups
            .iter()
            .map(|g| (g.topic.as_str(), g.group_index))
            .collect();
        assert_eq!(order, vec![("bash", 0), ("bash", 1), ("curl", 0), ("aaa", 0)]);
        assert!(groups.iter().all(|g| g.is_due(today)));
    }
}
