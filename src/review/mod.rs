//! Spaced-repetition review of the knowledge base.
//!
//! Each topic is split into groups of [`GROUP_SIZE`] consecutive records. A
//! group is due when it was never reviewed or its next review date has come;
//! completing a review pushes the date out along [`INTERVAL_TABLE_DAYS`].
//!
//! Groups are identified by record position, so they stay stable as long as
//! topic files are only appended to.

pub mod store;
pub mod types;

use std::collections::HashMap;

use chrono::NaiveDate;

pub use store::ScheduleStore;
pub use types::{group_count, interval_for, ReviewGroup, GROUP_SIZE, INTERVAL_TABLE_DAYS};

use crate::error::{LiaError, Result};
use crate::knowledge::{KnowledgeStore, Record};

/// A group with its due flag, as listed by [`ReviewScheduler::overview`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStatus {
    pub group: ReviewGroup,
    pub due: bool,
}

pub struct ReviewScheduler {
    schedule: ScheduleStore,
}

impl ReviewScheduler {
    pub fn new(schedule: ScheduleStore) -> Self {
        Self { schedule }
    }

    /// Create missing groups for every parseable topic. Malformed topics are
    /// skipped with a warning and keep the groups they already have.
    pub fn sync(&mut self, knowledge: &mut KnowledgeStore) -> Result<()> {
        self.sync_counts(knowledge).map(|_| ())
    }

    /// Sync, returning the record count of every parseable topic.
    fn sync_counts(&mut self, knowledge: &mut KnowledgeStore) -> Result<HashMap<String, usize>> {
        let (loaded, _skipped) = knowledge.load_all()?;
        let mut counts = HashMap::with_capacity(loaded.len());
        for (topic, load) in loaded {
            self.schedule.sync_topic(&topic, load.records.len())?;
            counts.insert(topic, load.records.len());
        }
        Ok(counts)
    }

    /// Groups due on `today`: fresh groups first, then the most overdue.
    pub fn list_due(
        &mut self,
        knowledge: &mut KnowledgeStore,
        today: NaiveDate,
    ) -> Result<Vec<ReviewGroup>> {
        Ok(self
            .overview(knowledge, today)?
            .into_iter()
            .filter(|status| status.due)
            .map(|status| status.group)
            .collect())
    }

    /// Every group holding records of a parseable topic, in due order.
    ///
    /// Rows of deleted or malformed topics, and trailing groups left empty by
    /// a shrunk file, are kept but not listed.
    pub fn overview(
        &mut self,
        knowledge: &mut KnowledgeStore,
        today: NaiveDate,
    ) -> Result<Vec<GroupStatus>> {
        let counts = self.sync_counts(knowledge)?;
        let mut groups: Vec<ReviewGroup> = self
            .schedule
            .all_groups()?
            .into_iter()
            .filter(|group| {
                counts
                    .get(&group.topic)
                    .is_some_and(|&count| group.group_index < group_count(count))
            })
            .collect();
        groups.sort_by(|a, b| a.due_order_key().cmp(&b.due_order_key()));
        Ok(groups
            .into_iter()
            .map(|group| GroupStatus {
                due: group.is_due(today),
                group,
            })
            .collect())
    }

    /// Non-empty groups of `topic` in index order, creating missing ones.
    pub fn groups_for_topic(
        &mut self,
        knowledge: &mut KnowledgeStore,
        topic: &str,
    ) -> Result<Vec<ReviewGroup>> {
        let count = knowledge.load_topic(topic)?.records.len();
        self.schedule.sync_topic(topic, count)?;
        let mut groups = self.schedule.groups_for_topic(topic)?;
        groups.retain(|group| group.group_index < group_count(count));
        Ok(groups)
    }

    /// Start reviewing group `group_id`.
    pub fn start_session(
        &self,
        knowledge: &mut KnowledgeStore,
        group_id: i64,
    ) -> Result<ReviewSession> {
        let group = self.schedule.get(group_id)?;
        let load = knowledge.load_topic(&group.topic)?;
        let cards = load.records[group.record_positions(load.records.len())].to_vec();
        tracing::debug!(topic = %group.topic, index = group.group_index, cards = cards.len(), "review session");
        Ok(ReviewSession {
            group,
            cards,
            shown: 0,
        })
    }

    /// Record a finished session. `None` when cards were left unseen or the
    /// group had no cards, in which case nothing changes.
    pub fn finish(&self, session: ReviewSession, today: NaiveDate) -> Option<ReviewOutcome> {
        if session.is_empty() || !session.is_complete() {
            return None;
        }
        let mut group = session.group;
        group.complete_review(today);
        let write_error = match self.schedule.save(&group) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(group = group.id, error = %e, "review not persisted");
                Some(e)
            }
        };
        Some(ReviewOutcome { group, write_error })
    }
}

/// The cards of one group, shown in stored order.
#[derive(Debug)]
pub struct ReviewSession {
    group: ReviewGroup,
    cards: Vec<Record>,
    shown: usize,
}

impl ReviewSession {
    pub fn group(&self) -> &ReviewGroup {
        &self.group
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// The next card, or `None` once every card was shown.
    pub fn next_card(&mut self) -> Option<&Record> {
        let card = self.cards.get(self.shown)?;
        self.shown += 1;
        Some(card)
    }

    /// Number of cards shown so far.
    pub fn shown(&self) -> usize {
        self.shown
    }

    pub fn is_complete(&self) -> bool {
        self.shown >= self.cards.len()
    }
}

/// Result of [`ReviewScheduler::finish`]. The group is advanced even when
/// persisting it failed.
#[derive(Debug)]
pub struct ReviewOutcome {
    pub group: ReviewGroup,
    pub write_error: Option<LiaError>,
}
