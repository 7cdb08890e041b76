//! SQLite persistence for review groups.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{group_count, ReviewGroup};
use crate::error::{LiaError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_GROUP: &str = "SELECT id, topic, group_index, last_review_date, next_review_date, reviews_count \
     FROM review_groups";

pub struct ScheduleStore {
    conn: Connection,
}

impl ScheduleStore {
    /// Wrap a connection with the schema already applied (see
    /// [`crate::db::open_database`]).
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Make sure `topic` has `ceil(record_count / 7)` groups. Only missing
    /// trailing groups are inserted; existing rows are never renumbered or
    /// removed. Returns the number of inserted groups.
    pub fn sync_topic(&mut self, topic: &str, record_count: usize) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let existing: i64 = tx.query_row(
            "SELECT COALESCE(MAX(group_index) + 1, 0) FROM review_groups WHERE topic = ?1",
            params![topic],
            |row| row.get(0),
        )?;
        let required = group_count(record_count) as i64;

        let mut inserted = 0;
        for group_index in existing..required {
            tx.execute(
                "INSERT INTO review_groups (group_index, topic, reviews_count) VALUES (?1, ?2, 0)",
                params![group_index, topic],
            )?;
            inserted += 1;
        }
        tx.commit()?;

        if inserted > 0 {
            tracing::debug!(topic, inserted, "created review groups");
        }
        Ok(inserted)
    }

    /// Groups of `topic` in index order.
    pub fn groups_for_topic(&self, topic: &str) -> Result<Vec<ReviewGroup>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_GROUP} WHERE topic = ?1 ORDER BY group_index"))?;
        let groups = stmt
            .query_map(params![topic], group_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    /// Every group, ordered by topic and index.
    pub fn all_groups(&self) -> Result<Vec<ReviewGroup>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_GROUP} ORDER BY topic, group_index"))?;
        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    pub fn get(&self, id: i64) -> Result<ReviewGroup> {
        self.conn
            .query_row(&format!("{SELECT_GROUP} WHERE id = ?1"), params![id], group_from_row)
            .optional()?
            .ok_or(LiaError::GroupNotFound(id))
    }

    /// Persist the review dates and count of `group`.
    pub fn save(&self, group: &ReviewGroup) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE review_groups \
                 SET last_review_date = ?1, next_review_date = ?2, reviews_count = ?3 \
                 WHERE id = ?4",
                params![
                    group.last_review_date.map(format_date),
                    group.next_review_date.map(format_date),
                    group.reviews_count,
                    group.id,
                ],
            )
            .map_err(LiaError::ScheduleWrite)?;
        if updated == 0 {
            return Err(LiaError::GroupNotFound(group.id));
        }
        Ok(())
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(column: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    value
        .map(|text| {
            NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    column,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })
        .transpose()
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewGroup> {
    Ok(ReviewGroup {
        id: row.get(0)?,
        topic: row.get(1)?,
        group_index: row.get::<_, i64>(2)? as usize,
        last_review_date: parse_date(3, row.get(3)?)?,
        next_review_date: parse_date(4, row.get(4)?)?,
        reviews_count: row.get(5)?,
    })
}
