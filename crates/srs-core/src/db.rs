//! SQLite-backed card store.

use crate::models::{
    AnswerRecord, Card, CardId, CardKind, Grade, OutcomeWindow, OwnerId, Quality, ReviewEvent,
};
use crate::store::{CardStore, StoreError, StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use uuid::Uuid;

const CARD_COLUMNS: &str = "id, owner_id, kind, front, back, created_at, ease_factor, interval_days,
    repetitions, due_at, total_reviews, total_fails, consecutive_fails, is_leech, leech_notes,
    last_reviewed_at, last_type_a_at, last_type_b_at, recent";

const REVIEW_COLUMNS: &str = "id, card_id, owner_id, quality, reviewed_at, ease_before, ease_after,
    interval_before, interval_after, answer_text, answer_correct";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create database at path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Create in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ease_factor REAL NOT NULL,
                interval_days INTEGER NOT NULL,
                repetitions INTEGER NOT NULL,
                due_at TEXT NOT NULL,
                total_reviews INTEGER DEFAULT 0,
                total_fails INTEGER DEFAULT 0,
                consecutive_fails INTEGER DEFAULT 0,
                is_leech INTEGER DEFAULT 0,
                leech_notes TEXT,
                last_reviewed_at TEXT,
                last_type_a_at TEXT,
                last_type_b_at TEXT,
                recent TEXT
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                card_id TEXT NOT NULL REFERENCES cards(id),
                owner_id TEXT NOT NULL,
                quality INTEGER NOT NULL,
                reviewed_at TEXT NOT NULL,
                ease_before REAL NOT NULL,
                ease_after REAL NOT NULL,
                interval_before INTEGER NOT NULL,
                interval_after INTEGER NOT NULL,
                answer_text TEXT,
                answer_correct INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_cards_owner ON cards(owner_id);
            CREATE INDEX IF NOT EXISTS idx_reviews_card ON reviews(card_id, reviewed_at);
            CREATE INDEX IF NOT EXISTS idx_reviews_owner ON reviews(owner_id, reviewed_at);
            "#,
        )?;
        Ok(())
    }

    /// Bulk erasure of a learner's cards and history. Returns reviews removed.
    pub fn erase_owner(&mut self, owner_id: OwnerId) -> StoreResult<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM reviews WHERE owner_id = ?1", params![owner_id.to_string()])?;
        tx.execute("DELETE FROM cards WHERE owner_id = ?1", params![owner_id.to_string()])?;
        tx.commit()?;
        Ok(removed)
    }

    fn query_reviews(&self, filter: &str, key: String, limit: Option<usize>) -> StoreResult<Vec<ReviewEvent>> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE {filter} = ?1
             ORDER BY reviewed_at DESC, rowid DESC LIMIT ?2"
        );
        // SQLite treats a negative limit as no limit.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![key, limit], ReviewRow::read)?
            .collect::<SqlResult<Vec<_>>>()?;
        rows.into_iter().map(ReviewRow::into_event).collect()
    }
}

impl CardStore for SqliteStore {
    fn load_cards(&self, owner_id: OwnerId) -> StoreResult<Vec<Card>> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE owner_id = ?1 ORDER BY created_at, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner_id.to_string()], CardRow::read)?
            .collect::<SqlResult<Vec<_>>>()?;
        rows.into_iter().map(CardRow::into_card).collect()
    }

    fn load_card(&self, owner_id: OwnerId, card_id: CardId) -> StoreResult<Option<Card>> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1 AND owner_id = ?2");
        let row = self
            .conn
            .query_row(&sql, params![card_id.to_string(), owner_id.to_string()], CardRow::read)
            .optional()?;
        row.map(CardRow::into_card).transpose()
    }

    fn save_card(&mut self, card: &Card) -> StoreResult<()> {
        upsert_card(&self.conn, card)
    }

    fn append_review_event(&mut self, event: &ReviewEvent) -> StoreResult<()> {
        insert_review(&self.conn, event)
    }

    fn commit_review(&mut self, card: &Card, event: &ReviewEvent) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        upsert_card(&tx, card)?;
        insert_review(&tx, event)?;
        tx.commit()?;
        Ok(())
    }

    fn reviews_by_card(&self, card_id: CardId, limit: Option<usize>) -> StoreResult<Vec<ReviewEvent>> {
        self.query_reviews("card_id", card_id.to_string(), limit)
    }

    fn reviews_by_owner(&self, owner_id: OwnerId, limit: Option<usize>) -> StoreResult<Vec<ReviewEvent>> {
        self.query_reviews("owner_id", owner_id.to_string(), limit)
    }

    fn first_reviews_since(&self, owner_id: OwnerId, since: DateTime<Utc>) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (
                SELECT card_id FROM reviews WHERE owner_id = ?1
                GROUP BY card_id HAVING MIN(reviewed_at) >= ?2
             )",
            params![owner_id.to_string(), timestamp(since)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn upsert_card(conn: &Connection, card: &Card) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO cards (id, owner_id, kind, front, back, created_at, ease_factor, interval_days,
            repetitions, due_at, total_reviews, total_fails, consecutive_fails, is_leech, leech_notes,
            last_reviewed_at, last_type_a_at, last_type_b_at, recent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
         ON CONFLICT(id) DO UPDATE SET
            kind = excluded.kind, front = excluded.front, back = excluded.back,
            ease_factor = excluded.ease_factor, interval_days = excluded.interval_days,
            repetitions = excluded.repetitions, due_at = excluded.due_at,
            total_reviews = excluded.total_reviews, total_fails = excluded.total_fails,
            consecutive_fails = excluded.consecutive_fails, is_leech = excluded.is_leech,
            leech_notes = excluded.leech_notes, last_reviewed_at = excluded.last_reviewed_at,
            last_type_a_at = excluded.last_type_a_at, last_type_b_at = excluded.last_type_b_at,
            recent = excluded.recent",
        params![
            card.id.to_string(),
            card.owner_id.to_string(),
            card.kind.name(),
            card.front,
            card.back,
            timestamp(card.created_at),
            card.ease_factor,
            card.interval_days,
            card.repetitions,
            timestamp(card.due_at),
            card.total_reviews,
            card.total_fails,
            card.consecutive_fails,
            card.is_leech,
            card.leech_notes,
            card.last_reviewed_at.map(timestamp),
            card.last_type_a_at.map(timestamp),
            card.last_type_b_at.map(timestamp),
            serde_json::to_string(&card.recent)?,
        ],
    )?;
    Ok(())
}

fn insert_review(conn: &Connection, event: &ReviewEvent) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO reviews (id, card_id, owner_id, quality, reviewed_at, ease_before, ease_after,
            interval_before, interval_after, answer_text, answer_correct)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            event.id.to_string(),
            event.card_id.to_string(),
            event.owner_id.to_string(),
            event.quality(),
            timestamp(event.reviewed_at),
            event.ease_before,
            event.ease_after,
            event.interval_before,
            event.interval_after,
            event.answer.as_ref().map(|a| a.text.clone()),
            event.answer.as_ref().map(|a| a.correct),
        ],
    )?;
    Ok(())
}

/// Fixed-width UTC timestamps so text order matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(field: &str, value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{field} '{value}': {e}")))
}

fn parse_opt_time(field: &str, value: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(field, &v)).transpose()
}

fn parse_id(field: &str, value: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("{field} '{value}': {e}")))
}

/// Raw column values, converted to a [`Card`] outside the SQLite callback.
struct CardRow {
    id: String,
    owner_id: String,
    kind: String,
    front: String,
    back: String,
    created_at: String,
    ease_factor: f64,
    interval_days: u32,
    repetitions: u32,
    due_at: String,
    total_reviews: u32,
    total_fails: u32,
    consecutive_fails: u32,
    is_leech: bool,
    leech_notes: Option<String>,
    last_reviewed_at: Option<String>,
    last_type_a_at: Option<String>,
    last_type_b_at: Option<String>,
    recent: Option<String>,
}

impl CardRow {
    fn read(row: &Row) -> SqlResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            kind: row.get("kind")?,
            front: row.get("front")?,
            back: row.get("back")?,
            created_at: row.get("created_at")?,
            ease_factor: row.get("ease_factor")?,
            interval_days: row.get("interval_days")?,
            repetitions: row.get("repetitions")?,
            due_at: row.get("due_at")?,
            total_reviews: row.get("total_reviews")?,
            total_fails: row.get("total_fails")?,
            consecutive_fails: row.get("consecutive_fails")?,
            is_leech: row.get("is_leech")?,
            leech_notes: row.get("leech_notes")?,
            last_reviewed_at: row.get("last_reviewed_at")?,
            last_type_a_at: row.get("last_type_a_at")?,
            last_type_b_at: row.get("last_type_b_at")?,
            recent: row.get("recent")?,
        })
    }

    fn into_card(self) -> StoreResult<Card> {
        let kind = CardKind::from_name(&self.kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown card kind '{}'", self.kind)))?;
        // Rows written before the window existed load with an empty one.
        let recent = match self.recent {
            Some(json) => serde_json::from_str(&json)?,
            None => OutcomeWindow::default(),
        };
        Ok(Card {
            id: parse_id("id", &self.id)?,
            owner_id: parse_id("owner_id", &self.owner_id)?,
            kind,
            front: self.front,
            back: self.back,
            created_at: parse_time("created_at", &self.created_at)?,
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
            repetitions: self.repetitions,
            due_at: parse_time("due_at", &self.due_at)?,
            total_reviews: self.total_reviews,
            total_fails: self.total_fails,
            consecutive_fails: self.consecutive_fails,
            is_leech: self.is_leech,
            leech_notes: self.leech_notes,
            last_reviewed_at: parse_opt_time("last_reviewed_at", self.last_reviewed_at)?,
            last_type_a_at: parse_opt_time("last_type_a_at", self.last_type_a_at)?,
            last_type_b_at: parse_opt_time("last_type_b_at", self.last_type_b_at)?,
            recent,
        })
    }
}

struct ReviewRow {
    id: String,
    card_id: String,
    owner_id: String,
    quality: u8,
    reviewed_at: String,
    ease_before: f64,
    ease_after: f64,
    interval_before: u32,
    interval_after: u32,
    answer_text: Option<String>,
    answer_correct: Option<bool>,
}

impl ReviewRow {
    fn read(row: &Row) -> SqlResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            card_id: row.get("card_id")?,
            owner_id: row.get("owner_id")?,
            quality: row.get("quality")?,
            reviewed_at: row.get("reviewed_at")?,
            ease_before: row.get("ease_before")?,
            ease_after: row.get("ease_after")?,
            interval_before: row.get("interval_before")?,
            interval_after: row.get("interval_after")?,
            answer_text: row.get("answer_text")?,
            answer_correct: row.get("answer_correct")?,
        })
    }

    fn into_event(self) -> StoreResult<ReviewEvent> {
        let quality = Quality::new(self.quality)
            .map_err(|_| StoreError::Corrupt(format!("quality {} out of range", self.quality)))?;
        let answer = self.answer_text.map(|text| AnswerRecord {
            text,
            correct: self.answer_correct.unwrap_or(false),
        });
        Ok(ReviewEvent {
            id: parse_id("id", &self.id)?,
            card_id: parse_id("card_id", &self.card_id)?,
            owner_id: parse_id("owner_id", &self.owner_id)?,
            grade: Grade::from(quality),
            reviewed_at: parse_time("reviewed_at", &self.reviewed_at)?,
            ease_before: self.ease_before,
            ease_after: self.ease_after,
            interval_before: self.interval_before,
            interval_after: self.interval_after,
            answer,
        })
    }
}
