use crate::error::{DrillError, Result};
use crate::selection::SelectionRound;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Deserializer, Serialize};
use std::io;
use tracing::{debug, info, warn};

pub const BASE_PRIORITY: u32 = 10;
pub const CRITICAL_PRIORITY: u32 = 15;

/// Dictionary-style record for one word, as produced by enrichment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordRecord {
    pub word: String,
    pub meaning: String,
    pub usage: String,
    pub etymology: String,
    pub word_break: String,
    pub picture: String,
    #[serde(alias = "dyk_facts")]
    pub did_you_know_facts: String,
    #[serde(deserialize_with = "string_or_list")]
    pub synonyms: String,
    #[serde(deserialize_with = "string_or_list")]
    pub antonyms: String,
    pub additional_facts: String,
}

impl WordRecord {
    /// A record carrying only the word itself
    pub fn bare(word: &str) -> Self {
        Self {
            word: word.to_string(),
            ..Default::default()
        }
    }
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s,
        StringOrList::Many(v) => v.join(", "),
        StringOrList::Nothing(()) => String::new(),
    })
}

/// A stored word with its drill priority
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VocabEntry {
    #[serde(flatten)]
    pub record: WordRecord,
    pub priority: u32,
    pub created_at: DateTime<Local>,
}

impl VocabEntry {
    pub fn word(&self) -> &str {
        &self.record.word
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(11)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    11,
                    "created_at".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?
            .with_timezone(&Local);

        Ok(VocabEntry {
            record: WordRecord {
                word: row.get(0)?,
                meaning: row.get(1)?,
                usage: row.get(2)?,
                etymology: row.get(3)?,
                word_break: row.get(4)?,
                picture: row.get(5)?,
                did_you_know_facts: row.get(6)?,
                synonyms: row.get(7)?,
                antonyms: row.get(8)?,
                additional_facts: row.get(9)?,
            },
            priority: row.get(10)?,
            created_at,
        })
    }
}

/// Stored key for a word. SQLite's NOCASE only folds ASCII, so keys are lowercased here.
fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

const ENTRY_COLUMNS: &str = "word, meaning, usage, etymology, word_break, picture, \
     did_you_know_facts, synonyms, antonyms, additional_facts, priority, created_at";

/// Word inventory backed by the `vocab` table
pub struct VocabStore<'c> {
    conn: &'c Connection,
}

impl<'c> VocabStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Look up a word, ignoring case
    pub fn get(&self, word: &str) -> Result<Option<VocabEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM vocab WHERE word = ?1");
        let entry = self
            .conn
            .query_row(&sql, [normalize(word)], VocabEntry::from_row)
            .optional()?;
        Ok(entry)
    }

    pub fn get_all_identifiers(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT word FROM vocab ORDER BY word")?;
        let words = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(words)
    }

    pub fn get_all(&self) -> Result<Vec<VocabEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM vocab ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], VocabEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Every word with its current priority, in insertion order
    pub fn get_selection_snapshot(&self) -> Result<SelectionRound> {
        let mut stmt = self
            .conn
            .prepare("SELECT word, priority FROM vocab ORDER BY rowid")?;
        let candidates = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(words = candidates.len(), "loaded selection snapshot");
        Ok(SelectionRound::new(candidates))
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vocab", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Store a new word at base priority, or critical priority when `critical` is set
    pub fn insert(&self, record: &WordRecord, critical: bool) -> Result<VocabEntry> {
        let word = normalize(&record.word);
        if word.is_empty() {
            return Err(DrillError::Validation("word must not be empty".into()));
        }

        let priority = if critical {
            CRITICAL_PRIORITY
        } else {
            BASE_PRIORITY
        };
        let created_at = Local::now();

        self.conn
            .execute(
                r#"
                INSERT INTO vocab
                (word, meaning, usage, etymology, word_break, picture,
                 did_you_know_facts, synonyms, antonyms, additional_facts, priority, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    word,
                    record.meaning,
                    record.usage,
                    record.etymology,
                    record.word_break,
                    record.picture,
                    record.did_you_know_facts,
                    record.synonyms,
                    record.antonyms,
                    record.additional_facts,
                    priority,
                    created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DrillError::from_insert(e, format!("word '{word}' already exists")))?;

        info!(word = %word, priority, "stored word");
        Ok(VocabEntry {
            record: WordRecord {
                word,
                ..record.clone()
            },
            priority,
            created_at,
        })
    }

    /// Set each listed word's priority to the given absolute value
    pub fn apply_priority_updates(&self, updates: &[(String, u32)]) -> Result<()> {
        if updates.is_empty() {
            return Err(DrillError::Validation("no priority updates given".into()));
        }

        let mut stmt = self
            .conn
            .prepare("UPDATE vocab SET priority = ?1 WHERE word = ?2")?;
        for (word, priority) in updates {
            if stmt.execute(params![priority, normalize(word)])? == 0 {
                return Err(DrillError::NotFound(format!("word '{word}'")));
            }
        }
        Ok(())
    }

    pub fn reset_all_priorities(&self, value: u32) -> Result<usize> {
        let touched = self
            .conn
            .execute("UPDATE vocab SET priority = ?1", [value])?;
        info!(words = touched, priority = value, "reset all priorities");
        Ok(touched)
    }

    /// Write every entry as CSV, header first. Returns the number of rows written.
    pub fn export<W: io::Write>(&self, sink: W) -> Result<usize> {
        let entries = self.get_all()?;
        if entries.is_empty() {
            warn!("vocabulary is empty, exporting header only");
        }

        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record([
            "word",
            "meaning",
            "usage",
            "etymology",
            "word_break",
            "picture",
            "did_you_know_facts",
            "synonyms",
            "antonyms",
            "additional_facts",
            "priority",
            "created_at",
        ])?;
        for e in &entries {
            let r = &e.record;
            let priority = e.priority.to_string();
            let created_at = e.created_at.to_rfc3339();
            writer.write_record([
                r.word.as_str(),
                r.meaning.as_str(),
                r.usage.as_str(),
                r.etymology.as_str(),
                r.word_break.as_str(),
                r.picture.as_str(),
                r.did_you_know_facts.as_str(),
                r.synonyms.as_str(),
                r.antonyms.as_str(),
                r.additional_facts.as_str(),
                priority.as_str(),
                created_at.as_str(),
            ])?;
        }
        writer.flush()?;

        Ok(entries.len())
    }
}
