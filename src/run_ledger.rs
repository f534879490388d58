use crate::error::{DrillError, Result};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use tracing::info;

/// One generated test, numbered within its category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRun {
    pub category: u32,
    pub sequence: u32,
    /// Drawn words joined by single spaces, in draw order
    pub words: String,
    pub artifact_location: String,
}

impl TestRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(TestRun {
            category: row.get(0)?,
            sequence: row.get(1)?,
            words: row.get(2)?,
            artifact_location: row.get(3)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TestSummary {
    pub category: u32,
    pub last_sequence: u32,
    pub run_count: u32,
}

impl TestSummary {
    pub fn empty(category: u32) -> Self {
        Self {
            category,
            last_sequence: 0,
            run_count: 0,
        }
    }

    pub fn next_sequence(&self) -> u32 {
        self.last_sequence + 1
    }
}

/// Append-mostly log of test runs backed by the `vocab_testset` table
pub struct RunLedger<'c> {
    conn: &'c Connection,
}

impl<'c> RunLedger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Summary for one category; zero-valued when it has no runs yet
    pub fn summary(&self, category: u32) -> Result<TestSummary> {
        let (last, count): (Option<u32>, u32) = self.conn.query_row(
            "SELECT MAX(testno), COUNT(*) FROM vocab_testset WHERE testtype = ?1",
            [category],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(TestSummary {
            category,
            last_sequence: last.unwrap_or(0),
            run_count: count,
        })
    }

    pub fn all_summaries(&self) -> Result<Vec<TestSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT testtype, MAX(testno), COUNT(*)
            FROM vocab_testset
            GROUP BY testtype
            ORDER BY testtype
            "#,
        )?;

        let summaries = stmt
            .query_map([], |row| {
                Ok(TestSummary {
                    category: row.get(0)?,
                    last_sequence: row.get(1)?,
                    run_count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    pub fn insert(&self, run: &TestRun) -> Result<()> {
        if run.sequence == 0 {
            return Err(DrillError::Validation("test sequence starts at 1".into()));
        }

        self.conn
            .execute(
                "INSERT INTO vocab_testset (testtype, testno, words, location) VALUES (?1, ?2, ?3, ?4)",
                params![run.category, run.sequence, run.words, run.artifact_location],
            )
            .map_err(|e| {
                DrillError::from_insert(
                    e,
                    format!("test {} of category {} already exists", run.sequence, run.category),
                )
            })?;
        Ok(())
    }

    pub fn list_runs(&self, category: u32) -> Result<Vec<TestRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT testtype, testno, words, location FROM vocab_testset WHERE testtype = ?1 ORDER BY testno",
        )?;
        let runs = stmt
            .query_map([category], TestRun::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    /// Delete every run of every category
    pub fn reset_all(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM vocab_testset", [])?;
        info!(deleted, "cleared all test runs");
        Ok(deleted)
    }

    pub fn reset_category(&self, category: u32) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM vocab_testset WHERE testtype = ?1", [category])?;
        info!(deleted, category, "cleared test runs");
        Ok(deleted)
    }
}
