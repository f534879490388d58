use crate::error::{DrillError, Result};
use crate::run_ledger::{RunLedger, TestRun};
use crate::vocab_store::VocabStore;
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS vocab (
        word TEXT NOT NULL PRIMARY KEY COLLATE NOCASE,
        meaning TEXT NOT NULL DEFAULT '',
        usage TEXT NOT NULL DEFAULT '',
        etymology TEXT NOT NULL DEFAULT '',
        word_break TEXT NOT NULL DEFAULT '',
        picture TEXT NOT NULL DEFAULT '',
        did_you_know_facts TEXT NOT NULL DEFAULT '',
        synonyms TEXT NOT NULL DEFAULT '',
        antonyms TEXT NOT NULL DEFAULT '',
        additional_facts TEXT NOT NULL DEFAULT '',
        priority INTEGER NOT NULL DEFAULT 10 CHECK (priority >= 0),
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS vocab_testset (
        testtype INTEGER NOT NULL,
        testno INTEGER NOT NULL CHECK (testno >= 1),
        words TEXT NOT NULL,
        location TEXT NOT NULL,
        PRIMARY KEY (testtype, testno)
    );
"#;

/// Single SQLite file holding the word inventory and the test-run ledger
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened vocabulary database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Database { conn })
    }

    pub fn vocab(&self) -> VocabStore<'_> {
        VocabStore::new(&self.conn)
    }

    pub fn ledger(&self) -> RunLedger<'_> {
        RunLedger::new(&self.conn)
    }

    /// Persist one round: decayed priorities and the new run, both or neither.
    ///
    /// The write lock is taken before the category's last sequence is re-read, so a
    /// writer that advanced the category since the round started makes this fail with
    /// `Conflict` instead of producing a gap or a duplicate.
    pub fn commit_round(&mut self, updates: &[(String, u32)], run: &TestRun) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = RunLedger::new(&tx).summary(run.category)?;
        if current.last_sequence + 1 != run.sequence {
            return Err(DrillError::Conflict(format!(
                "test {} of category {} (last committed is {})",
                run.sequence, run.category, current.last_sequence
            )));
        }

        VocabStore::new(&tx).apply_priority_updates(updates)?;
        RunLedger::new(&tx).insert(run)?;
        tx.commit()?;

        debug!(
            category = run.category,
            sequence = run.sequence,
            updated = updates.len(),
            "round committed"
        );
        Ok(())
    }
}
