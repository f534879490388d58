use crate::collaborators::{ArtifactRenderer, QuestionGenerator, TestMaterial};
use crate::db::Database;
use crate::error::{DrillError, Result};
use crate::run_ledger::TestRun;
use crate::selection::SelectionEngine;
use crate::vocab_store::BASE_PRIORITY;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum OrchestratorState {
    Idle,
    RoundInProgress,
    RoundSucceeded,
    RoundFailed,
    BatchStopped,
    BatchFailed,
}

/// Runs committed by one successful batch, in commit order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub category: u32,
    pub runs: Vec<TestRun>,
}

impl BatchReport {
    pub fn rounds(&self) -> usize {
        self.runs.len()
    }
}

/// A batch that ended on a failed round. Earlier rounds stay committed.
#[derive(Debug, Error)]
#[error("test generation for category {category} aborted after {rounds_committed} committed round(s): {source}")]
pub struct BatchError {
    pub category: u32,
    pub rounds_committed: usize,
    #[source]
    pub source: DrillError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub words_reset: usize,
    pub runs_deleted: usize,
}

/// Put every word back to base priority and drop the runs of `category`, or of
/// every category when `None`. The two steps are independent statements.
pub fn reset_progress(db: &Database, category: Option<u32>) -> Result<ResetReport> {
    let words_reset = db.vocab().reset_all_priorities(BASE_PRIORITY)?;
    let runs_deleted = match category {
        Some(c) => db.ledger().reset_category(c)?,
        None => db.ledger().reset_all()?,
    };
    Ok(ResetReport {
        words_reset,
        runs_deleted,
    })
}

enum RoundResult {
    Committed { run: TestRun, stop: bool },
    NothingToDraw,
}

/// Drives select → generate → render → commit rounds until the inventory is drilled out
pub struct TestOrchestrator<'a, G: QuestionGenerator, R: ArtifactRenderer> {
    db: &'a mut Database,
    generator: G,
    renderer: R,
    engine: SelectionEngine,
    rng: StdRng,
    state: OrchestratorState,
}

impl<'a, G: QuestionGenerator, R: ArtifactRenderer> TestOrchestrator<'a, G, R> {
    pub fn new(db: &'a mut Database, generator: G, renderer: R, engine: SelectionEngine) -> Self {
        Self {
            db,
            generator,
            renderer,
            engine,
            rng: StdRng::from_entropy(),
            state: OrchestratorState::Idle,
        }
    }

    /// Make draws reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug!(from = %self.state, to = %next, "orchestrator state");
        self.state = next;
    }

    /// Generate tests for `category` until a round reports nothing left to practise.
    ///
    /// The round that sees the stop condition is still generated and committed;
    /// the batch ends after it. An empty inventory ends the batch with no rounds.
    pub fn generate_tests(&mut self, category: u32) -> std::result::Result<BatchReport, BatchError> {
        let mut runs = Vec::new();

        if self.engine.words_per_test() == 0 {
            self.transition(OrchestratorState::BatchFailed);
            return Err(BatchError {
                category,
                rounds_committed: 0,
                source: DrillError::Validation("words per test must be at least 1".into()),
            });
        }

        loop {
            self.transition(OrchestratorState::RoundInProgress);
            match self.run_round(category) {
                Ok(RoundResult::Committed { run, stop }) => {
                    self.transition(OrchestratorState::RoundSucceeded);
                    runs.push(run);
                    if stop {
                        break;
                    }
                    self.transition(OrchestratorState::Idle);
                }
                Ok(RoundResult::NothingToDraw) => {
                    info!(category, "inventory is empty, nothing to test");
                    break;
                }
                Err(source) => {
                    self.transition(OrchestratorState::RoundFailed);
                    error!(category, rounds_committed = runs.len(), error = %source, "round failed");
                    self.transition(OrchestratorState::BatchFailed);
                    return Err(BatchError {
                        category,
                        rounds_committed: runs.len(),
                        source,
                    });
                }
            }
        }

        self.transition(OrchestratorState::BatchStopped);
        info!(category, rounds = runs.len(), "batch finished");
        Ok(BatchReport { category, runs })
    }

    fn run_round(&mut self, category: u32) -> Result<RoundResult> {
        let summary = self.db.ledger().summary(category)?;
        let snapshot = self.db.vocab().get_selection_snapshot()?;
        if snapshot.is_empty() {
            return Ok(RoundResult::NothingToDraw);
        }

        let outcome = self.engine.select(snapshot, &mut self.rng);
        let words = outcome.words();
        let questions = self.generator.generate(&words)?;

        let vocab = self.db.vocab();
        let entries = words
            .iter()
            .map(|w| {
                vocab
                    .get(w)?
                    .ok_or_else(|| DrillError::NotFound(format!("word '{w}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        let sequence = summary.next_sequence();
        let material = TestMaterial {
            category,
            sequence,
            entries,
            questions,
        };
        let artifact_location = self.renderer.render(&material)?;

        let run = TestRun {
            category,
            sequence,
            words: words.iter().join(" "),
            artifact_location,
        };
        self.db.commit_round(&outcome.priority_updates(), &run)?;

        info!(
            category,
            sequence,
            words = words.len(),
            stop = outcome.stop,
            "test committed"
        );
        Ok(RoundResult::Committed {
            run,
            stop: outcome.stop,
        })
    }

    pub fn reset(&mut self, category: Option<u32>) -> Result<ResetReport> {
        let report = reset_progress(&*self.db, category)?;
        self.transition(OrchestratorState::Idle);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::QuestionItem;
    use crate::vocab_store::WordRecord;
    use assert_matches::assert_matches;
    use std::cell::{Cell, RefCell};

    /// Writes "____ <word>" questions; can be told to fail on a given call
    #[derive(Default)]
    struct FakeGenerator {
        calls: Cell<usize>,
        fail_on_call: Option<usize>,
    }

    impl QuestionGenerator for FakeGenerator {
        fn generate(&self, words: &[String]) -> Result<Vec<QuestionItem>> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if Some(call) == self.fail_on_call {
                return Err(DrillError::Collaborator("model unavailable".into()));
            }
            Ok(words
                .iter()
                .map(|w| QuestionItem {
                    word: w.clone(),
                    question: format!("Fill in: ________ ({} letters)", w.len()),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        rendered: RefCell<Vec<(u32, u32, usize)>>,
        fail: bool,
    }

    impl ArtifactRenderer for RecordingRenderer {
        fn render(&self, material: &TestMaterial) -> Result<String> {
            if self.fail {
                return Err(DrillError::Collaborator("printer on fire".into()));
            }
            assert_eq!(material.entries.len(), material.questions.len());
            self.rendered.borrow_mut().push((
                material.category,
                material.sequence,
                material.questions.len(),
            ));
            Ok(format!("mem://{}/{}", material.category, material.sequence))
        }
    }

    fn inventory(n: usize, critical: bool) -> Database {
        let db = Database::open_in_memory().unwrap();
        for i in 0..n {
            db.vocab()
                .insert(&WordRecord::bare(&format!("word{i:02}")), critical)
                .unwrap();
        }
        db
    }

    fn all_priorities(db: &Database) -> Vec<u32> {
        db.vocab()
            .get_selection_snapshot()
            .unwrap()
            .candidates()
            .iter()
            .map(|(_, p)| *p)
            .collect()
    }

    #[test]
    fn batch_runs_until_everything_is_drilled_out() {
        let mut db = inventory(25, false);
        let generator = FakeGenerator::default();
        let renderer = RecordingRenderer::default();

        let report = {
            let mut orch =
                TestOrchestrator::new(&mut db, &generator, &renderer, SelectionEngine::new(20))
                    .with_seed(17);
            let report = orch.generate_tests(1).unwrap();
            assert_eq!(orch.state(), OrchestratorState::BatchStopped);
            report
        };

        assert!(report.rounds() >= 3);
        assert!(all_priorities(&db).iter().all(|p| *p == 0));

        let sequences: Vec<u32> = report.runs.iter().map(|r| r.sequence).collect();
        let expected: Vec<u32> = (1..=report.rounds() as u32).collect();
        assert_eq!(sequences, expected);
        assert!(report
            .runs
            .iter()
            .all(|r| r.words.split(' ').count() == 20));

        let summary = db.ledger().summary(1).unwrap();
        assert_eq!(summary.last_sequence as usize, report.rounds());
        assert_eq!(renderer.rendered.borrow().len(), report.rounds());
        assert_eq!(generator.calls.get(), report.rounds());
    }

    #[test]
    fn exhausted_inventory_gets_exactly_one_round() {
        let mut db = inventory(5, false);
        let zeros: Vec<(String, u32)> = (0..5).map(|i| (format!("word{i:02}"), 0)).collect();
        db.vocab().apply_priority_updates(&zeros).unwrap();

        let mut orch = TestOrchestrator::new(
            &mut db,
            FakeGenerator::default(),
            RecordingRenderer::default(),
            SelectionEngine::new(3),
        )
        .with_seed(1);
        let report = orch.generate_tests(4).unwrap();

        assert_eq!(report.rounds(), 1);
        assert_eq!(report.runs[0].sequence, 1);
        assert_eq!(report.runs[0].words.split(' ').count(), 3);
    }

    #[test]
    fn empty_inventory_ends_without_rounds() {
        let mut db = Database::open_in_memory().unwrap();
        let generator = FakeGenerator::default();

        let mut orch = TestOrchestrator::new(
            &mut db,
            &generator,
            RecordingRenderer::default(),
            SelectionEngine::default(),
        );
        let report = orch.generate_tests(1).unwrap();

        assert_eq!(report.rounds(), 0);
        assert_eq!(orch.state(), OrchestratorState::BatchStopped);
        assert_eq!(generator.calls.get(), 0);
    }

    #[test]
    fn generator_failure_keeps_earlier_rounds() {
        let mut db = inventory(10, true);
        let generator = FakeGenerator {
            fail_on_call: Some(2),
            ..Default::default()
        };

        let err = {
            let mut orch = TestOrchestrator::new(
                &mut db,
                &generator,
                RecordingRenderer::default(),
                SelectionEngine::new(10),
            )
            .with_seed(3);
            let err = orch.generate_tests(2).unwrap_err();
            assert_eq!(orch.state(), OrchestratorState::BatchFailed);
            err
        };

        assert_eq!(err.rounds_committed, 1);
        assert_matches!(err.source, DrillError::Collaborator(_));
        assert_eq!(db.ledger().summary(2).unwrap().run_count, 1);
        // round one drew all ten critical words: 15 -> 10
        assert!(all_priorities(&db).iter().all(|p| *p == 10));
    }

    #[test]
    fn renderer_failure_persists_nothing() {
        let mut db = inventory(4, false);
        let renderer = RecordingRenderer {
            fail: true,
            ..Default::default()
        };

        let err = TestOrchestrator::new(
            &mut db,
            FakeGenerator::default(),
            &renderer,
            SelectionEngine::new(2),
        )
        .generate_tests(1)
        .unwrap_err();

        assert_eq!(err.rounds_committed, 0);
        assert!(db.ledger().all_summaries().unwrap().is_empty());
        assert!(all_priorities(&db).iter().all(|p| *p == 10));
    }

    #[test]
    fn zero_words_per_test_is_rejected() {
        let mut db = inventory(2, false);
        let err = TestOrchestrator::new(
            &mut db,
            FakeGenerator::default(),
            RecordingRenderer::default(),
            SelectionEngine::new(0),
        )
        .generate_tests(1)
        .unwrap_err();
        assert_matches!(err.source, DrillError::Validation(_));
    }

    #[test]
    fn categories_number_independently() {
        let mut db = inventory(3, false);
        let mut orch = TestOrchestrator::new(
            &mut db,
            FakeGenerator::default(),
            RecordingRenderer::default(),
            SelectionEngine::new(20),
        );
        let first = orch.generate_tests(1).unwrap();
        orch.reset(Some(9)).unwrap();
        let second = orch.generate_tests(2).unwrap();

        assert_eq!(first.runs[0].sequence, 1);
        assert_eq!(second.runs[0].sequence, 1);
        assert_eq!(first.category, 1);
        assert_eq!(second.category, 2);
    }

    #[test]
    fn reset_restores_priorities_and_clears_runs() {
        let mut db = inventory(6, false);
        TestOrchestrator::new(
            &mut db,
            FakeGenerator::default(),
            RecordingRenderer::default(),
            SelectionEngine::new(4),
        )
        .with_seed(8)
        .generate_tests(1)
        .unwrap();
        db.ledger()
            .insert(&TestRun {
                category: 5,
                sequence: 1,
                words: "word00".into(),
                artifact_location: "elsewhere".into(),
            })
            .unwrap();

        let report = reset_progress(&db, Some(1)).unwrap();
        assert_eq!(report.words_reset, 6);
        assert!(report.runs_deleted >= 1);
        assert!(all_priorities(&db).iter().all(|p| *p == 10));
        assert_eq!(db.ledger().summary(1).unwrap().run_count, 0);
        assert_eq!(db.ledger().summary(5).unwrap().run_count, 1);

        let report = reset_progress(&db, None).unwrap();
        assert_eq!(report.runs_deleted, 1);
        assert!(db.ledger().all_summaries().unwrap().is_empty());
    }
}
