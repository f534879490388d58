//! Seams to the services a drill depends on but does not implement itself:
//! dictionary enrichment, question writing and paper rendering.

pub mod llm;
pub mod paper;

pub use llm::LlmClient;
pub use paper::{PaperFormat, PdfPaperRenderer, TextPaperRenderer};

use crate::error::Result;
use crate::vocab_store::{VocabEntry, WordRecord};
use serde::{Deserialize, Serialize};

/// Turns a raw word into a full dictionary-style record
pub trait WordEnricher {
    fn enrich(&self, word: &str) -> Result<WordRecord>;
}

/// Writes one fill-in-the-blank question per word, in the order given
pub trait QuestionGenerator {
    fn generate(&self, words: &[String]) -> Result<Vec<QuestionItem>>;
}

/// Lays out a finished test somewhere a learner can use it; returns its location
pub trait ArtifactRenderer {
    fn render(&self, material: &TestMaterial) -> Result<String>;
}

impl<T: WordEnricher + ?Sized> WordEnricher for &T {
    fn enrich(&self, word: &str) -> Result<WordRecord> {
        (**self).enrich(word)
    }
}

impl<T: QuestionGenerator + ?Sized> QuestionGenerator for &T {
    fn generate(&self, words: &[String]) -> Result<Vec<QuestionItem>> {
        (**self).generate(words)
    }
}

impl<T: ArtifactRenderer + ?Sized> ArtifactRenderer for &T {
    fn render(&self, material: &TestMaterial) -> Result<String> {
        (**self).render(material)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionItem {
    pub word: String,
    pub question: String,
}

impl QuestionItem {
    /// The question with its blank filled in by the word
    pub fn answer(&self) -> String {
        match find_blank(&self.question) {
            Some((start, end)) => format!(
                "{}{}{}",
                &self.question[..start],
                self.word,
                &self.question[end..]
            ),
            None => self.question.clone(),
        }
    }

    pub fn has_blank(&self) -> bool {
        find_blank(&self.question).is_some()
    }
}

/// Byte range of the first run of three or more underscores
fn find_blank(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let start = i;
            while i < bytes.len() && bytes[i] == b'_' {
                i += 1;
            }
            if i - start >= 3 {
                return Some((start, i));
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Everything needed to lay out one numbered test
#[derive(Debug, Clone, PartialEq)]
pub struct TestMaterial {
    pub category: u32,
    pub sequence: u32,
    pub entries: Vec<VocabEntry>,
    pub questions: Vec<QuestionItem>,
}
