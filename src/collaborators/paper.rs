use super::{ArtifactRenderer, TestMaterial};
use crate::error::{DrillError, Result};
use clap::ValueEnum;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

/// File format of rendered papers
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaperFormat {
    Text,
    #[default]
    Pdf,
}

impl PaperFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PaperFormat::Text => "txt",
            PaperFormat::Pdf => "pdf",
        }
    }
}

pub fn file_name(category: u32, sequence: u32, format: PaperFormat) -> String {
    format!("vocab_test_{category}_{sequence:03}.{}", format.extension())
}

/// Paper content as lines: title, questions, answer key, then word notes
pub fn paper_lines(material: &TestMaterial) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Vocabulary Test {} (category {})",
            material.sequence, material.category
        ),
        String::new(),
        "Questions :".to_string(),
    ];
    lines.extend(
        material
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}) {}", i + 1, q.question)),
    );

    lines.push(String::new());
    lines.push("Answers :".to_string());
    lines.extend(
        material
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}) {}", i + 1, q.answer())),
    );

    if !material.entries.is_empty() {
        lines.push(String::new());
        lines.push("Words :".to_string());
        for entry in &material.entries {
            let r = &entry.record;
            if r.meaning.is_empty() {
                lines.push(format!("- {}", r.word));
            } else {
                lines.push(format!("- {}: {}", r.word, r.meaning));
            }
            if !r.word_break.is_empty() {
                lines.push(format!("    remember: {}", r.word_break));
            }
        }
    }

    lines
}

/// Writes each test as a plain-text paper
#[derive(Debug, Clone)]
pub struct TextPaperRenderer {
    output_dir: PathBuf,
}

impl TextPaperRenderer {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ArtifactRenderer for TextPaperRenderer {
    fn render(&self, material: &TestMaterial) -> Result<String> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name(
            material.category,
            material.sequence,
            PaperFormat::Text,
        ));

        let mut text = paper_lines(material).join("\n");
        text.push('\n');
        fs::write(&path, text)?;

        info!(path = %path.display(), "paper written");
        Ok(path.display().to_string())
    }
}

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_MM: f32 = 19.0;
const FONT_SIZE: f32 = 12.0;
const LEADING_MM: f32 = 6.5;
/// Characters per line at `FONT_SIZE` Helvetica inside the margins
const WRAP_AT: usize = 85;

/// Writes each test as an A4 PDF in Helvetica
#[derive(Debug, Clone)]
pub struct PdfPaperRenderer {
    output_dir: PathBuf,
}

impl PdfPaperRenderer {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

fn pdf_error(e: printpdf::Error) -> DrillError {
    DrillError::Collaborator(format!("pdf rendering failed: {e:?}"))
}

/// Greedy word wrap; words longer than `width` get a line of their own
fn wrap(line: &str, width: usize) -> Vec<String> {
    let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    let mut out = Vec::new();
    let mut current = indent.clone();
    for word in line.split_whitespace() {
        let len = current.chars().count();
        if len > indent.len() && len + 1 + word.chars().count() > width {
            out.push(std::mem::replace(&mut current, indent.clone()));
        }
        if current.len() > indent.len() {
            current.push(' ');
        }
        current.push_str(word);
    }
    out.push(current);
    out
}

impl ArtifactRenderer for PdfPaperRenderer {
    fn render(&self, material: &TestMaterial) -> Result<String> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name(
            material.category,
            material.sequence,
            PaperFormat::Pdf,
        ));

        let title = format!("Vocabulary Test {}", material.sequence);
        let (doc, page, layer) = PdfDocument::new(&title, PAGE_WIDTH, PAGE_HEIGHT, "text");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?;

        let top = PAGE_HEIGHT.0 - MARGIN_MM;
        let mut current = doc.get_page(page).get_layer(layer);
        let mut y = top;
        let mut pages = 1;
        for line in paper_lines(material).iter().flat_map(|l| wrap(l, WRAP_AT)) {
            if y < MARGIN_MM {
                let (page, layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "text");
                current = doc.get_page(page).get_layer(layer);
                y = top;
                pages += 1;
            }
            if !line.is_empty() {
                current.use_text(line, FONT_SIZE, Mm(MARGIN_MM), Mm(y), &font);
            }
            y -= LEADING_MM;
        }

        let mut out = BufWriter::new(File::create(&path)?);
        doc.save(&mut out).map_err(pdf_error)?;

        info!(path = %path.display(), pages, "paper written");
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::QuestionItem;
    use crate::vocab_store::{VocabEntry, WordRecord};
    use chrono::Local;
    use tempfile::tempdir;

    fn material() -> TestMaterial {
        let entry = VocabEntry {
            record: WordRecord {
                word: "chasm".into(),
                meaning: "a deep crack in the ground".into(),
                word_break: "ch-asm".into(),
                ..Default::default()
            },
            priority: 5,
            created_at: Local::now(),
        };
        TestMaterial {
            category: 2,
            sequence: 7,
            entries: vec![entry],
            questions: vec![QuestionItem {
                word: "chasm".into(),
                question: "The hikers could not cross the deep ________.".into(),
            }],
        }
    }

    #[test]
    fn file_names_carry_category_sequence_and_extension() {
        assert_eq!(file_name(2, 7, PaperFormat::Text), "vocab_test_2_007.txt");
        assert_eq!(file_name(11, 123, PaperFormat::Pdf), "vocab_test_11_123.pdf");
        assert_eq!(PaperFormat::default(), PaperFormat::Pdf);
        assert_eq!(PaperFormat::Text.to_string(), "text");
    }

    #[test]
    fn layout_lists_questions_then_answers_then_notes() {
        let lines = paper_lines(&material());
        assert_eq!(
            lines,
            vec![
                "Vocabulary Test 7 (category 2)",
                "",
                "Questions :",
                "1) The hikers could not cross the deep ________.",
                "",
                "Answers :",
                "1) The hikers could not cross the deep chasm.",
                "",
                "Words :",
                "- chasm: a deep crack in the ground",
                "    remember: ch-asm",
            ]
        );
    }

    #[test]
    fn layout_without_entries_has_no_word_notes() {
        let mut m = material();
        m.entries.clear();
        let lines = paper_lines(&m);
        assert!(!lines.iter().any(|l| l == "Words :"));
        assert_eq!(lines.last().unwrap(), "1) The hikers could not cross the deep chasm.");
    }

    #[test]
    fn wrap_keeps_short_lines_and_indent() {
        assert_eq!(wrap("short line", 80), vec!["short line"]);
        assert_eq!(wrap("", 80), vec![""]);
        assert_eq!(
            wrap("    remember: aa bb cc", 16),
            vec!["    remember: aa", "    bb cc"]
        );
        assert!(wrap(&"word ".repeat(100), 30)
            .iter()
            .all(|l| l.chars().count() <= 30));
    }

    #[test]
    fn renders_text_paper() {
        let dir = tempdir().unwrap();
        let renderer = TextPaperRenderer::new(dir.path().join("papers"));

        let location = renderer.render(&material()).unwrap();
        assert!(location.ends_with("vocab_test_2_007.txt"));

        let text = fs::read_to_string(&location).unwrap();
        assert!(text.starts_with("Vocabulary Test 7 (category 2)"));
        assert!(text.contains("1) The hikers could not cross the deep chasm."));
        assert!(text.contains("remember: ch-asm"));
    }

    #[test]
    fn rerender_overwrites_same_file() {
        let dir = tempdir().unwrap();
        let renderer = TextPaperRenderer::new(dir.path());
        let first = renderer.render(&material()).unwrap();
        let second = renderer.render(&material()).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn renders_pdf_paper() {
        let dir = tempdir().unwrap();
        let renderer = PdfPaperRenderer::new(dir.path());

        let location = renderer.render(&material()).unwrap();
        assert!(location.ends_with("vocab_test_2_007.pdf"));

        let bytes = fs::read(&location).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_pdf_paper_spills_onto_more_pages() {
        let dir = tempdir().unwrap();
        let mut m = material();
        m.questions = (0..80)
            .map(|i| QuestionItem {
                word: format!("word{i}"),
                question: format!("Question {i} has a ________ to fill in."),
            })
            .collect();

        let location = PdfPaperRenderer::new(dir.path()).render(&m).unwrap();
        assert!(fs::metadata(&location).unwrap().len() > 0);
    }
}
