use super::{QuestionGenerator, QuestionItem, WordEnricher};
use crate::config::LlmConfig;
use crate::error::{DrillError, Result};
use crate::vocab_store::WordRecord;
use itertools::Itertools;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const ENRICH_PROMPT: &str = r#"You're an excellent English teacher for an 11 year old student. Given an input word, describe it using the fields below. No additional commentary.
Return a single JSON object fenced by a markdown code block with exactly these string fields:
word, meaning, usage, etymology, word_break, picture, did_you_know_facts, synonyms, antonyms, additional_facts.
- meaning: definition of the most common meaning
- usage: an example sentence
- etymology: origin of the word
- word_break: breakdown of the word that aids memory
- picture: a visual cue
- did_you_know_facts: an interesting fact
- synonyms, antonyms: comma separated
- additional_facts: numbered facts separated by newlines; always mention homographs, homonyms or homophones with an example, and other meanings of the word
If the word does not exist, return "word" as an empty string and empty strings for all other fields.

input_word : "#;

const QUESTION_PROMPT: &str = r#"Create a vocabulary test for 11 year old students.
1) For each word listed, write a sentence that uses the word, with the word replaced by ________.
2) The word, and no other listed word, must be the right fit for the sentence.
3) The level of difficulty is Very Hard.
4) Return a single JSON object fenced by a markdown code block, shaped like
   {"questions": [{"word": "parallel", "question": "The two railway tracks run ________ to each other for many miles."}]}
   with one entry per word, in the order given, and nothing else.

Words :
"#;

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct QuestionSheet {
    questions: Vec<QuestionItem>,
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| DrillError::Collaborator(format!("building http client: {e}")))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: std::env::var(&cfg.api_key_env).ok().filter(|k| !k.is_empty()),
        })
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": 0.7,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: ChatResponse = request
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| DrillError::Collaborator(format!("chat completion failed: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| DrillError::Collaborator("chat completion returned no content".into()))
    }
}

impl WordEnricher for LlmClient {
    fn enrich(&self, word: &str) -> Result<WordRecord> {
        let word = word.trim();
        if word.is_empty() {
            return Err(DrillError::Validation("cannot enrich an empty word".into()));
        }

        debug!(word, model = %self.model, "requesting enrichment");
        let content = self.complete(&format!("{ENRICH_PROMPT}{word}"))?;
        let record = parse_word_record(&content)?;
        info!(word, "enriched word");
        Ok(record)
    }
}

impl QuestionGenerator for LlmClient {
    fn generate(&self, words: &[String]) -> Result<Vec<QuestionItem>> {
        if words.is_empty() {
            return Err(DrillError::Validation("no words to write questions for".into()));
        }

        debug!(words = words.len(), model = %self.model, "requesting questions");
        let content = self.complete(&format!("{QUESTION_PROMPT}{}", words.iter().join(" ")))?;
        parse_questions(words, &content)
    }
}

/// Pull the JSON payload out of a reply that may wrap it in a markdown fence
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn parse_word_record(content: &str) -> Result<WordRecord> {
    let record: WordRecord = serde_json::from_str(extract_json(content))
        .map_err(|e| DrillError::Collaborator(format!("unparsable word record: {e}")))?;

    let word = record.word.trim();
    if word.is_empty() || word.eq_ignore_ascii_case("none") {
        return Err(DrillError::Collaborator("enrichment returned no word".into()));
    }
    Ok(record)
}

/// Match the returned questions to the requested words, in request order
fn parse_questions(words: &[String], content: &str) -> Result<Vec<QuestionItem>> {
    let sheet: QuestionSheet = serde_json::from_str(extract_json(content))
        .map_err(|e| DrillError::Collaborator(format!("unparsable question sheet: {e}")))?;

    let mut remaining = sheet.questions;
    let mut ordered = Vec::with_capacity(words.len());
    for word in words {
        let pos = remaining
            .iter()
            .position(|q| q.word.trim().eq_ignore_ascii_case(word))
            .ok_or_else(|| DrillError::Collaborator(format!("no question for '{word}'")))?;
        let item = remaining.swap_remove(pos);
        if item.question.trim().is_empty() {
            return Err(DrillError::Collaborator(format!("empty question for '{word}'")));
        }
        ordered.push(QuestionItem {
            word: word.clone(),
            question: item.question.trim().to_string(),
        });
    }
    Ok(ordered)
}
