//! Shared fixtures for the integration tests: a tiny PDF writer and
//! deterministic stand-ins for the embedding and chat services

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Mutex;

use magazine_qa::Result;
use magazine_qa::config::{Config, OllamaConfig};
use magazine_qa::embeddings::{Embedder, normalize};
use magazine_qa::llm::{ApiKey, ChatGenerator, ChatMessage};
use tempfile::TempDir;

pub const DIMENSION: usize = 64;

pub const EDITOR_PAGE: &str = "Letter from the editor. Spring arrives with new trail maps and guided forest walks for members.";
pub const RIVER_PAGE: &str = "The river cleanup brought two hundred volunteers to the riverbank. Volunteers collected plastic from the river shallows.";
pub const BUDGET_PAGE: &str = "Budget report. Membership fees rose slightly this quarter while printing costs stayed flat.";

/// Build a minimal PDF with one line of Helvetica text per page
///
/// An empty string produces a page with an empty content stream.
pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    let object_count = 3 + 2 * page_count;
    let mut objects: Vec<String> = Vec::with_capacity(object_count);

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );

    for (i, text) in pages.iter().enumerate() {
        let stream = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 10 Tf 36 720 Td ({}) Tj ET", escape(text))
        };
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));

    pdf.into_bytes()
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Write the three-page sample magazine into `dir`
pub fn write_sample_magazine(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("magazine.pdf");
    std::fs::write(&path, build_pdf(&[EDITOR_PAGE, RIVER_PAGE, BUDGET_PAGE]))
        .expect("should write sample pdf");
    path
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        base_dir: dir.path().to_path_buf(),
        ollama: OllamaConfig {
            embedding_dimension: DIMENSION as u32,
            ..OllamaConfig::default()
        },
        ..Config::default()
    }
}

/// FNV-1a bucket for a word
fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % DIMENSION as u64) as usize
}

/// Bag-of-words vector over words of four or more letters
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 4)
    {
        vector[bucket(&word.to_lowercase())] += 1.0;
    }
    // keep blank input away from the zero vector
    vector[0] += 0.01;
    normalize(&mut vector);
    vector
}

/// Deterministic embedder that needs no model server
pub struct HashingEmbedder;

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-test"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed_texts(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hashed_embedding(t)).collect())
    }
}

/// Chat generator that echoes the question and remembers every request
#[derive(Default)]
pub struct EchoGenerator {
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl EchoGenerator {
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock should not be poisoned").len()
    }
}

impl ChatGenerator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }

    fn generate(&self, messages: &[ChatMessage], _api_key: &ApiKey) -> Result<String> {
        let question = messages
            .last()
            .and_then(|m| m.content.split("Question: ").nth(1))
            .and_then(|rest| rest.lines().next())
            .unwrap_or_default()
            .to_string();
        self.calls
            .lock()
            .expect("lock should not be poisoned")
            .push(messages.to_vec());
        Ok(format!("Answer to: {question}"))
    }
}

pub fn test_key() -> ApiKey {
    ApiKey::parse("sk-test-key").expect("valid key")
}
