// File: src/corpus.rs
// Reading question/answer pairs from training corpora.

use crate::core::types::QaPair;
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// On-disk layout of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusFormat {
    /// Pick from the file extension: `.jsonl`/`.json` read as JSON lines,
    /// anything else as paired lines.
    #[default]
    Auto,
    /// A question line followed by an answer line, records separated by
    /// blank lines.
    Paired,
    /// One `{"question": ..., "answer": ...}` object per line.
    Jsonl,
    /// One `{"conversations": [{"from": "human", "value": ...}, ...]}`
    /// object per line; each human turn followed by a gpt turn is a pair.
    Conversations,
}

impl CorpusFormat {
    pub fn resolve(self, path: &Path) -> Self {
        if self != CorpusFormat::Auto {
            return self;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("json") => CorpusFormat::Jsonl,
            _ => CorpusFormat::Paired,
        }
    }
}

#[derive(Deserialize)]
struct JsonRecord {
    question: Option<String>,
    answer: Option<String>,
}

#[derive(Deserialize)]
struct Turn {
    from: Option<String>,
    value: Option<String>,
}

#[derive(Deserialize)]
struct ConversationRecord {
    conversations: Vec<Turn>,
}

/// Reads up to `max_pairs` pairs. Incomplete or malformed records are
/// skipped; running out of input early is not an error.
pub fn load_qa_pairs<R: BufRead>(
    reader: R,
    format: CorpusFormat,
    max_pairs: usize,
) -> Result<Vec<QaPair>> {
    let mut pairs = Vec::new();
    if max_pairs == 0 {
        return Ok(pairs);
    }
    let mut block: Vec<String> = Vec::with_capacity(2);
    let mut skipped = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ChatError::io(e, None))?;
        let line = line.trim();

        match format {
            CorpusFormat::Paired | CorpusFormat::Auto => {
                if line.is_empty() {
                    close_record(&mut block, &mut pairs, &mut skipped);
                } else {
                    block.push(line.to_string());
                }
            }
            _ if line.is_empty() => continue,
            CorpusFormat::Jsonl => match serde_json::from_str::<JsonRecord>(line) {
                Ok(record) => {
                    let pair = QaPair::new(
                        record.question.as_deref().unwrap_or(""),
                        record.answer.as_deref().unwrap_or(""),
                    );
                    match pair {
                        Some(pair) => pairs.push(pair),
                        None => skipped += 1,
                    }
                }
                Err(e) => {
                    debug!(line = line_no + 1, error = %e, "skipping malformed record");
                    skipped += 1;
                }
            },
            CorpusFormat::Conversations => {
                match serde_json::from_str::<ConversationRecord>(line) {
                    Ok(record) => pairs.extend(conversation_pairs(&record.conversations)),
                    Err(e) => {
                        debug!(line = line_no + 1, error = %e, "skipping malformed record");
                        skipped += 1;
                    }
                }
            }
        }

        if pairs.len() >= max_pairs {
            break;
        }
    }
    close_record(&mut block, &mut pairs, &mut skipped);
    pairs.truncate(max_pairs);

    if skipped > 0 {
        debug!(skipped, "corpus records skipped");
    }
    Ok(pairs)
}

/// Ends a paired-line record at a blank line or end of input. Two lines
/// make one pair. An even run of lines with no blank between records reads
/// as back-to-back pairs; an odd run has no clear pairing and is dropped.
fn close_record(block: &mut Vec<String>, pairs: &mut Vec<QaPair>, skipped: &mut usize) {
    if block.is_empty() {
        return;
    }
    if block.len() % 2 == 0 {
        pairs.extend(block.chunks_exact(2).filter_map(|qa| QaPair::new(&qa[0], &qa[1])));
    } else {
        debug!(lines = block.len(), first = %block[0], "skipping incomplete record");
        *skipped += 1;
    }
    block.clear();
}

fn conversation_pairs(turns: &[Turn]) -> Vec<QaPair> {
    turns
        .chunks_exact(2)
        .filter(|t| t[0].from.as_deref() == Some("human") && t[1].from.as_deref() == Some("gpt"))
        .filter_map(|t| {
            QaPair::new(
                t[0].value.as_deref().unwrap_or(""),
                t[1].value.as_deref().unwrap_or(""),
            )
        })
        .collect()
}

pub fn load_qa_pairs_from_path(
    path: &Path,
    format: CorpusFormat,
    max_pairs: usize,
) -> Result<Vec<QaPair>> {
    let file = File::open(path).map_err(|e| ChatError::io(e, Some(path.to_path_buf())))?;
    let format = format.resolve(path);
    let pairs = load_qa_pairs(BufReader::new(file), format, max_pairs)
        .map_err(|e| match e {
            ChatError::Io { source, .. } => ChatError::io(source, Some(path.to_path_buf())),
            other => other,
        })?;
    info!(path = %path.display(), ?format, pairs = pairs.len(), "loaded corpus");
    Ok(pairs)
}
