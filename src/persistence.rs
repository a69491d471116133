// File: src/persistence.rs
use crate::core::context::Context;
use crate::core::types::{NextWordStat, Successors, Token};
use crate::error::{ChatError, Result};
use crate::store::{check_order, increment, opener, FrequencyStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const MAGIC: [u8; 4] = *b"NGRM";
const FORMAT_VERSION: u32 = 1;

/// Artifact header, written before the rows.
#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u32,
    order: usize,
    rows: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Writable,
    ReadOnly,
}

/// The frequency table backed by a single model file.
///
/// Rows are `(w1..wN, next_token, count)`, unique per `(context, next_token)`.
/// In memory they are held in a `BTreeMap` keyed by the full context, so a
/// lookup costs O(log n) in the number of distinct contexts.
///
/// A store from [`PersistentStore::create`] accepts upserts and is written
/// with [`PersistentStore::flush`]. A store from [`PersistentStore::open`]
/// is read-only for the rest of its life.
#[derive(Debug)]
pub struct PersistentStore {
    path: PathBuf,
    order: usize,
    mode: Mode,
    index: BTreeMap<Context, Successors>,
    openers: Vec<Token>,
}

impl PersistentStore {
    /// True if a model artifact is present at `path`.
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Starts an empty, writable table that will be saved to `path`.
    pub fn create(path: &Path, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(ChatError::InvalidConfig("order must be at least 1".into()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            order,
            mode: Mode::Writable,
            index: BTreeMap::new(),
            openers: Vec::new(),
        })
    }

    /// Opens an existing artifact for serving.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ChatError::io(e, Some(path.to_path_buf())))?;
        let mut reader = BufReader::new(file);

        let header: Header = bincode::deserialize_from(&mut reader)?;
        if header.magic != MAGIC {
            return Err(ChatError::Serialization(format!(
                "{} is not a model file",
                path.display()
            )));
        }
        if header.version != FORMAT_VERSION {
            return Err(ChatError::Serialization(format!(
                "unsupported model format version {}",
                header.version
            )));
        }

        let mut index: BTreeMap<Context, Successors> = BTreeMap::new();
        for _ in 0..header.rows {
            let row: NextWordStat = bincode::deserialize_from(&mut reader)?;
            if row.context.len() != header.order {
                return Err(ChatError::OrderMismatch {
                    expected: header.order,
                    found: row.context.len(),
                });
            }
            index
                .entry(Context::new(row.context))
                .or_default()
                .insert(row.next_token, row.count);
        }
        let openers: Vec<Token> = index.keys().filter_map(opener).map(str::to_string).collect();

        info!(
            path = %path.display(),
            order = header.order,
            rows = header.rows,
            contexts = index.len(),
            openers = openers.len(),
            "opened frequency store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            order: header.order,
            mode: Mode::ReadOnly,
            index,
            openers,
        })
    }

    /// Writes the table to its path atomically: the rows go to a temporary
    /// file in the same directory which then replaces the artifact.
    pub fn flush(&self) -> Result<()> {
        let parent_dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir).map_err(|e| ChatError::io(e, Some(parent_dir.into())))?;

        let temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|e| ChatError::io(e, Some(parent_dir.into())))?;
        {
            let mut writer = BufWriter::new(&temp_file);
            let rows: u64 = self.index.values().map(|s| s.len() as u64).sum();
            let header = Header {
                magic: MAGIC,
                version: FORMAT_VERSION,
                order: self.order,
                rows,
            };
            bincode::serialize_into(&mut writer, &header)?;
            for (context, successors) in &self.index {
                let tokens = context.to_vec();
                for (next, &count) in successors {
                    let row = NextWordStat {
                        context: tokens.clone(),
                        next_token: next.clone(),
                        count,
                    };
                    bincode::serialize_into(&mut writer, &row)?;
                }
            }
            std::io::Write::flush(&mut writer)
                .map_err(|e| ChatError::io(e, Some(self.path.clone())))?;
        }

        temp_file
            .persist(&self.path)
            .map_err(|e| ChatError::io(e.error, Some(self.path.clone())))?;
        debug!(path = %self.path.display(), "frequency store flushed");
        Ok(())
    }

    /// Saves the table and reopens it read-only.
    pub fn finish(self) -> Result<Self> {
        self.flush()?;
        Self::open(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == Mode::ReadOnly
    }
}

impl FrequencyStore for PersistentStore {
    fn order(&self) -> usize {
        self.order
    }

    fn upsert_increment(&mut self, context: &Context, next: &str) -> Result<()> {
        if self.mode == Mode::ReadOnly {
            return Err(ChatError::ReadOnlyStore(self.path.clone()));
        }
        check_order(self.order, context)?;
        match self.index.get_mut(context) {
            Some(successors) => increment(successors, next),
            None => {
                let mut successors = Successors::new();
                increment(&mut successors, next);
                self.index.insert(context.clone(), successors);
                if let Some(token) = opener(context) {
                    self.openers.push(token.to_string());
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, context: &Context) -> Option<&Successors> {
        self.index.get(context)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&Context, &Successors)> + '_> {
        Box::new(self.index.iter())
    }

    fn openers(&self) -> &[Token] {
        &self.openers
    }

    fn context_count(&self) -> usize {
        self.index.len()
    }
}
