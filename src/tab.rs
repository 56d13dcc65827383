//! Tablature data model
//!
//! Lesson tablature consumed read-only during a practice session: the
//! expected note sequence, string layout, and the selectable chunks that
//! scope practice to part of a piece.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Playing technique attached to an expected note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    #[default]
    None,
    HammerOn,
    PullOff,
}

/// One note of the expected sequence; time is in beats from the start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedNote {
    pub time: f32,
    pub string: u8,
    pub fret: u8,
    #[serde(default)]
    pub technique: Technique,
}

/// A selectable contiguous sub-range of the note sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Index of the first note in the chunk
    pub start: usize,
    /// Index one past the last note in the chunk
    pub end: usize,
    pub name: String,
}

/// A complete lesson tablature
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tablature {
    /// Open-string MIDI-style identifiers, low to high
    #[serde(default)]
    pub strings: Vec<u8>,
    pub notes: Vec<ExpectedNote>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl Tablature {
    /// Load a tablature from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading tab file {:?}", path.as_ref()))?;
        let tab: Tablature = serde_json::from_str(&contents)
            .with_context(|| format!("parsing tab file {:?}", path.as_ref()))?;
        Ok(tab)
    }

    /// Notes for the given chunk, or the whole sequence when `chunk` is
    /// `None`. Chunk bounds are clamped to the note range.
    pub fn chunk_notes(&self, chunk: Option<usize>) -> &[ExpectedNote] {
        match chunk.and_then(|i| self.chunks.get(i)) {
            Some(chunk) => {
                let start = chunk.start.min(self.notes.len());
                let end = chunk.end.clamp(start, self.notes.len());
                &self.notes[start..end]
            }
            None => &self.notes,
        }
    }

    /// Name of the given chunk, if it exists.
    pub fn chunk_name(&self, chunk: Option<usize>) -> Option<&str> {
        chunk
            .and_then(|i| self.chunks.get(i))
            .map(|c| c.name.as_str())
    }
}
