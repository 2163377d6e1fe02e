//! Session notes and their content model.
//!
//! Note content arrives either as a structured document or as raw text
//! (free prose from transcription, or a serialised document from an older
//! client). [`NoteContent`] keeps the two apart until a single normalisation
//! step at the write boundary turns it into [`StructuredContent`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Structured content ──────────────────────────────────────────────────────

/// One titled block of a note, e.g. "Assessment" or "Plan".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSection {
  pub heading: String,
  pub body:    String,
}

/// The stored shape of a note. The default value is the empty document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredContent {
  pub summary:  String,
  /// Free-form text, e.g. a transcript or unstructured observations.
  pub body:     String,
  pub sections: Vec<NoteSection>,
}

impl StructuredContent {
  pub fn is_empty(&self) -> bool {
    self.summary.trim().is_empty()
      && self.body.trim().is_empty()
      && self
        .sections
        .iter()
        .all(|s| s.heading.trim().is_empty() && s.body.trim().is_empty())
  }
}

// ─── Caller-supplied content ─────────────────────────────────────────────────

/// Content as supplied by a caller.
///
/// Deserialises from either a JSON object (structured) or a JSON string
/// (raw).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteContent {
  Structured(StructuredContent),
  Raw(String),
}

impl NoteContent {
  pub fn is_blank(&self) -> bool {
    match self {
      Self::Structured(c) => c.is_empty(),
      Self::Raw(s) => s.trim().is_empty(),
    }
  }

  /// Convert to the stored shape.
  ///
  /// Raw text that looks like a serialised document (leading `{` or `[`) is
  /// parsed; anything else is kept verbatim as the note body. Returns
  /// [`Error::MalformedContent`] when serialised text does not parse.
  pub fn into_structured(self) -> Result<StructuredContent> {
    match self {
      Self::Structured(c) => Ok(c),
      Self::Raw(text) => {
        let trimmed = text.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
          serde_json::from_str(trimmed).map_err(Error::MalformedContent)
        } else {
          Ok(StructuredContent {
            body: trimmed.to_string(),
            ..Default::default()
          })
        }
      }
    }
  }
}

impl From<String> for NoteContent {
  fn from(s: String) -> Self { Self::Raw(s) }
}

impl From<StructuredContent> for NoteContent {
  fn from(c: StructuredContent) -> Self { Self::Structured(c) }
}

// ─── Note ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionNote {
  pub note_id:      Uuid,
  pub session_id:   Uuid,
  pub client_id:    Uuid,
  pub therapist_id: Uuid,
  pub title:        String,
  pub content:      StructuredContent,
  /// Modality label, e.g. "CBT" or "EMDR".
  pub therapy_type: Option<String>,
  pub tags:         Vec<String>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// Input to [`crate::store::RecordStore::insert_session_note`]. All ids are
/// resolved before this is built.
#[derive(Debug, Clone)]
pub struct NewSessionNote {
  pub session_id:   Uuid,
  pub client_id:    Uuid,
  pub therapist_id: Uuid,
  pub title:        String,
  pub content:      StructuredContent,
  pub therapy_type: Option<String>,
  pub tags:         Vec<String>,
}
