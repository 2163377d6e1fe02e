//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision so
//! that lexical order matches chronological order. Enums use their snake_case
//! text form. Tags, medications and note content are compact JSON. UUIDs are
//! hyphenated lowercase strings.

use std::str::FromStr;

use caseload_core::{
  client::{Client, ClientProfile, ProfileDetails},
  goal::{ProgressMetric, TreatmentGoal},
  note::{SessionNote, StructuredContent},
  session::Session,
  therapist::Therapist,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound as _, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// `dt` at the precision it will have after a round trip through a column.
pub fn stored(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

/// The current time at stored precision.
pub fn now() -> DateTime<Utc> { stored(Utc::now()) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// Parse a snake_case enum column.
pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| {
    Error::Core(caseload_core::Error::UnknownVariant {
      kind,
      value: s.to_string(),
    })
  })
}

pub fn encode_strings(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_strings(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

pub fn encode_content(c: &StructuredContent) -> Result<String> {
  Ok(serde_json::to_string(c)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Each `Raw*` struct holds the strings read directly from one row; the
// matching `*_COLUMNS` constant lists the columns in `from_row` order.

pub const THERAPIST_COLUMNS: &str =
  "t.therapist_id, t.principal_id, t.display_name, t.email, t.created_at";

pub struct RawTherapist {
  pub therapist_id: String,
  pub principal_id: String,
  pub display_name: String,
  pub email:        Option<String>,
  pub created_at:   String,
}

impl RawTherapist {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      therapist_id: row.get(0)?,
      principal_id: row.get(1)?,
      display_name: row.get(2)?,
      email:        row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_therapist(self) -> Result<Therapist> {
    Ok(Therapist {
      therapist_id: decode_uuid(&self.therapist_id)?,
      principal_id: decode_uuid(&self.principal_id)?,
      display_name: self.display_name,
      email:        self.email,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const CLIENT_COLUMNS: &str = "c.client_id, c.therapist_id, c.first_name, c.last_name, \
   c.email, c.phone, c.status, c.created_at, c.updated_at";

pub struct RawClient {
  pub client_id:    String,
  pub therapist_id: String,
  pub first_name:   String,
  pub last_name:    String,
  pub email:        Option<String>,
  pub phone:        Option<String>,
  pub status:       String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawClient {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      client_id:    row.get(0)?,
      therapist_id: row.get(1)?,
      first_name:   row.get(2)?,
      last_name:    row.get(3)?,
      email:        row.get(4)?,
      phone:        row.get(5)?,
      status:       row.get(6)?,
      created_at:   row.get(7)?,
      updated_at:   row.get(8)?,
    })
  }

  pub fn into_client(self) -> Result<Client> {
    Ok(Client {
      client_id:    decode_uuid(&self.client_id)?,
      therapist_id: decode_uuid(&self.therapist_id)?,
      first_name:   self.first_name,
      last_name:    self.last_name,
      email:        self.email,
      phone:        self.phone,
      status:       decode_enum("client status", &self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub const PROFILE_COLUMNS: &str = "p.profile_id, p.client_id, p.date_of_birth, p.gender, \
   p.address, p.emergency_contact, p.diagnosis, p.medications, p.notes, p.updated_at";

pub struct RawProfile {
  pub profile_id:        String,
  pub client_id:         String,
  pub date_of_birth:     Option<String>,
  pub gender:            Option<String>,
  pub address:           Option<String>,
  pub emergency_contact: Option<String>,
  pub diagnosis:         Option<String>,
  pub medications:       String,
  pub notes:             Option<String>,
  pub updated_at:        String,
}

impl RawProfile {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id:        row.get(0)?,
      client_id:         row.get(1)?,
      date_of_birth:     row.get(2)?,
      gender:            row.get(3)?,
      address:           row.get(4)?,
      emergency_contact: row.get(5)?,
      diagnosis:         row.get(6)?,
      medications:       row.get(7)?,
      notes:             row.get(8)?,
      updated_at:        row.get(9)?,
    })
  }

  pub fn into_profile(self) -> Result<ClientProfile> {
    Ok(ClientProfile {
      profile_id: decode_uuid(&self.profile_id)?,
      client_id:  decode_uuid(&self.client_id)?,
      details:    ProfileDetails {
        date_of_birth:     self.date_of_birth.as_deref().map(decode_date).transpose()?,
        gender:            self.gender,
        address:           self.address,
        emergency_contact: self.emergency_contact,
        diagnosis:         self.diagnosis,
        medications:       decode_strings(&self.medications)?,
        notes:             self.notes,
      },
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const SESSION_COLUMNS: &str = "s.session_id, s.client_id, s.therapist_id, s.session_date, \
   s.duration_minutes, s.session_type, s.status, s.notes, s.created_at";

pub struct RawSession {
  pub session_id:       String,
  pub client_id:        String,
  pub therapist_id:     String,
  pub session_date:     String,
  pub duration_minutes: u32,
  pub session_type:     String,
  pub status:           String,
  pub notes:            Option<String>,
  pub created_at:       String,
}

impl RawSession {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:       row.get(0)?,
      client_id:        row.get(1)?,
      therapist_id:     row.get(2)?,
      session_date:     row.get(3)?,
      duration_minutes: row.get(4)?,
      session_type:     row.get(5)?,
      status:           row.get(6)?,
      notes:            row.get(7)?,
      created_at:       row.get(8)?,
    })
  }

  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id:       decode_uuid(&self.session_id)?,
      client_id:        decode_uuid(&self.client_id)?,
      therapist_id:     decode_uuid(&self.therapist_id)?,
      session_date:     decode_dt(&self.session_date)?,
      duration_minutes: self.duration_minutes,
      session_type:     decode_enum("session type", &self.session_type)?,
      status:           decode_enum("session status", &self.status)?,
      notes:            self.notes,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

pub const NOTE_COLUMNS: &str = "n.note_id, n.session_id, n.client_id, n.therapist_id, n.title, \
   n.content_json, n.therapy_type, n.tags, n.created_at, n.updated_at";

pub struct RawNote {
  pub note_id:      String,
  pub session_id:   String,
  pub client_id:    String,
  pub therapist_id: String,
  pub title:        String,
  pub content_json: String,
  pub therapy_type: Option<String>,
  pub tags:         String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawNote {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      note_id:      row.get(0)?,
      session_id:   row.get(1)?,
      client_id:    row.get(2)?,
      therapist_id: row.get(3)?,
      title:        row.get(4)?,
      content_json: row.get(5)?,
      therapy_type: row.get(6)?,
      tags:         row.get(7)?,
      created_at:   row.get(8)?,
      updated_at:   row.get(9)?,
    })
  }

  pub fn into_note(self) -> Result<SessionNote> {
    Ok(SessionNote {
      note_id:      decode_uuid(&self.note_id)?,
      session_id:   decode_uuid(&self.session_id)?,
      client_id:    decode_uuid(&self.client_id)?,
      therapist_id: decode_uuid(&self.therapist_id)?,
      title:        self.title,
      content:      serde_json::from_str(&self.content_json)?,
      therapy_type: self.therapy_type,
      tags:         decode_strings(&self.tags)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub const GOAL_COLUMNS: &str =
  "g.goal_id, g.client_id, g.title, g.description, g.target_date, g.status, g.created_at";

pub struct RawGoal {
  pub goal_id:     String,
  pub client_id:   String,
  pub title:       String,
  pub description: Option<String>,
  pub target_date: Option<String>,
  pub status:      String,
  pub created_at:  String,
}

impl RawGoal {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      goal_id:     row.get(0)?,
      client_id:   row.get(1)?,
      title:       row.get(2)?,
      description: row.get(3)?,
      target_date: row.get(4)?,
      status:      row.get(5)?,
      created_at:  row.get(6)?,
    })
  }

  pub fn into_goal(self) -> Result<TreatmentGoal> {
    Ok(TreatmentGoal {
      goal_id:     decode_uuid(&self.goal_id)?,
      client_id:   decode_uuid(&self.client_id)?,
      title:       self.title,
      description: self.description,
      target_date: self.target_date.as_deref().map(decode_date).transpose()?,
      status:      decode_enum("goal status", &self.status)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const METRIC_COLUMNS: &str =
  "m.metric_id, m.client_id, m.goal_id, m.metric_name, m.value, m.notes, m.recorded_at";

pub struct RawMetric {
  pub metric_id:   String,
  pub client_id:   String,
  pub goal_id:     Option<String>,
  pub metric_name: String,
  pub value:       f64,
  pub notes:       Option<String>,
  pub recorded_at: String,
}

impl RawMetric {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      metric_id:   row.get(0)?,
      client_id:   row.get(1)?,
      goal_id:     row.get(2)?,
      metric_name: row.get(3)?,
      value:       row.get(4)?,
      notes:       row.get(5)?,
      recorded_at: row.get(6)?,
    })
  }

  pub fn into_metric(self) -> Result<ProgressMetric> {
    Ok(ProgressMetric {
      metric_id:   decode_uuid(&self.metric_id)?,
      client_id:   decode_uuid(&self.client_id)?,
      goal_id:     self.goal_id.as_deref().map(decode_uuid).transpose()?,
      metric_name: self.metric_name,
      value:       self.value,
      notes:       self.notes,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
