//! [`SqliteStore`], the SQLite implementation of [`RecordStore`].

use std::path::Path;

use caseload_core::{
  access::{Access, ServiceKey},
  client::{Client, ClientPatch, ClientProfile, NewClient, ProfileDetails},
  goal::{NewProgressMetric, NewTreatmentGoal, ProgressMetric, TreatmentGoal},
  note::{NewSessionNote, SessionNote},
  session::{NewSession, Session, SessionStatus},
  store::RecordStore,
  therapist::{NewTherapist, Therapist},
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    CLIENT_COLUMNS, GOAL_COLUMNS, METRIC_COLUMNS, NOTE_COLUMNS, PROFILE_COLUMNS, RawClient,
    RawGoal, RawMetric, RawNote, RawProfile, RawSession, RawTherapist, SESSION_COLUMNS,
    THERAPIST_COLUMNS, encode_content, encode_date, encode_dt, encode_strings, encode_uuid, now,
    stored,
  },
  policy::{
    CLIENT_OWNER, GOAL_OWNER, Gated, SESSION_OWNER, Scope, THERAPIST_OWNER, gate,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Caseload record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:        tokio_rusqlite::Connection,
  /// When set, privileged access must present this key.
  service_key: Option<ServiceKey>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, service_key: None };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, service_key: None };
    store.init_schema().await?;
    Ok(store)
  }

  /// Require `key` for every privileged call.
  pub fn with_service_key(mut self, key: ServiceKey) -> Self {
    self.service_key = Some(key);
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Validate `access` and reduce it to the scope statements run under.
  fn scope(&self, access: &Access) -> Result<Scope> {
    match access {
      Access::Restricted(cred) => {
        if cred.is_expired_at(Utc::now()) {
          return Err(Error::CredentialExpired(cred.principal_id));
        }
        Ok(Some(encode_uuid(cred.principal_id)))
      }
      Access::Privileged(key) => match &self.service_key {
        Some(expected) if expected != key => Err(Error::InvalidServiceKey),
        _ => Ok(None),
      },
    }
  }

  async fn select_client(&self, scope: Scope, client_id: Uuid) -> Result<Option<Client>> {
    let id_str = encode_uuid(client_id);

    let raw: Option<RawClient> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CLIENT_COLUMNS}
                 FROM clients c JOIN therapists t ON t.therapist_id = c.therapist_id
                 WHERE c.client_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)"
              ),
              rusqlite::params![id_str, scope],
              RawClient::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawClient::into_client).transpose()
  }

  async fn select_session(&self, scope: Scope, session_id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(session_id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SESSION_COLUMNS}
                 FROM sessions s JOIN therapists t ON t.therapist_id = s.therapist_id
                 WHERE s.session_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)"
              ),
              rusqlite::params![id_str, scope],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  // ── Therapists ────────────────────────────────────────────────────────────

  async fn find_therapist_by_principal(
    &self,
    access: Access,
    principal_id: Uuid,
  ) -> Result<Option<Therapist>> {
    let scope = self.scope(&access)?;
    let principal_str = encode_uuid(principal_id);

    let raw: Option<RawTherapist> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {THERAPIST_COLUMNS} FROM therapists t
                 WHERE t.principal_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)
                 ORDER BY t.created_at, t.rowid
                 LIMIT 1"
              ),
              rusqlite::params![principal_str, scope],
              RawTherapist::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTherapist::into_therapist).transpose()
  }

  async fn get_therapist(&self, access: Access, therapist_id: Uuid) -> Result<Option<Therapist>> {
    let scope = self.scope(&access)?;
    let id_str = encode_uuid(therapist_id);

    let raw: Option<RawTherapist> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {THERAPIST_COLUMNS} FROM therapists t
                 WHERE t.therapist_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)"
              ),
              rusqlite::params![id_str, scope],
              RawTherapist::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTherapist::into_therapist).transpose()
  }

  async fn insert_therapist(&self, access: Access, input: NewTherapist) -> Result<Therapist> {
    let scope = self.scope(&access)?;
    let therapist = Therapist {
      therapist_id: Uuid::new_v4(),
      principal_id: input.principal_id,
      display_name: input.display_name,
      email:        input.email,
      created_at:   now(),
    };

    let principal_str = encode_uuid(therapist.principal_id);
    if scope.as_ref().is_some_and(|p| p != &principal_str) {
      return Err(Error::PolicyDenied {
        action: "insert",
        entity: "therapist",
        id:     therapist.therapist_id,
      });
    }

    let id_str = encode_uuid(therapist.therapist_id);
    let name = therapist.display_name.clone();
    let email = therapist.email.clone();
    let at_str = encode_dt(therapist.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO therapists (therapist_id, principal_id, display_name, email, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, principal_str, name, email, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(therapist)
  }

  // ── Clients ───────────────────────────────────────────────────────────────

  async fn get_client(&self, access: Access, client_id: Uuid) -> Result<Option<Client>> {
    let scope = self.scope(&access)?;
    self.select_client(scope, client_id).await
  }

  async fn list_clients(&self, access: Access, therapist_id: Option<Uuid>) -> Result<Vec<Client>> {
    let scope = self.scope(&access)?;
    let therapist_str = therapist_id.map(encode_uuid);

    let raws: Vec<RawClient> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CLIENT_COLUMNS}
           FROM clients c JOIN therapists t ON t.therapist_id = c.therapist_id
           WHERE (?1 IS NULL OR t.principal_id = ?1)
             AND (?2 IS NULL OR c.therapist_id = ?2)
           ORDER BY c.created_at, c.rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![scope, therapist_str], RawClient::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClient::into_client).collect()
  }

  async fn insert_client(&self, access: Access, input: NewClient) -> Result<Client> {
    let scope = self.scope(&access)?;
    let stamp = now();
    let client = Client {
      client_id:    input.client_id.unwrap_or_else(Uuid::new_v4),
      therapist_id: input.therapist_id,
      first_name:   input.first_name,
      last_name:    input.last_name,
      email:        input.email,
      phone:        input.phone,
      status:       input.status,
      created_at:   stamp,
      updated_at:   stamp,
    };

    let id_str = encode_uuid(client.client_id);
    let therapist_str = encode_uuid(client.therapist_id);
    let first = client.first_name.clone();
    let last = client.last_name.clone();
    let email = client.email.clone();
    let phone = client.phone.clone();
    let status = client.status.as_ref().to_owned();
    let at_str = encode_dt(stamp);

    let gated: Gated<()> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, THERAPIST_OWNER, &therapist_str)?;
        if let Some(refused) = Gated::refuse(g, "therapist") {
          return Ok(refused);
        }
        conn.execute(
          "INSERT INTO clients (
             client_id, therapist_id, first_name, last_name, email, phone,
             status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          rusqlite::params![id_str, therapist_str, first, last, email, phone, status, at_str],
        )?;
        Ok(Gated::Done(()))
      })
      .await?;

    gated.into_result("client", client.client_id)?;
    Ok(client)
  }

  async fn update_client(
    &self,
    access: Access,
    client_id: Uuid,
    patch: ClientPatch,
  ) -> Result<Option<Client>> {
    let scope = self.scope(&access)?;
    let id_str = encode_uuid(client_id);
    let status = patch.status.map(|s| s.as_ref().to_owned());
    let at_str = encode_dt(now());

    let gated: Gated<RawClient> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, CLIENT_OWNER, &id_str)?;
        if let Some(refused) = Gated::refuse(g, "client") {
          return Ok(refused);
        }
        conn.execute(
          "UPDATE clients SET
             first_name = COALESCE(?2, first_name),
             last_name  = COALESCE(?3, last_name),
             email      = COALESCE(?4, email),
             phone      = COALESCE(?5, phone),
             status     = COALESCE(?6, status),
             updated_at = ?7
           WHERE client_id = ?1",
          rusqlite::params![
            id_str,
            patch.first_name,
            patch.last_name,
            patch.email,
            patch.phone,
            status,
            at_str,
          ],
        )?;
        let raw = conn.query_row(
          &format!("SELECT {CLIENT_COLUMNS} FROM clients c WHERE c.client_id = ?1"),
          rusqlite::params![id_str],
          RawClient::from_row,
        )?;
        Ok(Gated::Done(raw))
      })
      .await?;

    gated
      .into_option("update", client_id)?
      .map(RawClient::into_client)
      .transpose()
  }

  async fn delete_client(&self, access: Access, client_id: Uuid) -> Result<bool> {
    let scope = self.scope(&access)?;
    let id_str = encode_uuid(client_id);

    let gated: Gated<usize> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, CLIENT_OWNER, &id_str)?;
        if let Some(refused) = Gated::refuse(g, "client") {
          return Ok(refused);
        }
        let n = conn.execute(
          "DELETE FROM clients WHERE client_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(Gated::Done(n))
      })
      .await?;

    Ok(gated.into_option("delete", client_id)?.is_some_and(|n| n > 0))
  }

  // ── Client profiles ───────────────────────────────────────────────────────

  async fn get_client_profile(
    &self,
    access: Access,
    client_id: Uuid,
  ) -> Result<Option<ClientProfile>> {
    let scope = self.scope(&access)?;
    let id_str = encode_uuid(client_id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {PROFILE_COLUMNS}
                 FROM client_profiles p
                 JOIN clients c    ON c.client_id    = p.client_id
                 JOIN therapists t ON t.therapist_id = c.therapist_id
                 WHERE p.client_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)"
              ),
              rusqlite::params![id_str, scope],
              RawProfile::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn upsert_client_profile(
    &self,
    access: Access,
    client_id: Uuid,
    details: ProfileDetails,
  ) -> Result<ClientProfile> {
    let scope = self.scope(&access)?;
    let profile_id = Uuid::new_v4();
    let profile_str = encode_uuid(profile_id);
    let client_str = encode_uuid(client_id);
    let dob = details.date_of_birth.map(encode_date);
    let medications = encode_strings(&details.medications)?;
    let at_str = encode_dt(now());

    let gated: Gated<RawProfile> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, CLIENT_OWNER, &client_str)?;
        if let Some(refused) = Gated::refuse(g, "client") {
          return Ok(refused);
        }
        conn.execute(
          "INSERT INTO client_profiles (
             profile_id, client_id, date_of_birth, gender, address,
             emergency_contact, diagnosis, medications, notes, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (client_id) DO UPDATE SET
             date_of_birth     = excluded.date_of_birth,
             gender            = excluded.gender,
             address           = excluded.address,
             emergency_contact = excluded.emergency_contact,
             diagnosis         = excluded.diagnosis,
             medications       = excluded.medications,
             notes             = excluded.notes,
             updated_at        = excluded.updated_at",
          rusqlite::params![
            profile_str,
            client_str,
            dob,
            details.gender,
            details.address,
            details.emergency_contact,
            details.diagnosis,
            medications,
            details.notes,
            at_str,
          ],
        )?;
        let raw = conn.query_row(
          &format!("SELECT {PROFILE_COLUMNS} FROM client_profiles p WHERE p.client_id = ?1"),
          rusqlite::params![client_str],
          RawProfile::from_row,
        )?;
        Ok(Gated::Done(raw))
      })
      .await?;

    gated.into_result("client profile", profile_id)?.into_profile()
  }

  async fn delete_client_profile(&self, access: Access, client_id: Uuid) -> Result<bool> {
    let scope = self.scope(&access)?;
    let id_str = encode_uuid(client_id);

    let gated: Gated<usize> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, CLIENT_OWNER, &id_str)?;
        if let Some(refused) = Gated::refuse(g, "client") {
          return Ok(refused);
        }
        let n = conn.execute(
          "DELETE FROM client_profiles WHERE client_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(Gated::Done(n))
      })
      .await?;

    Ok(gated.into_option("delete", client_id)?.is_some_and(|n| n > 0))
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn get_session(&self, access: Access, session_id: Uuid) -> Result<Option<Session>> {
    let scope = self.scope(&access)?;
    self.select_session(scope, session_id).await
  }

  async fn list_sessions(&self, access: Access, client_id: Option<Uuid>) -> Result<Vec<Session>> {
    let scope = self.scope(&access)?;
    let client_str = client_id.map(encode_uuid);

    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLUMNS}
           FROM sessions s JOIN therapists t ON t.therapist_id = s.therapist_id
           WHERE (?1 IS NULL OR t.principal_id = ?1)
             AND (?2 IS NULL OR s.client_id = ?2)
           ORDER BY s.session_date DESC, s.rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![scope, client_str], RawSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  async fn insert_session(&self, access: Access, input: NewSession) -> Result<Session> {
    let scope = self.scope(&access)?;
    let session = Session {
      session_id:       Uuid::new_v4(),
      client_id:        input.client_id,
      therapist_id:     input.therapist_id,
      session_date:     stored(input.session_date),
      duration_minutes: input.duration_minutes,
      session_type:     input.session_type,
      status:           input.status,
      notes:            input.notes,
      created_at:       now(),
    };

    let id_str = encode_uuid(session.session_id);
    let client_str = encode_uuid(session.client_id);
    let therapist_str = encode_uuid(session.therapist_id);
    let date_str = encode_dt(session.session_date);
    let duration = session.duration_minutes;
    let kind = session.session_type.as_ref().to_owned();
    let status = session.status.as_ref().to_owned();
    let notes = session.notes.clone();
    let at_str = encode_dt(session.created_at);

    let gated: Gated<()> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, CLIENT_OWNER, &client_str)?;
        if let Some(refused) = Gated::refuse(g, "client") {
          return Ok(refused);
        }
        let g = gate(conn, &scope, THERAPIST_OWNER, &therapist_str)?;
        if let Some(refused) = Gated::refuse(g, "therapist") {
          return Ok(refused);
        }
        conn.execute(
          "INSERT INTO sessions (
             session_id, client_id, therapist_id, session_date, duration_minutes,
             session_type, status, notes, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            client_str,
            therapist_str,
            date_str,
            duration,
            kind,
            status,
            notes,
            at_str,
          ],
        )?;
        Ok(Gated::Done(()))
      })
      .await?;

    gated.into_result("session", session.session_id)?;
    Ok(session)
  }

  async fn update_session_status(
    &self,
    access: Access,
    session_id: Uuid,
    status: SessionStatus,
  ) -> Result<Option<Session>> {
    let scope = self.scope(&access)?;
    let id_str = encode_uuid(session_id);
    let status_str = status.as_ref().to_owned();

    let gated: Gated<RawSession> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, SESSION_OWNER, &id_str)?;
        if let Some(refused) = Gated::refuse(g, "session") {
          return Ok(refused);
        }
        conn.execute(
          "UPDATE sessions SET status = ?2 WHERE session_id = ?1",
          rusqlite::params![id_str, status_str],
        )?;
        let raw = conn.query_row(
          &format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.session_id = ?1"),
          rusqlite::params![id_str],
          RawSession::from_row,
        )?;
        Ok(Gated::Done(raw))
      })
      .await?;

    gated
      .into_option("update", session_id)?
      .map(RawSession::into_session)
      .transpose()
  }

  // ── Session notes ─────────────────────────────────────────────────────────

  async fn get_session_note(&self, access: Access, note_id: Uuid) -> Result<Option<SessionNote>> {
    let scope = self.scope(&access)?;
    let id_str = encode_uuid(note_id);

    let raw: Option<RawNote> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {NOTE_COLUMNS}
                 FROM session_notes n JOIN therapists t ON t.therapist_id = n.therapist_id
                 WHERE n.note_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)"
              ),
              rusqlite::params![id_str, scope],
              RawNote::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNote::into_note).transpose()
  }

  async fn list_session_notes(
    &self,
    access: Access,
    client_id: Option<Uuid>,
  ) -> Result<Vec<SessionNote>> {
    let scope = self.scope(&access)?;
    let client_str = client_id.map(encode_uuid);

    let raws: Vec<RawNote> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTE_COLUMNS}
           FROM session_notes n JOIN therapists t ON t.therapist_id = n.therapist_id
           WHERE (?1 IS NULL OR t.principal_id = ?1)
             AND (?2 IS NULL OR n.client_id = ?2)
           ORDER BY n.created_at DESC, n.rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![scope, client_str], RawNote::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNote::into_note).collect()
  }

  async fn insert_session_note(&self, access: Access, input: NewSessionNote) -> Result<SessionNote> {
    let scope = self.scope(&access)?;
    let stamp = now();
    let note = SessionNote {
      note_id:      Uuid::new_v4(),
      session_id:   input.session_id,
      client_id:    input.client_id,
      therapist_id: input.therapist_id,
      title:        input.title,
      content:      input.content,
      therapy_type: input.therapy_type,
      tags:         input.tags,
      created_at:   stamp,
      updated_at:   stamp,
    };

    let id_str = encode_uuid(note.note_id);
    let session_str = encode_uuid(note.session_id);
    let client_str = encode_uuid(note.client_id);
    let therapist_str = encode_uuid(note.therapist_id);
    let title = note.title.clone();
    let content = encode_content(&note.content)?;
    let therapy_type = note.therapy_type.clone();
    let tags = encode_strings(&note.tags)?;
    let at_str = encode_dt(stamp);

    let gated: Gated<()> = self
      .conn
      .call(move |conn| {
        for (sql, id, entity) in [
          (SESSION_OWNER, &session_str, "session"),
          (CLIENT_OWNER, &client_str, "client"),
          (THERAPIST_OWNER, &therapist_str, "therapist"),
        ] {
          let g = gate(conn, &scope, sql, id)?;
          if let Some(refused) = Gated::refuse(g, entity) {
            return Ok(refused);
          }
        }
        conn.execute(
          "INSERT INTO session_notes (
             note_id, session_id, client_id, therapist_id, title,
             content_json, therapy_type, tags, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
          rusqlite::params![
            id_str,
            session_str,
            client_str,
            therapist_str,
            title,
            content,
            therapy_type,
            tags,
            at_str,
          ],
        )?;
        Ok(Gated::Done(()))
      })
      .await?;

    gated.into_result("session note", note.note_id)?;
    Ok(note)
  }

  // ── Treatment goals ───────────────────────────────────────────────────────

  async fn get_treatment_goal(&self, access: Access, goal_id: Uuid) -> Result<Option<TreatmentGoal>> {
    let scope = self.scope(&access)?;
    let id_str = encode_uuid(goal_id);

    let raw: Option<RawGoal> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {GOAL_COLUMNS}
                 FROM treatment_goals g
                 JOIN clients c    ON c.client_id    = g.client_id
                 JOIN therapists t ON t.therapist_id = c.therapist_id
                 WHERE g.goal_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)"
              ),
              rusqlite::params![id_str, scope],
              RawGoal::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGoal::into_goal).transpose()
  }

  async fn list_treatment_goals(&self, access: Access, client_id: Uuid) -> Result<Vec<TreatmentGoal>> {
    let scope = self.scope(&access)?;
    let client_str = encode_uuid(client_id);

    let raws: Vec<RawGoal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {GOAL_COLUMNS}
           FROM treatment_goals g
           JOIN clients c    ON c.client_id    = g.client_id
           JOIN therapists t ON t.therapist_id = c.therapist_id
           WHERE g.client_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)
           ORDER BY g.created_at, g.rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![client_str, scope], RawGoal::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGoal::into_goal).collect()
  }

  async fn insert_treatment_goal(
    &self,
    access: Access,
    input: NewTreatmentGoal,
  ) -> Result<TreatmentGoal> {
    let scope = self.scope(&access)?;
    let goal = TreatmentGoal {
      goal_id:     Uuid::new_v4(),
      client_id:   input.client_id,
      title:       input.title,
      description: input.description,
      target_date: input.target_date,
      status:      input.status,
      created_at:  now(),
    };

    let id_str = encode_uuid(goal.goal_id);
    let client_str = encode_uuid(goal.client_id);
    let title = goal.title.clone();
    let description = goal.description.clone();
    let target = goal.target_date.map(encode_date);
    let status = goal.status.as_ref().to_owned();
    let at_str = encode_dt(goal.created_at);

    let gated: Gated<()> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, CLIENT_OWNER, &client_str)?;
        if let Some(refused) = Gated::refuse(g, "client") {
          return Ok(refused);
        }
        conn.execute(
          "INSERT INTO treatment_goals (
             goal_id, client_id, title, description, target_date, status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, client_str, title, description, target, status, at_str],
        )?;
        Ok(Gated::Done(()))
      })
      .await?;

    gated.into_result("treatment goal", goal.goal_id)?;
    Ok(goal)
  }

  // ── Progress metrics ──────────────────────────────────────────────────────

  async fn list_progress_metrics(
    &self,
    access: Access,
    client_id: Uuid,
  ) -> Result<Vec<ProgressMetric>> {
    let scope = self.scope(&access)?;
    let client_str = encode_uuid(client_id);

    let raws: Vec<RawMetric> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {METRIC_COLUMNS}
           FROM progress_metrics m
           JOIN clients c    ON c.client_id    = m.client_id
           JOIN therapists t ON t.therapist_id = c.therapist_id
           WHERE m.client_id = ?1 AND (?2 IS NULL OR t.principal_id = ?2)
           ORDER BY m.recorded_at, m.rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![client_str, scope], RawMetric::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMetric::into_metric).collect()
  }

  async fn insert_progress_metric(
    &self,
    access: Access,
    input: NewProgressMetric,
  ) -> Result<ProgressMetric> {
    let scope = self.scope(&access)?;
    let metric = ProgressMetric {
      metric_id:   Uuid::new_v4(),
      client_id:   input.client_id,
      goal_id:     input.goal_id,
      metric_name: input.metric_name,
      value:       input.value,
      notes:       input.notes,
      recorded_at: input.recorded_at.map_or_else(now, stored),
    };

    let id_str = encode_uuid(metric.metric_id);
    let client_str = encode_uuid(metric.client_id);
    let goal_str = metric.goal_id.map(encode_uuid);
    let name = metric.metric_name.clone();
    let value = metric.value;
    let notes = metric.notes.clone();
    let at_str = encode_dt(metric.recorded_at);

    let gated: Gated<()> = self
      .conn
      .call(move |conn| {
        let g = gate(conn, &scope, CLIENT_OWNER, &client_str)?;
        if let Some(refused) = Gated::refuse(g, "client") {
          return Ok(refused);
        }
        if let Some(goal) = &goal_str {
          let g = gate(conn, &scope, GOAL_OWNER, goal)?;
          if let Some(refused) = Gated::refuse(g, "treatment goal") {
            return Ok(refused);
          }
        }
        conn.execute(
          "INSERT INTO progress_metrics (
             metric_id, client_id, goal_id, metric_name, value, notes, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, client_str, goal_str, name, value, notes, at_str],
        )?;
        Ok(Gated::Done(()))
      })
      .await?;

    gated.into_result("progress metric", metric.metric_id)?;
    Ok(metric)
  }
}
