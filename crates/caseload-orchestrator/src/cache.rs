//! Optimistic in-memory collections kept in step with the store.
//!
//! A [`Reconciler`] holds the caller's client and session lists. Successful
//! writes are echoed into the lists immediately; a periodic refresh fetches
//! the authoritative lists and replaces them.
//!
//! Every echo is stamped with a generation. A refresh remembers the
//! generation current when its fetch started, and when the fetch lands it
//! re-applies only the echoes stamped after that point. Echoes the fetch
//! could already have observed are dropped, so the store wins for them,
//! while a write that raced the fetch is never erased by it. Echoes are only
//! retained while a refresh is in flight; outside one, the next fetch is
//! authoritative for them anyway.
//!
//! Each collection moves `Idle → Loading → Ready`, or `Loading → Error` when
//! a refresh fails. The next refresh retries from `Error` by passing back
//! through `Idle`.
//!
//! [`Reconciler::reset`] bumps an epoch. A refresh that started under an
//! older epoch lands nothing and leaves the principal alone.

use std::{future::Future, sync::Arc, time::Duration as StdDuration};

use caseload_core::{client::Client, principal::PrincipalContext, session::Session};
use chrono::{DateTime, Utc};
use tokio::{
  sync::{Mutex, watch},
  task::JoinHandle,
  time::MissedTickBehavior,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Result;

// ─── Source ──────────────────────────────────────────────────────────────────

/// Where a [`Reconciler`] gets its authoritative lists.
pub trait CollectionSource: Send + Sync {
  /// Return `ctx` with a credential fresh enough to read with.
  fn refresh_principal(
    &self,
    ctx: PrincipalContext,
  ) -> impl Future<Output = Result<PrincipalContext>> + Send + '_;

  fn fetch_clients(
    &self,
    ctx: PrincipalContext,
  ) -> impl Future<Output = Result<Vec<Client>>> + Send + '_;

  fn fetch_sessions(
    &self,
    ctx: PrincipalContext,
  ) -> impl Future<Output = Result<Vec<Session>>> + Send + '_;
}

impl<S, A> CollectionSource for crate::Practice<S, A>
where
  S: caseload_core::store::RecordStore,
  A: caseload_core::principal::AuthProvider,
{
  async fn refresh_principal(&self, ctx: PrincipalContext) -> Result<PrincipalContext> {
    crate::Practice::refresh_principal(self, &ctx).await
  }

  async fn fetch_clients(&self, ctx: PrincipalContext) -> Result<Vec<Client>> {
    self.list_clients(&ctx).await
  }

  async fn fetch_sessions(&self, ctx: PrincipalContext) -> Result<Vec<Session>> {
    self.list_sessions(&ctx, None).await
  }
}

/// Items with a stable identity within their collection.
pub trait Keyed {
  fn key(&self) -> Uuid;
}

impl Keyed for Client {
  fn key(&self) -> Uuid { self.client_id }
}

impl Keyed for Session {
  fn key(&self) -> Uuid { self.session_id }
}

// ─── Collection ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
  Idle,
  Loading,
  Ready,
  /// The last refresh failed. Items are kept; the next refresh returns the
  /// collection to `Idle` and retries.
  Error(String),
}

#[derive(Debug, Clone)]
enum Echo<T> {
  Upsert(T),
  Remove(Uuid),
}

#[derive(Debug, Clone)]
struct PendingEcho<T> {
  generation: u64,
  echo:       Echo<T>,
}

/// One cached list with its load status and unconfirmed echoes.
#[derive(Debug)]
struct Collection<T> {
  status:       CacheStatus,
  items:        Vec<T>,
  pending:      Vec<PendingEcho<T>>,
  /// Refreshes between `begin` and `land`/`fail`.
  in_flight:    u32,
  refreshed_at: Option<DateTime<Utc>>,
}

impl<T: Keyed + Clone> Collection<T> {
  fn new() -> Self {
    Self {
      status:       CacheStatus::Idle,
      items:        Vec::new(),
      pending:      Vec::new(),
      in_flight:    0,
      refreshed_at: None,
    }
  }

  fn apply(items: &mut Vec<T>, echo: &Echo<T>) {
    match echo {
      Echo::Upsert(item) => match items.iter_mut().find(|i| i.key() == item.key()) {
        Some(slot) => *slot = item.clone(),
        None => items.push(item.clone()),
      },
      Echo::Remove(key) => items.retain(|i| i.key() != *key),
    }
  }

  fn echo(&mut self, generation: u64, echo: Echo<T>) {
    Self::apply(&mut self.items, &echo);
    if self.in_flight > 0 {
      self.pending.push(PendingEcho { generation, echo });
    }
  }

  fn begin(&mut self) {
    if let CacheStatus::Error(previous) = &self.status {
      debug!(error = %previous, "retrying after failed refresh");
      self.status = CacheStatus::Idle;
    }
    self.status = CacheStatus::Loading;
    self.in_flight += 1;
  }

  /// One refresh is over; with none left, nothing needs replaying.
  fn settle(&mut self) {
    self.in_flight = self.in_flight.saturating_sub(1);
    if self.in_flight == 0 {
      self.pending.clear();
    }
  }

  /// Replace the items with `fetched`, then replay echoes newer than
  /// `started`.
  fn land(&mut self, started: u64, fetched: Vec<T>) {
    self.pending.retain(|p| p.generation > started);
    self.items = fetched;
    for p in &self.pending {
      Self::apply(&mut self.items, &p.echo);
    }
    self.settle();
    self.status = CacheStatus::Ready;
    self.refreshed_at = Some(Utc::now());
  }

  fn fail(&mut self, message: String) {
    self.settle();
    self.status = CacheStatus::Error(message);
  }

  fn snapshot(&self) -> Snapshot<T> {
    Snapshot {
      status:       self.status.clone(),
      items:        self.items.clone(),
      refreshed_at: self.refreshed_at,
    }
  }
}

/// A point-in-time copy of one collection.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
  pub status:       CacheStatus,
  pub items:        Vec<T>,
  pub refreshed_at: Option<DateTime<Utc>>,
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
  pub refresh_interval: StdDuration,
}

impl Default for ReconcilerConfig {
  fn default() -> Self {
    Self { refresh_interval: StdDuration::from_secs(30) }
  }
}

struct State {
  ctx:        PrincipalContext,
  /// Bumped by every reset.
  epoch:      u64,
  generation: u64,
  clients:    Collection<Client>,
  sessions:   Collection<Session>,
}

impl State {
  fn next_generation(&mut self) -> u64 {
    self.generation += 1;
    self.generation
  }
}

/// Client and session lists for one principal.
///
/// The state lock is never held while a fetch is in flight.
pub struct Reconciler<Src> {
  source: Arc<Src>,
  state:  Mutex<State>,
}

impl<Src: CollectionSource> Reconciler<Src> {
  pub fn new(source: Arc<Src>, ctx: PrincipalContext) -> Self {
    Self {
      source,
      state: Mutex::new(State {
        ctx,
        epoch: 0,
        generation: 0,
        clients: Collection::new(),
        sessions: Collection::new(),
      }),
    }
  }

  /// Switch to another principal and forget everything cached. Refreshes
  /// still in flight are discarded when they land.
  pub async fn reset(&self, ctx: PrincipalContext) {
    let mut state = self.state.lock().await;
    state.epoch += 1;
    state.ctx = ctx;
    state.clients = Collection::new();
    state.sessions = Collection::new();
  }

  // ── Echoes ────────────────────────────────────────────────────────────────

  pub async fn echo_client(&self, client: Client) {
    let mut state = self.state.lock().await;
    let generation = state.next_generation();
    state.clients.echo(generation, Echo::Upsert(client));
  }

  /// Remove a deleted client and the sessions that went with it.
  pub async fn forget_client(&self, client_id: Uuid) {
    let mut state = self.state.lock().await;
    let generation = state.next_generation();
    state.clients.echo(generation, Echo::Remove(client_id));
    let orphaned: Vec<Uuid> = state
      .sessions
      .items
      .iter()
      .filter(|s| s.client_id == client_id)
      .map(|s| s.session_id)
      .collect();
    for session_id in orphaned {
      state.sessions.echo(generation, Echo::Remove(session_id));
    }
  }

  pub async fn echo_session(&self, session: Session) {
    let mut state = self.state.lock().await;
    let generation = state.next_generation();
    state.sessions.echo(generation, Echo::Upsert(session));
  }

  // ── Snapshots ─────────────────────────────────────────────────────────────

  pub async fn clients(&self) -> Snapshot<Client> { self.state.lock().await.clients.snapshot() }

  pub async fn sessions(&self) -> Snapshot<Session> { self.state.lock().await.sessions.snapshot() }

  pub async fn principal(&self) -> PrincipalContext { self.state.lock().await.ctx.clone() }

  // ── Refresh ───────────────────────────────────────────────────────────────
  //
  // Each returns the number of items landed. A refresh overtaken by a reset
  // lands nothing and reports 0.

  pub async fn refresh_clients(&self) -> Result<usize> {
    self
      .refresh(|s| &mut s.clients, |src, ctx| async move {
        src.fetch_clients(ctx).await
      })
      .await
  }

  pub async fn refresh_sessions(&self) -> Result<usize> {
    self
      .refresh(|s| &mut s.sessions, |src, ctx| async move {
        src.fetch_sessions(ctx).await
      })
      .await
  }

  /// Refresh both collections. Both are attempted; the first error wins.
  pub async fn refresh_all(&self) -> Result<()> {
    let clients = self.refresh_clients().await;
    let sessions = self.refresh_sessions().await;
    clients?;
    sessions?;
    Ok(())
  }

  async fn refresh<T, F, Fut>(
    &self,
    pick: fn(&mut State) -> &mut Collection<T>,
    fetch: F,
  ) -> Result<usize>
  where
    T: Keyed + Clone,
    F: FnOnce(Arc<Src>, PrincipalContext) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let (ctx, started, epoch) = {
      let mut state = self.state.lock().await;
      pick(&mut state).begin();
      (state.ctx.clone(), state.generation, state.epoch)
    };

    let ctx = match self.source.refresh_principal(ctx).await {
      Ok(ctx) => ctx,
      Err(e) => {
        let mut state = self.state.lock().await;
        if state.epoch == epoch {
          pick(&mut state).fail(e.to_string());
        }
        return Err(e);
      }
    };
    {
      let mut state = self.state.lock().await;
      if state.epoch != epoch {
        debug!(epoch, "principal changed during refresh, discarding");
        return Ok(0);
      }
      state.ctx = ctx.clone();
    }

    let fetched = fetch(self.source.clone(), ctx).await;

    let mut state = self.state.lock().await;
    if state.epoch != epoch {
      debug!(epoch, "principal changed during fetch, discarding");
      return Ok(0);
    }
    let collection = pick(&mut state);
    match fetched {
      Ok(items) => {
        let count = items.len();
        collection.land(started, items);
        debug!(count, started, "collection refreshed");
        Ok(count)
      }
      Err(e) => {
        collection.fail(e.to_string());
        Err(e)
      }
    }
  }
}

impl<Src: CollectionSource + 'static> Reconciler<Src> {
  /// Refresh on a fixed interval until `shutdown` turns true or its sender
  /// is dropped. The first refresh runs immediately.
  pub fn spawn_periodic(
    self: Arc<Self>,
    config: ReconcilerConfig,
    mut shutdown: watch::Receiver<bool>,
  ) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(config.refresh_interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = ticker.tick() => {
            if let Err(e) = self.refresh_all().await {
              warn!(error = %e, "periodic refresh failed");
            }
          }
          changed = shutdown.changed() => {
            if changed.is_err() || *shutdown.borrow() {
              debug!("reconciler stopping");
              break;
            }
          }
        }
      }
    })
  }
}
