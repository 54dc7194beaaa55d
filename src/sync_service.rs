//! Offline-first sync service.
//!
//! One [`SyncService`] is built at startup and shared by `Arc`. It answers
//! reads from the remote API when it is reachable and from the local store
//! otherwise, and it stores every write locally before trying the remote. A
//! remote write that fails (or is skipped while offline) becomes a
//! [`PendingOperation`] that is replayed by [`SyncService::drain_pending`].
//!
//! Remote failures never reach callers. Reads report where their data came
//! from through [`Fetched::source`]; writes only fail when the local store
//! itself rejects them.
//!
//! Startup runs once, in order:
//!
//! ```text
//! Uninitialized -> IdentityReady -> Connected | Offline -> Ready
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::app_response::AppResponse;
use crate::catalog::{Catalog, MIN_SEARCH_LEN};
use crate::config::SyncConfig;
use crate::identity;
use crate::local_store::LocalStore;
use crate::model::{
    CatalogStats, ContentItem, DrainReport, Fetched, InitState, PendingOpType, PendingOperation,
    Playlist, PlaylistCreated, Preferences, SharedPlaylist, SyncStatus, WriteOutcome,
};
use crate::pending::{PendingQueue, PENDING_KEY};
use crate::remote::{HttpTransport, RemoteApi, Transport};

pub const QUEUE_KEY: &str = "movieshows_user_queue";
pub const CATALOG_KEY: &str = "movieshows_catalog";
pub const LAST_SYNC_KEY: &str = "movieshows_last_sync";
pub const QUEUE_SYNCED_AT_KEY: &str = "movieshows_queue_synced_at";
pub const PREFS_SYNCED_AT_KEY: &str = "movieshows_prefs_synced_at";
pub const CATALOG_SYNCED_AT_KEY: &str = "movieshows_catalog_synced_at";
pub const QUEUE_RECONCILE_KEY: &str = "movieshows_queue_reconcile";
pub const PLAYLIST_KEY_PREFIX: &str = "playlist_";

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn playlist_key(code: &str) -> String {
    format!("{PLAYLIST_KEY_PREFIX}{code}")
}

#[derive(Debug)]
struct Connection {
    state: InitState,
    connected: bool,
    last_sync: Option<i64>,
}

struct DrainWorker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Deserialize)]
struct CatalogSyncPayload {
    movies: Vec<ContentItem>,
}

pub struct SyncService {
    config: SyncConfig,
    store: Arc<LocalStore>,
    remote: RemoteApi,
    pending: PendingQueue,
    catalog: Catalog,
    connection: Mutex<Connection>,
    draining: AtomicBool,
    worker: Mutex<Option<DrainWorker>>,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("client_id", &self.remote.client_id())
            .field("store", &self.store)
            .field("connection", &*self.connection())
            .finish()
    }
}

impl SyncService {
    /// Builds the service and runs the startup sequence: resolve identity,
    /// probe the remote, drain pending operations, then start the periodic
    /// drain if configured.
    ///
    /// Only a failing local store makes this return an error; an unreachable
    /// remote just leaves the service offline.
    pub fn start(
        config: SyncConfig,
        store: Arc<LocalStore>,
        transport: Box<dyn Transport>,
    ) -> Result<Arc<Self>, AppResponse> {
        let client_id = identity::resolve_client_id(&store)?;
        let last_sync: Option<i64> = store.load_or_default(LAST_SYNC_KEY);
        let catalog = Catalog::new(store.load_or_default(CATALOG_KEY));
        if catalog.is_empty() {
            debug!("No cached catalog; local catalog reads start empty");
        }

        let service = Arc::new(Self {
            remote: RemoteApi::new(transport, client_id),
            pending: PendingQueue::new(Arc::clone(&store)),
            catalog,
            connection: Mutex::new(Connection {
                state: InitState::IdentityReady,
                connected: false,
                last_sync,
            }),
            draining: AtomicBool::new(false),
            worker: Mutex::new(None),
            store,
            config,
        });

        service.probe();
        let report = service.drain_pending();
        service.connection().state = InitState::Ready;
        info!(
            "Sync service ready (client {}, connected: {}, pending: {})",
            service.remote.client_id(),
            service.is_connected(),
            report.remaining
        );

        if service.config.background_drain {
            service.spawn_drain_worker();
        }
        Ok(service)
    }

    /// Opens the configured local store and talks HTTP to `api_base_url`.
    pub fn open(config: SyncConfig) -> Result<Arc<Self>, AppResponse> {
        config.validate()?;
        let store = Arc::new(LocalStore::init(&config.db_path, config.map_size_mb)?);
        let transport = HttpTransport::new(
            &config.api_base_url,
            config.request_timeout(),
            config.connect_timeout(),
        );
        Self::start(config, store, Box::new(transport))
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn client_id(&self) -> &str {
        self.remote.client_id()
    }

    pub fn is_connected(&self) -> bool {
        self.connection().connected
    }

    pub fn status(&self) -> SyncStatus {
        let pending = self.pending.len();
        let connection = self.connection();
        SyncStatus {
            client_id: self.remote.client_id().to_string(),
            connected: connection.connected,
            last_sync: connection.last_sync,
            pending,
            state: connection.state,
        }
    }

    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.pending.load()
    }

    /// Checks reachability with the status endpoint and records the result.
    pub fn probe(&self) -> bool {
        let reachable = match self.remote.status() {
            Ok(()) => true,
            Err(e) => {
                warn!("Remote API unavailable, working locally: {e}");
                false
            }
        };
        {
            let mut connection = self.connection();
            if connection.state == InitState::IdentityReady {
                connection.state = if reachable { InitState::Connected } else { InitState::Offline };
            }
            connection.connected = reachable;
        }
        if reachable {
            self.record_remote_success();
        }
        reachable
    }

    fn record_remote_success(&self) {
        let now = now_millis();
        {
            let mut connection = self.connection();
            connection.connected = true;
            connection.last_sync = Some(now);
        }
        self.touch(LAST_SYNC_KEY, now);
    }

    fn record_remote_failure(&self, what: &str, err: &AppResponse) {
        warn!("Remote {what} failed, using local data: {err}");
        if matches!(err, AppResponse::NetworkError(_)) {
            self.connection().connected = false;
        }
    }

    fn touch(&self, key: &str, at: i64) {
        if let Err(e) = self.store.put_json(key, &at) {
            warn!("Could not record timestamp under '{key}': {e}");
        }
    }

    /// Runs `call` against the remote when connected. `None` means the
    /// caller should fall back to local data.
    fn try_remote<T, F>(&self, what: &str, call: F) -> Option<T>
    where
        F: FnOnce(&RemoteApi) -> Result<T, AppResponse>,
    {
        if !self.is_connected() {
            debug!("Offline, skipping remote {what}");
            return None;
        }
        match call(&self.remote) {
            Ok(value) => {
                self.record_remote_success();
                Some(value)
            }
            Err(e) => {
                self.record_remote_failure(what, &e);
                None
            }
        }
    }

    /// Mirrors an already-persisted local write, queueing it on failure.
    fn mirror_write<F, P>(&self, op_type: PendingOpType, call: F, payload: P) -> Result<WriteOutcome, AppResponse>
    where
        F: FnOnce(&RemoteApi) -> Result<(), AppResponse>,
        P: FnOnce() -> Result<serde_json::Value, AppResponse>,
    {
        if self.try_remote(op_type.as_str(), call).is_some() {
            return Ok(WriteOutcome::Synced);
        }
        self.pending.enqueue(op_type, payload()?)?;
        Ok(WriteOutcome::Queued)
    }

    // ---------------------------------------------------------------
    // Catalog
    // ---------------------------------------------------------------

    pub fn catalog_list(&self, limit: Option<usize>, offset: Option<usize>) -> Fetched<Vec<ContentItem>> {
        let limit = limit.unwrap_or(self.config.default_page_size);
        let offset = offset.unwrap_or(0);
        match self.try_remote("catalog list", |api| api.catalog_list(limit, offset)) {
            Some(items) => Fetched::remote(items),
            None => Fetched::local(self.catalog.list(limit, offset)),
        }
    }

    /// Free-text search. Queries under two characters return nothing and
    /// never reach the remote.
    pub fn catalog_search(&self, query: &str, limit: Option<usize>) -> Fetched<Vec<ContentItem>> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Fetched::local(Vec::new());
        }
        let limit = limit.unwrap_or(self.config.default_page_size);
        match self.try_remote("catalog search", |api| api.catalog_search(query, limit)) {
            Some(items) => Fetched::remote(items),
            None => Fetched::local(self.catalog.search(query, limit)),
        }
    }

    pub fn catalog_random(&self, count: Option<usize>) -> Fetched<Vec<ContentItem>> {
        let count = count.unwrap_or(self.config.default_random_count);
        match self.try_remote("random sample", |api| api.catalog_random(count)) {
            Some(items) => Fetched::remote(items),
            None => Fetched::local(self.catalog.random(count)),
        }
    }

    pub fn catalog_stats(&self) -> Fetched<CatalogStats> {
        match self.try_remote("stats", RemoteApi::catalog_stats) {
            Some(stats) => Fetched::remote(stats),
            None => Fetched::local(self.catalog.stats()),
        }
    }

    /// Merges `items` into the local catalog by title, then pushes them to
    /// the remote catalog.
    pub fn catalog_bulk_sync(&self, items: &[ContentItem]) -> Result<WriteOutcome, AppResponse> {
        if items.is_empty() {
            return Ok(WriteOutcome::Unchanged);
        }
        let added = self.catalog.merge(items);
        self.store.put_json(CATALOG_KEY, &self.catalog.snapshot())?;
        debug!("Catalog merged {} items ({} new)", items.len(), added);

        let outcome = self.mirror_write(
            PendingOpType::CatalogSync,
            |api| api.catalog_bulk_add(items),
            || Ok(json!({ "movies": items })),
        )?;
        if outcome == WriteOutcome::Synced {
            self.touch(CATALOG_SYNCED_AT_KEY, now_millis());
        }
        Ok(outcome)
    }

    // ---------------------------------------------------------------
    // Queue
    // ---------------------------------------------------------------

    fn local_queue(&self) -> Vec<ContentItem> {
        self.store.load_or_default(QUEUE_KEY)
    }

    /// True while a local removal has not reached the remote queue yet.
    fn queue_needs_reconcile(&self) -> bool {
        self.store.load_or_default(QUEUE_RECONCILE_KEY)
    }

    /// Replaces the remote queue with the local one and clears the
    /// reconcile flag. Returns whether the remote accepted it.
    fn reconcile_queue(&self) -> bool {
        let items = self.local_queue();
        if self.try_remote("queue reconcile", |api| api.queue_sync(&items)).is_none() {
            return false;
        }
        if let Err(e) = self.store.remove(QUEUE_RECONCILE_KEY) {
            warn!("Could not clear queue reconcile flag: {e}");
        }
        info!("Remote queue reconciled ({} items)", items.len());
        true
    }

    /// The user's queue. A successful remote read replaces the local copy,
    /// except while local removals are still unsent: those are pushed first,
    /// and the local queue is answered if that fails.
    pub fn queue_fetch(&self) -> Fetched<Vec<ContentItem>> {
        if self.queue_needs_reconcile() && !self.reconcile_queue() {
            return Fetched::local(self.local_queue());
        }
        match self.try_remote("queue fetch", RemoteApi::queue_get) {
            Some(items) => {
                match self.store.put_json(QUEUE_KEY, &items) {
                    Ok(()) => self.touch(QUEUE_SYNCED_AT_KEY, now_millis()),
                    Err(e) => warn!("Could not cache remote queue: {e}"),
                }
                Fetched::remote(items)
            }
            None => Fetched::local(self.local_queue()),
        }
    }

    /// Adds `item` unless its title is already queued.
    pub fn queue_add(&self, item: &ContentItem) -> Result<WriteOutcome, AppResponse> {
        if item.title.trim().is_empty() {
            return Err(AppResponse::ValidationError("Queue item needs a title".to_string()));
        }
        let added = self.store.update_json(QUEUE_KEY, |queue: &mut Vec<ContentItem>| {
            if queue.iter().any(|existing| existing.same_title(&item.title)) {
                false
            } else {
                queue.push(item.clone());
                true
            }
        })?;
        if !added {
            debug!("'{}' already queued", item.title);
            return Ok(WriteOutcome::Unchanged);
        }

        let outcome = self.mirror_write(
            PendingOpType::QueueAdd,
            |api| api.queue_add(item),
            || Ok(serde_json::to_value(item)?),
        )?;
        if outcome == WriteOutcome::Synced {
            self.touch(QUEUE_SYNCED_AT_KEY, now_millis());
        }
        Ok(outcome)
    }

    /// Removes `title` locally and tells the remote when possible.
    ///
    /// The removal also drops a pending `queue-add` for the same title and
    /// marks the queue for reconciling, all in one store transaction. Until
    /// the remote confirms, the next drain (or queue fetch) sends the whole
    /// local queue so the removal cannot be undone by remote data.
    pub fn queue_remove(&self, title: &str) -> Result<WriteOutcome, AppResponse> {
        let (removed, already_marked) = self.store.transaction(|txn| {
            let mut queue: Vec<ContentItem> = txn.load(QUEUE_KEY)?;
            let before = queue.len();
            queue.retain(|existing| !existing.same_title(title));
            if queue.len() == before {
                return Ok((false, false));
            }
            txn.save(QUEUE_KEY, &queue)?;

            let mut pending: Vec<PendingOperation> = txn.load(PENDING_KEY)?;
            if PendingQueue::forget_queue_add(&mut pending, title) {
                debug!("Dropped pending queue-add for '{}'", title.trim());
                txn.save(PENDING_KEY, &pending)?;
            }

            let already_marked: bool = txn.load(QUEUE_RECONCILE_KEY)?;
            txn.save(QUEUE_RECONCILE_KEY, &true)?;
            Ok((true, already_marked))
        })?;
        if !removed {
            return Ok(WriteOutcome::Unchanged);
        }

        match self.try_remote("queue remove", |api| api.queue_remove(title.trim())) {
            Some(()) => {
                // Earlier unsent removals still need the full sync.
                if !already_marked {
                    if let Err(e) = self.store.remove(QUEUE_RECONCILE_KEY) {
                        warn!("Could not clear queue reconcile flag: {e}");
                    }
                }
                Ok(WriteOutcome::Synced)
            }
            None => Ok(WriteOutcome::LocalOnly),
        }
    }

    // ---------------------------------------------------------------
    // Preferences
    // ---------------------------------------------------------------

    fn local_preferences(&self) -> Preferences {
        Preferences::from_local_flags(|key| match self.store.get_raw(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not read preference '{key}': {e}");
                None
            }
        })
    }

    fn write_local_preferences(&self, prefs: &Preferences) -> Result<(), AppResponse> {
        let flags = prefs.to_local_flags();
        let entries: Vec<(&str, &str)> = flags
            .iter()
            .map(|(key, value)| (*key, if *value { "true" } else { "false" }))
            .collect();
        self.store.put_raw_many(&entries)
    }

    /// Preferences. A successful remote read replaces the local flags.
    pub fn preferences_fetch(&self) -> Fetched<Preferences> {
        match self.try_remote("preferences fetch", RemoteApi::preferences_get) {
            Some(prefs) => {
                match self.write_local_preferences(&prefs) {
                    Ok(()) => self.touch(PREFS_SYNCED_AT_KEY, now_millis()),
                    Err(e) => warn!("Could not cache remote preferences: {e}"),
                }
                Fetched::remote(prefs)
            }
            None => Fetched::local(self.local_preferences()),
        }
    }

    pub fn preferences_save(&self, prefs: &Preferences) -> Result<WriteOutcome, AppResponse> {
        self.write_local_preferences(prefs)?;
        let outcome = self.mirror_write(
            PendingOpType::PreferencesSave,
            |api| api.preferences_save(prefs),
            || Ok(serde_json::to_value(prefs)?),
        )?;
        if outcome == WriteOutcome::Synced {
            self.touch(PREFS_SYNCED_AT_KEY, now_millis());
        }
        Ok(outcome)
    }

    // ---------------------------------------------------------------
    // Playlists
    // ---------------------------------------------------------------

    /// Shares a playlist. Offline, or when the remote refuses, the playlist
    /// is kept on this device under a `LOCAL-` code instead.
    pub fn playlist_create(&self, title: &str, items: Vec<ContentItem>) -> Result<PlaylistCreated, AppResponse> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppResponse::ValidationError("Playlist needs a title".to_string()));
        }
        let playlist = Playlist { title: title.to_string(), items };

        if let Some(code) = self.try_remote("playlist create", |api| api.playlist_create(&playlist)) {
            info!("Playlist '{}' shared as {code}", playlist.title);
            return Ok(PlaylistCreated { code, local: false });
        }

        let mut code = identity::mint_local_share_code();
        while self.store.get_raw(&playlist_key(&code))?.is_some() {
            code = identity::mint_local_share_code();
        }
        self.store.put_json(&playlist_key(&code), &playlist)?;
        info!("Playlist '{}' stored locally as {code}", playlist.title);
        Ok(PlaylistCreated { code, local: true })
    }

    /// Looks a playlist up by share code. Playlists stored on this device
    /// are checked first; the remote is only asked when there is none.
    pub fn playlist_get(&self, code: &str) -> Option<SharedPlaylist> {
        let code = code.trim();
        if !identity::is_valid_share_code(code) {
            debug!("Ignoring malformed share code '{code}'");
            return None;
        }
        match self.store.get_json::<Playlist>(&playlist_key(code)) {
            Ok(Some(playlist)) => {
                return Some(SharedPlaylist { code: code.to_string(), playlist, local: true });
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable local playlist {code}: {e}"),
        }
        // Device-local codes are never known to the remote.
        if identity::is_local_share_code(code) {
            return None;
        }
        self.try_remote("playlist fetch", |api| api.playlist_get(code))
            .map(|playlist| SharedPlaylist { code: code.to_string(), playlist, local: false })
    }

    /// Codes of playlists that exist only on this device.
    pub fn local_playlist_codes(&self) -> Vec<String> {
        match self.store.keys_with_prefix(PLAYLIST_KEY_PREFIX) {
            Ok(keys) => keys
                .into_iter()
                .map(|key| key[PLAYLIST_KEY_PREFIX.len()..].to_string())
                .collect(),
            Err(e) => {
                warn!("Could not list local playlists: {e}");
                Vec::new()
            }
        }
    }

    // ---------------------------------------------------------------
    // Pending queue
    // ---------------------------------------------------------------

    fn replay(&self, op: &PendingOperation) -> Result<(), AppResponse> {
        match op.op_type {
            PendingOpType::CatalogSync => {
                let payload: CatalogSyncPayload = serde_json::from_value(op.payload.clone())?;
                self.remote.catalog_bulk_add(&payload.movies)
            }
            PendingOpType::QueueAdd => {
                let item: ContentItem = serde_json::from_value(op.payload.clone())?;
                self.remote.queue_add(&item)
            }
            PendingOpType::PreferencesSave => {
                let prefs: Preferences = serde_json::from_value(op.payload.clone())?;
                self.remote.preferences_save(&prefs)
            }
        }
    }

    /// Replays pending operations in FIFO order. Successful ones are removed;
    /// failed ones stay for the next drain. Payloads that can no longer be
    /// decoded are dropped. Replay stops as soon as the remote becomes
    /// unreachable. Once the queue is through, unsent local removals are
    /// reconciled with a full queue sync. Skipped while offline or while
    /// another drain is running.
    pub fn drain_pending(&self) -> DrainReport {
        let queue = self.pending.load();
        let reconcile = self.queue_needs_reconcile();
        if queue.is_empty() && !reconcile {
            return DrainReport::default();
        }
        if !self.is_connected() {
            debug!("Offline, leaving {} pending operations", queue.len());
            return DrainReport { remaining: queue.len(), ..DrainReport::default() };
        }
        if self.draining.swap(true, Ordering::AcqRel) {
            debug!("Drain already running");
            return DrainReport { remaining: queue.len(), ..DrainReport::default() };
        }

        let mut report = DrainReport::default();
        let mut done = HashSet::new();
        for op in &queue {
            report.attempted += 1;
            match self.replay(op) {
                Ok(()) => {
                    report.replayed += 1;
                    done.insert(op.id.clone());
                }
                Err(e) if e.is_remote_failure() => {
                    self.record_remote_failure(op.op_type.as_str(), &e);
                    if !self.is_connected() {
                        debug!("Remote lost, stopping drain after {} operations", report.attempted);
                        break;
                    }
                }
                Err(e) => {
                    warn!("Dropping undecodable {} operation {}: {e}", op.op_type.as_str(), op.id);
                    report.discarded += 1;
                    done.insert(op.id.clone());
                }
            }
        }
        if report.replayed > 0 && self.is_connected() {
            self.record_remote_success();
        }

        report.remaining = match self.pending.remove_ids(&done) {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!("Could not persist drained queue: {e}");
                self.pending.len()
            }
        };
        if reconcile && self.is_connected() {
            self.reconcile_queue();
        }
        self.draining.store(false, Ordering::Release);

        info!(
            "Drained pending queue: {} replayed, {} discarded, {} remaining",
            report.replayed, report.discarded, report.remaining
        );
        report
    }

    /// Periodic work: re-probe when offline, then drain.
    pub fn tick(&self) -> DrainReport {
        if !self.is_connected() {
            self.probe();
        }
        self.drain_pending()
    }

    /// The host became visible again (tab focus, app resume).
    pub fn on_visibility_restored(&self) -> DrainReport {
        self.tick()
    }

    /// Best-effort final push of the local queue. Returns at once; the
    /// upload runs on a detached thread that is never joined.
    pub fn on_teardown(self: &Arc<Self>) {
        if !self.is_connected() {
            return;
        }
        let items = self.local_queue();
        let service = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("movieshows-teardown".to_string())
            .spawn(move || {
                match service.remote.queue_sync(&items) {
                    Ok(()) => {
                        if let Err(e) = service.store.remove(QUEUE_RECONCILE_KEY) {
                            debug!("Could not clear queue reconcile flag: {e}");
                        }
                    }
                    Err(e) => debug!("Teardown queue flush failed: {e}"),
                }
            });
        if let Err(e) = spawned {
            debug!("Could not start teardown flush: {e}");
        }
    }

    fn spawn_drain_worker(self: &Arc<Self>) {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.drain_interval();

        let spawned = thread::Builder::new()
            .name("movieshows-drain".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match weak.upgrade() {
                        Some(service) => {
                            service.tick();
                        }
                        None => break,
                    },
                    _ => break,
                }
            });

        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(|p| p.into_inner()) =
                    Some(DrainWorker { stop: stop_tx, handle });
            }
            Err(e) => warn!("Periodic drain disabled, could not spawn worker: {e}"),
        }
    }

    /// Stops the periodic drain and waits for it to exit.
    pub fn shutdown(&self) {
        let worker = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(());
            if worker.handle.thread().id() != thread::current().id() {
                let _ = worker.handle.join();
            }
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        // The worker may be the thread running this drop, so never join here.
        if let Some(worker) = self.worker.get_mut().unwrap_or_else(|p| p.into_inner()).take() {
            let _ = worker.stop.send(());
        }
    }
}
