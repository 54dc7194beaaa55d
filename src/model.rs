//! Domain types shared by the local store, the remote API and the FFI layer.
//!
//! Everything here is plain serde data. Field names on the wire follow the
//! remote API (camelCase); the same shapes are what gets persisted locally.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Movie or series. Serialized as `"movie"` / `"series"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Movie,
    #[serde(alias = "tv")]
    Series,
}

/// A catalog entry; also the shape of a user queue entry.
///
/// Items are keyed by `title`. No numeric id is guaranteed locally, so all
/// dedup and removal goes through [`ContentItem::same_title`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub title: String,
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default, alias = "poster")]
    pub poster_url: Option<String>,
    /// External video id of the trailer, when one is known.
    #[serde(default, alias = "trailerUrl")]
    pub trailer_id: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ContentItem {
    pub fn new(title: impl Into<String>, content_type: ContentType, year: Option<u16>) -> Self {
        Self {
            title: title.into(),
            content_type,
            year,
            poster_url: None,
            trailer_id: None,
            genres: Vec::new(),
            rating: None,
            description: None,
        }
    }

    pub fn with_poster(mut self, poster_url: impl Into<String>) -> Self {
        self.poster_url = Some(poster_url.into());
        self
    }

    pub fn with_trailer(mut self, trailer_id: impl Into<String>) -> Self {
        self.trailer_id = Some(trailer_id.into());
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    /// Title comparison used for queue dedup: exact after trimming.
    pub fn same_title(&self, title: &str) -> bool {
        self.title.trim() == title.trim()
    }
}

/// The user's playback preferences.
///
/// Locally each flag lives under its own key (see [`Preferences::to_local_flags`]);
/// remotely they travel as one object. The serde names below are the remote
/// field names and must stay in sync with the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "autoplay", default = "default_autoplay")]
    pub autoplay: bool,
    #[serde(rename = "soundOnScroll", default)]
    pub sound_on_scroll: bool,
    #[serde(rename = "rewatchEnabled", default)]
    pub rewatch: bool,
}

fn default_autoplay() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            autoplay: true,
            sound_on_scroll: false,
            rewatch: false,
        }
    }
}

impl Preferences {
    pub const AUTOPLAY_KEY: &'static str = "pref_autoplay";
    pub const SOUND_ON_SCROLL_KEY: &'static str = "pref_sound_on_scroll";
    pub const REWATCH_KEY: &'static str = "pref_rewatch";

    /// Pairs of (local key, value) as persisted locally.
    pub fn to_local_flags(&self) -> [(&'static str, bool); 3] {
        [
            (Self::AUTOPLAY_KEY, self.autoplay),
            (Self::SOUND_ON_SCROLL_KEY, self.sound_on_scroll),
            (Self::REWATCH_KEY, self.rewatch),
        ]
    }

    /// Rebuilds preferences from local flags. A flag that is missing or not
    /// `"true"`/`"false"` keeps its default.
    pub fn from_local_flags<F>(mut read: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |raw: Option<String>, fallback: bool| match raw.as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => fallback,
        };
        Self {
            autoplay: flag(read(Self::AUTOPLAY_KEY), defaults.autoplay),
            sound_on_scroll: flag(read(Self::SOUND_ON_SCROLL_KEY), defaults.sound_on_scroll),
            rewatch: flag(read(Self::REWATCH_KEY), defaults.rewatch),
        }
    }
}

/// A titled, ordered list of content items addressed by a share code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub title: String,
    #[serde(default)]
    pub items: Vec<ContentItem>,
}

/// Result of creating a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistCreated {
    pub code: String,
    /// True when the playlist only exists on this device.
    pub local: bool,
}

/// A playlist fetched by code, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedPlaylist {
    pub code: String,
    pub playlist: Playlist,
    pub local: bool,
}

/// Aggregate numbers about the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total: usize,
    pub movies: usize,
    pub series: usize,
    #[serde(rename = "withTrailers", default)]
    pub with_trailers: usize,
}

/// Kind of deferred remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingOpType {
    #[serde(rename = "catalog-sync")]
    CatalogSync,
    #[serde(rename = "queue-add")]
    QueueAdd,
    #[serde(rename = "preferences-save")]
    PreferencesSave,
}

impl PendingOpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingOpType::CatalogSync => "catalog-sync",
            PendingOpType::QueueAdd => "queue-add",
            PendingOpType::PreferencesSave => "preferences-save",
        }
    }
}

/// A remote write that failed or was skipped and waits for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Unique per enqueue; replayed entries are removed by this id.
    pub id: String,
    #[serde(rename = "type")]
    pub op_type: PendingOpType,
    pub payload: JsonValue,
    /// Epoch milliseconds.
    pub enqueued_at: i64,
}

/// Where a read's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Remote,
    Local,
}

/// Read result. Callers get data either way; `source` only says which side
/// answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetched<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Fetched<T> {
    pub fn remote(data: T) -> Self {
        Self { data, source: DataSource::Remote }
    }

    pub fn local(data: T) -> Self {
        Self { data, source: DataSource::Local }
    }

    pub fn is_remote(&self) -> bool {
        self.source == DataSource::Remote
    }
}

/// What happened to a write after it was stored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Stored locally and mirrored to the remote.
    Synced,
    /// Stored locally; the remote write is queued for replay.
    Queued,
    /// Stored locally only; the remote catches up through the next full
    /// queue sync.
    LocalOnly,
    /// Nothing changed locally (title already queued, or not present).
    Unchanged,
}

/// Initialization progress of the sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    Uninitialized,
    IdentityReady,
    Connected,
    Offline,
    Ready,
}

/// Snapshot for a connectivity indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub client_id: String,
    pub connected: bool,
    /// Epoch milliseconds of the last successful remote exchange.
    pub last_sync: Option<i64>,
    pub pending: usize,
    pub state: InitState,
}

/// Outcome of one pending-queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub replayed: usize,
    /// Entries dropped because their payload could not be decoded.
    pub discarded: usize,
    pub remaining: usize,
}
