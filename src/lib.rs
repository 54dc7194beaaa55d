//! # MovieShows Sync
//!
//! Offline-first sync core for the MovieShows front end. The crate keeps the
//! catalog cache, the user's watch queue, playback preferences and shared
//! playlists in a local LMDB store and mirrors them to the MovieShows API.
//!
//! ## How it behaves
//!
//! - **Local first**: every write is stored locally before the remote is
//!   contacted, so nothing the user does is lost while offline.
//! - **Pending queue**: remote writes that fail are persisted and replayed
//!   periodically, when the host becomes visible again, and on demand.
//! - **Silent fallback**: reads use the remote when it answers and the local
//!   store otherwise; callers only learn which side answered.
//! - **FFI-friendly**: a C-compatible surface returning JSON responses, for
//!   Flutter and web-view hosts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use movieshows_sync::{ContentItem, ContentType, SyncConfig, SyncService};
//!
//! let config = SyncConfig {
//!     api_base_url: "https://movieshows.example/api".to_string(),
//!     ..SyncConfig::default()
//! };
//! let sync = SyncService::open(config)?;
//!
//! let item = ContentItem::new("Dune: Part Two", ContentType::Movie, Some(2024));
//! sync.queue_add(&item)?;
//! let queue = sync.queue_fetch();
//! println!("{} queued ({:?})", queue.data.len(), queue.source);
//! # Ok::<(), movieshows_sync::AppResponse>(())
//! ```
//!
//! ## FFI Functions
//!
//! Every function taking a handle returns a JSON-serialized [`AppResponse`]
//! as a C string, to be released with [`free_response`]:
//!
//! - [`sync_create`] / [`sync_destroy`] - service lifecycle
//! - [`sync_status`], [`sync_drain`], [`sync_visibility_restored`], [`sync_teardown`]
//! - [`sync_queue_add`], [`sync_queue_remove`], [`sync_queue_fetch`]
//! - [`sync_preferences_save`], [`sync_preferences_fetch`]
//! - [`sync_catalog_bulk`], [`sync_catalog_list`], [`sync_catalog_search`],
//!   [`sync_catalog_random`], [`sync_catalog_stats`]
//! - [`sync_playlist_create`], [`sync_playlist_get`]

pub mod app_response;
pub mod catalog;
pub mod config;
pub mod identity;
pub mod local_store;
pub mod model;
pub mod pending;
pub mod remote;
pub mod sync_service;

pub use crate::app_response::AppResponse;
pub use crate::config::SyncConfig;
pub use crate::local_store::LocalStore;
pub use crate::model::{
    CatalogStats, ContentItem, ContentType, DataSource, DrainReport, Fetched, InitState,
    PendingOpType, PendingOperation, Playlist, PlaylistCreated, Preferences, SharedPlaylist,
    SyncStatus, WriteOutcome,
};
pub use crate::remote::{ApiRequest, HttpTransport, Method, RemoteApi, Transport};
pub use crate::sync_service::SyncService;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Opaque handle owned by the FFI caller.
pub struct SyncHandle {
    service: Arc<SyncService>,
}

#[derive(Deserialize)]
struct PlaylistRequest {
    title: String,
    #[serde(default)]
    items: Vec<ContentItem>,
}

/// Creates the sync service from a JSON [`SyncConfig`].
///
/// Opens the local store, resolves the client identity, probes the remote and
/// drains pending operations. An unreachable remote is not an error.
///
/// # Returns
///
/// A handle to pass to the other functions, or a null pointer when the
/// configuration is invalid or the local store cannot be opened. Release it
/// with [`sync_destroy`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use movieshows_sync::sync_create;
///
/// let config = CString::new(r#"{"api_base_url":"https://movieshows.example/api"}"#).unwrap();
/// let handle = sync_create(config.as_ptr());
/// assert!(!handle.is_null());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_create(config_json: *const c_char) -> *mut SyncHandle {
    let json = match c_ptr_to_str(config_json) {
        Some(s) => s,
        None => {
            warn!("Null or invalid config passed to sync_create");
            return std::ptr::null_mut();
        }
    };

    let config = match SyncConfig::from_json(&json) {
        Ok(config) => config,
        Err(e) => {
            warn!("Rejected sync configuration: {e}");
            return std::ptr::null_mut();
        }
    };

    match SyncService::open(config) {
        Ok(service) => {
            info!("✅ Sync service created");
            Box::into_raw(Box::new(SyncHandle { service }))
        }
        Err(e) => {
            warn!("❌ Failed to create sync service: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Stops background work and releases the handle. The pointer must not be
/// used afterwards.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_destroy(handle: *mut SyncHandle) -> *const c_char {
    if handle.is_null() {
        return response_to_c_string(&AppResponse::BadRequest(
            "Null handle passed to sync_destroy".to_string(),
        ));
    }
    let handle = unsafe { Box::from_raw(handle) };
    handle.service.shutdown();
    if let Err(e) = handle.service.store().close_database() {
        warn!("Flush on destroy failed: {e}");
    }
    drop(handle);
    response_to_c_string(&AppResponse::success("Sync service destroyed"))
}

/// Connection indicator: client id, connected flag, last sync, pending count.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_status(handle: *mut SyncHandle) -> *const c_char {
    with_handle(handle, "sync_status", |service| ok_json(&service.status()))
}

/// Adds a queue item given as JSON. Duplicate titles leave the queue as is.
///
/// ```json
/// { "title": "Dune: Part Two", "type": "movie", "year": 2024, "posterUrl": "...", "trailerId": "..." }
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_queue_add(handle: *mut SyncHandle, item_json: *const c_char) -> *const c_char {
    with_handle(handle, "sync_queue_add", |service| {
        let item: ContentItem = parse_json_arg(item_json, "item")?;
        ok_json(&service.queue_add(&item)?)
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_queue_remove(handle: *mut SyncHandle, title: *const c_char) -> *const c_char {
    with_handle(handle, "sync_queue_remove", |service| {
        let title = required_str(title, "title")?;
        ok_json(&service.queue_remove(&title)?)
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_queue_fetch(handle: *mut SyncHandle) -> *const c_char {
    with_handle(handle, "sync_queue_fetch", |service| ok_json(&service.queue_fetch()))
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_preferences_save(handle: *mut SyncHandle, prefs_json: *const c_char) -> *const c_char {
    with_handle(handle, "sync_preferences_save", |service| {
        let prefs: Preferences = parse_json_arg(prefs_json, "preferences")?;
        ok_json(&service.preferences_save(&prefs)?)
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_preferences_fetch(handle: *mut SyncHandle) -> *const c_char {
    with_handle(handle, "sync_preferences_fetch", |service| {
        ok_json(&service.preferences_fetch())
    })
}

/// Merges a JSON array of content items into the catalog and pushes it.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_catalog_bulk(handle: *mut SyncHandle, items_json: *const c_char) -> *const c_char {
    with_handle(handle, "sync_catalog_bulk", |service| {
        let items: Vec<ContentItem> = parse_json_arg(items_json, "items")?;
        ok_json(&service.catalog_bulk_sync(&items)?)
    })
}

/// Negative `limit`/`offset` select the defaults.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_catalog_list(handle: *mut SyncHandle, limit: i64, offset: i64) -> *const c_char {
    with_handle(handle, "sync_catalog_list", |service| {
        ok_json(&service.catalog_list(optional_count(limit), optional_count(offset)))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_catalog_search(handle: *mut SyncHandle, query: *const c_char, limit: i64) -> *const c_char {
    with_handle(handle, "sync_catalog_search", |service| {
        let query = required_str(query, "query")?;
        ok_json(&service.catalog_search(&query, optional_count(limit)))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_catalog_random(handle: *mut SyncHandle, count: i64) -> *const c_char {
    with_handle(handle, "sync_catalog_random", |service| {
        ok_json(&service.catalog_random(optional_count(count)))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_catalog_stats(handle: *mut SyncHandle) -> *const c_char {
    with_handle(handle, "sync_catalog_stats", |service| ok_json(&service.catalog_stats()))
}

/// Creates a shared playlist from `{ "title": ..., "items": [...] }`.
///
/// The response carries the share code and a `local` flag that is true when
/// the playlist could only be stored on this device.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_playlist_create(handle: *mut SyncHandle, playlist_json: *const c_char) -> *const c_char {
    with_handle(handle, "sync_playlist_create", |service| {
        let request: PlaylistRequest = parse_json_arg(playlist_json, "playlist")?;
        ok_json(&service.playlist_create(&request.title, request.items)?)
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_playlist_get(handle: *mut SyncHandle, code: *const c_char) -> *const c_char {
    with_handle(handle, "sync_playlist_get", |service| {
        let code = required_str(code, "code")?;
        match service.playlist_get(&code) {
            Some(playlist) => ok_json(&playlist),
            None => Err(AppResponse::NotFound(format!("No playlist with code {code}"))),
        }
    })
}

/// Replays pending operations now.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_drain(handle: *mut SyncHandle) -> *const c_char {
    with_handle(handle, "sync_drain", |service| ok_json(&service.drain_pending()))
}

/// Call when the host becomes visible again; re-probes if offline and drains.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_visibility_restored(handle: *mut SyncHandle) -> *const c_char {
    with_handle(handle, "sync_visibility_restored", |service| {
        ok_json(&service.on_visibility_restored())
    })
}

/// Call on page/app teardown. Starts a best-effort upload of the queue and
/// returns without waiting for it.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_teardown(handle: *mut SyncHandle) -> *const c_char {
    with_handle(handle, "sync_teardown", |service| {
        service.on_teardown();
        Ok(AppResponse::success("Teardown flush dispatched"))
    })
}

/// Releases a string returned by any `sync_*` function.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

fn with_handle<F>(handle: *mut SyncHandle, caller: &str, f: F) -> *const c_char
where
    F: FnOnce(&Arc<SyncService>) -> Result<AppResponse, AppResponse>,
{
    let handle = match unsafe { handle.as_ref() } {
        Some(h) => h,
        None => {
            let error = AppResponse::BadRequest(format!("Null handle passed to {caller}"));
            return response_to_c_string(&error);
        }
    };
    match f(&handle.service) {
        Ok(response) => response_to_c_string(&response),
        Err(error) => response_to_c_string(&error),
    }
}

fn ok_json<T: Serialize>(value: &T) -> Result<AppResponse, AppResponse> {
    Ok(AppResponse::Ok(serde_json::to_string(value)?))
}

fn parse_json_arg<T: for<'de> Deserialize<'de>>(ptr: *const c_char, field_name: &str) -> Result<T, AppResponse> {
    let json = required_str(ptr, field_name)?;
    serde_json::from_str(&json)
        .map_err(|e| AppResponse::SerializationError(format!("Invalid {field_name} JSON: {e}")))
}

fn required_str(ptr: *const c_char, field_name: &str) -> Result<String, AppResponse> {
    if ptr.is_null() {
        return Err(AppResponse::BadRequest(format!("Null {field_name} pointer")));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_string)
        .map_err(|e| AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}")))
}

fn c_ptr_to_str(ptr: *const c_char) -> Option<String> {
    required_str(ptr, "string").ok()
}

fn optional_count(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Serializes an [`AppResponse`] into a caller-owned C string, or null if
/// that fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}
