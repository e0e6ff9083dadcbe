//! Network client for the model server
//!
//! Requests run on the browser event loop via `spawn_local`. Their results
//! land in [`NetworkInbox`], which [`process_network_results`] drains once
//! per frame.

use bevy::prelude::*;
use tracing::{debug, info, warn};
use glbview_core::settings::{PreviewInfo, SettingsFileList};
use glbview_core::{ModelDescriptor, UpdateCheck, ViewerConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::app::{Config, Reload, Watcher};
use crate::models::ReloadModels;
use crate::storage::ImportSettings;

pub struct NetworkPlugin;

impl Plugin for NetworkPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<NetworkInbox>()
            .init_resource::<ServerState>()
            .init_resource::<PollTimer>()
            .add_message::<InitModels>()
            .add_message::<RefreshPreviewInfo>()
            .add_message::<SetPreviewDir>()
            .add_message::<FetchSettingsList>()
            .add_message::<FetchSettingsFile>()
            .add_message::<SaveSettings>()
            .add_systems(Startup, request_initial_models)
            .add_systems(
                Update,
                (
                    handle_requests,
                    poll_models,
                    process_network_results,
                )
                    .chain(),
            );
    }
}

/// Read the viewer configuration from the page URL
#[cfg(target_arch = "wasm32")]
pub fn config_from_browser() -> ViewerConfig {
    let search = web_sys::window()
        .and_then(|window| window.location().search().ok())
        .unwrap_or_default();
    ViewerConfig::from_query(&search)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn config_from_browser() -> ViewerConfig {
    ViewerConfig::default()
}

/// Fetch the model list and load every model
#[derive(Message, Debug, Clone, Copy, Default)]
pub struct InitModels;

#[derive(Message, Debug, Clone, Copy, Default)]
pub struct RefreshPreviewInfo;

/// Point the server at another preview folder; empty resets it
#[derive(Message, Debug, Clone)]
pub struct SetPreviewDir {
    pub path: String,
}

#[derive(Message, Debug, Clone, Copy, Default)]
pub struct FetchSettingsList;

#[derive(Message, Debug, Clone)]
pub struct FetchSettingsFile {
    pub path: String,
}

/// Store an exported settings bundle in the preview folder
#[derive(Message, Debug, Clone)]
pub struct SaveSettings {
    pub json: String,
}

/// Completed request, waiting to be applied to the ECS
#[derive(Debug)]
pub enum NetworkResult {
    ModelList(Option<Vec<ModelDescriptor>>),
    Poll {
        fetched: Option<Vec<ModelDescriptor>>,
        /// `Last-Modified` per entry of the list that was current when polling
        stamps: Vec<Option<String>>,
    },
    PreviewInfo(PreviewInfo),
    PreviewDir {
        reset: bool,
        /// Response body on failure
        result: Result<(), Option<String>>,
    },
    SettingsList(SettingsFileList),
    SettingsFile(Result<String, String>),
    SettingsSaved(Result<String, String>),
}

#[derive(Resource, Default, Clone)]
pub struct NetworkInbox(pub Arc<Mutex<Vec<NetworkResult>>>);

impl NetworkInbox {
    #[cfg(target_arch = "wasm32")]
    fn push(&self, result: NetworkResult) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push(result);
        }
    }

    fn drain(&self) -> Vec<NetworkResult> {
        self.0
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }
}

/// Server-side facts shown in the settings dialog
#[derive(Resource, Default)]
pub struct ServerState {
    pub preview_info: Option<PreviewInfo>,
    /// Failure of the last preview-folder request
    pub preview_dir_warning: Option<String>,
    pub settings_files: Option<SettingsFileList>,
    /// Outcome of the last settings transfer
    pub settings_status: Option<String>,
}

/// Repeating auto-reload timer
#[derive(Resource)]
pub struct PollTimer {
    pub timer: Timer,
}

impl Default for PollTimer {
    fn default() -> Self {
        Self {
            timer: Timer::from_seconds(1.0, TimerMode::Repeating),
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod fetch {
    use anyhow::{bail, Result};
    use gloo_net::http::{Method, Request, RequestBuilder};
    use serde::de::DeserializeOwned;
    use web_sys::RequestCache;

    pub async fn json<T: DeserializeOwned>(url: &str) -> Result<T> {
        let response = Request::get(url)
            .cache(RequestCache::NoStore)
            .send()
            .await?;
        if !response.ok() {
            bail!("{} returned {}", url, response.status());
        }
        Ok(response.json::<T>().await?)
    }

    /// `Last-Modified` of a model file, `None` when unavailable
    pub async fn last_modified(url: &str) -> Option<String> {
        let response = RequestBuilder::new(url)
            .method(Method::HEAD)
            .cache(RequestCache::NoStore)
            .send()
            .await
            .ok()?;
        if !response.ok() {
            return None;
        }
        response.headers().get("Last-Modified")
    }

    /// POST a JSON body; returns success and the response text
    pub async fn post_json(url: &str, body: String) -> Result<(bool, String)> {
        let response = Request::post(url)
            .header("Content-Type", "application/json")
            .body(body)?
            .send()
            .await?;
        let ok = response.ok();
        Ok((ok, response.text().await.unwrap_or_default()))
    }

    pub async fn text(url: &str) -> Result<String> {
        let response = Request::get(url)
            .cache(RequestCache::NoStore)
            .send()
            .await?;
        if !response.ok() {
            bail!("{} returned {}", url, response.status());
        }
        Ok(response.text().await?)
    }
}

fn request_initial_models(mut init: MessageWriter<InitModels>) {
    init.write(InitModels);
}

fn fetch_model_list(config: &ViewerConfig, inbox: &NetworkInbox) {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let url = config.url(&config.list_endpoint);
        let inbox = inbox.clone();
        spawn_local(async move {
            let list = match fetch::json::<Vec<ModelDescriptor>>(&url).await {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!("Failed to fetch model list: {:?}", e);
                    None
                }
            };
            inbox.push(NetworkResult::ModelList(list));
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (config, inbox);
        tracing::debug!("Model list fetch not available in native mode");
    }
}

/// Fetch the list, then HEAD every file of the current list
fn spawn_poll(config: &ViewerConfig, current: &[ModelDescriptor], inbox: &NetworkInbox) {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let list_url = config.url(&config.list_endpoint);
        let file_urls: Vec<String> = current.iter().map(|d| config.url(&d.file)).collect();
        let inbox = inbox.clone();
        spawn_local(async move {
            let fetched = fetch::json::<Vec<ModelDescriptor>>(&list_url).await.ok();
            let mut stamps = Vec::with_capacity(file_urls.len());
            if fetched.is_some() {
                for url in &file_urls {
                    stamps.push(fetch::last_modified(url).await);
                }
            }
            inbox.push(NetworkResult::Poll { fetched, stamps });
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (config, current, inbox);
    }
}

fn fetch_preview_info(config: &ViewerConfig, inbox: &NetworkInbox) {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let url = config.url(&config.preview_info_endpoint);
        let inbox = inbox.clone();
        spawn_local(async move {
            match fetch::json::<PreviewInfo>(&url).await {
                Ok(info) => inbox.push(NetworkResult::PreviewInfo(info)),
                Err(e) => tracing::warn!("Failed to fetch preview info: {:?}", e),
            }
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (config, inbox);
    }
}

fn post_preview_dir(config: &ViewerConfig, path: String, inbox: &NetworkInbox) {
    #[cfg(target_arch = "wasm32")]
    {
        use glbview_core::settings::PreviewDirRequest;
        use wasm_bindgen_futures::spawn_local;

        let url = config.url(&config.set_preview_dir_endpoint);
        let inbox = inbox.clone();
        let reset = path.trim().is_empty();
        spawn_local(async move {
            let body = serde_json::to_string(&PreviewDirRequest { path }).unwrap_or_default();
            let result = match fetch::post_json(&url, body).await {
                Ok((true, _)) => Ok(()),
                Ok((false, text)) => Err(Some(text)),
                Err(e) => {
                    tracing::warn!("Failed to set preview folder: {:?}", e);
                    Err(None)
                }
            };
            inbox.push(NetworkResult::PreviewDir { reset, result });
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (config, path, inbox);
        tracing::warn!("Preview folder not available in native mode");
    }
}

fn fetch_settings_list(config: &ViewerConfig, inbox: &NetworkInbox) {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let url = config.url(&config.settings_list_endpoint);
        let inbox = inbox.clone();
        spawn_local(async move {
            match fetch::json::<SettingsFileList>(&url).await {
                Ok(list) => inbox.push(NetworkResult::SettingsList(list)),
                Err(e) => tracing::warn!("Failed to list saved settings: {:?}", e),
            }
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (config, inbox);
    }
}

fn fetch_settings_file(config: &ViewerConfig, path: &str, inbox: &NetworkInbox) {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let encoded: String = js_sys::encode_uri_component(path).into();
        let url = format!("{}?path={}", config.url(&config.settings_file_endpoint), encoded);
        let inbox = inbox.clone();
        spawn_local(async move {
            let result = fetch::text(&url).await.map_err(|e| e.to_string());
            inbox.push(NetworkResult::SettingsFile(result));
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (config, path, inbox);
    }
}

fn post_settings(config: &ViewerConfig, json: String, inbox: &NetworkInbox) {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let url = config.url(&config.save_settings_endpoint);
        let inbox = inbox.clone();
        spawn_local(async move {
            let result = match fetch::post_json(&url, json).await {
                Ok((true, text)) => Ok(text),
                Ok((false, text)) => Err(text),
                Err(e) => Err(e.to_string()),
            };
            inbox.push(NetworkResult::SettingsSaved(result));
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (config, json, inbox);
        tracing::warn!("Saving settings to the server is not available in native mode");
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_requests(
    config: Res<Config>,
    inbox: Res<NetworkInbox>,
    mut init: MessageReader<InitModels>,
    mut refresh: MessageReader<RefreshPreviewInfo>,
    mut preview_dir: MessageReader<SetPreviewDir>,
    mut list_settings: MessageReader<FetchSettingsList>,
    mut settings_file: MessageReader<FetchSettingsFile>,
    mut save_settings: MessageReader<SaveSettings>,
) {
    if init.read().count() > 0 {
        fetch_model_list(&config, &inbox);
    }
    if refresh.read().count() > 0 {
        fetch_preview_info(&config, &inbox);
    }
    for request in preview_dir.read() {
        post_preview_dir(&config, request.path.trim().to_string(), &inbox);
    }
    if list_settings.read().count() > 0 {
        fetch_settings_list(&config, &inbox);
    }
    for request in settings_file.read() {
        fetch_settings_file(&config, &request.path, &inbox);
    }
    for request in save_settings.read() {
        post_settings(&config, request.json.clone(), &inbox);
    }
}

/// Tick the auto-reload timer and start a poll when it fires
fn poll_models(
    time: Res<Time>,
    config: Res<Config>,
    inbox: Res<NetworkInbox>,
    watcher: Res<Watcher>,
    mut timer: ResMut<PollTimer>,
    mut reload: ResMut<Reload>,
) {
    if reload.take_rearm() {
        timer.timer = Timer::new(
            Duration::from_millis(reload.interval_ms() as u64),
            TimerMode::Repeating,
        );
    }
    if !reload.enabled() {
        return;
    }
    timer.timer.tick(time.delta());
    if timer.timer.just_finished() && reload.begin_poll() {
        spawn_poll(&config, watcher.list(), &inbox);
    }
}

#[allow(clippy::too_many_arguments)]
fn process_network_results(
    inbox: Res<NetworkInbox>,
    mut watcher: ResMut<Watcher>,
    mut reload: ResMut<Reload>,
    mut server: ResMut<ServerState>,
    mut reload_models: MessageWriter<ReloadModels>,
    mut init: MessageWriter<InitModels>,
    mut refresh: MessageWriter<RefreshPreviewInfo>,
    mut list_settings: MessageWriter<FetchSettingsList>,
    mut import: MessageWriter<ImportSettings>,
) {
    for result in inbox.drain() {
        match result {
            NetworkResult::ModelList(Some(list)) => {
                info!(count = list.len(), "Loaded model list");
                watcher.set_list(list);
                reload_models.write(ReloadModels);
            }
            NetworkResult::ModelList(None) => {
                reload.mark_offline();
            }
            NetworkResult::Poll { fetched, stamps } => {
                let check = watcher.check(fetched, |index, _| stamps.get(index).cloned().flatten());
                match reload.finish_poll(&check) {
                    glbview_core::ReloadAction::ReplaceList => {
                        if let UpdateCheck::ListChanged { list, .. } = check {
                            watcher.set_list(list);
                        }
                        reload_models.write(ReloadModels);
                    }
                    glbview_core::ReloadAction::ReloadModels => {
                        reload_models.write(ReloadModels);
                    }
                    glbview_core::ReloadAction::None => {}
                }
            }
            NetworkResult::PreviewInfo(info) => {
                debug!(source = %info.source, "Preview info");
                server.preview_info = Some(info);
                list_settings.write(FetchSettingsList);
            }
            NetworkResult::PreviewDir { reset, result } => match result {
                Ok(()) => {
                    server.preview_dir_warning = None;
                    init.write(InitModels);
                    refresh.write(RefreshPreviewInfo);
                }
                Err(body) => {
                    let message =
                        glbview_core::settings::preview_dir_failure(body.as_deref(), reset);
                    warn!("{}", message);
                    server.preview_dir_warning = Some(message);
                }
            },
            NetworkResult::SettingsList(list) => {
                server.settings_files = Some(list);
            }
            NetworkResult::SettingsFile(Ok(json)) => {
                import.write(ImportSettings { json });
            }
            NetworkResult::SettingsFile(Err(e)) => {
                warn!("Failed to fetch saved settings: {}", e);
                server.settings_status = Some(format!("Load failed: {}", e));
            }
            NetworkResult::SettingsSaved(Ok(_)) => {
                server.settings_status = Some("Settings saved to preview folder".to_string());
                list_settings.write(FetchSettingsList);
            }
            NetworkResult::SettingsSaved(Err(e)) => {
                warn!("Failed to save settings: {}", e);
                server.settings_status = Some(format!("Save failed: {}", e));
            }
        }
    }
}
