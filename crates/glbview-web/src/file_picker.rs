//! Browser file dialogs for settings bundles
//!
//! Import reads a JSON bundle chosen by the user; export downloads the
//! current bundle. Both go through a hidden DOM element and report back
//! through [`PendingFileResults`], which is drained once per frame.

use bevy::prelude::*;
use tracing::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::network::ServerState;
use crate::storage::ImportSettings;

pub struct FilePickerPlugin;

impl Plugin for FilePickerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FilePickerState>()
            .init_resource::<PendingFileResults>()
            .add_systems(Update, process_file_results);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Open,
    Save,
}

/// What the dialog was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePickerContext {
    SettingsImport,
    SettingsExport,
}

/// Accepted extensions for the open dialog
#[derive(Debug, Clone)]
pub struct FileFilter {
    pub name: String,
    /// Without dots
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn json() -> Self {
        Self {
            name: "Settings Files".to_string(),
            extensions: vec!["json".to_string()],
        }
    }

    /// Value for the `accept` attribute of a file input
    pub fn to_accept_string(&self) -> String {
        if self.extensions.is_empty() {
            "*".to_string()
        } else {
            self.extensions
                .iter()
                .map(|ext| format!(".{}", ext))
                .collect::<Vec<_>>()
                .join(",")
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilePickerResult {
    pub context: FilePickerContext,
    pub operation: FileOperation,
    pub filename: String,
    /// File bytes for open operations
    pub content: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl FilePickerResult {
    fn failed(context: FilePickerContext, operation: FileOperation, error: impl Into<String>) -> Self {
        Self {
            context,
            operation,
            filename: String::new(),
            content: None,
            error: Some(error.into()),
        }
    }
}

/// Results pushed by DOM callbacks
#[derive(Resource, Default, Clone)]
pub struct PendingFileResults(pub Arc<Mutex<VecDeque<FilePickerResult>>>);

impl PendingFileResults {
    fn push(&self, result: FilePickerResult) {
        if let Ok(mut results) = self.0.lock() {
            results.push_back(result);
        }
    }
}

#[derive(Resource, Default)]
pub struct FilePickerState {
    /// An open dialog is waiting for the user
    pub waiting: Option<FilePickerContext>,
    /// Name of the last imported or exported file
    pub last_file: Option<String>,
}

fn process_file_results(
    pending: Res<PendingFileResults>,
    mut state: ResMut<FilePickerState>,
    mut server: ResMut<ServerState>,
    mut imports: MessageWriter<ImportSettings>,
) {
    let results: Vec<FilePickerResult> = match pending.0.lock() {
        Ok(mut queue) => queue.drain(..).collect(),
        Err(_) => return,
    };

    for result in results {
        state.waiting = None;
        if let Some(error) = result.error {
            warn!(context = ?result.context, "File operation failed: {}", error);
            server.settings_status = Some(error);
            continue;
        }
        match (result.context, result.operation) {
            (FilePickerContext::SettingsImport, FileOperation::Open) => {
                let Some(bytes) = result.content else {
                    continue;
                };
                match String::from_utf8(bytes) {
                    Ok(json) => {
                        info!(file = %result.filename, "Importing settings file");
                        imports.write(ImportSettings { json });
                    }
                    Err(_) => {
                        server.settings_status =
                            Some(format!("{} is not a text file", result.filename));
                    }
                }
            }
            (FilePickerContext::SettingsExport, FileOperation::Save) => {
                server.settings_status = Some(format!("Exported {}", result.filename));
            }
            (context, operation) => {
                debug!(?context, ?operation, "Unexpected file result");
            }
        }
        state.last_file = Some(result.filename);
    }
}

#[cfg(target_arch = "wasm32")]
mod js_interop {
    use super::*;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{Blob, HtmlInputElement, Url};

    fn document() -> Option<web_sys::Document> {
        web_sys::window()?.document()
    }

    /// Click a hidden `<input type=file>` and read the chosen file
    pub fn open_file_picker(accept: &str, pending: PendingFileResults, context: FilePickerContext) {
        let Some(document) = document() else {
            tracing::error!("open_file_picker: no document");
            return;
        };
        let input: HtmlInputElement = match document
            .create_element("input")
            .ok()
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
        {
            Some(input) => input,
            None => {
                tracing::error!("open_file_picker: failed to create input element");
                return;
            }
        };
        input.set_type("file");
        input.set_accept(accept);
        input.style().set_property("display", "none").ok();

        let Some(body) = document.body() else {
            tracing::error!("open_file_picker: no document body");
            return;
        };
        if let Err(e) = body.append_child(&input) {
            tracing::error!("open_file_picker: failed to attach input: {:?}", e);
            return;
        }

        let input_clone = input.clone();
        let on_change = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let file = input_clone.files().and_then(|files| files.get(0));
            if let Some(file) = file {
                read_file(file, pending.clone(), context);
            } else {
                tracing::debug!("open_file_picker: nothing selected");
            }
            if let Some(parent) = input_clone.parent_node() {
                parent.remove_child(&input_clone).ok();
            }
        }) as Box<dyn FnMut(_)>);

        input.set_onchange(Some(on_change.as_ref().unchecked_ref()));
        on_change.forget();
        input.click();
    }

    fn read_file(file: web_sys::File, pending: PendingFileResults, context: FilePickerContext) {
        let filename = file.name();
        let reader = match web_sys::FileReader::new() {
            Ok(reader) => reader,
            Err(e) => {
                pending.push(FilePickerResult::failed(
                    context,
                    FileOperation::Open,
                    format!("Unable to read {}: {:?}", filename, e),
                ));
                return;
            }
        };
        let reader_clone = reader.clone();
        let on_load = Closure::wrap(Box::new(move |_: web_sys::Event| {
            let bytes = reader_clone
                .result()
                .ok()
                .and_then(|value| value.dyn_into::<js_sys::ArrayBuffer>().ok())
                .map(|buffer| js_sys::Uint8Array::new(&buffer).to_vec());
            let result = match bytes {
                Some(content) => FilePickerResult {
                    context,
                    operation: FileOperation::Open,
                    filename: filename.clone(),
                    content: Some(content),
                    error: None,
                },
                None => FilePickerResult::failed(
                    context,
                    FileOperation::Open,
                    format!("Unable to read {}", filename),
                ),
            };
            pending.push(result);
        }) as Box<dyn FnMut(_)>);

        reader.set_onload(Some(on_load.as_ref().unchecked_ref()));
        on_load.forget();
        reader.read_as_array_buffer(&file).ok();
    }

    /// Download `content` through a temporary object URL
    pub fn save_file(
        filename: &str,
        content: &[u8],
        mime_type: &str,
        pending: PendingFileResults,
        context: FilePickerContext,
    ) {
        let fail = |reason: &str| {
            pending.push(FilePickerResult::failed(
                context,
                FileOperation::Save,
                format!("Unable to save {}: {}", filename, reason),
            ));
        };
        let (Some(window), Some(document)) = (web_sys::window(), document()) else {
            fail("no document");
            return;
        };

        let parts = js_sys::Array::new();
        parts.push(&js_sys::Uint8Array::from(content).buffer());
        let options = web_sys::BlobPropertyBag::new();
        options.set_type(mime_type);
        let Ok(blob) = Blob::new_with_u8_array_sequence_and_options(&parts, &options) else {
            fail("blob");
            return;
        };
        let Ok(url) = Url::create_object_url_with_blob(&blob) else {
            fail("object URL");
            return;
        };
        let Ok(anchor) = document.create_element("a") else {
            fail("anchor");
            return;
        };
        anchor.set_attribute("href", &url).ok();
        anchor.set_attribute("download", filename).ok();

        if let Some(body) = document.body() {
            body.append_child(&anchor).ok();
            if let Some(element) = anchor.dyn_ref::<web_sys::HtmlElement>() {
                element.click();
            }
            body.remove_child(&anchor).ok();
        }

        let revoke = Closure::wrap(Box::new(move || {
            Url::revoke_object_url(&url).ok();
        }) as Box<dyn FnMut()>);
        window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                revoke.as_ref().unchecked_ref(),
                1000,
            )
            .ok();
        revoke.forget();

        pending.push(FilePickerResult {
            context,
            operation: FileOperation::Save,
            filename: filename.to_string(),
            content: None,
            error: None,
        });
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod js_interop {
    use super::*;

    pub fn open_file_picker(_accept: &str, pending: PendingFileResults, context: FilePickerContext) {
        pending.push(FilePickerResult::failed(
            context,
            FileOperation::Open,
            "File picker not supported on this platform",
        ));
    }

    pub fn save_file(
        _filename: &str,
        _content: &[u8],
        _mime_type: &str,
        pending: PendingFileResults,
        context: FilePickerContext,
    ) {
        pending.push(FilePickerResult::failed(
            context,
            FileOperation::Save,
            "File save not supported on this platform",
        ));
    }
}

pub use js_interop::{open_file_picker, save_file};

pub fn trigger_file_open(
    pending: &PendingFileResults,
    state: &mut FilePickerState,
    context: FilePickerContext,
    filter: FileFilter,
) {
    state.waiting = Some(context);
    open_file_picker(&filter.to_accept_string(), pending.clone(), context);
}

pub fn trigger_file_save(
    pending: &PendingFileResults,
    context: FilePickerContext,
    filename: &str,
    content: &[u8],
    mime_type: &str,
) {
    save_file(filename, content, mime_type, pending.clone(), context);
}

/// Download name for an exported bundle
pub fn export_filename(stamp_ms: u64) -> String {
    format!("glbview-settings-{}.json", stamp_ms)
}
