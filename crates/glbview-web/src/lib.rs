//! glbview Web - Browser frontend for the glbview model viewer
//!
//! Renders the served GLB models with Bevy and WebGPU and drives the
//! state types from `glbview-core` through an egui toolbar and settings
//! dialog.

mod app;
mod file_picker;
mod lights;
mod models;
mod network;
mod preview;
mod scene;
mod storage;
mod ui;

use wasm_bindgen::prelude::*;

/// Entry point for WASM module
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();

    let config = network::config_from_browser();

    // wgpu is noisy below WARN; ?log=debug opts in
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(config.max_level())
            .build(),
    );

    app::run(config);
}
