//! glbview Core - Viewer state for the glbview GLB model viewer
//!
//! This crate holds everything the viewer decides without a renderer:
//! - Camera pose math, framing and orthographic fitting
//! - The camera rig with saved slots and dirty tracking
//! - Ambient, directional and spot lights with keyframe interpolation
//! - Model list change detection and auto-reload state
//! - Settings persistence, export bundles and color themes

pub mod bounds;
pub mod camera;
pub mod color;
pub mod config;
pub mod expr;
pub mod framing;
pub mod lights;
pub mod models;
pub mod pose;
pub mod preview;
pub mod reload;
pub mod settings;
pub mod theme;

pub use bounds::Aabb;
pub use camera::{CameraBundle, CameraEvent, CameraMode, CameraRig, CameraSlot, ControlType};
pub use color::{ColorError, HexColor};
pub use config::ViewerConfig;
pub use expr::evaluate_numeric_input;
pub use framing::Face;
pub use lights::{LightEntry, LightEvent, LightKind, LightOptions, LightRig, LightState};
pub use models::{ModelDescriptor, ModelWatcher, SceneBounds, UpdateCheck};
pub use preview::{PickAction, PreviewState, SettingsTab};
pub use reload::{AutoReload, ReloadAction};
pub use settings::{SettingsBundle, SettingsError, SettingsStore, ViewerPrefs};
pub use theme::{ThemeColors, ThemeError, ThemeState};
