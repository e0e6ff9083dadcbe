//! Viewer configuration
//!
//! Defaults can be overridden from the page URL, for example
//! `?log=debug&interval=500&server=http://localhost:8000`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{warn, Level};

use crate::camera::{DEFAULT_FAR, DEFAULT_FOV_DEG, DEFAULT_NEAR};
use crate::preview::{PREVIEW_FAR, PREVIEW_FOV_DEG};
use crate::reload::{DEFAULT_INTERVAL_MS, MIN_INTERVAL_MS};

fn default_list_endpoint() -> String {
    "/glb_list.json".to_string()
}

fn default_preview_info_endpoint() -> String {
    "/preview_info.json".to_string()
}

fn default_set_preview_dir_endpoint() -> String {
    "/set_preview_dir".to_string()
}

fn default_settings_list_endpoint() -> String {
    "/preview_settings_list.json".to_string()
}

fn default_settings_file_endpoint() -> String {
    "/preview_settings_file".to_string()
}

fn default_save_settings_endpoint() -> String {
    "/save_preview_settings".to_string()
}

fn default_poll_interval_ms() -> u32 {
    DEFAULT_INTERVAL_MS
}

fn default_min_poll_interval_ms() -> u32 {
    MIN_INTERVAL_MS
}

fn default_fov_deg() -> f32 {
    DEFAULT_FOV_DEG
}

fn default_preview_fov_deg() -> f32 {
    PREVIEW_FOV_DEG
}

fn default_near() -> f32 {
    DEFAULT_NEAR
}

fn default_far() -> f32 {
    DEFAULT_FAR
}

fn default_preview_far() -> f32 {
    PREVIEW_FAR
}

fn default_axes_length() -> f32 {
    100.0
}

fn default_orbit_sensitivity() -> f32 {
    0.005
}

fn default_rotate_speed() -> f32 {
    4.0
}

fn default_zoom_speed() -> f32 {
    1.2
}

fn default_pan_speed() -> f32 {
    1.0
}

fn default_damping() -> f32 {
    0.2
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Server origin; empty means same origin
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_list_endpoint")]
    pub list_endpoint: String,
    #[serde(default = "default_preview_info_endpoint")]
    pub preview_info_endpoint: String,
    #[serde(default = "default_set_preview_dir_endpoint")]
    pub set_preview_dir_endpoint: String,
    #[serde(default = "default_settings_list_endpoint")]
    pub settings_list_endpoint: String,
    #[serde(default = "default_settings_file_endpoint")]
    pub settings_file_endpoint: String,
    #[serde(default = "default_save_settings_endpoint")]
    pub save_settings_endpoint: String,
    /// Auto-reload interval used when nothing is saved
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u32,
    #[serde(default = "default_min_poll_interval_ms")]
    pub min_poll_interval_ms: u32,
    #[serde(default = "default_fov_deg")]
    pub fov_deg: f32,
    #[serde(default = "default_preview_fov_deg")]
    pub preview_fov_deg: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    #[serde(default = "default_preview_far")]
    pub preview_far: f32,
    #[serde(default = "default_axes_length")]
    pub axes_length: f32,
    /// Orbit radians per pixel of drag
    #[serde(default = "default_orbit_sensitivity")]
    pub orbit_sensitivity: f32,
    #[serde(default = "default_rotate_speed")]
    pub trackball_rotate_speed: f32,
    #[serde(default = "default_zoom_speed")]
    pub zoom_speed: f32,
    /// Pan multiplier in trackball mode
    #[serde(default = "default_pan_speed")]
    pub pan_speed: f32,
    /// Trackball damping factor
    #[serde(default = "default_damping")]
    pub damping: f32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            list_endpoint: default_list_endpoint(),
            preview_info_endpoint: default_preview_info_endpoint(),
            set_preview_dir_endpoint: default_set_preview_dir_endpoint(),
            settings_list_endpoint: default_settings_list_endpoint(),
            settings_file_endpoint: default_settings_file_endpoint(),
            save_settings_endpoint: default_save_settings_endpoint(),
            poll_interval_ms: default_poll_interval_ms(),
            min_poll_interval_ms: default_min_poll_interval_ms(),
            fov_deg: default_fov_deg(),
            preview_fov_deg: default_preview_fov_deg(),
            near: default_near(),
            far: default_far(),
            preview_far: default_preview_far(),
            axes_length: default_axes_length(),
            orbit_sensitivity: default_orbit_sensitivity(),
            trackball_rotate_speed: default_rotate_speed(),
            zoom_speed: default_zoom_speed(),
            pan_speed: default_pan_speed(),
            damping: default_damping(),
            log_level: default_log_level(),
        }
    }
}

impl ViewerConfig {
    /// Apply overrides from a `location.search` string
    pub fn from_query(search: &str) -> Self {
        let mut config = Self::default();
        if let Some(level) = parse_query_param(search, "log") {
            config.log_level = level.to_lowercase();
        }
        if let Some(interval) = parse_query_param(search, "interval") {
            match interval.parse::<u32>() {
                Ok(ms) if ms >= config.min_poll_interval_ms => config.poll_interval_ms = ms,
                _ => warn!("Ignoring interval override: {}", interval),
            }
        }
        if let Some(server) = parse_query_param(search, "server") {
            config.server = server.trim_end_matches('/').to_string();
        }
        config
    }

    /// Tracing level for the log layer, WARN when unparseable
    pub fn max_level(&self) -> Level {
        Level::from_str(&self.log_level).unwrap_or(Level::WARN)
    }

    /// Absolute or same-origin URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }
}

/// Find `param` in a query string like `?a=1&b=2`
pub fn parse_query_param(search: &str, param: &str) -> Option<String> {
    let search = search.trim_start_matches('?');
    for pair in search.split('&') {
        let mut parts = pair.splitn(2, '=');
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if key == param {
                return Some(percent_decode(value));
            }
        }
    }
    None
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.list_endpoint, "/glb_list.json");
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.fov_deg, 20.0);
        assert_eq!(config.preview_fov_deg, 40.0);
        assert_eq!(config.axes_length, 100.0);
        assert_eq!(config.max_level(), Level::WARN);

        let parsed: ViewerConfig = serde_json::from_str(r#"{"far": 50}"#).unwrap();
        assert_eq!(parsed.far, 50.0);
        assert_eq!(parsed.near, 0.1);
    }

    #[test]
    fn test_query_overrides() {
        let config = ViewerConfig::from_query("?log=DEBUG&interval=500&server=http%3A%2F%2Flocalhost%3A8000%2F");
        assert_eq!(config.max_level(), Level::DEBUG);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.server, "http://localhost:8000");
        assert_eq!(config.url("/glb_list.json"), "http://localhost:8000/glb_list.json");

        let rejected = ViewerConfig::from_query("?interval=10&log=loud");
        assert_eq!(rejected.poll_interval_ms, 1000);
        assert_eq!(rejected.max_level(), Level::WARN);
    }

    #[test]
    fn test_parse_query_param() {
        assert_eq!(parse_query_param("?a=1&b=x%20y", "b").as_deref(), Some("x y"));
        assert_eq!(parse_query_param("a=1", "a").as_deref(), Some("1"));
        assert_eq!(parse_query_param("?a", "a"), None);
        assert_eq!(parse_query_param("?a=100%", "a").as_deref(), Some("100%"));
    }
}
