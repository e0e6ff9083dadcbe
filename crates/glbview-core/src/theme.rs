//! Color themes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::color::{ColorError, HexColor};
use crate::settings::{SettingsError, SettingsStore, THEME_CUSTOM_KEY, THEME_KEY};

pub const DARK: &str = "dark";
pub const LIGHT: &str = "light";
pub const CUSTOM: &str = "custom";
pub const DEFAULT_THEME: &str = DARK;

/// Variable names in display order
pub const THEME_VARS: [&str; 11] = [
    "--bg",
    "--panel",
    "--section-bg",
    "--text",
    "--button-bg",
    "--button-text",
    "--button-border",
    "--button-bg-active",
    "--axis-x",
    "--axis-y",
    "--axis-z",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThemeError {
    #[error("Unknown theme: {0}")]
    UnknownPreset(String),
    #[error("Unknown theme variable: {0}")]
    UnknownVariable(String),
    #[error(transparent)]
    Color(#[from] ColorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeColors {
    #[serde(rename = "--bg")]
    pub bg: HexColor,
    #[serde(rename = "--panel")]
    pub panel: HexColor,
    #[serde(rename = "--section-bg")]
    pub section_bg: HexColor,
    #[serde(rename = "--text")]
    pub text: HexColor,
    #[serde(rename = "--button-bg")]
    pub button_bg: HexColor,
    #[serde(rename = "--button-text")]
    pub button_text: HexColor,
    #[serde(rename = "--button-border")]
    pub button_border: HexColor,
    #[serde(rename = "--button-bg-active")]
    pub button_bg_active: HexColor,
    #[serde(rename = "--axis-x")]
    pub axis_x: HexColor,
    #[serde(rename = "--axis-y")]
    pub axis_y: HexColor,
    #[serde(rename = "--axis-z")]
    pub axis_z: HexColor,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self::DARK
    }
}

impl ThemeColors {
    pub const DARK: ThemeColors = ThemeColors {
        bg: HexColor::new(0x1e, 0x1f, 0x22),
        panel: HexColor::new(0x2b, 0x2d, 0x31),
        section_bg: HexColor::new(0x31, 0x33, 0x38),
        text: HexColor::new(0xe6, 0xe6, 0xe6),
        button_bg: HexColor::new(0x3a, 0x3c, 0x42),
        button_text: HexColor::new(0xf2, 0xf2, 0xf2),
        button_border: HexColor::new(0x4a, 0x4d, 0x55),
        button_bg_active: HexColor::new(0x4f, 0x7c, 0xff),
        axis_x: HexColor::new(0xff, 0x55, 0x55),
        axis_y: HexColor::new(0x55, 0xdd, 0x55),
        axis_z: HexColor::new(0x55, 0x99, 0xff),
    };

    pub const LIGHT: ThemeColors = ThemeColors {
        bg: HexColor::new(0xf4, 0xf5, 0xf7),
        panel: HexColor::new(0xff, 0xff, 0xff),
        section_bg: HexColor::new(0xe9, 0xeb, 0xef),
        text: HexColor::new(0x1f, 0x23, 0x28),
        button_bg: HexColor::new(0xff, 0xff, 0xff),
        button_text: HexColor::new(0x1f, 0x23, 0x28),
        button_border: HexColor::new(0xc9, 0xce, 0xd6),
        button_bg_active: HexColor::new(0x3b, 0x6f, 0xe0),
        axis_x: HexColor::new(0xd6, 0x28, 0x28),
        axis_y: HexColor::new(0x2a, 0x9d, 0x3a),
        axis_z: HexColor::new(0x1f, 0x5f, 0xd1),
    };

    pub fn preset(name: &str) -> Option<ThemeColors> {
        match name {
            DARK => Some(Self::DARK),
            LIGHT => Some(Self::LIGHT),
            _ => None,
        }
    }

    fn slot(&mut self, var: &str) -> Option<&mut HexColor> {
        Some(match var {
            "--bg" => &mut self.bg,
            "--panel" => &mut self.panel,
            "--section-bg" => &mut self.section_bg,
            "--text" => &mut self.text,
            "--button-bg" => &mut self.button_bg,
            "--button-text" => &mut self.button_text,
            "--button-border" => &mut self.button_border,
            "--button-bg-active" => &mut self.button_bg_active,
            "--axis-x" => &mut self.axis_x,
            "--axis-y" => &mut self.axis_y,
            "--axis-z" => &mut self.axis_z,
            _ => return None,
        })
    }

    pub fn get(&self, var: &str) -> Option<HexColor> {
        let mut copy = *self;
        copy.slot(var).copied()
    }

    pub fn set(&mut self, var: &str, color: HexColor) -> Result<(), ThemeError> {
        let slot = self
            .slot(var)
            .ok_or_else(|| ThemeError::UnknownVariable(var.to_string()))?;
        *slot = color;
        Ok(())
    }

    /// Variables paired with their colors, in display order
    pub fn entries(&self) -> Vec<(&'static str, HexColor)> {
        THEME_VARS
            .iter()
            .filter_map(|var| self.get(var).map(|c| (*var, c)))
            .collect()
    }
}

fn default_active() -> String {
    DEFAULT_THEME.to_string()
}

/// Active theme name plus the user's custom colors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeState {
    #[serde(default = "default_active")]
    pub active: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<ThemeColors>,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self {
            active: default_active(),
            custom: None,
        }
    }
}

impl ThemeState {
    /// Colors currently in effect
    pub fn colors(&self) -> ThemeColors {
        if self.active == CUSTOM {
            if let Some(custom) = self.custom {
                return custom;
            }
        }
        ThemeColors::preset(&self.active).unwrap_or_default()
    }

    pub fn is_custom(&self) -> bool {
        self.active == CUSTOM
    }

    /// Names offered by the theme selector
    pub fn choices(&self) -> Vec<&'static str> {
        let mut names = vec![DARK, LIGHT];
        if self.custom.is_some() {
            names.push(CUSTOM);
        }
        names
    }

    pub fn select(&mut self, name: &str) -> Result<(), ThemeError> {
        match name {
            DARK | LIGHT => self.active = name.to_string(),
            CUSTOM => {
                if self.custom.is_none() {
                    self.custom = Some(self.colors());
                }
                self.active = CUSTOM.to_string();
            }
            other => return Err(ThemeError::UnknownPreset(other.to_string())),
        }
        Ok(())
    }

    /// Edit one variable; the theme becomes custom
    pub fn edit(&mut self, var: &str, value: &str) -> Result<(), ThemeError> {
        let color = HexColor::parse(value)?;
        let mut colors = self.colors();
        colors.set(var, color)?;
        self.custom = Some(colors);
        self.active = CUSTOM.to_string();
        Ok(())
    }

    /// Copy the colors in effect into the custom theme and select it
    pub fn save_as_custom(&mut self) {
        self.custom = Some(self.colors());
        self.active = CUSTOM.to_string();
    }

    /// Back to the default preset; custom colors are kept
    pub fn reset(&mut self) {
        self.active = default_active();
    }

    /// Load selection and custom colors; bad values fall back to defaults
    pub fn load(store: &dyn SettingsStore) -> Self {
        let custom = store.get(THEME_CUSTOM_KEY).and_then(|raw| {
            serde_json::from_str::<ThemeColors>(&raw)
                .map_err(|e| warn!("Ignoring saved custom theme: {}", e))
                .ok()
        });
        let mut state = Self {
            active: default_active(),
            custom,
        };
        if let Some(active) = store.get(THEME_KEY) {
            if let Err(e) = state.select(&active) {
                warn!("{}", e);
            }
        }
        state
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        store.set(THEME_KEY, &self.active)?;
        match &self.custom {
            Some(custom) => store.set(THEME_CUSTOM_KEY, &serde_json::to_string(custom)?),
            None => store.remove(THEME_CUSTOM_KEY),
        }
    }
}
