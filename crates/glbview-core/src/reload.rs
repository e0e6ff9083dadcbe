//! Auto-reload polling state

use crate::models::UpdateCheck;

pub const DEFAULT_INTERVAL_MS: u32 = 1000;
pub const MIN_INTERVAL_MS: u32 = 250;

/// What the viewer should do after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadAction {
    None,
    /// Adopt the new list, reset visibility and reload every model
    ReplaceList,
    /// Reload every model
    ReloadModels,
}

/// Toggle, interval and offline indicator for model polling.
///
/// Only one poll may be in flight: [`AutoReload::begin_poll`] refuses while
/// the previous one has not been finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoReload {
    enabled: bool,
    interval_ms: u32,
    offline: bool,
    in_flight: bool,
    rearm: bool,
}

impl Default for AutoReload {
    fn default() -> Self {
        Self::new(true, DEFAULT_INTERVAL_MS)
    }
}

impl AutoReload {
    pub fn new(enabled: bool, interval_ms: u32) -> Self {
        Self {
            enabled,
            interval_ms: if interval_ms >= MIN_INTERVAL_MS {
                interval_ms
            } else {
                DEFAULT_INTERVAL_MS
            },
            offline: false,
            in_flight: false,
            rearm: true,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.rearm = enabled;
    }

    pub fn toggle(&mut self) {
        self.set_enabled(!self.enabled);
    }

    /// Set the interval; values below the minimum are rejected
    pub fn set_interval_ms(&mut self, interval_ms: u32) -> bool {
        if interval_ms < MIN_INTERVAL_MS {
            return false;
        }
        self.interval_ms = interval_ms;
        if self.enabled {
            self.rearm = true;
        }
        true
    }

    /// Whether the timer must be restarted; clears the request
    pub fn take_rearm(&mut self) -> bool {
        std::mem::take(&mut self.rearm)
    }

    pub fn begin_poll(&mut self) -> bool {
        if !self.enabled || self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// A fetch outside the poll cycle failed. Any poll in flight stays
    /// in flight.
    pub fn mark_offline(&mut self) {
        self.offline = true;
    }

    /// Record a poll outcome and decide what to reload
    pub fn finish_poll(&mut self, result: &UpdateCheck) -> ReloadAction {
        self.in_flight = false;
        match result {
            UpdateCheck::Offline => {
                self.offline = true;
                ReloadAction::None
            }
            other => {
                self.offline = false;
                match other {
                    UpdateCheck::ListChanged { .. } => ReloadAction::ReplaceList,
                    UpdateCheck::FilesChanged => ReloadAction::ReloadModels,
                    _ => ReloadAction::None,
                }
            }
        }
    }

    pub fn status_text(&self) -> &'static str {
        if self.offline {
            "Auto Reload: OFFLINE"
        } else if self.enabled {
            "Auto Reload: ON"
        } else {
            "Auto Reload: OFF"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_minimum() {
        assert_eq!(AutoReload::new(true, 100).interval_ms(), DEFAULT_INTERVAL_MS);
        let mut reload = AutoReload::default();
        reload.take_rearm();
        assert!(!reload.set_interval_ms(249));
        assert!(!reload.take_rearm());
        assert!(reload.set_interval_ms(250));
        assert_eq!(reload.interval_ms(), 250);
        assert!(reload.take_rearm());
    }

    #[test]
    fn test_single_poll_in_flight() {
        let mut reload = AutoReload::default();
        assert!(reload.begin_poll());
        assert!(!reload.begin_poll());
        reload.finish_poll(&UpdateCheck::Unchanged);
        assert!(reload.begin_poll());

        let mut disabled = AutoReload::new(false, 1000);
        assert!(!disabled.begin_poll());
    }

    #[test]
    fn test_offline_indicator() {
        let mut reload = AutoReload::default();
        assert_eq!(reload.status_text(), "Auto Reload: ON");
        assert_eq!(reload.finish_poll(&UpdateCheck::Offline), ReloadAction::None);
        assert_eq!(reload.status_text(), "Auto Reload: OFFLINE");
        reload.set_enabled(false);
        assert_eq!(reload.status_text(), "Auto Reload: OFFLINE");
        assert_eq!(reload.finish_poll(&UpdateCheck::FilesChanged), ReloadAction::ReloadModels);
        assert_eq!(reload.status_text(), "Auto Reload: OFF");
    }

    #[test]
    fn test_mark_offline_keeps_poll_in_flight() {
        let mut reload = AutoReload::default();
        assert!(reload.begin_poll());
        reload.mark_offline();
        assert_eq!(reload.status_text(), "Auto Reload: OFFLINE");
        assert!(reload.in_flight());
        assert!(!reload.begin_poll());
        reload.finish_poll(&UpdateCheck::Unchanged);
        assert_eq!(reload.status_text(), "Auto Reload: ON");
    }

    #[test]
    fn test_list_change_action() {
        let mut reload = AutoReload::default();
        let result = UpdateCheck::ListChanged {
            list: Vec::new(),
            signature: "[]".into(),
        };
        assert_eq!(reload.finish_poll(&result), ReloadAction::ReplaceList);
    }
}
