//! Model list tracking, change detection and scene bounds

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bounds::Aabb;
use crate::camera::CameraMode;

/// File name fragment that marks the framing reference model
pub const REFERENCE_MODEL_MARKER: &str = "bounding_box.glb";

/// One entry of `/glb_list.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ModelDescriptor {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: None,
        }
    }

    /// Display label, falling back to the file name
    pub fn label(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            _ => self.file.rsplit('/').next().unwrap_or(&self.file),
        }
    }

    pub fn is_reference(&self) -> bool {
        is_reference_model(&self.file)
    }
}

pub fn is_reference_model(file: &str) -> bool {
    file.to_lowercase().contains(REFERENCE_MODEL_MARKER)
}

/// Compact JSON of the list, used to detect list changes
pub fn signature(list: &[ModelDescriptor]) -> String {
    serde_json::to_string(list).unwrap_or_default()
}

/// Model URL with a `cb` query parameter that defeats the HTTP cache.
///
/// The parameter goes first in an existing query so the URL keeps ending
/// in the model's file name and extension.
pub fn cache_busted(file: &str, stamp: u64) -> String {
    match file.split_once('?') {
        Some((path, query)) => format!("{}?cb={}&{}", path, stamp, query),
        None => format!("{}?cb={}", file, stamp),
    }
}

/// Outcome of one auto-reload poll
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateCheck {
    /// The list could not be fetched
    Offline,
    ListChanged {
        list: Vec<ModelDescriptor>,
        signature: String,
    },
    FilesChanged,
    Unchanged,
}

/// Remembers the current model list and per-file modification stamps
#[derive(Debug, Clone, Default)]
pub struct ModelWatcher {
    list: Vec<ModelDescriptor>,
    signature: String,
    last_modified: Vec<Option<String>>,
    visible: Vec<bool>,
}

impl ModelWatcher {
    pub fn new() -> Self {
        let mut watcher = Self::default();
        watcher.signature = signature(&[]);
        watcher
    }

    pub fn list(&self) -> &[ModelDescriptor] {
        &self.list
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Replace the list. Forgets modification stamps and shows every model.
    pub fn set_list(&mut self, list: Vec<ModelDescriptor>) {
        self.signature = signature(&list);
        self.last_modified = vec![None; list.len()];
        self.visible = vec![true; list.len()];
        self.list = list;
    }

    /// Forget modification stamps (after a full reload)
    pub fn reset_stamps(&mut self) {
        self.last_modified = vec![None; self.list.len()];
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.visible.get(index).copied().unwrap_or(true)
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) {
        if let Some(v) = self.visible.get_mut(index) {
            *v = visible;
        }
    }

    /// Index of the first reference model in the list
    pub fn reference_index(&self) -> Option<usize> {
        self.list.iter().position(ModelDescriptor::is_reference)
    }

    /// Compare a freshly fetched list against the current one.
    ///
    /// `head` returns the `Last-Modified` header for a list entry, or `None`
    /// when the request failed or carried no header. It is only consulted
    /// when the list itself is unchanged.
    pub fn check<F>(&mut self, fetched: Option<Vec<ModelDescriptor>>, mut head: F) -> UpdateCheck
    where
        F: FnMut(usize, &ModelDescriptor) -> Option<String>,
    {
        let Some(fetched) = fetched else {
            return UpdateCheck::Offline;
        };
        let next_signature = signature(&fetched);
        if next_signature != self.signature {
            debug!(count = fetched.len(), "Model list changed");
            return UpdateCheck::ListChanged {
                list: fetched,
                signature: next_signature,
            };
        }

        if self.last_modified.len() != self.list.len() {
            self.last_modified.resize(self.list.len(), None);
        }
        for (index, descriptor) in self.list.iter().enumerate() {
            let Some(modified) = head(index, descriptor).filter(|m| !m.is_empty()) else {
                continue;
            };
            match &self.last_modified[index] {
                Some(previous) if *previous != modified => {
                    debug!(file = %descriptor.file, "Model file modified");
                    self.last_modified[index] = Some(modified);
                    return UpdateCheck::FilesChanged;
                }
                Some(_) => {}
                None => self.last_modified[index] = Some(modified),
            }
        }
        UpdateCheck::Unchanged
    }
}

/// Scene-space boxes used by framing
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SceneBounds {
    /// Reference model box and whether it is shown
    pub reference: Option<(Aabb, bool)>,
    /// Union of the visible models
    pub visible: Option<Aabb>,
}

impl SceneBounds {
    fn visible_reference(&self) -> Option<Aabb> {
        self.reference.and_then(|(b, shown)| shown.then_some(b))
    }

    /// Box to frame in the given mode.
    ///
    /// Orthographic framing uses the reference box even when it is hidden,
    /// perspective only when it is shown.
    pub fn frame_box(&self, mode: CameraMode) -> Option<Aabb> {
        let reference = match mode {
            CameraMode::Orthographic => self.reference.map(|(b, _)| b),
            CameraMode::Perspective => self.visible_reference(),
        };
        reference.or(self.visible)
    }

    /// Box that reset, presets and re-targeting aim at
    pub fn target_box(&self) -> Option<Aabb> {
        self.visible_reference().or(self.visible)
    }

    /// Scene-space center of the target box, origin when nothing is loaded
    pub fn model_center(&self) -> Vec3 {
        self.target_box().map_or(Vec3::ZERO, |b| b.center())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(files: &[&str]) -> Vec<ModelDescriptor> {
        files.iter().map(|f| ModelDescriptor::new(*f)).collect()
    }

    #[test]
    fn test_signature_is_compact_json() {
        assert_eq!(signature(&list(&["a.glb"])), r#"[{"file":"a.glb"}]"#);
        let named = vec![ModelDescriptor {
            file: "b.glb".into(),
            name: Some("Body".into()),
        }];
        assert_eq!(signature(&named), r#"[{"file":"b.glb","name":"Body"}]"#);
    }

    #[test]
    fn test_cache_busted() {
        assert_eq!(cache_busted("models/a.glb", 7), "models/a.glb?cb=7");
        assert_eq!(
            cache_busted("/preview_file?path=out/a.glb", 7),
            "/preview_file?cb=7&path=out/a.glb"
        );
    }

    #[test]
    fn test_list_change_detected() {
        let mut watcher = ModelWatcher::new();
        watcher.set_list(list(&["a.glb", "b.glb"]));
        let result = watcher.check(Some(list(&["a.glb", "b.glb", "c.glb"])), |_, _| None);
        match result {
            UpdateCheck::ListChanged { list, signature: sig } => {
                assert_eq!(list.len(), 3);
                assert_eq!(sig, signature(&list));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_offline() {
        let mut watcher = ModelWatcher::new();
        assert_eq!(watcher.check(None, |_, _| None), UpdateCheck::Offline);
    }

    #[test]
    fn test_last_modified_after_first_observation() {
        let mut watcher = ModelWatcher::new();
        watcher.set_list(list(&["a.glb", "b.glb"]));
        let same = || Some(list(&["a.glb", "b.glb"]));

        // First sight records the stamps
        let r = watcher.check(same(), |i, _| Some(format!("t{}", i)));
        assert_eq!(r, UpdateCheck::Unchanged);
        let r = watcher.check(same(), |i, _| Some(format!("t{}", i)));
        assert_eq!(r, UpdateCheck::Unchanged);

        // Empty or missing headers never count as a change
        let r = watcher.check(same(), |_, _| Some(String::new()));
        assert_eq!(r, UpdateCheck::Unchanged);

        let r = watcher.check(same(), |i, _| Some(if i == 1 { "t9".into() } else { "t0".into() }));
        assert_eq!(r, UpdateCheck::FilesChanged);
        let r = watcher.check(same(), |i, _| Some(if i == 1 { "t9".into() } else { "t0".into() }));
        assert_eq!(r, UpdateCheck::Unchanged);
    }

    #[test]
    fn test_visibility_resets_with_list() {
        let mut watcher = ModelWatcher::new();
        watcher.set_list(list(&["a.glb", "b.glb"]));
        watcher.set_visible(1, false);
        assert!(!watcher.is_visible(1));
        watcher.set_list(list(&["a.glb", "b.glb"]));
        assert!(watcher.is_visible(1));
        assert!(watcher.is_visible(42));
    }

    #[test]
    fn test_reference_detection() {
        assert!(is_reference_model("out/Bounding_Box.GLB"));
        assert!(!is_reference_model("device.glb"));
        let mut watcher = ModelWatcher::new();
        watcher.set_list(list(&["a.glb", "parts/bounding_box.glb"]));
        assert_eq!(watcher.reference_index(), Some(1));
    }

    #[test]
    fn test_frame_box_preference() {
        let reference = Aabb::new(Vec3::splat(-5.0), Vec3::splat(5.0));
        let visible = Aabb::new(Vec3::ZERO, Vec3::ONE);

        let hidden = SceneBounds {
            reference: Some((reference, false)),
            visible: Some(visible),
        };
        assert_eq!(hidden.frame_box(CameraMode::Orthographic), Some(reference));
        assert_eq!(hidden.frame_box(CameraMode::Perspective), Some(visible));
        assert_eq!(hidden.model_center(), Vec3::splat(0.5));

        let shown = SceneBounds {
            reference: Some((reference, true)),
            visible: Some(visible),
        };
        assert_eq!(shown.frame_box(CameraMode::Perspective), Some(reference));
        assert_eq!(shown.model_center(), Vec3::ZERO);

        assert_eq!(SceneBounds::default().model_center(), Vec3::ZERO);
        assert!(SceneBounds::default().frame_box(CameraMode::Perspective).is_none());
    }
}
