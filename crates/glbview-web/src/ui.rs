//! UI overlays using bevy_egui
//!
//! Toolbar across the top, the model selector on the left and the settings
//! dialog with its preview viewport.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use tracing::{info, warn};
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use glbview_core::camera::CameraInputs;
use glbview_core::lights::LightEditorInputs;
use glbview_core::settings::parse_interval_input;
use glbview_core::{ControlType, Face, HexColor, LightKind, LightState, SettingsBundle, SettingsTab, ThemeColors};

use crate::app::{Lights, MainCameraRig, Prefs, Preview, Reload, Theme, Watcher};
use crate::file_picker::{
    export_filename, trigger_file_open, trigger_file_save, FileFilter, FilePickerContext,
    FilePickerState, PendingFileResults,
};
use crate::lights::LightsChanged;
use crate::models::{cache_stamp, ModelSet};
use crate::network::{FetchSettingsFile, FetchSettingsList, RefreshPreviewInfo, SaveSettings, ServerState, SetPreviewDir};
use crate::preview::{PreviewPick, PreviewViewport};
use crate::scene::CameraChanged;
use crate::storage::Settings;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UiState>()
            .add_systems(Update, refresh_editor_inputs)
            // bevy_egui 0.38 runs UI in its own pass so input is routed correctly
            .add_systems(EguiPrimaryContextPass, (apply_theme_visuals, ui_system).chain());
    }
}

/// Preview viewport size in logical pixels
const PREVIEW_WIDTH: f32 = 360.0;
const PREVIEW_MIN_HEIGHT: f32 = 260.0;

/// Preview orbit radians per dragged pixel
const PREVIEW_ORBIT_SPEED: f32 = 0.005;

/// Zoom factor per 100 px of scroll inside the preview
const PREVIEW_ZOOM_STEP: f32 = 1.2;

/// Field text and other state owned by the widgets
#[derive(Resource, Default)]
pub struct UiState {
    camera_inputs: CameraInputs,
    light_inputs: Option<LightEditorInputs>,
    interval_text: String,
    preview_dir_text: String,
    keyframe_start: Option<LightState>,
    keyframe_end: Option<LightState>,
    keyframe_t: f32,
    /// Theme variable currently being edited as text
    theme_text: Vec<(&'static str, String)>,
    visuals_applied: bool,
}

impl UiState {
    fn interpolating(&self) -> bool {
        self.keyframe_start.is_some() && self.keyframe_end.is_some()
    }
}

#[derive(SystemParam)]
pub struct ViewerState<'w> {
    rig: ResMut<'w, MainCameraRig>,
    lights: ResMut<'w, Lights>,
    watcher: ResMut<'w, Watcher>,
    models: Res<'w, ModelSet>,
    reload: ResMut<'w, Reload>,
    prefs: ResMut<'w, Prefs>,
    theme: ResMut<'w, Theme>,
    preview: ResMut<'w, Preview>,
    viewport: ResMut<'w, PreviewViewport>,
    server: ResMut<'w, ServerState>,
    settings: Res<'w, Settings>,
    pending_files: Res<'w, PendingFileResults>,
    picker: ResMut<'w, FilePickerState>,
    fields: ResMut<'w, UiState>,
}

#[derive(SystemParam)]
pub struct UiRequests<'w> {
    preview_info: MessageWriter<'w, RefreshPreviewInfo>,
    preview_dir: MessageWriter<'w, SetPreviewDir>,
    settings_list: MessageWriter<'w, FetchSettingsList>,
    settings_file: MessageWriter<'w, FetchSettingsFile>,
    save_settings: MessageWriter<'w, SaveSettings>,
    picks: MessageWriter<'w, PreviewPick>,
}

fn egui_color(color: HexColor) -> egui::Color32 {
    let [r, g, b] = color.0;
    egui::Color32::from_rgb(r, g, b)
}

fn is_dark(color: HexColor) -> bool {
    let [r, g, b] = color.to_rgb_f32();
    0.2126 * r + 0.7152 * g + 0.0722 * b < 0.5
}

fn theme_visuals(colors: &ThemeColors) -> egui::Visuals {
    let mut visuals = if is_dark(colors.bg) {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    };
    visuals.override_text_color = Some(egui_color(colors.text));
    visuals.panel_fill = egui_color(colors.panel);
    visuals.window_fill = egui_color(colors.panel);
    visuals.extreme_bg_color = egui_color(colors.section_bg);
    visuals.faint_bg_color = egui_color(colors.section_bg);
    visuals.selection.bg_fill = egui_color(colors.button_bg_active);

    let button_text = egui_color(colors.button_text);
    let border = egui::Stroke::new(1.0, egui_color(colors.button_border));
    for widget in [
        &mut visuals.widgets.inactive,
        &mut visuals.widgets.hovered,
        &mut visuals.widgets.active,
    ] {
        widget.weak_bg_fill = egui_color(colors.button_bg);
        widget.bg_stroke = border;
        widget.fg_stroke.color = button_text;
    }
    visuals.widgets.active.weak_bg_fill = egui_color(colors.button_bg_active);
    visuals
}

fn apply_theme_visuals(mut contexts: EguiContexts, theme: Res<Theme>, mut state: ResMut<UiState>) {
    if state.visuals_applied && !theme.is_changed() {
        return;
    }
    let Ok(ctx) = contexts.ctx_mut() else { return };
    let colors = theme.colors();
    ctx.set_visuals(theme_visuals(&colors));
    state.theme_text = colors
        .entries()
        .into_iter()
        .map(|(var, color)| (var, color.to_string()))
        .collect();
    state.visuals_applied = true;
}

/// Keep the editor fields in step with the rigs
fn refresh_editor_inputs(
    mut camera_changes: MessageReader<CameraChanged>,
    mut light_changes: MessageReader<LightsChanged>,
    rig: Res<MainCameraRig>,
    lights: Res<Lights>,
    reload: Res<Reload>,
    mut state: ResMut<UiState>,
) {
    if camera_changes.read().count() > 0 || state.camera_inputs.yaw.is_empty() {
        state.camera_inputs = rig.inputs();
    }
    if light_changes.read().count() > 0 || (state.light_inputs.is_none() && !lights.lights().is_empty()) {
        state.light_inputs = lights.editor_inputs();
    }
    if state.interval_text.is_empty() {
        state.interval_text = reload.interval_ms().to_string();
    }
}

fn ui_system(mut contexts: EguiContexts, mut viewer: ViewerState, mut requests: UiRequests) {
    let Ok(ctx) = contexts.ctx_mut() else { return };

    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        toolbar(ui, &mut viewer, &mut requests);
    });

    model_selector(ctx, &mut viewer);

    let mut open = viewer.preview.is_open();
    let mut dialog_rect = None;
    if open {
        let response = egui::Window::new("Settings")
            .open(&mut open)
            .default_pos(egui::pos2(80.0, 80.0))
            .resizable(false)
            .show(ctx, |ui| settings_dialog(ui, &mut viewer, &mut requests));
        dialog_rect = response.map(|r| r.response.rect);
    }
    if !open && viewer.preview.is_open() {
        viewer.preview.close();
    }

    let mut viewport = None;
    if let Some(rect) = dialog_rect {
        if viewer.preview.preview_active() {
            viewport = preview_area(ctx, rect, &mut viewer, &mut requests);
        }
    }
    viewer.viewport.rect = viewport;
}

fn toolbar(ui: &mut egui::Ui, viewer: &mut ViewerState, requests: &mut UiRequests) {
    ui.horizontal_wrapped(|ui| {
        if ui.button(viewer.reload.status_text()).clicked() {
            let enabled = !viewer.reload.enabled();
            viewer.reload.set_enabled(enabled);
            viewer.prefs.auto_reload = enabled;
            info!(enabled, "Auto reload toggled");
        }

        let axes_label = if viewer.prefs.axes_visible { "Axes: On" } else { "Axes: Off" };
        if ui.button(axes_label).clicked() {
            viewer.prefs.axes_visible = !viewer.prefs.axes_visible;
        }

        if ui.button(viewer.rig.mode_label()).clicked() {
            viewer.rig.toggle_mode();
        }

        ui.separator();

        if ui.button("Home").clicked() {
            viewer.rig.reset_home();
        }
        if ui.button("Reset").clicked() {
            viewer.rig.reset();
        }
        if ui.button("Center").on_hover_text("Aim at the model center").clicked() {
            viewer.rig.target_to_model_center(true);
        }
        egui::ComboBox::from_id_salt("face_preset")
            .selected_text("View")
            .show_ui(ui, |ui| {
                for face in Face::ALL {
                    if ui.selectable_label(false, capitalize_first(face.as_str())).clicked() {
                        viewer.rig.apply_preset(face);
                    }
                }
            });

        ui.separator();

        for index in 0..viewer.rig.slot_count() {
            let highlighted = viewer.rig.slot_highlighted(index);
            if ui.selectable_label(highlighted, format!("{}", index + 1)).clicked() {
                viewer.rig.select_slot(index);
            }
        }
        if ui.button("+").on_hover_text("Add camera").clicked() {
            viewer.rig.add_slot();
        }
        let can_remove = viewer.rig.remove_enabled();
        if ui
            .add_enabled(can_remove, egui::Button::new("−"))
            .on_hover_text("Remove camera")
            .clicked()
        {
            viewer.rig.remove_active_slot();
        }
        if let Some(label) = viewer.rig.update_button_label() {
            if ui.button(label).clicked() {
                viewer.rig.commit_active();
            }
        }

        let home = viewer.rig.is_home();
        let current = viewer.rig.control_type();
        ui.add_enabled_ui(!home, |ui| {
            for control_type in [ControlType::Orbit, ControlType::Trackball] {
                let label = capitalize_first(control_type.as_str());
                if ui.selectable_label(current == control_type, label).clicked() && current != control_type {
                    viewer.rig.set_control_type_active(control_type);
                }
            }
        });

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("Settings").clicked() {
                if viewer.preview.is_open() {
                    viewer.preview.close();
                } else {
                    let tab = viewer.preview.tab();
                    let rig = &viewer.rig;
                    viewer.preview.open(tab, rig);
                    requests.preview_info.write(RefreshPreviewInfo);
                }
            }
            if viewer.models.is_loading() {
                ui.spinner();
            }
        });
    });
}

fn model_selector(ctx: &egui::Context, viewer: &mut ViewerState) {
    if viewer.watcher.list().is_empty() {
        return;
    }
    egui::Area::new(egui::Id::new("model_selector"))
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(8.0, 48.0))
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                let collapsed = viewer.prefs.model_selector_collapsed;
                let header = egui::CollapsingHeader::new(format!("Models ({})", viewer.watcher.list().len()))
                    .open(Some(!collapsed))
                    .show(ui, |ui| {
                        let labels: Vec<String> = viewer
                            .watcher
                            .list()
                            .iter()
                            .map(|m| m.label().to_string())
                            .collect();
                        for (index, label) in labels.into_iter().enumerate() {
                            let mut visible = viewer.watcher.is_visible(index);
                            if ui.checkbox(&mut visible, label).changed() {
                                viewer.watcher.set_visible(index, visible);
                            }
                        }
                    });
                if header.header_response.clicked() {
                    viewer.prefs.model_selector_collapsed = !collapsed;
                }
            });
        });
}

fn settings_dialog(ui: &mut egui::Ui, viewer: &mut ViewerState, requests: &mut UiRequests) {
    let current = viewer.preview.tab();
    ui.horizontal(|ui| {
        for tab in SettingsTab::ALL {
            if ui.selectable_label(current == tab, tab.title()).clicked() && tab != current {
                let rig = &viewer.rig;
                viewer.preview.activate_tab(tab, rig);
                if tab == SettingsTab::General {
                    requests.preview_info.write(RefreshPreviewInfo);
                }
            }
        }
    });
    ui.separator();

    match viewer.preview.tab() {
        SettingsTab::General => general_tab(ui, viewer, requests),
        SettingsTab::Camera => camera_tab(ui, viewer),
        SettingsTab::Lights => lights_tab(ui, viewer),
        SettingsTab::Theme => theme_tab(ui, viewer),
    }
}

/// Stroke-only area next to the dialog; the preview camera draws under it
fn preview_area(
    ctx: &egui::Context,
    dialog: egui::Rect,
    viewer: &mut ViewerState,
    requests: &mut UiRequests,
) -> Option<Rect> {
    let height = dialog.height().max(PREVIEW_MIN_HEIGHT);
    let area = egui::Area::new(egui::Id::new("settings_preview"))
        .fixed_pos(dialog.right_top() + egui::vec2(8.0, 0.0))
        .show(ctx, |ui| {
            let (rect, response) =
                ui.allocate_exact_size(egui::vec2(PREVIEW_WIDTH, height), egui::Sense::click_and_drag());
            ui.painter().rect_stroke(
                rect,
                4.0,
                egui::Stroke::new(1.0, egui_color(viewer.theme.colors().button_border)),
                egui::StrokeKind::Outside,
            );

            if response.dragged() {
                let delta = response.drag_delta();
                viewer
                    .preview
                    .camera
                    .orbit(delta.x * PREVIEW_ORBIT_SPEED, delta.y * PREVIEW_ORBIT_SPEED);
            }
            if response.hovered() {
                let scroll = ui.input(|i| i.smooth_scroll_delta.y);
                if scroll != 0.0 {
                    viewer.preview.camera.zoom(PREVIEW_ZOOM_STEP.powf(-scroll / 100.0));
                }
            }
            if response.double_clicked() {
                if let Some(pos) = response.interact_pointer_pos() {
                    let local = pos - rect.min;
                    requests.picks.write(PreviewPick {
                        position: Vec2::new(local.x, local.y),
                    });
                }
            }
            rect
        });
    let rect = area.inner;
    Some(Rect::new(rect.min.x, rect.min.y, rect.max.x, rect.max.y))
}

fn general_tab(ui: &mut egui::Ui, viewer: &mut ViewerState, requests: &mut UiRequests) {
    ui.heading("Preview Source");
    match &viewer.server.preview_info {
        Some(info) => {
            let label = info.source_label();
            ui.label(if label.is_empty() { info.preview_dir.clone() } else { label });
            ui.small(&info.cwd);
        }
        None => {
            ui.label("Unknown");
        }
    }
    ui.horizontal(|ui| {
        ui.add(
            egui::TextEdit::singleline(&mut viewer.fields.preview_dir_text)
                .hint_text("Folder")
                .desired_width(220.0),
        );
        if ui.button("Set").clicked() {
            let path = viewer.fields.preview_dir_text.trim().to_string();
            if !path.is_empty() {
                requests.preview_dir.write(SetPreviewDir { path });
            }
        }
        if ui.button("Reset").clicked() {
            viewer.fields.preview_dir_text.clear();
            requests.preview_dir.write(SetPreviewDir { path: String::new() });
        }
    });
    if let Some(warning) = &viewer.server.preview_dir_warning {
        ui.colored_label(egui::Color32::from_rgb(0xe0, 0x9b, 0x2d), warning);
    }

    ui.separator();
    ui.heading("Auto Reload");
    ui.horizontal(|ui| {
        ui.label("Interval (ms)");
        let response = ui.add(egui::TextEdit::singleline(&mut viewer.fields.interval_text).desired_width(80.0));
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if ui.button("Apply").clicked() || submitted {
            match parse_interval_input(&viewer.fields.interval_text) {
                Some(ms) => {
                    viewer.reload.set_interval_ms(ms);
                    viewer.prefs.auto_reload_interval_ms = ms;
                }
                None => {
                    warn!(input = %viewer.fields.interval_text, "Rejected auto reload interval");
                    viewer.fields.interval_text = viewer.reload.interval_ms().to_string();
                }
            }
        }
    });

    ui.separator();
    ui.heading("Settings File");
    ui.horizontal(|ui| {
        if ui.button("Export").clicked() {
            if let Some(json) = export_json(viewer) {
                let filename = export_filename(cache_stamp());
                trigger_file_save(
                    &viewer.pending_files,
                    FilePickerContext::SettingsExport,
                    &filename,
                    json.as_bytes(),
                    "application/json",
                );
            }
        }
        let waiting = viewer.picker.waiting.is_some();
        if ui.add_enabled(!waiting, egui::Button::new("Import")).clicked() {
            let pending = viewer.pending_files.clone();
            trigger_file_open(
                &pending,
                &mut viewer.picker,
                FilePickerContext::SettingsImport,
                FileFilter::json(),
            );
        }
        if ui.button("Save to Preview Folder").clicked() {
            if let Some(json) = export_json(viewer) {
                requests.save_settings.write(SaveSettings { json });
            }
        }
    });
    if let Some(status) = &viewer.server.settings_status {
        ui.small(status);
    }

    ui.horizontal(|ui| {
        ui.label("Saved in preview folder");
        if ui.small_button("Refresh").clicked() {
            requests.settings_list.write(FetchSettingsList);
        }
    });
    match &viewer.server.settings_files {
        Some(list) if !list.files.is_empty() => {
            egui::ScrollArea::vertical().max_height(120.0).show(ui, |ui| {
                for file in &list.files {
                    ui.horizontal(|ui| {
                        ui.label(&file.name);
                        if ui.small_button("Load").clicked() {
                            requests.settings_file.write(FetchSettingsFile {
                                path: file.path.clone(),
                            });
                        }
                    });
                }
            });
        }
        _ => {
            ui.small("No saved settings");
        }
    }
}

fn export_json(viewer: &ViewerState) -> Option<String> {
    let bundle = SettingsBundle::export(viewer.settings.store(), &viewer.lights.state(), &viewer.theme.0);
    match bundle.to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to export settings: {}", e);
            None
        }
    }
}

fn text_field(ui: &mut egui::Ui, label: &str, value: &mut String, enabled: bool) -> bool {
    ui.label(label);
    let response = ui.add_enabled(enabled, egui::TextEdit::singleline(value).desired_width(90.0));
    ui.end_row();
    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter))
}

fn camera_tab(ui: &mut egui::Ui, viewer: &mut ViewerState) {
    let mut apply = false;
    let mut apply_distance = false;
    let inputs = &mut viewer.fields.camera_inputs;
    egui::Grid::new("camera_fields").num_columns(2).show(ui, |ui| {
        apply |= text_field(ui, "Yaw", &mut inputs.yaw, true);
        apply |= text_field(ui, "Pitch", &mut inputs.pitch, true);
        apply_distance |= text_field(ui, "Distance", &mut inputs.distance, true);
        for (axis, value) in ["Target X", "Target Y", "Target Z"].iter().zip(inputs.target.iter_mut()) {
            apply |= text_field(ui, axis, value, true);
        }
        let roll_enabled = inputs.roll_enabled;
        apply |= text_field(ui, "Roll", &mut inputs.roll, roll_enabled);
        let fov_enabled = inputs.fov_enabled;
        apply |= text_field(ui, "FOV", &mut inputs.fov, fov_enabled);
    });

    ui.horizontal(|ui| {
        if ui.button("Apply").clicked() {
            apply = true;
        }
        let mut roll = viewer.rig.allow_roll();
        if ui.checkbox(&mut roll, "Allow roll").changed() {
            viewer.rig.set_roll_enabled(roll);
        }
    });

    if apply {
        viewer.rig.apply_inputs(&viewer.fields.camera_inputs);
    } else if apply_distance {
        viewer.rig.apply_distance_input(&viewer.fields.camera_inputs);
    }

    ui.separator();
    ui.horizontal(|ui| {
        ui.label("Default control");
        let current = viewer.prefs.default_control_type;
        for control_type in [ControlType::Orbit, ControlType::Trackball] {
            let label = capitalize_first(control_type.as_str());
            if ui.selectable_label(current == control_type, label).clicked() {
                viewer.prefs.default_control_type = control_type;
                viewer.rig.set_default_control_type(control_type);
            }
        }
    });
    ui.small("Double-click the preview to aim the camera");
}

fn lights_tab(ui: &mut egui::Ui, viewer: &mut ViewerState) {
    ui.horizontal(|ui| {
        ui.label("Ambient");
        let ambient = viewer.lights.ambient;
        let mut rgb = ambient.color.0;
        let mut intensity = ambient.intensity;
        let color_changed = ui.color_edit_button_srgb(&mut rgb).changed();
        let intensity_changed = ui
            .add(egui::DragValue::new(&mut intensity).speed(0.01).range(0.0..=10.0))
            .changed();
        if color_changed || intensity_changed {
            viewer.lights.set_ambient(HexColor(rgb), intensity);
        }
    });

    ui.separator();
    let editable = viewer.lights.structure_editable();
    ui.horizontal_wrapped(|ui| {
        let active = viewer.lights.active_index();
        let labels: Vec<String> = viewer
            .lights
            .lights()
            .iter()
            .enumerate()
            .map(|(i, light)| format!("{} {}", i + 1, light.kind.label()))
            .collect();
        for (index, label) in labels.into_iter().enumerate() {
            if ui.selectable_label(index == active, label).clicked() {
                viewer.lights.set_active(index);
                viewer.fields.light_inputs = viewer.lights.editor_inputs();
            }
        }
        if ui.add_enabled(editable, egui::Button::new("+")).clicked() {
            viewer.lights.add_light_from_editor();
        }
        let can_remove = editable && viewer.lights.remove_enabled();
        if ui.add_enabled(can_remove, egui::Button::new("−")).clicked() {
            viewer.lights.remove_active_light();
        }
    });

    if let Some(mut inputs) = viewer.fields.light_inputs.take() {
        light_editor(ui, viewer, &mut inputs, editable);
        viewer.fields.light_inputs = Some(inputs);
    }

    ui.separator();
    keyframes(ui, viewer);

    ui.horizontal(|ui| {
        if ui.add_enabled(editable, egui::Button::new("Reset Lights")).clicked() {
            viewer.lights.reset();
            viewer.fields.light_inputs = viewer.lights.editor_inputs();
        }
        ui.small("Double-click the preview to aim the active light");
    });
}

fn light_editor(ui: &mut egui::Ui, viewer: &mut ViewerState, inputs: &mut LightEditorInputs, editable: bool) {
    ui.horizontal(|ui| {
        for kind in [LightKind::Directional, LightKind::Spot] {
            let clicked = ui
                .add_enabled_ui(editable, |ui| ui.selectable_label(inputs.kind == kind, kind.label()))
                .inner
                .clicked();
            if clicked && inputs.kind != kind {
                viewer.lights.set_active_kind(kind, inputs);
                if let Some(next) = viewer.lights.editor_inputs() {
                    *inputs = next;
                }
            }
        }
        let mut rgb = inputs.color.0;
        if ui.color_edit_button_srgb(&mut rgb).changed() {
            inputs.color = HexColor(rgb);
            viewer.lights.update_active(inputs);
        }
    });

    let mut changed = false;
    egui::Grid::new("light_fields").num_columns(2).show(ui, |ui| {
        changed |= text_field(ui, "Intensity", &mut inputs.intensity, true);
        changed |= text_field(ui, "Yaw", &mut inputs.yaw, true);
        changed |= text_field(ui, "Pitch", &mut inputs.pitch, true);
        changed |= text_field(ui, "Distance", &mut inputs.distance, true);
        for (axis, value) in ["Target X", "Target Y", "Target Z"].iter().zip(inputs.target.iter_mut()) {
            changed |= text_field(ui, axis, value, true);
        }
        changed |= text_field(ui, "Range", &mut inputs.range, true);
        if inputs.kind == LightKind::Spot {
            changed |= text_field(ui, "Angle", &mut inputs.angle, true);
            changed |= text_field(ui, "Penumbra", &mut inputs.penumbra, true);
            changed |= text_field(ui, "Decay", &mut inputs.decay, true);
        }
    });
    if ui.button("Update Light").clicked() || changed {
        viewer.lights.update_active(inputs);
        if let Some(next) = viewer.lights.editor_inputs() {
            *inputs = next;
        }
    }
}

/// Capture two light states and scrub between them
fn keyframes(ui: &mut egui::Ui, viewer: &mut ViewerState) {
    ui.horizontal(|ui| {
        ui.label("Keyframes");
        if ui.button("Set A").clicked() {
            viewer.fields.keyframe_start = Some(viewer.lights.state());
        }
        if ui.button("Set B").clicked() {
            viewer.fields.keyframe_end = Some(viewer.lights.state());
        }
        let interpolating = viewer.fields.interpolating();
        if ui.add_enabled(interpolating, egui::Button::new("Clear")).clicked() {
            viewer.fields.keyframe_start = None;
            viewer.fields.keyframe_end = None;
            viewer.fields.keyframe_t = 0.0;
            viewer.lights.set_structure_editable(true);
        }
    });

    let (Some(start), Some(end)) = (viewer.fields.keyframe_start.clone(), viewer.fields.keyframe_end.clone()) else {
        return;
    };
    let slider = ui.add(egui::Slider::new(&mut viewer.fields.keyframe_t, 0.0..=1.0).text("t"));
    if slider.changed() {
        // Lights are overwritten while scrubbing, so adding and removing waits
        viewer.lights.set_structure_editable(false);
        let t = viewer.fields.keyframe_t;
        viewer.lights.apply_interpolated(&start, &end, t);
    }
}

fn theme_tab(ui: &mut egui::Ui, viewer: &mut ViewerState) {
    let active = viewer.theme.active.clone();
    egui::ComboBox::from_label("Theme")
        .selected_text(capitalize_first(&active))
        .show_ui(ui, |ui| {
            for name in viewer.theme.choices() {
                if ui.selectable_label(active == name, capitalize_first(name)).clicked() && active != name {
                    if let Err(e) = viewer.theme.select(name) {
                        warn!("{}", e);
                    }
                }
            }
        });

    ui.separator();
    let mut edit: Option<(&'static str, String)> = None;
    egui::Grid::new("theme_vars").num_columns(3).show(ui, |ui| {
        for (var, color) in viewer.theme.colors().entries() {
            ui.label(var);
            let mut rgb = color.0;
            if ui.color_edit_button_srgb(&mut rgb).changed() {
                edit = Some((var, HexColor(rgb).to_string()));
            }
            if let Some((_, text)) = viewer.fields.theme_text.iter_mut().find(|(v, _)| *v == var) {
                let response = ui.add(egui::TextEdit::singleline(text).desired_width(80.0));
                if response.lost_focus() && *text != color.to_string() {
                    edit = Some((var, text.clone()));
                }
            }
            ui.end_row();
        }
    });
    if let Some((var, value)) = edit {
        if let Err(e) = viewer.theme.edit(var, &value) {
            warn!(var, "Ignoring theme color: {}", e);
            viewer.fields.visuals_applied = false;
        }
    }

    ui.horizontal(|ui| {
        if ui.button("Save as Custom").clicked() {
            viewer.theme.save_as_custom();
        }
        if ui.button("Reset").clicked() {
            viewer.theme.reset();
        }
    });
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
