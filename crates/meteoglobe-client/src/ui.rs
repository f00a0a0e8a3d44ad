//! Control panel standing in for the embedding application.
//!
//! Shows FPS and load progress, lets the user type coordinates and a
//! country code to fly to, and reads back the marker's screen anchor.

use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::ecs::message::MessageReader;
use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};

use crate::host::{GlobeTarget, LoadEvent, LoadStage, MarkerScreenPosition};

/// Plugin for the host control panel.
pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin::default())
            .add_plugins(FrameTimeDiagnosticsPlugin::default())
            .init_resource::<HudState>()
            .init_resource::<LoadStatus>()
            .add_systems(Update, track_load_events)
            .add_systems(EguiPrimaryContextPass, hud_system);
    }
}

/// Text field contents of the control panel.
#[derive(Resource)]
struct HudState {
    lat: String,
    lon: String,
    country: String,
}

impl Default for HudState {
    fn default() -> Self {
        Self {
            lat: "48.85".to_owned(),
            lon: "2.35".to_owned(),
            country: "FRA".to_owned(),
        }
    }
}

/// Latest observed progress per loading stage.
#[derive(Resource, Default)]
struct LoadStatus {
    base_percent: f32,
    base_completed: bool,
    cloud_percent: f32,
    cloud_completed: bool,
}

impl LoadStatus {
    fn stage_line(&self, label: &str, percent: f32, completed: bool) -> String {
        if completed {
            format!("{label}: done")
        } else {
            format!("{label}: {percent:.0}%")
        }
    }

    fn apply(&mut self, event: &LoadEvent) {
        match *event {
            LoadEvent::Progress { stage, percent } => match stage {
                LoadStage::BaseTextures => self.base_percent = percent,
                LoadStage::CloudImagery => {
                    self.cloud_percent = percent;
                    // A new refresh pass restarts the stage.
                    self.cloud_completed = false;
                }
            },
            LoadEvent::Completed { stage } => match stage {
                LoadStage::BaseTextures => self.base_completed = true,
                LoadStage::CloudImagery => self.cloud_completed = true,
            },
        }
    }
}

fn track_load_events(mut events: MessageReader<LoadEvent>, mut status: ResMut<LoadStatus>) {
    for event in events.read() {
        status.apply(event);
    }
}

/// Render the control panel.
#[allow(clippy::needless_pass_by_value)]
fn hud_system(
    mut contexts: EguiContexts,
    diagnostics: Res<DiagnosticsStore>,
    status: Res<LoadStatus>,
    anchor: Res<MarkerScreenPosition>,
    mut state: ResMut<HudState>,
    mut target: ResMut<GlobeTarget>,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(bevy::diagnostic::Diagnostic::smoothed)
        .unwrap_or(0.0);

    egui::Window::new("Globe")
        .default_pos([10.0, 10.0])
        .show(ctx, |ui| {
            ui.label(format!("FPS: {fps:.0}"));
            ui.label(status.stage_line("Textures", status.base_percent, status.base_completed));
            ui.label(status.stage_line("Clouds", status.cloud_percent, status.cloud_completed));
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Lat");
                ui.text_edit_singleline(&mut state.lat);
                ui.label("Lon");
                ui.text_edit_singleline(&mut state.lon);
            });
            ui.horizontal(|ui| {
                ui.label("Country");
                ui.text_edit_singleline(&mut state.country);
            });

            ui.horizontal(|ui| {
                if ui.button("Fly to").clicked() {
                    match (state.lat.trim().parse(), state.lon.trim().parse()) {
                        (Ok(lat), Ok(lon)) => {
                            target.coordinate =
                                Some(crate::coords::GeoCoordinate::new(lat, lon));
                            let country = state.country.trim();
                            target.country_code =
                                (!country.is_empty()).then(|| country.to_owned());
                        }
                        _ => tracing::warn!("Unparseable coordinates in the control panel"),
                    }
                }
                if ui.button("Clear").clicked() {
                    target.coordinate = None;
                    target.country_code = None;
                }
            });

            ui.separator();
            match anchor.0 {
                Some(position) => {
                    ui.label(format!("Marker at ({:.0}, {:.0}) px", position.x, position.y));
                }
                None => {
                    ui.label("Marker off-screen");
                }
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_status_tracks_both_stages() {
        let mut status = LoadStatus::default();
        status.apply(&LoadEvent::Progress {
            stage: LoadStage::BaseTextures,
            percent: 40.0,
        });
        status.apply(&LoadEvent::Completed {
            stage: LoadStage::BaseTextures,
        });
        status.apply(&LoadEvent::Progress {
            stage: LoadStage::CloudImagery,
            percent: 15.0,
        });
        assert!(status.base_completed);
        assert!(!status.cloud_completed);
        assert!((status.cloud_percent - 15.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cloud_refresh_reopens_completed_stage() {
        let mut status = LoadStatus::default();
        status.apply(&LoadEvent::Completed {
            stage: LoadStage::CloudImagery,
        });
        status.apply(&LoadEvent::Progress {
            stage: LoadStage::CloudImagery,
            percent: 5.0,
        });
        assert!(!status.cloud_completed);
    }
}
