//! Stage one of the asset pipeline: the tracked base-texture batch.
//!
//! The five base planet maps are fetched concurrently on background tasks
//! and delivered over a channel. A [`BatchProgress`] counter turns arrivals
//! into monotone progress percentages and a single completion event; a
//! failed download is logged and counted so the stage always terminates.

use bevy::asset::RenderAssetUsages;
use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;
use image::DynamicImage;
use meteoglobe::BaseTexture;

use crate::async_runtime::TaskSpawner;
use crate::host::{GlobeClient, LoadEvent, LoadStage};
use crate::materials::{CloudMaterial, EarthMaterial};
use crate::scene::{GlobeMaterials, GlobeTextures};

/// Plugin for the base-texture loading stage.
pub struct TextureLoaderPlugin;

impl Plugin for TextureLoaderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TextureLoaderState>()
            .add_systems(Startup, start_batch_load)
            .add_systems(Update, poll_texture_batch);
    }
}

/// Progress accounting for a fixed-size batch of tracked loads.
///
/// Percent is loaded/total and never decreases; the completion flag fires
/// exactly once, when the final member of the batch is recorded.
#[derive(Debug)]
pub struct BatchProgress {
    total: usize,
    loaded: usize,
    completed_fired: bool,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            loaded: 0,
            completed_fired: false,
        }
    }

    /// Record one finished load (success or failure).
    ///
    /// Returns the new percentage and whether the batch just completed.
    pub fn record(&mut self) -> (f32, bool) {
        self.loaded = (self.loaded + 1).min(self.total);
        let completed_now = self.loaded == self.total && !self.completed_fired;
        if completed_now {
            self.completed_fired = true;
        }
        (self.percent(), completed_now)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            self.loaded as f32 / self.total as f32 * 100.0
        }
    }
}

type TextureResult = (BaseTexture, Result<DynamicImage, meteoglobe::Error>);

/// State for the batch loader.
#[derive(Resource)]
pub struct TextureLoaderState {
    batch: BatchProgress,
    result_rx: async_channel::Receiver<TextureResult>,
    result_tx: async_channel::Sender<TextureResult>,
}

impl Default for TextureLoaderState {
    fn default() -> Self {
        let (result_tx, result_rx) = async_channel::unbounded();
        Self {
            batch: BatchProgress::new(BaseTexture::ALL.len()),
            result_rx,
            result_tx,
        }
    }
}

/// Kick off the whole batch on startup.
#[allow(clippy::needless_pass_by_value)]
fn start_batch_load(
    state: Res<TextureLoaderState>,
    client: Res<GlobeClient>,
    spawner: TaskSpawner,
) {
    for texture in BaseTexture::ALL {
        let client = client.0.clone();
        let tx = state.result_tx.clone();
        spawner.spawn(async move {
            let result = client.fetch_texture(texture).await;
            let _ = tx.send((texture, result)).await;
        });
    }
    tracing::info!("Started loading {} base textures", BaseTexture::ALL.len());
}

/// Poll arriving textures, install them, and report progress.
#[allow(clippy::needless_pass_by_value)]
fn poll_texture_batch(
    mut state: ResMut<TextureLoaderState>,
    mut textures: ResMut<GlobeTextures>,
    globe_materials: Option<Res<GlobeMaterials>>,
    mut images: ResMut<Assets<Image>>,
    mut earth_materials: ResMut<Assets<EarthMaterial>>,
    mut cloud_materials: ResMut<Assets<CloudMaterial>>,
    mut events: MessageWriter<LoadEvent>,
) {
    while let Ok((texture, result)) = state.result_rx.try_recv() {
        match result {
            Ok(decoded) => {
                let handle = images.add(Image::from_dynamic(
                    decoded,
                    is_srgb(texture),
                    RenderAssetUsages::default(),
                ));
                let previous = install_texture(texture, handle, &mut textures);
                if let Some(globe_materials) = globe_materials.as_ref() {
                    refresh_materials(
                        texture,
                        &textures,
                        globe_materials,
                        &mut earth_materials,
                        &mut cloud_materials,
                    );
                }
                images.remove(&previous);
                tracing::info!("Loaded {} texture", texture.label());
            }
            Err(e) => {
                // The globe keeps its placeholder; the stage still finishes.
                tracing::error!("Failed to load {} texture: {}", texture.label(), e);
            }
        }

        let (percent, completed) = state.batch.record();
        events.write(LoadEvent::Progress {
            stage: LoadStage::BaseTextures,
            percent,
        });
        if completed {
            events.write(LoadEvent::Completed {
                stage: LoadStage::BaseTextures,
            });
            tracing::info!("Base texture batch complete");
        }
    }
}

/// Color maps are sRGB; the bump and specular masks hold linear data.
fn is_srgb(texture: BaseTexture) -> bool {
    !matches!(texture, BaseTexture::Bump | BaseTexture::Specular)
}

/// Swap the new handle into place, returning the superseded one.
fn install_texture(
    texture: BaseTexture,
    handle: Handle<Image>,
    textures: &mut GlobeTextures,
) -> Handle<Image> {
    let slot = match texture {
        BaseTexture::Day => &mut textures.day,
        BaseTexture::NightLights => &mut textures.night,
        BaseTexture::Bump => &mut textures.bump,
        BaseTexture::Specular => &mut textures.specular,
        BaseTexture::CloudMask => &mut textures.cloud,
    };
    std::mem::replace(slot, handle)
}

/// Point the live materials at the freshly installed handle.
fn refresh_materials(
    texture: BaseTexture,
    textures: &GlobeTextures,
    globe_materials: &GlobeMaterials,
    earth_materials: &mut Assets<EarthMaterial>,
    cloud_materials: &mut Assets<CloudMaterial>,
) {
    match texture {
        BaseTexture::CloudMask => {
            if let Some(material) = cloud_materials.get_mut(&globe_materials.clouds) {
                material.cloud_texture = textures.cloud.clone();
            }
        }
        _ => {
            if let Some(material) = earth_materials.get_mut(&globe_materials.earth) {
                material.day_texture = textures.day.clone();
                material.night_texture = textures.night.clone();
                material.bump_texture = textures.bump.clone();
                material.specular_texture = textures.specular.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_progress_is_monotone() {
        let mut batch = BatchProgress::new(5);
        let mut last = 0.0;
        for _ in 0..5 {
            let (percent, _) = batch.record();
            assert!(percent >= last);
            last = percent;
        }
        assert!((last - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_completion_fires_exactly_once() {
        let mut batch = BatchProgress::new(5);
        let mut completions = 0;
        for _ in 0..5 {
            let (_, completed) = batch.record();
            if completed {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);

        // A spurious extra arrival must not re-fire or exceed 100.
        let (percent, completed) = batch.record();
        assert!(!completed);
        assert!((percent - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_completion_only_on_final_member() {
        let mut batch = BatchProgress::new(3);
        assert!(!batch.record().1);
        assert!(!batch.record().1);
        assert!(batch.record().1);
    }
}
