//! Stage two of the asset pipeline: the refreshed satellite cloud layer.
//!
//! Once the host signals that the base textures are in, the latest satellite
//! composite is streamed through the image proxy, decoded, and swapped into
//! the cloud material. The fetch repeats every ten minutes for as long as
//! the view lives; failures keep the previous texture and still complete the
//! stage so the host is never left waiting.

use bevy::asset::RenderAssetUsages;
use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;
use image::DynamicImage;

use crate::async_runtime::TaskSpawner;
use crate::host::{GlobeClient, LoadEvent, LoadStage};
use crate::materials::{CloudMaterial, CloudUniform};
use crate::scene::{GlobeMaterials, GlobeTextures};

/// Refresh cadence of the satellite composite.
pub const REFRESH_INTERVAL_SECS: f32 = 600.0;

/// Plugin for the cloud imagery refresh stage.
pub struct CloudRefreshPlugin;

impl Plugin for CloudRefreshPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CloudRefreshState>()
            .add_systems(Update, (tick_cloud_refresh, poll_cloud_fetch).chain());
    }
}

/// Updates streamed out of an in-flight imagery fetch.
pub enum CloudFetchUpdate {
    /// Bytes-received percentage; absent entirely when the response has no
    /// content length.
    Progress(f32),
    Finished(Result<DynamicImage, meteoglobe::Error>),
}

/// State for the periodic cloud refresh.
#[derive(Resource)]
pub struct CloudRefreshState {
    /// Host gate; flipped when stage one completes.
    pub enabled: bool,
    in_flight: bool,
    started_once: bool,
    timer: Timer,
    update_rx: async_channel::Receiver<CloudFetchUpdate>,
    update_tx: async_channel::Sender<CloudFetchUpdate>,
}

impl Default for CloudRefreshState {
    fn default() -> Self {
        let (update_tx, update_rx) = async_channel::unbounded();
        Self {
            enabled: false,
            in_flight: false,
            started_once: false,
            timer: Timer::from_seconds(REFRESH_INTERVAL_SECS, TimerMode::Repeating),
            update_rx,
            update_tx,
        }
    }
}

impl CloudRefreshState {
    /// Sender half for tests and spawned tasks.
    fn sender(&self) -> async_channel::Sender<CloudFetchUpdate> {
        self.update_tx.clone()
    }

    #[cfg(test)]
    pub fn push_update_for_test(&self, update: CloudFetchUpdate) {
        let _ = self.update_tx.try_send(update);
    }

    #[cfg(test)]
    pub fn mark_in_flight_for_test(&mut self) {
        self.in_flight = true;
    }
}

fn now_millis() -> u128 {
    web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Start a fetch immediately when first enabled, then on every timer lap.
#[allow(clippy::needless_pass_by_value)]
fn tick_cloud_refresh(
    time: Res<Time>,
    mut state: ResMut<CloudRefreshState>,
    client: Res<GlobeClient>,
    spawner: TaskSpawner,
) {
    if !state.enabled {
        return;
    }

    let due = if state.started_once {
        state.timer.tick(time.delta()).just_finished()
    } else {
        state.started_once = true;
        true
    };

    if !due || state.in_flight {
        return;
    }
    state.in_flight = true;

    let url = meteoglobe::cloud_imagery_url(now_millis());
    let client = client.0.clone();
    let tx = state.sender();
    let progress_tx = state.sender();

    spawner.spawn(async move {
        let result = client
            .fetch_cloud_imagery(&url, |percent| {
                let _ = progress_tx.try_send(CloudFetchUpdate::Progress(percent));
            })
            .await;
        let _ = tx.send(CloudFetchUpdate::Finished(result)).await;
    });

    tracing::info!("Started cloud imagery fetch");
}

/// Drain fetch updates: forward progress, install the decoded texture.
#[allow(clippy::needless_pass_by_value)]
pub fn poll_cloud_fetch(
    mut state: ResMut<CloudRefreshState>,
    mut textures: ResMut<GlobeTextures>,
    globe_materials: Option<Res<GlobeMaterials>>,
    mut images: ResMut<Assets<Image>>,
    mut cloud_materials: ResMut<Assets<CloudMaterial>>,
    mut events: MessageWriter<LoadEvent>,
) {
    while let Ok(update) = state.update_rx.try_recv() {
        match update {
            CloudFetchUpdate::Progress(percent) => {
                events.write(LoadEvent::Progress {
                    stage: LoadStage::CloudImagery,
                    percent,
                });
            }
            CloudFetchUpdate::Finished(result) => {
                state.in_flight = false;
                match result {
                    Ok(decoded) => {
                        let handle = images.add(Image::from_dynamic(
                            decoded,
                            true,
                            RenderAssetUsages::default(),
                        ));
                        let previous = std::mem::replace(&mut textures.cloud, handle);
                        if let Some(globe_materials) = globe_materials.as_ref()
                            && let Some(material) =
                                cloud_materials.get_mut(&globe_materials.clouds)
                        {
                            material.cloud_texture = textures.cloud.clone();
                            // Live imagery carries no alpha mask; show it fully.
                            material.settings = CloudUniform::with_opacity(1.0);
                        }
                        images.remove(&previous);
                        tracing::info!("Installed fresh cloud imagery");
                    }
                    Err(e) => {
                        // Keep whatever cloud texture is currently showing.
                        tracing::error!("Cloud imagery fetch failed: {}", e);
                    }
                }
                events.write(LoadEvent::Completed {
                    stage: LoadStage::CloudImagery,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::message::Messages;

    fn test_app() -> App {
        let mut app = App::new();
        app.init_resource::<Assets<Image>>()
            .init_resource::<Assets<CloudMaterial>>()
            .init_resource::<CloudRefreshState>()
            .add_message::<LoadEvent>()
            .add_systems(Update, poll_cloud_fetch);

        let cloud_handle = {
            let mut images = app.world_mut().resource_mut::<Assets<Image>>();
            images.add(Image::default())
        };
        app.insert_resource(GlobeTextures {
            day: Handle::default(),
            night: Handle::default(),
            bump: Handle::default(),
            specular: Handle::default(),
            cloud: cloud_handle,
        });
        app
    }

    fn drain_events(app: &mut App) -> Vec<LoadEvent> {
        app.world_mut()
            .resource_mut::<Messages<LoadEvent>>()
            .drain()
            .collect()
    }

    #[test]
    fn test_failed_fetch_completes_and_keeps_texture() {
        let mut app = test_app();
        let before = app.world().resource::<GlobeTextures>().cloud.clone();

        {
            let mut state = app.world_mut().resource_mut::<CloudRefreshState>();
            state.mark_in_flight_for_test();
            state.push_update_for_test(CloudFetchUpdate::Finished(Err(
                meteoglobe::Error::HttpStatus {
                    url: "proxy".to_string(),
                    status: 502,
                },
            )));
        }
        app.update();

        let events = drain_events(&mut app);
        assert!(events.contains(&LoadEvent::Completed {
            stage: LoadStage::CloudImagery
        }));

        let textures = app.world().resource::<GlobeTextures>();
        assert_eq!(textures.cloud, before, "prior cloud texture must survive");
        assert!(
            app.world()
                .resource::<Assets<Image>>()
                .get(&textures.cloud)
                .is_some()
        );
        assert!(!app.world().resource::<CloudRefreshState>().in_flight);
    }

    #[test]
    fn test_successful_fetch_swaps_and_releases() {
        let mut app = test_app();
        let before = app.world().resource::<GlobeTextures>().cloud.clone();

        {
            let mut state = app.world_mut().resource_mut::<CloudRefreshState>();
            state.mark_in_flight_for_test();
            state.push_update_for_test(CloudFetchUpdate::Finished(Ok(DynamicImage::new_rgba8(
                2, 2,
            ))));
        }
        app.update();

        let textures = app.world().resource::<GlobeTextures>();
        assert_ne!(textures.cloud, before);
        // The superseded image was removed from the asset store.
        assert!(app.world().resource::<Assets<Image>>().get(&before).is_none());
    }

    #[test]
    fn test_progress_updates_are_forwarded() {
        let mut app = test_app();
        {
            let state = app.world().resource::<CloudRefreshState>();
            state.push_update_for_test(CloudFetchUpdate::Progress(40.0));
            state.push_update_for_test(CloudFetchUpdate::Progress(80.0));
        }
        app.update();

        let events = drain_events(&mut app);
        assert_eq!(
            events,
            vec![
                LoadEvent::Progress {
                    stage: LoadStage::CloudImagery,
                    percent: 40.0
                },
                LoadEvent::Progress {
                    stage: LoadStage::CloudImagery,
                    percent: 80.0
                },
            ]
        );
    }
}
