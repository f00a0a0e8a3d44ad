//! Unified async task spawning for native and WASM platforms.
//!
//! Texture, imagery, and boundary fetches all run as background tasks that
//! report back over channels. `TaskSpawner` hides the platform split:
//! - Native: `bevy_tokio_tasks` provides a Tokio runtime (reqwest needs one)
//! - WASM: Bevy's `AsyncComputeTaskPool` drives reqwest's browser fetch

use bevy::prelude::*;

/// Plugin that sets up the async runtime for the current platform.
///
/// On native this adds the Tokio runtime plugin; on WASM it is a no-op since
/// the browser event loop drives async execution.
pub struct AsyncRuntimePlugin;

impl Plugin for AsyncRuntimePlugin {
    fn build(&self, app: &mut App) {
        #[cfg(target_family = "wasm")]
        let _ = app;

        #[cfg(not(target_family = "wasm"))]
        app.add_plugins(bevy_tokio_tasks::TokioTasksPlugin::default());
    }
}

// Native implementation using Tokio.
#[cfg(not(target_family = "wasm"))]
mod native {
    use std::future::Future;

    use bevy::ecs::system::SystemParam;
    use bevy::prelude::*;

    /// System parameter for spawning fire-and-forget async tasks.
    ///
    /// Tasks communicate results back to the main thread over channels
    /// (`async_channel`), which systems poll with `try_recv`.
    #[derive(SystemParam)]
    pub struct TaskSpawner<'w, 's> {
        runtime: Res<'w, bevy_tokio_tasks::TokioTasksRuntime>,
        // Local<()> matches the WASM signature.
        #[allow(dead_code)]
        _local: Local<'s, ()>,
    }

    impl TaskSpawner<'_, '_> {
        /// Spawn a background task that runs to completion.
        pub fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            self.runtime.spawn_background_task(move |_ctx| future);
        }
    }
}

// WASM implementation using Bevy's task pool.
#[cfg(target_family = "wasm")]
mod wasm {
    use std::future::Future;

    use bevy::ecs::system::SystemParam;
    use bevy::prelude::*;
    use bevy::tasks::AsyncComputeTaskPool;

    /// System parameter for spawning fire-and-forget async tasks.
    ///
    /// On WASM no runtime resource is needed; `Local<()>` satisfies the
    /// derive requirements.
    #[derive(SystemParam)]
    pub struct TaskSpawner<'w, 's> {
        #[allow(dead_code)]
        _local: Local<'s, ()>,
        #[allow(dead_code)]
        _marker: std::marker::PhantomData<&'w ()>,
    }

    impl TaskSpawner<'_, '_> {
        /// Spawn a background task that runs to completion.
        ///
        /// The `Send` bound is not required here; the browser is
        /// single-threaded.
        pub fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + 'static,
        {
            AsyncComputeTaskPool::get().spawn_local(future).detach();
        }
    }
}

#[cfg(not(target_family = "wasm"))]
pub use native::TaskSpawner;
#[cfg(target_family = "wasm")]
pub use wasm::TaskSpawner;
