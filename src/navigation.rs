//! Box-based navigation: a portal graph over axis-aligned walkable boxes,
//! A* over its portals, and a velocity-obstacle solver for local avoidance.
//!
//! [`NavigationPlugin`] wires the pieces into a Bevy app. Everything below it
//! is plain data and usable without an `App`.

use bevy::prelude::*;

pub mod avoidance;
pub mod config;
pub mod debug;
pub mod intersector;
pub mod layout;
pub mod math;
pub mod navmesh;
pub mod rational;

pub use avoidance::{SamplePattern, VelocityObstacle};
pub use config::{load_navigation_config, AvoidanceSettings, AvoidanceSolver, NavMeshSettings, NavigationConfig};
pub use debug::{DebugDrawer, RecordingDrawer};
pub use intersector::{intersect_segments, IntSegment, IntersectError, Intersector};
pub use layout::{LayoutError, WalkableLayout};
pub use math::{NavBox, Segment};
pub use navmesh::{NavMesh, NavMeshError, NavPath, SearchControl};

/// Shared Poisson-disk samples for the sampled avoidance solver.
#[derive(Resource, Clone, Debug, Default)]
pub struct AvoidanceSamples(pub SamplePattern);

/// Rebuild the [`NavMesh`] resource from the current [`WalkableLayout`].
///
/// A message carrying a layout replaces the resource first.
#[derive(Message, Debug, Clone, Default)]
pub struct RebuildNavMesh {
    pub layout: Option<WalkableLayout>,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct NavDebugSettings {
    pub show_navmesh: bool,
    pub show_paths: bool,
}

/// A path drawn while [`NavDebugSettings::show_paths`] is set.
#[derive(Component, Debug, Clone)]
pub struct PathDebug(pub NavPath);

pub struct NavigationPlugin {
    pub config_path: String,
}

impl Default for NavigationPlugin {
    fn default() -> Self {
        Self {
            config_path: config::NAVIGATION_CONFIG_PATH.to_string(),
        }
    }
}

impl Plugin for NavigationPlugin {
    fn build(&self, app: &mut App) {
        // Loaded here rather than in Startup so the sample set exists before any system runs
        let config = load_navigation_config(&self.config_path);
        let samples = SamplePattern::from_settings(&config.avoidance);
        info!("[CONFIG] {} avoidance samples ready", samples.len());

        app.insert_resource(config)
            .insert_resource(AvoidanceSamples(samples))
            .init_resource::<NavMesh>()
            .init_resource::<WalkableLayout>()
            .init_resource::<NavDebugSettings>()
            .add_message::<RebuildNavMesh>()
            .add_systems(PreUpdate, rebuild_navmesh);

        // Headless apps have no gizmo storage
        if app.is_plugin_added::<bevy::gizmos::GizmoPlugin>() {
            app.add_systems(Update, (draw_navmesh_gizmos, draw_path_gizmos));
        }
    }
}

fn rebuild_navmesh(
    mut requests: MessageReader<RebuildNavMesh>,
    mut layout: ResMut<WalkableLayout>,
    mut navmesh: ResMut<NavMesh>,
    config: Res<NavigationConfig>,
) {
    let mut rebuild = false;
    for request in requests.read() {
        if let Some(new_layout) = &request.layout {
            *layout = new_layout.clone();
        }
        rebuild = true;
    }
    if !rebuild {
        return;
    }

    match NavMesh::build(&layout.boxes, &config.navmesh) {
        Ok(mesh) => *navmesh = mesh,
        Err(e) => error!("[NAVMESH] Rebuild from {} boxes failed: {}", layout.boxes.len(), e),
    }
}

fn draw_navmesh_gizmos(settings: Res<NavDebugSettings>, navmesh: Res<NavMesh>, mut gizmos: Gizmos) {
    if settings.show_navmesh {
        navmesh.draw_debug(&mut gizmos);
    }
}

fn draw_path_gizmos(
    settings: Res<NavDebugSettings>,
    navmesh: Res<NavMesh>,
    paths: Query<&PathDebug>,
    mut gizmos: Gizmos,
) {
    if !settings.show_paths {
        return;
    }
    for path in &paths {
        path.0.draw_debug(&navmesh, &mut gizmos);
    }
}
