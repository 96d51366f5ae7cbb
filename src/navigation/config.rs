use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Default location of the navigation tunables, relative to the working directory.
pub const NAVIGATION_CONFIG_PATH: &str = "assets/navigation_config.ron";

/// Navigation tunables loaded once at startup.
///
/// Missing files or parse errors fall back to [`Default`], so a fresh checkout
/// runs without any asset.
#[derive(Resource, Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct NavigationConfig {
    pub navmesh: NavMeshSettings,
    pub avoidance: AvoidanceSettings,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NavMeshSettings {
    /// Two box borders closer than this are considered touching.
    pub touch_tolerance: f32,
    /// Below this distance to the goal, a portal is crossed along its own direction.
    pub goal_tolerance: f32,
    /// Spatial index cell size. `0.0` picks one from the average box size.
    pub index_cell_size: f32,
    /// Hard cap on A* expansions, a safety net against corrupted graphs.
    pub max_search_iterations: usize,
}

impl Default for NavMeshSettings {
    fn default() -> Self {
        Self {
            touch_tolerance: 1e-4,
            goal_tolerance: 1e-4,
            index_cell_size: 0.0,
            max_search_iterations: 100_000,
        }
    }
}

/// Which candidate generator the avoidance solver runs after its cheap checks.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AvoidanceSolver {
    /// Classify the faces of the exact obstacle-boundary arrangement.
    #[default]
    Exact,
    /// Score a fixed Poisson-disk sample set.
    Sampled,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AvoidanceSettings {
    pub solver: AvoidanceSolver,
    /// General float tolerance for velocity-space tests.
    pub tolerance: f32,
    /// Arcs of the max-speed circle narrower than this (radians) count as closed.
    pub arc_tolerance: f32,
    /// Weight of direction agreement against speed when scoring candidates.
    pub direction_weight: f32,
    /// How many of the canonical directions (+X, +Y, -Y, -X) are scored.
    pub scored_axes: usize,
    /// Candidates must score strictly above this to be accepted.
    pub acceptance_threshold: f32,
    /// Lattice units per `max_speed` used when quantizing cone boundaries.
    pub grid_resolution: i32,
    /// Minimum spacing of the Poisson-disk sample set, in units of `max_speed`.
    pub sample_spacing: f32,
    /// Bridson rejection attempts per active sample.
    pub sample_attempts: u32,
    pub sample_seed: u64,
}

impl Default for AvoidanceSettings {
    fn default() -> Self {
        Self {
            solver: AvoidanceSolver::Exact,
            tolerance: 1e-4,
            arc_tolerance: 1e-3,
            direction_weight: 0.5,
            scored_axes: 1,
            acceptance_threshold: 0.0,
            grid_resolution: 1000,
            sample_spacing: 0.075,
            sample_attempts: 30,
            sample_seed: 0x6b65_7374,
        }
    }
}

/// Read a config from `path`, logging and falling back to defaults on failure.
pub fn load_navigation_config(path: &str) -> NavigationConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match ron::from_str::<NavigationConfig>(&contents) {
            Ok(config) => {
                info!("[CONFIG] Loaded navigation config from {}", path);
                config
            }
            Err(e) => {
                error!("[CONFIG] Failed to parse {}: {}", path, e);
                error!("[CONFIG] Using default NavigationConfig");
                NavigationConfig::default()
            }
        },
        Err(e) => {
            warn!("[CONFIG] Failed to read {}: {}", path, e);
            warn!("[CONFIG] Using default NavigationConfig");
            NavigationConfig::default()
        }
    }
}
