use bevy::prelude::*;

use kestrel::navigation::{
    AvoidanceSamples, NavMesh, NavigationConfig, NavigationPlugin, RebuildNavMesh, Segment, VelocityObstacle,
    WalkableLayout,
};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::fs;
use std::path::{Path, PathBuf};

const LOG_PREFIX: &str = "kestrel";

/// '.' is walkable, top row first.
const DEMO_GRID: [&str; 8] = [
    "................",
    ".####.......###.",
    ".#..........#...",
    ".#..######..#.##",
    "....#....#......",
    "##..#....#..###.",
    "....#.......#...",
    "................",
];

fn setup_file_logging() -> String {
    let log_dir = PathBuf::from("logs");
    if !log_dir.exists() {
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create {}: {}", log_dir.display(), e);
        }
    }

    // Keep only the most recent runs
    cleanup_old_logs(&log_dir, 25);

    let now = chrono::Local::now();
    let log_filename = format!("{}_{}.log", LOG_PREFIX, now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, &log_filename);

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bevy_ecs=info,kestrel=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    log_path_str
}

fn cleanup_old_logs(log_dir: &Path, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with(LOG_PREFIX) && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Oldest first
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

fn demo_layout() -> Result<WalkableLayout, kestrel::navigation::LayoutError> {
    let height = DEMO_GRID.len();
    let width = DEMO_GRID[0].len();
    let mut cells = vec![false; width * height];
    for (row, line) in DEMO_GRID.iter().enumerate() {
        let y = height - 1 - row;
        for (x, c) in line.chars().enumerate() {
            cells[y * width + x] = c == '.';
        }
    }
    WalkableLayout::from_grid(width, height, &cells, 1.0, Vec2::ZERO)
}

fn run_demo(app: &App) {
    let world = app.world();
    let navmesh = world.resource::<NavMesh>();
    let config = world.resource::<NavigationConfig>();
    let samples = world.resource::<AvoidanceSamples>();

    for (i, component) in navmesh.components().iter().enumerate() {
        let stats = component.stats();
        info!("Component {}: {} faces, {} portals, {} walls", i, stats.faces, stats.portals, stats.walls);
    }

    let start = Vec2::new(0.5, 0.5);
    let goal = Vec2::new(6.5, 3.5);
    let Some(path) = navmesh.find_path(start, goal) else {
        warn!("No path from {} to {}", start, goal);
        return;
    };
    info!("Path from {} to {} crosses {} portals", start, goal, path.len());
    for (i, waypoint) in path.waypoints(navmesh).iter().enumerate() {
        info!("  waypoint {}: {}", i, waypoint);
    }

    // One avoidance step along the first leg, with a wall and a crossing agent nearby
    let heading = path
        .steps
        .first()
        .map(|step| step.direction)
        .unwrap_or_else(|| (goal - start).normalize_or_zero());
    let mut solver = VelocityObstacle::new(&samples.0, &config.avoidance);
    solver.start(None, start, 0.4, heading, 1.5);
    solver.add_point(start + heading * 2.0, 0.4, -heading);
    solver.add_segment(Segment::new(Vec2::new(0.0, 1.0), Vec2::new(4.0, 1.0)), 0.0);
    let velocity = solver.find_best_velocity(heading);
    info!("Avoidance picked {} (desired {})", velocity, heading * 1.5);

    if let Some(dir) = navmesh.get_treadmill_dir(start) {
        info!("Treadmill direction at {}: {}", start, dir);
    }
}

fn main() {
    let log_file = setup_file_logging();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Kestrel navigation demo - Logging to file               ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Log file: {:<45} ║", log_file);
    println!("╚══════════════════════════════════════════════════════════╝");

    let layout = match demo_layout() {
        Ok(layout) => layout,
        Err(e) => {
            error!("Demo layout is invalid: {}", e);
            return;
        }
    };

    let mut app = App::new();
    app.add_plugins((MinimalPlugins, NavigationPlugin::default()));
    app.world_mut().write_message(RebuildNavMesh { layout: Some(layout) });
    app.update();

    run_demo(&app);
}
