use bevy::prelude::*;

use super::*;
use crate::navigation::debug::RecordingDrawer;

fn settings(solver: AvoidanceSolver) -> AvoidanceSettings {
    AvoidanceSettings {
        solver,
        ..AvoidanceSettings::default()
    }
}

fn pattern() -> SamplePattern {
    SamplePattern::from_settings(&AvoidanceSettings::default())
}

const SOLVERS: [AvoidanceSolver; 2] = [AvoidanceSolver::Exact, AvoidanceSolver::Sampled];

/// Square room of half size `half` around `center`, walls listed counter-clockwise.
fn room(center: Vec2, half: f32) -> [Segment; 4] {
    let corners = NavBox::from_center_half_size(center, Vec2::splat(half)).corners();
    [
        Segment::new(corners[0], corners[1]),
        Segment::new(corners[1], corners[2]),
        Segment::new(corners[2], corners[3]),
        Segment::new(corners[3], corners[0]),
    ]
}

#[test]
fn test_no_obstacles_returns_desired_velocity() {
    let samples = pattern();
    for solver in SOLVERS {
        let mut vo = VelocityObstacle::new(&samples, &settings(solver));
        vo.start(None, Vec2::new(3.0, 4.0), 0.5, Vec2::new(0.0, 2.0), 3.0);
        assert_eq!(vo.find_best_velocity(Vec2::ZERO), Vec2::new(0.0, 3.0));

        vo.start(None, Vec2::ZERO, 0.5, Vec2::ZERO, 3.0);
        assert!(vo.is_pure_avoidance());
        assert_eq!(vo.find_best_velocity(Vec2::ZERO), Vec2::ZERO);
    }
}

#[test]
fn test_overlapping_obstacle_ahead_forces_avoidance() {
    let samples = pattern();
    for solver in SOLVERS {
        let mut vo = VelocityObstacle::new(&samples, &settings(solver));
        vo.start(None, Vec2::ZERO, 1.0, Vec2::X, 2.0);
        vo.add_point(Vec2::new(1.5, 0.0), 1.0, Vec2::ZERO);
        assert_eq!(vo.obstacles().len(), 1);
        assert!(!vo.is_whole_circle_cut());

        let velocity = vo.find_best_velocity(Vec2::ZERO);
        assert!(velocity.dot(Vec2::X) < 2.0 - 1e-3, "{solver:?}: {velocity:?}");
        assert!(velocity.dot(Vec2::X) <= 1e-3, "{solver:?}: moved into the obstacle");
        assert!(velocity.length() > 0.1, "{solver:?}: should sidestep");
        assert!(velocity.length() <= 2.0 + 1e-3);
    }
}

#[test]
fn test_deflects_around_point_obstacle() {
    let samples = pattern();
    // Combined radius 2 at distance 5: the cone half angle is asin(0.4)
    let half_angle = (2.0_f32 / 5.0).asin();

    for solver in SOLVERS {
        let mut vo = VelocityObstacle::new(&samples, &settings(solver));
        vo.start(None, Vec2::ZERO, 1.0, Vec2::X, 3.0);
        vo.add_point(Vec2::new(5.0, 0.0), 1.0, Vec2::ZERO);

        let velocity = vo.find_best_velocity(Vec2::ZERO);
        let speed = velocity.length();
        assert!(speed > 0.5 && speed <= 3.0 + 1e-3, "{solver:?}: speed {speed}");

        let angle = velocity.y.atan2(velocity.x).abs();
        assert!(angle >= half_angle - 2e-3, "{solver:?}: {velocity:?} still aims at the obstacle");
        assert!(angle < std::f32::consts::FRAC_PI_2, "{solver:?}: turned away too much");
    }
}

#[test]
fn test_exact_solver_hugs_the_cone() {
    let samples = pattern();
    let mut vo = VelocityObstacle::new(&samples, &settings(AvoidanceSolver::Exact));
    vo.start(None, Vec2::new(10.0, -4.0), 1.0, Vec2::X, 3.0);
    vo.add_point(Vec2::new(15.0, -4.0), 1.0, Vec2::ZERO);

    let velocity = vo.find_best_velocity(Vec2::ZERO);
    let half_angle = (2.0_f32 / 5.0).asin();
    assert!((velocity.length() - 3.0).abs() < 1e-2, "{velocity:?}");
    assert!((velocity.y.atan2(velocity.x).abs() - half_angle).abs() < 1e-2, "{velocity:?}");
}

#[test]
fn test_walled_in_agent_stops() {
    let samples = pattern();
    for solver in SOLVERS {
        let mut vo = VelocityObstacle::new(&samples, &settings(solver));
        let center = Vec2::new(-7.0, 2.0);
        vo.start(None, center, 0.5, Vec2::new(1.0, 1.0), 2.0);
        for wall in room(center, 1.5) {
            vo.add_segment(wall, 0.5);
        }
        assert!(vo.is_whole_circle_cut());
        assert_eq!(vo.find_best_velocity(Vec2::X), Vec2::ZERO);
    }
}

#[test]
fn test_open_room_keeps_a_way_out() {
    let samples = pattern();
    let mut vo = VelocityObstacle::new(&samples, &settings(AvoidanceSolver::Exact));
    vo.start(None, Vec2::ZERO, 0.5, Vec2::X, 2.0);
    // Three walls, the +Y side left open
    let walls = room(Vec2::ZERO, 3.0);
    for wall in [walls[0], walls[1], walls[3]] {
        vo.add_segment(wall, 0.0);
    }
    assert!(!vo.is_whole_circle_cut());

    let velocity = vo.find_best_velocity(Vec2::ZERO);
    assert!(velocity.y > 0.1, "{velocity:?}");
}

#[test]
fn test_cone_swallowing_the_disc_stops_the_agent() {
    let samples = pattern();
    for solver in SOLVERS {
        let mut vo = VelocityObstacle::new(&samples, &settings(solver));
        vo.start(None, Vec2::ZERO, 1.0, Vec2::X, 1.0);
        // Rushing in much faster than the agent can move away
        vo.add_point(Vec2::new(5.0, 0.0), 1.0, Vec2::new(-10.0, 0.0));
        assert!(vo.is_whole_circle_cut());
        assert_eq!(vo.find_best_velocity(Vec2::ZERO), Vec2::ZERO);
    }
}

#[test]
fn test_pure_avoidance_moves_only_when_threatened() {
    let samples = pattern();
    for solver in SOLVERS {
        let mut vo = VelocityObstacle::new(&samples, &settings(solver));

        vo.start(None, Vec2::ZERO, 1.0, Vec2::ZERO, 3.0);
        vo.add_point(Vec2::new(3.0, 0.0), 1.0, Vec2::new(0.0, 2.0));
        assert_eq!(vo.find_best_velocity(Vec2::ZERO), Vec2::ZERO, "{solver:?}");

        vo.start(None, Vec2::ZERO, 1.0, Vec2::ZERO, 3.0);
        vo.add_point(Vec2::new(3.0, 0.0), 1.0, Vec2::new(-2.0, 0.0));
        let velocity = vo.find_best_velocity(Vec2::ZERO);
        assert!(velocity.length() > 0.5, "{solver:?}: {velocity:?}");
        if solver == AvoidanceSolver::Sampled {
            assert!(!vo.obstacles()[0].forbids(velocity));
        }
    }
}

#[test]
fn test_arc_fallback_rechecks_cones() {
    // The cone's lower ray sits just under +X, inside the arc tolerance, so
    // +X still reads as a free arc angle while the cone forbids it
    let samples = pattern();
    for solver in SOLVERS {
        let strict = AvoidanceSettings {
            acceptance_threshold: 10.0,
            ..settings(solver)
        };
        let mut vo = VelocityObstacle::new(&samples, &strict);
        vo.start(None, Vec2::ZERO, 0.5, Vec2::X, 3.0);
        vo.add_obstacle(Vec2::ZERO, [Vec2::from_angle(-0.0005), Vec2::from_angle(1.0)], 1.0);
        assert!(vo.free_arcs.contains(0.0, strict.arc_tolerance));
        assert!(vo.forbidden(Vec2::new(3.0, 0.0)));

        assert_eq!(vo.find_best_velocity(Vec2::X), Vec2::ZERO, "{solver:?}");

        // With the usual threshold the agent still gets a velocity the cone allows
        let mut vo = VelocityObstacle::new(&samples, &settings(solver));
        vo.start(None, Vec2::ZERO, 0.5, Vec2::X, 3.0);
        vo.add_obstacle(Vec2::ZERO, [Vec2::from_angle(-0.0005), Vec2::from_angle(1.0)], 1.0);
        let velocity = vo.find_best_velocity(Vec2::X);
        assert!(velocity.length() <= 3.0 + 1e-4);
        let angle = velocity.to_angle();
        assert!(velocity.length() > 1e-3, "{solver:?}");
        assert!(angle <= -0.0005 + 1e-5 || angle >= 1.0 - 1e-5, "{solver:?}: {velocity}");
    }
}

#[test]
fn test_previous_direction_breaks_symmetry() {
    let samples = pattern();
    let mut vo = VelocityObstacle::new(&samples, &settings(AvoidanceSolver::Exact));

    for side in [1.0, -1.0] {
        vo.start(None, Vec2::ZERO, 1.0, Vec2::X, 2.0);
        vo.add_point(Vec2::new(1.5, 0.0), 1.0, Vec2::ZERO);
        let velocity = vo.find_best_velocity(Vec2::new(0.0, side));
        assert!(velocity.y * side > 1.0, "side {side}: {velocity:?}");
    }
}

#[test]
fn test_start_resets_state() {
    let samples = pattern();
    let mut vo = VelocityObstacle::new(&samples, &settings(AvoidanceSolver::Exact));
    vo.start(None, Vec2::ZERO, 1.0, Vec2::X, 1.0);
    vo.add_point(Vec2::new(5.0, 0.0), 1.0, Vec2::new(-10.0, 0.0));
    assert_eq!(vo.find_best_velocity(Vec2::ZERO), Vec2::ZERO);

    vo.start(None, Vec2::ZERO, 1.0, Vec2::Y, 1.5);
    assert!(vo.obstacles().is_empty());
    assert!(!vo.is_whole_circle_cut() && !vo.is_circle_cut());
    assert_eq!(vo.free_arcs().as_slice(), &[CircleArc::FULL]);
    assert_eq!(vo.find_best_velocity(Vec2::ZERO), Vec2::new(0.0, 1.5));
}

#[test]
fn test_degenerate_inputs_are_ignored() {
    let samples = pattern();
    let mut vo = VelocityObstacle::new(&samples, &settings(AvoidanceSolver::Exact));
    vo.start(None, Vec2::ZERO, 0.0, Vec2::X, 1.0);

    vo.add_point(Vec2::new(2.0, 0.0), 0.0, Vec2::ZERO);
    vo.add_point(Vec2::ZERO, 1.0, Vec2::ZERO);
    vo.add_obstacle(Vec2::ZERO, [Vec2::X, Vec2::X], 1.0);
    assert!(vo.obstacles().is_empty());
    assert_eq!(vo.find_best_velocity(Vec2::ZERO), Vec2::X);
}

#[test]
fn test_random_scenes_stay_within_limits() {
    let samples = pattern();
    let mut rng = fastrand::Rng::with_seed(0xA70_1DA);

    for solver in SOLVERS {
        let mut vo = VelocityObstacle::new(&samples, &settings(solver));
        for _ in 0..60 {
            let max_speed = 0.5 + rng.f32() * 3.0;
            let desired = Vec2::from_angle(rng.f32() * std::f32::consts::TAU);
            vo.start(None, Vec2::ZERO, 0.5, desired, max_speed);

            for _ in 0..rng.usize(1..6) {
                let position = Vec2::new(rng.f32() * 12.0 - 6.0, rng.f32() * 12.0 - 6.0);
                let velocity = Vec2::new(rng.f32() * 2.0 - 1.0, rng.f32() * 2.0 - 1.0);
                vo.add_point(position, 0.2 + rng.f32(), velocity);
            }

            let chosen = vo.find_best_velocity(desired);
            assert!(chosen.is_finite());
            assert!(chosen.length() <= max_speed * (1.0 + 1e-3), "{solver:?}: {chosen:?}");
            // Samples lie strictly inside the disc, arc fallbacks on its rim
            let from_samples = chosen != Vec2::ZERO && chosen.length() < max_speed * 0.999;
            if solver == AvoidanceSolver::Sampled && from_samples {
                let local = get_local(vo.desired_dir(), chosen);
                assert!(vo.obstacles().iter().all(|o| !o.forbids(local)));
            }
        }
    }
}

#[test]
fn test_debug_drawing_records_cones_and_velocity() {
    let samples = pattern();
    let mut vo = VelocityObstacle::new(&samples, &settings(AvoidanceSolver::Exact));
    vo.start(None, Vec2::ZERO, 1.0, Vec2::X, 3.0);
    vo.add_point(Vec2::new(5.0, 0.0), 1.0, Vec2::ZERO);
    vo.find_best_velocity(Vec2::ZERO);

    let mut drawer = RecordingDrawer::default();
    vo.draw_debug(&mut drawer);
    assert_eq!(drawer.count_with(BLOCKED_COLOR), 2);
    assert_eq!(drawer.count_with(VELOCITY_COLOR), 1);
    assert!(drawer.count_with(FREE_COLOR) > 0);
}
