use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use kestrel_macros::profile;

use super::{ComponentId, FaceId, NavComponent, NavMesh, PortalId, Side};
use crate::navigation::debug::{DebugDrawer, PATH_COLOR};
use crate::navigation::math::safe_normalize;

/// What the search should do after a portal is dequeued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchControl {
    Continue,
    Stop,
}

/// One portal crossing along a path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathStep {
    pub portal: PortalId,
    pub from_face: FaceId,
    pub to_face: FaceId,
    /// Unit direction to move in while crossing.
    pub direction: Vec2,
}

/// Portal sequence from a start face to a goal face. Empty when both points
/// share a face.
#[derive(Clone, Debug, PartialEq)]
pub struct NavPath {
    pub component: ComponentId,
    pub start: Vec2,
    pub goal: Vec2,
    pub start_face: FaceId,
    pub goal_face: FaceId,
    pub steps: Vec<PathStep>,
}

impl NavPath {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn portals(&self) -> impl Iterator<Item = PortalId> + '_ {
        self.steps.iter().map(|step| step.portal)
    }

    /// Faces visited, start face first and goal face last.
    pub fn faces(&self) -> Vec<FaceId> {
        let mut faces = Vec::with_capacity(self.steps.len() + 1);
        faces.push(self.start_face);
        faces.extend(self.steps.iter().map(|step| step.to_face));
        faces
    }

    /// Portal midpoints followed by the goal.
    pub fn waypoints(&self, mesh: &NavMesh) -> Vec<Vec2> {
        let mut points = Vec::with_capacity(self.steps.len() + 1);
        if let Some(component) = mesh.component(self.component) {
            points.extend(
                self.steps
                    .iter()
                    .filter_map(|step| component.portal(step.portal))
                    .map(|portal| portal.midpoint()),
            );
        }
        points.push(self.goal);
        points
    }

    /// Polyline from the start through every waypoint.
    pub fn draw_debug<D: DebugDrawer + ?Sized>(&self, mesh: &NavMesh, drawer: &mut D) {
        let mut previous = self.start;
        for point in self.waypoints(mesh) {
            drawer.line(previous, point, PATH_COLOR);
            previous = point;
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f32,
    portal: u32,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost, portal id breaks ties deterministically
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.portal.cmp(&self.portal))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* over the portal graph of one component.
///
/// Every `(portal, cost)` in `seeds` starts the search. `visit` is called
/// each time a portal is dequeued; returning [`SearchControl::Stop`] ends the
/// search with that portal. Returns the chain of portals from a seed to the
/// stopping portal.
pub(crate) fn search_portals<V>(
    component: &NavComponent,
    seeds: &[(PortalId, f32)],
    goal: Vec2,
    max_iterations: usize,
    mut visit: V,
) -> Option<Vec<PortalId>>
where
    V: FnMut(PortalId) -> SearchControl,
{
    let count = component.portals.len();
    let mut g_score = vec![f32::INFINITY; count];
    let mut came_from: Vec<Option<u32>> = vec![None; count];
    let mut closed = FixedBitSet::with_capacity(count);
    let mut open = BinaryHeap::new();

    for &(portal, cost) in seeds {
        let Some(node) = component.portal(portal) else {
            continue;
        };
        if cost < g_score[portal.index()] {
            g_score[portal.index()] = cost;
            open.push(State {
                cost: cost + node.midpoint().distance(goal),
                portal: portal.0,
            });
        }
    }

    let mut iterations = 0;
    while let Some(State { portal, .. }) = open.pop() {
        let current = portal as usize;
        if closed.contains(current) {
            continue;
        }
        closed.insert(current);

        if visit(PortalId(portal)) == SearchControl::Stop {
            return reconstruct_path(&came_from, portal);
        }

        iterations += 1;
        if iterations > max_iterations {
            error!(
                "[PATHFINDING] A* exceeded {} iterations over {} portals",
                max_iterations, count
            );
            return None;
        }

        for link in component.links(PortalId(portal)) {
            let next = link.target.index();
            if closed.contains(next) {
                continue;
            }
            let tentative = g_score[current] + link.weight;
            if tentative < g_score[next] {
                g_score[next] = tentative;
                came_from[next] = Some(portal);
                let heuristic = component.portals[next].midpoint().distance(goal);
                open.push(State {
                    cost: tentative + heuristic,
                    portal: link.target.0,
                });
            }
        }
    }

    None
}

fn reconstruct_path(came_from: &[Option<u32>], last: u32) -> Option<Vec<PortalId>> {
    let mut path = vec![PortalId(last)];
    let mut current = last;
    while let Some(previous) = came_from[current as usize] {
        if path.len() > came_from.len() {
            error!("[PATHFINDING] Predecessor cycle while rebuilding path");
            return None;
        }
        path.push(PortalId(previous));
        current = previous;
    }
    path.reverse();
    Some(path)
}

impl NavMesh {
    /// Shortest portal path from `start` to `goal`.
    ///
    /// `None` when either point is off the mesh or the two lie in different
    /// components. Same-face queries succeed with an empty path.
    #[profile]
    pub fn find_path(&self, start: Vec2, goal: Vec2) -> Option<NavPath> {
        let start_found = self.find_face(start)?;
        let goal_found = self.find_face(goal)?;

        let mut path = NavPath {
            component: start_found.component,
            start,
            goal,
            start_face: start_found.face,
            goal_face: goal_found.face,
            steps: Vec::new(),
        };

        if start_found == goal_found {
            return Some(path);
        }
        if start_found.component != goal_found.component {
            debug!(
                "[PATHFINDING] {:?} and {:?} are in different components",
                start, goal
            );
            return None;
        }

        let component = self.component(start_found.component)?;
        let start_face = component.face(start_found.face)?;
        if start_face.portals.is_empty() {
            warn!("[PATHFINDING] Start face {:?} has no portals", start_found.face);
            return None;
        }

        let seeds: Vec<(PortalId, f32)> = start_face
            .portals
            .iter()
            .filter_map(|&id| component.portal(id).map(|p| (id, p.midpoint().distance(start))))
            .collect();

        let goal_face = goal_found.face;
        let mut portals = search_portals(
            component,
            &seeds,
            goal,
            self.settings.max_search_iterations,
            |portal| match component.portal(portal) {
                Some(node) if node.touches(goal_face) => SearchControl::Stop,
                _ => SearchControl::Continue,
            },
        )?;

        trim_path(component, &mut portals, start_found.face, goal_face);
        path.steps = self.crossing_steps(component, &portals, start_found.face, goal_face, goal)?;
        Some(path)
    }

    /// Faces and crossing directions for a portal chain.
    fn crossing_steps(
        &self,
        component: &NavComponent,
        portals: &[PortalId],
        start_face: FaceId,
        goal_face: FaceId,
        goal: Vec2,
    ) -> Option<Vec<PathStep>> {
        let tolerance = self.settings.goal_tolerance;
        let mut steps = Vec::with_capacity(portals.len());
        let mut current = start_face;

        for &id in portals {
            let portal = component.portal(id)?;
            let Some(next) = portal.other_face(current) else {
                error!(
                    "[PATHFINDING] Portal {:?} does not border face {:?}, broken chain",
                    id, current
                );
                return None;
            };

            let direction = if goal.distance(portal.midpoint()) < tolerance {
                safe_normalize(portal.segment.start - portal.segment.end)
            } else {
                let from_bounds = component.face(current)?.bounds;
                match Side::of_segment(&from_bounds, &portal.segment, self.settings.touch_tolerance) {
                    Some(side) => side.outward(),
                    None => Vec2::ZERO,
                }
            };

            steps.push(PathStep {
                portal: id,
                from_face: current,
                to_face: next,
                direction,
            });
            current = next;
        }

        if current != goal_face {
            error!(
                "[PATHFINDING] Portal chain ends in {:?} instead of goal face {:?}",
                current, goal_face
            );
            return None;
        }
        Some(steps)
    }
}

/// Drop a first portal the start face shares with the second one, and a
/// last portal the goal face shares with the one before it.
fn trim_path(component: &NavComponent, portals: &mut Vec<PortalId>, start_face: FaceId, goal_face: FaceId) {
    let common = |a: PortalId, b: PortalId| {
        let a = component.portal(a)?;
        let b = component.portal(b)?;
        a.common_face(b)
    };

    if portals.len() >= 2 && common(portals[0], portals[1]) == Some(start_face) {
        portals.remove(0);
    }
    let len = portals.len();
    if len >= 2 && common(portals[len - 2], portals[len - 1]) == Some(goal_face) {
        portals.pop();
    }
}
