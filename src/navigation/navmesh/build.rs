use bevy::prelude::*;
use kestrel_macros::profile;
use smallvec::SmallVec;
use union_find::{QuickUnionUf, UnionBySize, UnionFind};

use super::walls::compute_walls;
use super::{
    BoxIndex, Face, FaceId, NavComponent, NavMesh, NavMeshError, Portal, PortalId,
    PortalLink,
};
use crate::navigation::config::NavMeshSettings;
use crate::navigation::math::{NavBox, Segment};

/// Portal found between two input boxes, before components are split out.
struct PortalNode {
    boxes: [usize; 2],
    segment: Segment,
}

impl NavMesh {
    /// Build the mesh from walkable boxes.
    ///
    /// Boxes are expected not to overlap. Every pair sharing a border of
    /// positive length gets one portal; boxes without any portal become
    /// single-face components enclosed by four walls.
    #[profile]
    pub fn build(boxes: &[NavBox], settings: &NavMeshSettings) -> Result<NavMesh, NavMeshError> {
        if boxes.is_empty() {
            return Err(NavMeshError::EmptyInput);
        }
        if let Some(index) = boxes.iter().position(|b| !b.is_valid()) {
            return Err(NavMeshError::InvalidBox {
                index,
                bounds: boxes[index],
            });
        }
        let mut extent = NavBox::EMPTY;
        for (index, b) in boxes.iter().enumerate() {
            extent.absorb(b.min);
            extent.absorb(b.max);
            if !extent.size().is_finite() {
                return Err(NavMeshError::InvalidBox { index, bounds: *b });
            }
        }

        let tolerance = settings.touch_tolerance;
        let box_index = BoxIndex::build(boxes, settings.index_cell_size);

        // 1. Portals between touching boxes, each pair seen once
        let mut nodes: Vec<PortalNode> = Vec::new();
        let mut box_portals: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); boxes.len()];
        let mut candidates = Vec::new();

        for (i, bounds) in boxes.iter().enumerate() {
            box_index.query_box(&bounds.expanded(tolerance.max(f32::EPSILON)), &mut candidates);
            for &j in candidates.iter().filter(|&&j| j > i) {
                let Some(segment) = bounds.touch(&boxes[j], tolerance) else {
                    continue;
                };
                if segment.is_degenerate(tolerance) {
                    continue;
                }
                box_portals[i].push(nodes.len());
                box_portals[j].push(nodes.len());
                nodes.push(PortalNode {
                    boxes: [i, j],
                    segment,
                });
            }
        }

        // 2. Components of the portal graph: portals bounding the same box are joined
        let mut sets: QuickUnionUf<UnionBySize> = QuickUnionUf::new(nodes.len());
        for portals in &box_portals {
            for pair in portals.windows(2) {
                sets.union(pair[0], pair[1]);
            }
        }

        // 3. Split faces and portals into components, keeping input order
        let mut components: Vec<NavComponent> = Vec::new();
        let mut component_of_root: Vec<Option<u32>> = vec![None; nodes.len()];
        let mut face_slot: Vec<(u32, u32)> = Vec::with_capacity(boxes.len());

        for (box_id, bounds) in boxes.iter().enumerate() {
            let component = match box_portals[box_id].first() {
                Some(&portal) => {
                    let root = sets.find(portal);
                    match component_of_root[root] {
                        Some(component) => component,
                        None => {
                            let component = components.len() as u32;
                            component_of_root[root] = Some(component);
                            components.push(empty_component());
                            component
                        }
                    }
                }
                None => {
                    components.push(empty_component());
                    (components.len() - 1) as u32
                }
            };

            let faces = &mut components[component as usize].faces;
            face_slot.push((component, faces.len() as u32));
            faces.push(Face {
                bounds: *bounds,
                portals: SmallVec::new(),
                walls: SmallVec::new(),
                has_side: [false; 4],
                walled: [false; 4],
                source_index: box_id,
            });
        }

        for node in &nodes {
            let (component, face_a) = face_slot[node.boxes[0]];
            let (_, face_b) = face_slot[node.boxes[1]];
            let target = &mut components[component as usize];
            let portal_id = PortalId(target.portals.len() as u32);

            target.faces[face_a as usize].portals.push(portal_id);
            target.faces[face_b as usize].portals.push(portal_id);
            target.portals.push(Portal {
                faces: [FaceId(face_a), FaceId(face_b)],
                segment: node.segment,
                links_start: 0,
                links_end: 0,
            });
        }

        // 4. Per-component adjacency arena, walls and face index
        for component in &mut components {
            link_portals(component);
            for face in &mut component.faces {
                compute_walls(face, &component.portals, tolerance);
            }
            let face_boxes: Vec<NavBox> = component.faces.iter().map(|face| face.bounds).collect();
            component.face_index = BoxIndex::build(&face_boxes, settings.index_cell_size);
        }

        let wall_count: usize = components
            .iter()
            .flat_map(|component| component.faces.iter())
            .map(|face| face.walls.len())
            .sum();
        info!(
            "[NAVMESH] Built {} faces, {} portals, {} walls in {} components",
            boxes.len(),
            nodes.len(),
            wall_count,
            components.len()
        );

        Ok(NavMesh {
            components,
            settings: settings.clone(),
        })
    }
}

fn empty_component() -> NavComponent {
    NavComponent {
        faces: Vec::new(),
        portals: Vec::new(),
        links: Vec::new(),
        face_index: BoxIndex::default(),
    }
}

/// Link every portal to every other portal of its two faces.
fn link_portals(component: &mut NavComponent) {
    component.links.clear();
    for portal_index in 0..component.portals.len() {
        let start = component.links.len() as u32;
        let portal = &component.portals[portal_index];
        let origin = portal.midpoint();

        for face in portal.faces {
            for &other in &component.faces[face.index()].portals {
                if other.index() == portal_index {
                    continue;
                }
                let weight = origin.distance(component.portals[other.index()].midpoint());
                component.links.push(PortalLink {
                    target: other,
                    weight,
                });
            }
        }

        let end = component.links.len() as u32;
        let portal = &mut component.portals[portal_index];
        portal.links_start = start;
        portal.links_end = end;
    }
}
