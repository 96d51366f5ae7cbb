use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bevy::prelude::*;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::math::NavBox;

pub const LAYOUT_VERSION: u32 = 1;

/// Walkable boxes a [`NavMesh`](super::NavMesh) is built from.
#[derive(Resource, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct WalkableLayout {
    pub boxes: Vec<NavBox>,
}

#[derive(Serialize, Deserialize)]
struct LayoutFile {
    version: u32,
    layout: WalkableLayout,
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("layout encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("layout version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("grid of {width}x{height} needs {expected} cells, got {found}")]
    GridSize {
        width: usize,
        height: usize,
        expected: usize,
        found: usize,
    },
}

impl WalkableLayout {
    pub fn new(boxes: Vec<NavBox>) -> Self {
        Self { boxes }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Smallest box holding every walkable box.
    pub fn bounds(&self) -> NavBox {
        let mut bounds = NavBox::EMPTY;
        for b in &self.boxes {
            bounds.absorb(b.min);
            bounds.absorb(b.max);
        }
        bounds
    }

    /// Boxes covering the walkable cells of a row-major occupancy grid.
    ///
    /// Each row is cut into runs of walkable cells, then runs spanning the
    /// same columns in consecutive rows are stacked into one rectangle.
    /// Cell `(x, y)` covers `origin + (x, y) * cell_size` to one cell further.
    pub fn from_grid(
        width: usize,
        height: usize,
        walkable: &[bool],
        cell_size: f32,
        origin: Vec2,
    ) -> Result<Self, LayoutError> {
        let expected = width * height;
        if walkable.len() != expected {
            return Err(LayoutError::GridSize {
                width,
                height,
                expected,
                found: walkable.len(),
            });
        }

        let strips = find_horizontal_strips(width, height, walkable);
        let boxes: Vec<NavBox> = merge_strips_into_rectangles(&strips)
            .into_iter()
            .map(|(x_start, x_end, y_min, y_max)| {
                NavBox::from_origin_size(
                    origin + Vec2::new(x_start as f32, y_min as f32) * cell_size,
                    Vec2::new((x_end + 1 - x_start) as f32, (y_max + 1 - y_min) as f32) * cell_size,
                )
            })
            .collect();

        debug!(
            "[LAYOUT] {}x{} grid: {} strips merged into {} boxes",
            width,
            height,
            strips.len(),
            boxes.len()
        );
        Ok(Self { boxes })
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), LayoutError> {
        let mut encoder = ZlibEncoder::new(writer, Compression::default());
        let file = LayoutFile {
            version: LAYOUT_VERSION,
            layout: self.clone(),
        };
        bincode::serialize_into(&mut encoder, &file)?;
        encoder.finish()?.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, LayoutError> {
        let mut decoder = ZlibDecoder::new(reader);
        let file: LayoutFile = bincode::deserialize_from(&mut decoder)?;
        if file.version != LAYOUT_VERSION {
            return Err(LayoutError::VersionMismatch {
                found: file.version,
                expected: LAYOUT_VERSION,
            });
        }
        Ok(file.layout)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LayoutError> {
        let path = path.as_ref();
        self.write_to(BufWriter::new(File::create(path)?))?;
        info!("[LAYOUT] Saved {} boxes to {}", self.boxes.len(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let layout = Self::read_from(BufReader::new(File::open(path)?))?;
        info!("[LAYOUT] Loaded {} boxes from {}", layout.boxes.len(), path.display());
        Ok(layout)
    }
}

/// Runs of walkable cells per row, as `(y, x_start, x_end)` with `x_end` inclusive.
fn find_horizontal_strips(width: usize, height: usize, walkable: &[bool]) -> Vec<(usize, usize, usize)> {
    let mut strips = Vec::new();

    for y in 0..height {
        let mut strip_start: Option<usize> = None;

        for x in 0..=width {
            let is_walkable = x < width && walkable[y * width + x];

            match (strip_start, is_walkable) {
                (None, true) => strip_start = Some(x),
                (Some(start), false) => {
                    strips.push((y, start, x - 1));
                    strip_start = None;
                }
                _ => {}
            }
        }
    }

    strips
}

/// Stack strips with identical column spans in consecutive rows.
///
/// Returns `(x_start, x_end, y_min, y_max)`, all inclusive.
fn merge_strips_into_rectangles(strips: &[(usize, usize, usize)]) -> Vec<(usize, usize, usize, usize)> {
    let mut rectangles = Vec::new();
    let mut used = vec![false; strips.len()];

    for i in 0..strips.len() {
        if used[i] {
            continue;
        }
        used[i] = true;

        let (y, x_start, x_end) = strips[i];
        let mut y_max = y;

        for j in (i + 1)..strips.len() {
            let (other_y, other_start, other_end) = strips[j];
            if other_y > y_max + 1 {
                break;
            }
            if !used[j] && other_y == y_max + 1 && other_start == x_start && other_end == x_end {
                y_max = other_y;
                used[j] = true;
            }
        }

        rectangles.push((x_start, x_end, y, y_max));
    }

    rectangles
}
