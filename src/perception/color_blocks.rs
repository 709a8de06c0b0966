/// Channel A: flat-color region detection by tile clustering.
///
/// The canvas is cut into BLOCK×BLOCK tiles. Tiles with little internal
/// variation seed a 4-connected region grow that only absorbs neighbours of
/// near-identical mean colour. Clusters that are rectangular, internally
/// uniform and clearly distinct from their surroundings become candidates.
use std::collections::VecDeque;

use crate::perception::canvas::WorkingCanvas;
use crate::perception::color_space::rgb_distance;
use crate::perception::types::{Candidate, Channel, Rect};

pub const BLOCK: usize = 5;

/// Minimum tile grid on each axis; smaller canvases yield no candidates.
const MIN_GRID: usize = 4;
const SEED_VAR: f32 = 40.0;
const JOIN_VAR: f32 = 70.0;
const JOIN_DIST_FLAT: f32 = 28.0;
const JOIN_DIST_TEXTURED: f32 = 18.0;
const MIN_TILES: usize = 4;
const MIN_RECT_FILL: f32 = 0.35;
const MIN_ASPECT: f32 = 0.2;
const MAX_ASPECT: f32 = 5.0;
const UNIFORMITY_SCALE: f32 = 60.0;
const CONTRAST_SCALE: f32 = 50.0;
const MIN_BORDER_CONTRAST: f32 = 0.18;

const UNASSIGNED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Tile {
    mean: [f32; 3],
    /// Combined RGB standard deviation, `sqrt(var_r + var_g + var_b)`.
    var: f32,
}

struct TileGrid {
    cols: usize,
    rows: usize,
    tiles: Vec<Tile>,
}

impl TileGrid {
    fn build(canvas: &WorkingCanvas) -> Self {
        let cols = canvas.width / BLOCK;
        let rows = canvas.height / BLOCK;
        let n = (BLOCK * BLOCK) as f32;
        let mut tiles = Vec::with_capacity(cols * rows);
        for by in 0..rows {
            for bx in 0..cols {
                let mut sum = [0.0f32; 3];
                let mut sq = [0.0f32; 3];
                for y in by * BLOCK..(by + 1) * BLOCK {
                    for x in bx * BLOCK..(bx + 1) * BLOCK {
                        let p = canvas.rgb(x, y);
                        for c in 0..3 {
                            let v = p[c] as f32;
                            sum[c] += v;
                            sq[c] += v * v;
                        }
                    }
                }
                let mean = [sum[0] / n, sum[1] / n, sum[2] / n];
                let var: f32 = (0..3).map(|c| (sq[c] / n - mean[c] * mean[c]).max(0.0)).sum();
                tiles.push(Tile { mean, var: var.sqrt() });
            }
        }
        Self { cols, rows, tiles }
    }

    fn neighbours(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let (bx, by) = (idx % self.cols, idx / self.cols);
        let left = (bx > 0).then(|| idx - 1);
        let right = (bx + 1 < self.cols).then(|| idx + 1);
        let up = (by > 0).then(|| idx - self.cols);
        let down = (by + 1 < self.rows).then(|| idx + self.cols);
        [left, right, up, down].into_iter().flatten()
    }
}

/// Joining threshold between two adjacent tiles: tight when either is
/// textured so text and ornament don't bleed into flat fills.
fn join_threshold(a: &Tile, b: &Tile) -> f32 {
    if a.var <= SEED_VAR && b.var <= SEED_VAR {
        JOIN_DIST_FLAT
    } else {
        JOIN_DIST_TEXTURED
    }
}

/// Channel A confidence from normalised shape and contrast features.
pub fn score(rect_fill: f32, uniformity: f32, border_contrast: f32, aspect: f32, area_ratio: f32) -> f32 {
    let shape_bonus = if (1.2..=4.0).contains(&aspect) && (0.005..=0.08).contains(&area_ratio) {
        0.10
    } else {
        0.0
    };
    (0.20 * rect_fill + 0.20 * uniformity + 0.50 * border_contrast + shape_bonus + 0.10).clamp(0.0, 1.0)
}

fn grow_clusters(grid: &TileGrid) -> (Vec<u32>, Vec<Vec<usize>>) {
    let mut owner = vec![UNASSIGNED; grid.tiles.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..grid.tiles.len() {
        if owner[seed] != UNASSIGNED || grid.tiles[seed].var > SEED_VAR {
            continue;
        }
        let id = clusters.len() as u32;
        owner[seed] = id;
        let mut members = vec![seed];
        queue.push_back(seed);

        while let Some(cur) = queue.pop_front() {
            let cur_tile = grid.tiles[cur];
            for nb in grid.neighbours(cur) {
                if owner[nb] != UNASSIGNED {
                    continue;
                }
                let nb_tile = grid.tiles[nb];
                if nb_tile.var > JOIN_VAR {
                    continue;
                }
                if rgb_distance(cur_tile.mean, nb_tile.mean) < join_threshold(&cur_tile, &nb_tile) {
                    owner[nb] = id;
                    members.push(nb);
                    queue.push_back(nb);
                }
            }
        }
        clusters.push(members);
    }
    (owner, clusters)
}

/// Run Channel A over the canvas.
pub fn detect(canvas: &WorkingCanvas) -> Vec<Candidate> {
    let grid = TileGrid::build(canvas);
    if grid.cols < MIN_GRID || grid.rows < MIN_GRID {
        tracing::debug!(cols = grid.cols, rows = grid.rows, "canvas too small for block clustering");
        return Vec::new();
    }

    let (owner, clusters) = grow_clusters(&grid);
    let image_area = canvas.area() as f32;
    let mut out = Vec::new();

    for (id, members) in clusters.iter().enumerate() {
        if members.len() < MIN_TILES {
            continue;
        }
        let id = id as u32;

        let (mut min_bx, mut min_by) = (usize::MAX, usize::MAX);
        let (mut max_bx, mut max_by) = (0usize, 0usize);
        let mut var_sum = 0.0f32;
        for &t in members {
            let (bx, by) = (t % grid.cols, t / grid.cols);
            min_bx = min_bx.min(bx);
            min_by = min_by.min(by);
            max_bx = max_bx.max(bx);
            max_by = max_by.max(by);
            var_sum += grid.tiles[t].var;
        }
        let span_x = max_bx - min_bx + 1;
        let span_y = max_by - min_by + 1;
        let rect_fill = members.len() as f32 / (span_x * span_y) as f32;
        if rect_fill < MIN_RECT_FILL {
            continue;
        }
        let rect = Rect::new(
            (min_bx * BLOCK) as u32,
            (min_by * BLOCK) as u32,
            (span_x * BLOCK) as u32,
            (span_y * BLOCK) as u32,
        );
        let aspect = rect.aspect();
        if !(MIN_ASPECT..=MAX_ASPECT).contains(&aspect) {
            continue;
        }

        let uniformity = (1.0 - (var_sum / members.len() as f32) / UNIFORMITY_SCALE).max(0.0);

        let mut edge_dist = 0.0f32;
        let mut edges = 0u32;
        for &t in members {
            for nb in grid.neighbours(t) {
                if owner[nb] != id {
                    edge_dist += rgb_distance(grid.tiles[t].mean, grid.tiles[nb].mean);
                    edges += 1;
                }
            }
        }
        let border_contrast = if edges == 0 {
            0.0
        } else {
            (edge_dist / edges as f32 / CONTRAST_SCALE).clamp(0.0, 1.0)
        };
        if border_contrast < MIN_BORDER_CONTRAST {
            continue;
        }

        let area_ratio = rect.area() as f32 / image_area;
        let confidence = score(rect_fill, uniformity, border_contrast, aspect, area_ratio);
        out.push(Candidate::new(
            rect,
            (members.len() * BLOCK * BLOCK) as u64,
            confidence,
            Channel::ColorBlock,
        ));
    }

    tracing::debug!(clusters = clusters.len(), candidates = out.len(), "color-block channel");
    out
}
