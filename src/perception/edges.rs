/// Channel B: enclosed regions between detected edges.
///
/// grayscale → 3×3 blur → Sobel magnitude → Otsu binarisation → dilate ×3,
/// erode ×1 → invert → 4-connected components → spatial merge → candidates.
/// Kept as a low-weight complement to the colour-block channel.
use std::collections::VecDeque;

use crate::perception::canvas::WorkingCanvas;
use crate::perception::color_space::blur3x3;
use crate::perception::types::{Candidate, Channel, Rect};

const DILATE_PASSES: usize = 3;
const ERODE_PASSES: usize = 1;
const MIN_PIXELS: u64 = 15;
const MIN_RECT_FILL: f32 = 0.25;
/// Components closer than this fraction of the shorter side are merged.
const MERGE_GAP_FRAC: f32 = 0.025;
/// A merge may not produce a box larger than this fraction of the canvas.
const MERGE_MAX_AREA_FRAC: f32 = 0.35;
const SIZE_REF_FRAC: f32 = 0.015;
/// Keeps Channel B below Channel A when both see the same element.
const CHANNEL_WEIGHT: f32 = 0.90;

/// Sobel gradient magnitude; the one-pixel border is left at zero.
pub fn sobel_magnitude(field: &[f32], w: usize, h: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; w * h];
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let p = |dx: isize, dy: isize| -> f32 {
                field[(y as isize + dy) as usize * w + (x as isize + dx) as usize]
            };
            let gx = -p(-1, -1) + p(1, -1) - 2.0 * p(-1, 0) + 2.0 * p(1, 0) - p(-1, 1) + p(1, 1);
            let gy = -p(-1, -1) - 2.0 * p(0, -1) - p(1, -1) + p(-1, 1) + 2.0 * p(0, 1) + p(1, 1);
            out[y * w + x] = (gx * gx + gy * gy).sqrt();
        }
    }
    out
}

/// Otsu threshold over non-negative values, returned in value units.
/// An all-zero field returns 0.
pub fn otsu_threshold(values: &[f32]) -> f32 {
    let max = values.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return 0.0;
    }
    let scale = 255.0 / max;
    let mut hist = [0u64; 256];
    for &v in values {
        let bin = (v.max(0.0) * scale).round().min(255.0) as usize;
        hist[bin] += 1;
    }

    let total = values.len() as u64;
    let sum_total: u64 = hist.iter().enumerate().map(|(i, &c)| i as u64 * c).sum();
    let mut sum_b = 0u64;
    let mut w_b = 0u64;
    let mut max_var = 0f64;
    let mut threshold = 0usize;

    for (i, &count) in hist.iter().enumerate() {
        w_b += count;
        if w_b == 0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0 {
            break;
        }
        sum_b += i as u64 * count;
        let m_b = sum_b as f64 / w_b as f64;
        let m_f = (sum_total - sum_b) as f64 / w_f as f64;
        let var_between = (w_b as f64) * (w_f as f64) * (m_b - m_f).powi(2);
        if var_between > max_var {
            max_var = var_between;
            threshold = i;
        }
    }
    (threshold as f32 + 0.5) / scale
}

fn dilate(mask: &[bool], w: usize, h: usize) -> Vec<bool> {
    let mut out = vec![false; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut hit = false;
            'scan: for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    if mask[ny * w + nx] {
                        hit = true;
                        break 'scan;
                    }
                }
            }
            out[y * w + x] = hit;
        }
    }
    out
}

fn erode(mask: &[bool], w: usize, h: usize) -> Vec<bool> {
    let mut out = vec![false; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut all = true;
            'scan: for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    if !mask[ny * w + nx] {
                        all = false;
                        break 'scan;
                    }
                }
            }
            out[y * w + x] = all;
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct Component {
    rect: Rect,
    pixels: u64,
}

/// 4-connected labelling of `true` pixels.
fn connected_components(mask: &[bool], w: usize, h: usize) -> Vec<Component> {
    let mut seen = vec![false; w * h];
    let mut queue = VecDeque::new();
    let mut out = Vec::new();

    for start in 0..w * h {
        if !mask[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        queue.push_back(start);
        let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0usize, 0usize);
        let mut pixels = 0u64;

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % w, idx / w);
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
            pixels += 1;

            let mut visit = |n: usize| {
                if mask[n] && !seen[n] {
                    seen[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < w {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - w);
            }
            if y + 1 < h {
                visit(idx + w);
            }
        }

        out.push(Component {
            rect: Rect::new(x0 as u32, y0 as u32, (x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32),
            pixels,
        });
    }
    out
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Union-find merge of nearby components. Repeats until no pair merges, so
/// groups that grow into each other's reach are joined as well.
fn merge_components(components: Vec<Component>, w: usize, h: usize) -> Vec<Component> {
    let n = components.len();
    let gap_limit = MERGE_GAP_FRAC * w.min(h) as f32;
    let area_limit = MERGE_MAX_AREA_FRAC * (w * h) as f32;
    let mut groups = components;
    let mut parent: Vec<usize> = (0..n).collect();

    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..n {
            for j in i + 1..n {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri == rj {
                    continue;
                }
                let (a, b) = (groups[ri], groups[rj]);
                if (a.rect.gap(&b.rect) as f32) >= gap_limit {
                    continue;
                }
                let merged = a.rect.union(&b.rect);
                if merged.area() as f32 >= area_limit {
                    continue;
                }
                parent[rj] = ri;
                groups[ri] = Component {
                    rect: merged,
                    pixels: a.pixels + b.pixels,
                };
                changed = true;
            }
        }
    }

    (0..n)
        .filter(|&i| find(&mut parent, i) == i)
        .map(|i| groups[i])
        .collect()
}

/// Channel B confidence.
pub fn score(rect_fill: f32, area: u64, image_area: u64) -> f32 {
    let size_score = (area as f32 / (image_area as f32 * SIZE_REF_FRAC)).min(1.0);
    ((0.5 * rect_fill + 0.5 * size_score) * CHANNEL_WEIGHT).clamp(0.0, 1.0)
}

/// Merge nearby components, then keep the merged regions that are large
/// and solid enough. Small fragments count toward their merged region.
fn components_to_candidates(components: Vec<Component>, w: usize, h: usize) -> Vec<Candidate> {
    let image_area = (w * h) as u64;
    merge_components(components, w, h)
        .into_iter()
        .filter(|c| c.pixels >= MIN_PIXELS)
        .filter_map(|c| {
            let rect_fill = c.pixels as f32 / c.rect.area().max(1) as f32;
            if rect_fill < MIN_RECT_FILL {
                return None;
            }
            let confidence = score(rect_fill.min(1.0), c.rect.area(), image_area);
            Some(Candidate::new(c.rect, c.pixels, confidence, Channel::Edge))
        })
        .collect()
}

/// Run Channel B over the canvas.
pub fn detect(canvas: &WorkingCanvas) -> Vec<Candidate> {
    let (w, h) = (canvas.width, canvas.height);
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let blurred = blur3x3(&canvas.grayscale(), w, h);
    let magnitude = sobel_magnitude(&blurred, w, h);
    let threshold = otsu_threshold(&magnitude);
    let mut mask: Vec<bool> = magnitude.iter().map(|&m| m > threshold).collect();
    if !mask.iter().any(|&e| e) {
        tracing::debug!("edge channel found no edges");
        return Vec::new();
    }

    for _ in 0..DILATE_PASSES {
        mask = dilate(&mask, w, h);
    }
    for _ in 0..ERODE_PASSES {
        mask = erode(&mask, w, h);
    }
    let regions: Vec<bool> = mask.iter().map(|&e| !e).collect();

    let components = connected_components(&regions, w, h);
    let component_count = components.len();
    let out = components_to_candidates(components, w, h);

    tracing::debug!(
        threshold = threshold,
        components = component_count,
        candidates = out.len(),
        "edge channel"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::PixelBuffer;

    #[test]
    fn otsu_on_zero_field_is_zero() {
        assert_eq!(otsu_threshold(&[0.0; 64]), 0.0);
    }

    #[test]
    fn otsu_splits_bimodal_values() {
        let mut values = vec![10.0f32; 500];
        values.extend(std::iter::repeat(200.0f32).take(100));
        let t = otsu_threshold(&values);
        assert!(t > 10.0 && t < 200.0, "threshold {t}");
    }

    #[test]
    fn sobel_responds_to_step() {
        let (w, h) = (8, 5);
        let field: Vec<f32> = (0..w * h).map(|i| if i % w < 4 { 0.0 } else { 100.0 }).collect();
        let mag = sobel_magnitude(&field, w, h);
        assert_eq!(mag[2 * w + 1], 0.0);
        assert!(mag[2 * w + 3] > 0.0);
        assert!(mag[2 * w + 4] > 0.0);
        assert_eq!(mag[2 * w + 6], 0.0);
        // Border is never written.
        assert_eq!(mag[3], 0.0);
    }

    #[test]
    fn morphology_closing_is_mild() {
        let (w, h) = (9, 9);
        let mut mask = vec![false; w * h];
        mask[4 * w + 4] = true;
        let grown = dilate(&mask, w, h);
        assert_eq!(grown.iter().filter(|&&v| v).count(), 9);
        let shrunk = erode(&grown, w, h);
        assert_eq!(shrunk.iter().filter(|&&v| v).count(), 1);
    }

    #[test]
    fn merge_respects_gap_and_area_guard() {
        let near = vec![
            Component { rect: Rect::new(10, 10, 10, 10), pixels: 100 },
            Component { rect: Rect::new(22, 10, 10, 10), pixels: 100 },
            Component { rect: Rect::new(150, 150, 10, 10), pixels: 100 },
        ];
        let merged = merge_components(near, 200, 200);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|c| c.rect == Rect::new(10, 10, 22, 10) && c.pixels == 200));

        let huge = vec![
            Component { rect: Rect::new(0, 0, 150, 150), pixels: 20000 },
            Component { rect: Rect::new(151, 0, 40, 190), pixels: 7000 },
        ];
        assert_eq!(merge_components(huge, 200, 200).len(), 2);
    }

    #[test]
    fn fragments_count_after_merging() {
        let parts = vec![
            Component { rect: Rect::new(10, 10, 3, 3), pixels: 9 },
            Component { rect: Rect::new(14, 10, 3, 3), pixels: 9 },
            Component { rect: Rect::new(100, 100, 3, 3), pixels: 9 },
        ];
        let out = components_to_candidates(parts, 200, 200);
        assert_eq!(out.len(), 1, "{out:?}");
        assert_eq!(out[0].rect, Rect::new(10, 10, 7, 3));
        assert_eq!(out[0].pixel_count, 18);
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = PixelBuffer::from_fn(80, 60, |_, _| [128, 64, 32]).unwrap();
        let canvas = WorkingCanvas::from_buffer(&img, 400).unwrap();
        assert!(detect(&canvas).is_empty());
    }

    #[test]
    fn outlined_box_yields_interior_region() {
        let img = PixelBuffer::from_fn(200, 200, |x, y| {
            let inside = (60..140).contains(&x) && (70..130).contains(&y);
            if inside { [240, 240, 240] } else { [20, 20, 20] }
        })
        .unwrap();
        let canvas = WorkingCanvas::from_buffer(&img, 400).unwrap();
        let found = detect(&canvas);
        let target = Rect::new(60, 70, 80, 60);
        assert!(
            found.iter().any(|c| c.rect.iou(&target) > 0.7 && c.channel == Channel::Edge),
            "candidates: {found:?}"
        );
        assert!(found.iter().all(|c| c.confidence <= CHANNEL_WEIGHT));
    }
}
