/// Region splitter: subdivides oversized boxes along gradient bands.
///
/// A large flat region can hold several adjacent controls (a button row on a
/// panel). Column and row gradient projections inside the box expose the
/// edges between them; the box is sliced along whichever axis shows more
/// separators and each slice is tightened to its own content.
use crate::perception::postprocess::passes_area_and_side;
use crate::perception::types::{Candidate, Rect};

/// Boxes larger than this share of the canvas are split.
pub const SPLIT_AREA_FRAC: f32 = 0.08;
const EDGE_MARGIN_FRAC: f32 = 0.10;
const BAND_LIFT: f32 = 0.15;
const MIN_CUT_SPACING_FRAC: f32 = 0.08;
const MIN_SLICE_FRAC: f32 = 0.08;
const CHILD_DECAY: f32 = 0.95;
const MAX_DEPTH: usize = 3;
/// Gray-level step that counts as content when tightening a slice.
const CONTENT_GRADIENT: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Cut lines run horizontally; slices are stacked rows.
    Horizontal,
    /// Cut lines run vertically; slices sit side by side.
    Vertical,
}

/// Per-pixel `|Δx| + |Δy|` restricted to the inside of `rect`.
struct LocalGradient {
    w: usize,
    h: usize,
    g: Vec<f32>,
}

impl LocalGradient {
    fn new(gray: &[f32], canvas_w: usize, rect: &Rect) -> Self {
        let (w, h) = (rect.w as usize, rect.h as usize);
        let (x0, y0) = (rect.x as usize, rect.y as usize);
        let mut g = vec![0.0f32; w * h];
        for ly in 0..h {
            for lx in 0..w {
                let at = |dx: usize, dy: usize| gray[(y0 + ly + dy) * canvas_w + x0 + lx + dx];
                let here = at(0, 0);
                let mut v = 0.0;
                if lx + 1 < w {
                    v += (at(1, 0) - here).abs();
                }
                if ly + 1 < h {
                    v += (at(0, 1) - here).abs();
                }
                g[ly * w + lx] = v;
            }
        }
        Self { w, h, g }
    }

    fn column_profile(&self) -> Vec<f32> {
        let mut p = vec![0.0f32; self.w];
        for ly in 0..self.h {
            for lx in 0..self.w {
                p[lx] += self.g[ly * self.w + lx];
            }
        }
        p.iter_mut().for_each(|v| *v /= self.h as f32);
        p
    }

    fn row_profile(&self) -> Vec<f32> {
        (0..self.h)
            .map(|ly| self.g[ly * self.w..(ly + 1) * self.w].iter().sum::<f32>() / self.w as f32)
            .collect()
    }

    /// Bounding box (local coordinates) of content pixels inside the window.
    fn content_bounds(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Option<Rect> {
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (usize::MAX, usize::MAX, 0usize, 0usize);
        for ly in y0..y1 {
            for lx in x0..x1 {
                if self.g[ly * self.w + lx] >= CONTENT_GRADIENT {
                    min_x = min_x.min(lx);
                    min_y = min_y.min(ly);
                    max_x = max_x.max(lx);
                    max_y = max_y.max(ly);
                }
            }
        }
        if min_x == usize::MAX {
            return None;
        }
        Some(Rect::new(
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        ))
    }
}

/// Cut positions along a 1-D gradient profile.
///
/// The outer margin is ignored; runs above `mean + 0.15·(max − mean)` form
/// separator bands; bands closer than the minimum spacing are fused so a
/// narrow gap between two edges yields a single cut at its centre.
pub fn find_cuts(profile: &[f32]) -> Vec<usize> {
    let n = profile.len();
    let margin = (n as f32 * EDGE_MARGIN_FRAC).floor() as usize;
    if n < 3 || n <= 2 * margin {
        return Vec::new();
    }
    let inner = &profile[margin..n - margin];
    let mean = inner.iter().sum::<f32>() / inner.len() as f32;
    let max = inner.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !(max - mean > 1e-6) {
        return Vec::new();
    }
    let threshold = mean + (max - mean) * BAND_LIFT;
    let min_spacing = (n as f32 * MIN_CUT_SPACING_FRAC).max(1.0);

    let mut bands: Vec<(usize, usize)> = Vec::new();
    let mut run_start: Option<usize> = None;
    for i in margin..=n - margin {
        let above = i < n - margin && profile[i] > threshold;
        match (above, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                let band = (s, i - 1);
                match bands.last_mut() {
                    Some(last) if ((band.0 - last.1) as f32) < min_spacing => last.1 = band.1,
                    _ => bands.push(band),
                }
                run_start = None;
            }
            _ => {}
        }
    }

    let mut cuts: Vec<usize> = Vec::with_capacity(bands.len());
    for (s, e) in bands {
        let mid = (s + e) / 2;
        match cuts.last() {
            Some(&prev) if ((mid - prev) as f32) < min_spacing => {}
            _ => cuts.push(mid),
        }
    }
    cuts
}

/// Try to subdivide one candidate. Returns `None` when fewer than two valid
/// children come out.
pub fn try_split(candidate: &Candidate, gray: &[f32], w: usize, h: usize) -> Option<Vec<Candidate>> {
    let rect = candidate.rect;
    if rect.w < 3 || rect.h < 3 {
        return None;
    }
    let grad = LocalGradient::new(gray, w, &rect);
    let row_cuts = find_cuts(&grad.row_profile());
    let col_cuts = find_cuts(&grad.column_profile());
    if row_cuts.is_empty() && col_cuts.is_empty() {
        return None;
    }
    let (axis, cuts, extent) = if row_cuts.len() >= col_cuts.len() {
        (Axis::Horizontal, row_cuts, grad.h)
    } else {
        (Axis::Vertical, col_cuts, grad.w)
    };

    let min_slice = extent as f32 * MIN_SLICE_FRAC;
    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(0);
    bounds.extend(cuts);
    bounds.push(extent);

    let mut children = Vec::new();
    for pair in bounds.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if ((b - a) as f32) < min_slice {
            continue;
        }
        let window = match axis {
            Axis::Horizontal => grad.content_bounds(0, a, grad.w, b),
            Axis::Vertical => grad.content_bounds(a, 0, b, grad.h),
        };
        let Some(local) = window else { continue };
        let child_rect = Rect::new(rect.x + local.x, rect.y + local.y, local.w, local.h);
        if !passes_area_and_side(&child_rect, w, h) {
            continue;
        }
        let pixel_count = (child_rect.area() as f32 * candidate.rect_fill).round() as u64;
        children.push(Candidate::new(
            child_rect,
            pixel_count,
            candidate.confidence * CHILD_DECAY,
            candidate.channel,
        ));
    }

    tracing::debug!(
        x = rect.x,
        y = rect.y,
        w = rect.w,
        h = rect.h,
        axis = ?axis,
        children = children.len(),
        "split attempt"
    );
    (children.len() >= 2).then_some(children)
}

fn split_into(candidate: Candidate, gray: &[f32], w: usize, h: usize, depth: usize, out: &mut Vec<Candidate>) {
    let oversized = candidate.area() as f32 > SPLIT_AREA_FRAC * (w * h) as f32;
    if !oversized || depth >= MAX_DEPTH {
        out.push(candidate);
        return;
    }
    match try_split(&candidate, gray, w, h) {
        Some(children) => {
            for child in children {
                split_into(child, gray, w, h, depth + 1, out);
            }
        }
        None => out.push(candidate),
    }
}

/// Replace every oversized candidate by its split children where splitting
/// succeeds; other candidates pass through unchanged.
pub fn split_oversized(candidates: Vec<Candidate>, gray: &[f32], w: usize, h: usize) -> Vec<Candidate> {
    let mut out = Vec::with_capacity(candidates.len());
    for c in candidates {
        split_into(c, gray, w, h, 0, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::Channel;

    const W: usize = 400;
    const H: usize = 200;

    /// Gray plane: 300x100 panel at (50, 50) with buttons at x 115..195 and
    /// 205..285, y 85..115.
    fn panel_with_buttons() -> Vec<f32> {
        let mut g = vec![30.0f32; W * H];
        for y in 50..150 {
            for x in 50..350 {
                let button = (85..115).contains(&y) && ((115..195).contains(&x) || (205..285).contains(&x));
                g[y * W + x] = if button { 180.0 } else { 95.0 };
            }
        }
        g
    }

    fn panel_candidate() -> Candidate {
        Candidate::new(Rect::new(50, 50, 300, 100), 25000, 0.9, Channel::ColorBlock)
    }

    #[test]
    fn cuts_fuse_close_bands() {
        let mut profile = vec![0.0f32; 300];
        for &i in &[64usize, 144, 154, 234] {
            profile[i] = 30.0;
        }
        assert_eq!(find_cuts(&profile), vec![64, 149, 234]);
    }

    #[test]
    fn flat_profile_has_no_cuts() {
        assert!(find_cuts(&[5.0; 50]).is_empty());
        assert!(find_cuts(&[]).is_empty());
    }

    #[test]
    fn margin_bands_are_ignored() {
        let mut profile = vec![0.0f32; 100];
        profile[3] = 50.0;
        profile[97] = 50.0;
        profile[50] = 10.0;
        assert_eq!(find_cuts(&profile), vec![50]);
    }

    #[test]
    fn panel_splits_into_buttons() {
        let gray = panel_with_buttons();
        let children = try_split(&panel_candidate(), &gray, W, H).expect("split");
        assert_eq!(children.len(), 2);
        let b1 = Rect::new(115, 85, 80, 30);
        let b2 = Rect::new(205, 85, 80, 30);
        assert!(children.iter().any(|c| c.rect.iou(&b1) > 0.8), "{children:?}");
        assert!(children.iter().any(|c| c.rect.iou(&b2) > 0.8), "{children:?}");
        assert!(children.iter().all(|c| (c.confidence - 0.9 * 0.95).abs() < 1e-6));
    }

    #[test]
    fn flat_box_is_kept_whole() {
        let gray = vec![80.0f32; W * H];
        let c = panel_candidate();
        assert!(try_split(&c, &gray, W, H).is_none());
        assert_eq!(split_oversized(vec![c.clone()], &gray, W, H), vec![c]);
    }

    #[test]
    fn wide_children_are_split_again() {
        // Two rows of two 130x35 buttons. The first pass cuts the rows
        // (each still > 8 % of the canvas), the second cuts each row in two.
        let buttons = [
            Rect::new(50, 45, 130, 35),
            Rect::new(220, 45, 130, 35),
            Rect::new(50, 120, 130, 35),
            Rect::new(220, 120, 130, 35),
        ];
        let mut gray = vec![95.0f32; W * H];
        for b in &buttons {
            for y in b.y..b.bottom() {
                for x in b.x..b.right() {
                    gray[y as usize * W + x as usize] = 180.0;
                }
            }
        }
        let panel = Candidate::new(Rect::new(20, 20, 360, 160), 50000, 0.9, Channel::ColorBlock);

        let first = try_split(&panel, &gray, W, H).expect("row split");
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|c| c.area() as f32 > SPLIT_AREA_FRAC * (W * H) as f32));

        let out = split_oversized(vec![panel], &gray, W, H);
        assert_eq!(out.len(), 4, "{out:?}");
        for b in &buttons {
            assert!(out.iter().any(|c| c.rect.iou(b) > 0.8), "{b:?} not found in {out:?}");
        }
        assert!(out.iter().all(|c| (c.confidence - 0.9 * 0.95 * 0.95).abs() < 1e-5));
    }

    #[test]
    fn small_boxes_pass_through() {
        let gray = panel_with_buttons();
        let small = Candidate::new(Rect::new(115, 85, 80, 30), 2400, 0.8, Channel::Edge);
        assert_eq!(split_oversized(vec![small.clone()], &gray, W, H), vec![small]);
    }
}
