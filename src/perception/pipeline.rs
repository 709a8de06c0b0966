/// UI-element detection pipeline: both candidate channels, pruning,
/// splitting of oversized regions, then labelled screen-space boxes.
use std::collections::HashMap;

use crate::errors::{GameLensError, GameLensResult};
use crate::perception::canvas::WorkingCanvas;
use crate::perception::postprocess::post_process;
use crate::perception::splitter::split_oversized;
use crate::perception::types::{Candidate, DetectedBox, ElementLabel, PixelBuffer, Provenance, ScreenRect};
use crate::perception::{color_blocks, edges};

/// Upper bound on returned boxes.
pub const MAX_RESULTS: usize = 30;
/// Boxes centred this close to a screen edge get a small confidence bonus.
const EDGE_ZONE_FRAC: f32 = 0.12;
const EDGE_BONUS: f32 = 0.08;

/// Run the full detector:
///
/// 1. Downsample to a working canvas bounded by `max_dim`.
/// 2. Channel A (colour blocks) and Channel B (edges), unioned.
/// 3. Geometry filter, NMS and containment removal.
/// 4. Recursive splitting of oversized survivors.
/// 5. Rescale to `screen_w`×`screen_h`, edge bonus, label, rank and cap.
///
/// Deterministic for identical inputs; `image` is never modified.
pub fn detect_ui_elements(
    image: &PixelBuffer,
    screen_w: u32,
    screen_h: u32,
    max_dim: u32,
) -> GameLensResult<Vec<DetectedBox>> {
    if screen_w == 0 || screen_h == 0 {
        return Err(GameLensError::InvalidParameter(format!(
            "screen size must be positive, got {screen_w}x{screen_h}"
        )));
    }
    let canvas = WorkingCanvas::from_buffer(image, max_dim)?;
    let (w, h) = (canvas.width, canvas.height);

    let mut candidates = color_blocks::detect(&canvas);
    let block_count = candidates.len();
    candidates.extend(edges::detect(&canvas));
    tracing::debug!(
        color_block = block_count,
        edge = candidates.len() - block_count,
        "raw candidates"
    );

    let survivors = post_process(candidates, w, h);
    let gray = canvas.grayscale();
    let finals = split_oversized(survivors, &gray, w, h);

    let boxes = finalize(finals, w, h, screen_w, screen_h);
    tracing::debug!(count = boxes.len(), "detection complete");
    Ok(boxes)
}

fn to_screen(c: &Candidate, sx: f32, sy: f32) -> ScreenRect {
    ScreenRect {
        x: c.rect.x as f32 * sx,
        y: c.rect.y as f32 * sy,
        w: c.rect.w as f32 * sx,
        h: c.rect.h as f32 * sy,
    }
}

fn near_screen_edge(bbox: &ScreenRect, screen_w: f32, screen_h: f32) -> bool {
    let (cx, cy) = bbox.center();
    let mx = screen_w * EDGE_ZONE_FRAC;
    let my = screen_h * EDGE_ZONE_FRAC;
    cx < mx || cx > screen_w - mx || cy < my || cy > screen_h - my
}

/// Coarse label from screen-space area ratio and aspect.
pub fn classify(bbox: &ScreenRect, screen_w: f32, screen_h: f32) -> ElementLabel {
    let area_ratio = bbox.area() / (screen_w * screen_h);
    let aspect = if bbox.h > 0.0 { bbox.w / bbox.h } else { 0.0 };
    if area_ratio < 0.01 && (0.75..=1.33).contains(&aspect) {
        ElementLabel::Icon
    } else if area_ratio < 0.06 && (1.2..=6.0).contains(&aspect) {
        ElementLabel::Button
    } else if (0.02..=0.25).contains(&area_ratio) && (0.5..=1.0).contains(&aspect) {
        ElementLabel::Card
    } else if area_ratio >= 0.10 {
        ElementLabel::Region
    } else {
        ElementLabel::Unknown
    }
}

fn finalize(candidates: Vec<Candidate>, w: usize, h: usize, screen_w: u32, screen_h: u32) -> Vec<DetectedBox> {
    let (sw, sh) = (screen_w as f32, screen_h as f32);
    let sx = sw / w as f32;
    let sy = sh / h as f32;

    let mut scored: Vec<(ScreenRect, f32, &Candidate)> = candidates
        .iter()
        .map(|c| {
            let bbox = to_screen(c, sx, sy);
            let bonus = if near_screen_edge(&bbox, sw, sh) { EDGE_BONUS } else { 0.0 };
            (bbox, (c.confidence + bonus).clamp(0.0, 1.0), c)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(MAX_RESULTS);

    let mut counters: HashMap<ElementLabel, u32> = HashMap::new();
    scored
        .into_iter()
        .map(|(bbox, confidence, c)| {
            let label = classify(&bbox, sw, sh);
            let count = counters.entry(label).or_insert(0);
            *count += 1;
            DetectedBox {
                id: format!("{}_{}", label.id_prefix(), count),
                label,
                bbox,
                confidence,
                rect_fill: c.rect_fill,
                pixel_count: (c.pixel_count as f32 * sx * sy).round() as u64,
                source: Provenance::Auto,
                channel: c.channel,
            }
        })
        .collect()
}
