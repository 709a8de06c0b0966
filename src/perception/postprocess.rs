/// Candidate post-processing: geometry filter, greedy NMS, containment
/// removal. Deterministic, and idempotent on its own output.
use std::cmp::Ordering;

use crate::perception::types::{Candidate, Rect};

pub const MIN_AREA_FRAC: f32 = 0.003;
pub const MAX_AREA_FRAC: f32 = 0.50;
pub const MIN_ASPECT: f32 = 0.18;
pub const MAX_ASPECT: f32 = 5.5;
pub const MIN_SIDE_FRAC: f32 = 0.035;
pub const NMS_IOU: f32 = 0.30;
/// A box is considered nested when a larger box covers more than this share of it.
pub const CONTAINMENT_COVER: f32 = 0.65;

/// Area and minimum-side bounds relative to a `w`×`h` canvas.
pub fn passes_area_and_side(rect: &Rect, w: usize, h: usize) -> bool {
    let image_area = (w * h) as f32;
    let area = rect.area() as f32;
    if area < MIN_AREA_FRAC * image_area || area > MAX_AREA_FRAC * image_area {
        return false;
    }
    rect.w.min(rect.h) as f32 >= MIN_SIDE_FRAC * w.min(h) as f32
}

pub fn passes_geometry(rect: &Rect, w: usize, h: usize) -> bool {
    let aspect = rect.aspect();
    (MIN_ASPECT..=MAX_ASPECT).contains(&aspect) && passes_area_and_side(rect, w, h)
}

/// Confidence descending; ties broken by larger area, then position, so the
/// order is total and stable across runs.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.area().cmp(&a.area()))
        .then_with(|| a.rect.y.cmp(&b.rect.y))
        .then_with(|| a.rect.x.cmp(&b.rect.x))
        .then_with(|| a.rect.w.cmp(&b.rect.w))
}

/// Greedy NMS: keep the best box, drop later boxes overlapping it by more
/// than `iou_threshold`.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(rank_order);
    let mut suppressed = vec![false; candidates.len()];
    let mut keep = Vec::with_capacity(candidates.len());

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        for j in i + 1..candidates.len() {
            if !suppressed[j] && candidates[i].rect.iou(&candidates[j].rect) > iou_threshold {
                suppressed[j] = true;
            }
        }
        keep.push(i);
    }

    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    keep.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Drop boxes mostly covered by a strictly larger box of the same set.
pub fn remove_contained(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let nested: Vec<bool> = candidates
        .iter()
        .enumerate()
        .map(|(i, small)| {
            let small_area = small.area() as f32;
            candidates.iter().enumerate().any(|(j, big)| {
                j != i
                    && big.area() > small.area()
                    && small.rect.intersection_area(&big.rect) as f32 > CONTAINMENT_COVER * small_area
            })
        })
        .collect();

    candidates
        .into_iter()
        .zip(nested)
        .filter_map(|(c, drop)| (!drop).then_some(c))
        .collect()
}

/// Filter → NMS → containment removal, output ranked by confidence.
pub fn post_process(candidates: Vec<Candidate>, w: usize, h: usize) -> Vec<Candidate> {
    let total = candidates.len();
    let filtered: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| passes_geometry(&c.rect, w, h))
        .collect();
    let after_filter = filtered.len();
    let kept = non_max_suppression(filtered, NMS_IOU);
    let after_nms = kept.len();
    let out = remove_contained(kept);
    tracing::debug!(
        total,
        after_filter,
        after_nms,
        survivors = out.len(),
        "post-processing"
    );
    out
}
