/// Visual saliency: where a viewer's attention is likely to land.
///
/// Two signals are fused on a Lab working copy of the image:
/// multi-scale center-surround contrast (how much a pixel differs from its
/// blurred surroundings) and colour rarity (self-information of its Lab bin).
/// Saturated pixels are boosted, the field is smoothed to fixation-sized
/// blobs, then contrast-stretched with an adaptive sigmoid.
use crate::errors::GameLensResult;
use crate::perception::canvas::WorkingCanvas;
use crate::perception::color_space::{gaussian_blur, normalize_unit, rgb_to_lab, saturation};
use crate::perception::types::{PixelBuffer, SaliencyResult};

/// (sigma as a share of the shorter side, weight). Coarse scales dominate.
const SCALES: [(f32, f32); 3] = [(0.04, 0.10), (0.10, 0.35), (0.25, 0.55)];
const MIN_SIGMA: f32 = 2.0;

const BINS: usize = 12;
const L_RANGE: (f32, f32) = (0.0, 100.0);
const AB_RANGE: (f32, f32) = (-128.0, 128.0);
const RARITY_SMOOTH_FRAC: f32 = 0.03;

const CENTER_SURROUND_WEIGHT: f32 = 0.55;
const RARITY_WEIGHT: f32 = 0.45;
const ATTENTION_SMOOTH_FRAC: f32 = 0.04;

const SIGMOID_GAIN: f32 = 1.2;
const SIGMOID_K_MIN: f32 = 5.0;
const SIGMOID_K_MAX: f32 = 15.0;

/// Planar Lab channels of the working canvas.
struct LabField {
    l: Vec<f32>,
    a: Vec<f32>,
    b: Vec<f32>,
}

impl LabField {
    fn from_canvas(canvas: &WorkingCanvas) -> (Self, Vec<f32>) {
        let n = canvas.width * canvas.height;
        let mut field = LabField {
            l: Vec::with_capacity(n),
            a: Vec::with_capacity(n),
            b: Vec::with_capacity(n),
        };
        let mut sat = Vec::with_capacity(n);
        for px in canvas.rgba.chunks_exact(4) {
            let rgb = [px[0], px[1], px[2]];
            let [l, a, b] = rgb_to_lab(rgb);
            field.l.push(l);
            field.a.push(a);
            field.b.push(b);
            sat.push(saturation(rgb));
        }
        (field, sat)
    }
}

fn scaled_sigma(frac: f32, min_dim: f32) -> f32 {
    (frac * min_dim).max(MIN_SIGMA)
}

fn center_surround(lab: &LabField, w: usize, h: usize) -> Vec<f32> {
    let min_dim = w.min(h) as f32;
    let mut acc = vec![0.0f32; w * h];
    for (frac, weight) in SCALES {
        let sigma = scaled_sigma(frac, min_dim);
        let bl = gaussian_blur(&lab.l, w, h, sigma);
        let ba = gaussian_blur(&lab.a, w, h, sigma);
        let bb = gaussian_blur(&lab.b, w, h, sigma);
        for i in 0..acc.len() {
            let dl = lab.l[i] - bl[i];
            let da = lab.a[i] - ba[i];
            let db = lab.b[i] - bb[i];
            acc[i] += weight * (dl * dl + da * da + db * db).sqrt();
        }
        tracing::debug!(sigma, weight, "center-surround scale");
    }
    normalize_unit(&mut acc);
    acc
}

#[inline]
fn bin_of(v: f32, (lo, hi): (f32, f32)) -> usize {
    let t = (v - lo) / (hi - lo) * BINS as f32;
    (t.floor().max(0.0) as usize).min(BINS - 1)
}

fn color_rarity(lab: &LabField, w: usize, h: usize) -> Vec<f32> {
    let n = w * h;
    let bins: Vec<usize> = (0..n)
        .map(|i| {
            let bl = bin_of(lab.l[i], L_RANGE);
            let ba = bin_of(lab.a[i], AB_RANGE);
            let bb = bin_of(lab.b[i], AB_RANGE);
            (bl * BINS + ba) * BINS + bb
        })
        .collect();

    let mut hist = vec![0u32; BINS * BINS * BINS];
    for &b in &bins {
        hist[b] += 1;
    }
    let total = n as f32;
    let mut rarity: Vec<f32> = bins
        .iter()
        .map(|&b| -(hist[b] as f32 / total).log2())
        .collect();
    normalize_unit(&mut rarity);

    let sigma = scaled_sigma(RARITY_SMOOTH_FRAC, w.min(h) as f32);
    let mut smoothed = gaussian_blur(&rarity, w, h, sigma);
    normalize_unit(&mut smoothed);
    smoothed
}

/// Logistic stretch around the mean; steeper for low-variance fields.
fn adaptive_sigmoid(field: &mut [f32]) {
    let n = field.len() as f32;
    let mean = field.iter().sum::<f32>() / n;
    let var = field.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    let std = var.sqrt();
    if std <= 1e-6 {
        return;
    }
    let k = (SIGMOID_GAIN / std).clamp(SIGMOID_K_MIN, SIGMOID_K_MAX);
    for v in field.iter_mut() {
        *v = 1.0 / (1.0 + (-k * (*v - mean)).exp());
    }
}

/// Compute the saliency field of `image` at a working resolution whose
/// longer side is at most `max_dim`.
///
/// Values are in [0, 1]. Non-uniform images span the full range; a uniform
/// image gives an all-zero field.
pub fn analyze_saliency(image: &PixelBuffer, max_dim: u32) -> GameLensResult<SaliencyResult> {
    let canvas = WorkingCanvas::from_buffer(image, max_dim)?;
    let (w, h) = (canvas.width, canvas.height);

    if image.is_uniform() {
        tracing::debug!(width = w, height = h, "uniform image, empty saliency");
        return Ok(SaliencyResult {
            saliency_map: vec![0.0; w * h],
            width: w as u32,
            height: h as u32,
        });
    }

    let (lab, sat) = LabField::from_canvas(&canvas);
    let cs = center_surround(&lab, w, h);
    let rarity = color_rarity(&lab, w, h);

    let fused: Vec<f32> = cs
        .iter()
        .zip(&rarity)
        .zip(&sat)
        .map(|((&c, &r), &s)| {
            let base = CENTER_SURROUND_WEIGHT * c + RARITY_WEIGHT * r;
            base * (0.6 + 0.6 * s.min(1.0))
        })
        .collect();

    let sigma = scaled_sigma(ATTENTION_SMOOTH_FRAC, w.min(h) as f32);
    let mut map = gaussian_blur(&fused, w, h, sigma);
    normalize_unit(&mut map);
    adaptive_sigmoid(&mut map);
    normalize_unit(&mut map);

    Ok(SaliencyResult {
        saliency_map: map,
        width: w as u32,
        height: h as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_image() -> PixelBuffer {
        PixelBuffer::from_fn(160, 120, |x, y| {
            if (70..90).contains(&x) && (50..70).contains(&y) {
                [240, 40, 40]
            } else if (x / 8 + y / 8) % 2 == 0 {
                [120, 120, 120]
            } else {
                [135, 135, 135]
            }
        })
        .unwrap()
    }

    #[test]
    fn bins_cover_the_lab_gamut() {
        assert_eq!(bin_of(0.0, L_RANGE), 0);
        assert_eq!(bin_of(100.0, L_RANGE), BINS - 1);
        assert_eq!(bin_of(-128.0, AB_RANGE), 0);
        assert_eq!(bin_of(-500.0, AB_RANGE), 0);
        assert_eq!(bin_of(127.9, AB_RANGE), BINS - 1);
        assert_eq!(bin_of(50.0, L_RANGE), 6);
    }

    #[test]
    fn sigmoid_skips_flat_fields() {
        let mut flat = vec![0.4f32; 16];
        adaptive_sigmoid(&mut flat);
        assert!(flat.iter().all(|&v| v == 0.4));
    }

    #[test]
    fn map_spans_unit_range() {
        let out = analyze_saliency(&blob_image(), 400).unwrap();
        assert_eq!((out.width, out.height), (160, 120));
        assert_eq!(out.saliency_map.len(), 160 * 120);
        assert!(out.saliency_map.iter().all(|v| (0.0..=1.0).contains(v)));
        let max = out.saliency_map.iter().cloned().fold(f32::MIN, f32::max);
        let min = out.saliency_map.iter().cloned().fold(f32::MAX, f32::min);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(min.abs() < 1e-6);
    }

    #[test]
    fn accent_blob_is_the_peak() {
        let out = analyze_saliency(&blob_image(), 400).unwrap();
        let (px, py, v) = out.peak();
        assert!((66..94).contains(&px) && (46..74).contains(&py), "peak at ({px}, {py})");
        assert!(v > 0.99);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let img = blob_image();
        let a = analyze_saliency(&img, 100).unwrap();
        let b = analyze_saliency(&img, 100).unwrap();
        assert_eq!(a, b);
        assert_eq!((a.width, a.height), (100, 75));
    }

    #[test]
    fn uniform_image_is_all_zero() {
        let img = PixelBuffer::from_fn(64, 48, |_, _| [10, 200, 90]).unwrap();
        let out = analyze_saliency(&img, 400).unwrap();
        assert!(out.saliency_map.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn zero_max_dim_is_rejected() {
        assert!(analyze_saliency(&blob_image(), 0).is_err());
    }
}
