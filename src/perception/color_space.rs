/// Pixel-level conversions and blur primitives shared by both engines.
///
/// All planar fields are row-major `Vec<f32>` of length `w * h`.
use palette::{FromColor, Lab, LinSrgb, Srgb};

/// Rec.601 luma in 0–255.
#[inline]
pub fn luma(rgb: [u8; 3]) -> f32 {
    0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32
}

/// Grayscale plane from interleaved RGBA bytes.
pub fn grayscale(rgba: &[u8]) -> Vec<f32> {
    rgba.chunks_exact(4).map(|p| luma([p[0], p[1], p[2]])).collect()
}

/// sRGB → linear → XYZ (D65) → CIE-Lab.
pub fn rgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let srgb: Srgb<f32> = Srgb::new(rgb[0], rgb[1], rgb[2]).into_format();
    let lin: LinSrgb<f32> = srgb.into_linear();
    let lab: Lab = Lab::from_color(lin);
    [lab.l.max(0.0), lab.a, lab.b]
}

/// HSL-style saturation in [0, 1].
pub fn saturation(rgb: [u8; 3]) -> f32 {
    let r = rgb[0] as f32 / 255.0;
    let g = rgb[1] as f32 / 255.0;
    let b = rgb[2] as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;
    if d <= f32::EPSILON {
        return 0.0;
    }
    let l = (max + min) / 2.0;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    s.clamp(0.0, 1.0)
}

#[inline]
pub fn rgb_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Box widths whose three successive passes approximate a Gaussian of
/// standard deviation `sigma` (Kovesi's ideal-width construction).
pub fn boxes_for_gauss(sigma: f32, n: usize) -> Vec<usize> {
    let nf = n as f32;
    let w_ideal = (12.0 * sigma * sigma / nf + 1.0).sqrt();
    let mut wl = w_ideal.floor() as i64;
    if wl % 2 == 0 {
        wl -= 1;
    }
    let wl = wl.max(1);
    let wu = wl + 2;
    let wlf = wl as f32;
    let m_ideal = (12.0 * sigma * sigma - nf * wlf * wlf - 4.0 * nf * wlf - 3.0 * nf) / (-4.0 * wlf - 4.0);
    let m = m_ideal.round().max(0.0) as usize;
    (0..n)
        .map(|i| if i < m { wl as usize } else { wu as usize })
        .collect()
}

/// Mirror an out-of-range index back into `0..n`. Valid for `-n <= i < 2n`.
#[inline]
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let r = if i < 0 {
        -i - 1
    } else if i >= n {
        2 * n - 1 - i
    } else {
        i
    };
    r.clamp(0, n - 1) as usize
}

fn box_blur_h(src: &[f32], dst: &mut [f32], w: usize, h: usize, r: usize) {
    let norm = 1.0 / (2 * r + 1) as f64;
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        let out = &mut dst[y * w..(y + 1) * w];
        let mut acc: f64 = (-(r as isize)..=r as isize)
            .map(|k| row[reflect(k, w)] as f64)
            .sum();
        out[0] = (acc * norm) as f32;
        for x in 1..w {
            let add = reflect(x as isize + r as isize, w);
            let sub = reflect(x as isize - r as isize - 1, w);
            acc += row[add] as f64 - row[sub] as f64;
            out[x] = (acc * norm) as f32;
        }
    }
}

fn box_blur_v(src: &[f32], dst: &mut [f32], w: usize, h: usize, r: usize) {
    let norm = 1.0 / (2 * r + 1) as f64;
    for x in 0..w {
        let mut acc: f64 = (-(r as isize)..=r as isize)
            .map(|k| src[reflect(k, h) * w + x] as f64)
            .sum();
        dst[x] = (acc * norm) as f32;
        for y in 1..h {
            let add = reflect(y as isize + r as isize, h);
            let sub = reflect(y as isize - r as isize - 1, h);
            acc += src[add * w + x] as f64 - src[sub * w + x] as f64;
            dst[y * w + x] = (acc * norm) as f32;
        }
    }
}

/// Largest box radius the mirrored indexing supports for this field.
pub fn max_blur_radius(w: usize, h: usize) -> usize {
    w.min(h) / 2
}

/// Three-pass box-blur approximation of a Gaussian with mirrored borders.
/// The radius is capped at half the shorter side.
pub fn gaussian_blur(field: &[f32], w: usize, h: usize, sigma: f32) -> Vec<f32> {
    debug_assert_eq!(field.len(), w * h);
    let mut cur = field.to_vec();
    if w == 0 || h == 0 || sigma <= 0.0 {
        return cur;
    }
    let cap = max_blur_radius(w, h);
    let mut tmp = vec![0.0f32; w * h];
    for size in boxes_for_gauss(sigma, 3) {
        let r = ((size.saturating_sub(1)) / 2).min(cap);
        if r == 0 {
            continue;
        }
        box_blur_h(&cur, &mut tmp, w, h, r);
        box_blur_v(&tmp, &mut cur, w, h, r);
    }
    cur
}

/// 3×3 binomial blur (`[1 2 1] / 4` per axis) with clamped borders.
pub fn blur3x3(field: &[f32], w: usize, h: usize) -> Vec<f32> {
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let l = field[y * w + x.saturating_sub(1)];
            let c = field[y * w + x];
            let r = field[y * w + (x + 1).min(w - 1)];
            tmp[y * w + x] = (l + 2.0 * c + r) * 0.25;
        }
    }
    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        let up = y.saturating_sub(1);
        let down = (y + 1).min(h - 1);
        for x in 0..w {
            out[y * w + x] = (tmp[up * w + x] + 2.0 * tmp[y * w + x] + tmp[down * w + x]) * 0.25;
        }
    }
    out
}

/// Min-max normalise in place. A field with no spread is zeroed and `false`
/// is returned.
pub fn normalize_unit(field: &mut [f32]) -> bool {
    let (min, max) = field
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if field.is_empty() || !(max - min > 1e-6) {
        field.iter_mut().for_each(|v| *v = 0.0);
        return false;
    }
    let inv = 1.0 / (max - min);
    for v in field.iter_mut() {
        *v = ((*v - min) * inv).clamp(0.0, 1.0);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_reference_points() {
        let white = rgb_to_lab([255, 255, 255]);
        assert!((white[0] - 100.0).abs() < 0.1);
        assert!(white[1].abs() < 0.1 && white[2].abs() < 0.1);
        let black = rgb_to_lab([0, 0, 0]);
        assert!(black[0].abs() < 1e-3);
        let red = rgb_to_lab([255, 0, 0]);
        assert!((red[0] - 53.2).abs() < 0.5);
        assert!((red[1] - 80.1).abs() < 0.5);
        assert!((red[2] - 67.2).abs() < 0.5);
    }

    #[test]
    fn saturation_of_grays_is_zero() {
        assert_eq!(saturation([128, 128, 128]), 0.0);
        assert!((saturation([255, 0, 0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn box_sizes_are_odd_and_track_sigma() {
        for sigma in [1.0f32, 2.5, 8.0, 20.0, 50.0] {
            let boxes = boxes_for_gauss(sigma, 3);
            assert_eq!(boxes.len(), 3);
            assert!(boxes.iter().all(|b| b % 2 == 1));
            // Variance of three boxes of width w is 3 * (w^2 - 1) / 12.
            let var: f32 = boxes.iter().map(|&b| ((b * b) as f32 - 1.0) / 12.0).sum();
            assert!((var.sqrt() - sigma).abs() < 1.0, "sigma {sigma} -> {boxes:?}");
        }
    }

    #[test]
    fn blur_preserves_constant_fields_exactly() {
        let field = vec![53.238_9f32; 37 * 23];
        let out = gaussian_blur(&field, 37, 23, 9.0);
        assert!(out.iter().all(|&v| v == 53.238_9));
    }

    #[test]
    fn blur_preserves_mass_and_spreads_impulse() {
        let (w, h) = (41, 41);
        let mut field = vec![0.0f32; w * h];
        field[20 * w + 20] = 1.0;
        let out = gaussian_blur(&field, w, h, 3.0);
        let total: f32 = out.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(out[20 * w + 20] < 1.0);
        assert!(out[20 * w + 23] > 0.0);
        // Symmetric around the impulse.
        assert!((out[20 * w + 17] - out[20 * w + 23]).abs() < 1e-6);
    }

    #[test]
    fn blur_radius_is_capped_on_tiny_images() {
        let field: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let out = gaussian_blur(&field, 4, 3, 50.0);
        assert_eq!(out.len(), 12);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn normalize_flat_field_zeroes() {
        let mut flat = vec![3.0f32; 10];
        assert!(!normalize_unit(&mut flat));
        assert!(flat.iter().all(|&v| v == 0.0));

        let mut ramp = vec![2.0f32, 4.0, 6.0];
        assert!(normalize_unit(&mut ramp));
        assert_eq!(ramp, vec![0.0, 0.5, 1.0]);
    }
}
