//! sRGB <-> CIE L*a*b* (D65) conversion
//!
//! L is kept in the 8-bit scale (0..=255, i.e. L* * 255/100) so it can be
//! histogram-equalised directly. a* and b* stay in floating point to avoid
//! quantising the chrominance we are trying to preserve.

const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;
const EPSILON: f32 = 0.008856;
const KAPPA: f32 = 903.3;

/// Planar Lab image
#[derive(Debug, Clone)]
pub struct LabPlanes {
    pub width: u32,
    pub height: u32,
    /// Lightness in 0..=255
    pub l: Vec<u8>,
    pub a: Vec<f32>,
    pub b: Vec<f32>,
}

fn srgb_to_linear_lut() -> [f32; 256] {
    let mut lut = [0.0f32; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        let c = i as f32 / 255.0;
        *v = if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
    }
    lut
}

fn linear_to_srgb(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let v = if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn f_inv(v: f32) -> f32 {
    let cube = v * v * v;
    if cube > EPSILON {
        cube
    } else {
        (v - 16.0 / 116.0) / 7.787
    }
}

/// Convert packed RGB bytes into Lab planes
pub fn rgb_to_lab(rgb: &[u8], width: u32, height: u32) -> LabPlanes {
    let lut = srgb_to_linear_lut();
    let pixels = (width * height) as usize;
    let mut l = Vec::with_capacity(pixels);
    let mut a = Vec::with_capacity(pixels);
    let mut b = Vec::with_capacity(pixels);

    for px in rgb.chunks_exact(3).take(pixels) {
        let r = lut[px[0] as usize];
        let g = lut[px[1] as usize];
        let bl = lut[px[2] as usize];

        let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * bl) / WHITE_X;
        let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * bl;
        let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * bl) / WHITE_Z;

        let fy = f(y);
        let lightness = if y > EPSILON {
            116.0 * fy - 16.0
        } else {
            KAPPA * y
        };

        l.push((lightness * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8);
        a.push(500.0 * (f(x) - fy));
        b.push(200.0 * (fy - f(z)));
    }

    LabPlanes {
        width,
        height,
        l,
        a,
        b,
    }
}

/// Convert Lab planes back into packed RGB bytes
pub fn lab_to_rgb(lab: &LabPlanes) -> Vec<u8> {
    let mut out = Vec::with_capacity(lab.l.len() * 3);

    for ((&l8, &a), &b) in lab.l.iter().zip(&lab.a).zip(&lab.b) {
        let lightness = l8 as f32 * 100.0 / 255.0;
        let fy = (lightness + 16.0) / 116.0;
        let fx = fy + a / 500.0;
        let fz = fy - b / 200.0;

        let y = if lightness > KAPPA * EPSILON {
            fy * fy * fy
        } else {
            lightness / KAPPA
        };
        let x = f_inv(fx) * WHITE_X;
        let z = f_inv(fz) * WHITE_Z;

        let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
        let g = -0.969_256 * x + 1.875_991 * y + 0.041_556 * z;
        let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

        out.push(linear_to_srgb(r));
        out.push(linear_to_srgb(g));
        out.push(linear_to_srgb(bl));
    }

    out
}
