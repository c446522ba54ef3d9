//! Continuous and discrete colormaps used by the mosaics.

/// Anchor points of Moreland's diverging cool-warm map
const COOLWARM: [(f64, [f64; 3]); 5] = [
    (0.0, [0.2298, 0.2987, 0.7537]),
    (0.25, [0.5529, 0.6902, 0.9960]),
    (0.5, [0.8654, 0.8654, 0.8654]),
    (0.75, [0.9571, 0.6029, 0.4817]),
    (1.0, [0.7057, 0.0156, 0.1502]),
];

/// ColorBrewer OrRd, reversed so the strongest values are the lightest
const ORRD_R: [[u8; 3]; 9] = [
    [0x7f, 0x00, 0x00],
    [0xb3, 0x00, 0x00],
    [0xd7, 0x30, 0x1f],
    [0xef, 0x65, 0x48],
    [0xfc, 0x8d, 0x59],
    [0xfd, 0xbb, 0x84],
    [0xfd, 0xd4, 0x9e],
    [0xfe, 0xe8, 0xc8],
    [0xff, 0xf7, 0xec],
];

#[derive(Debug, Clone)]
pub enum Colormap {
    Gray,
    CoolWarm,
    OrRdR,
    /// One color per integer label starting at 1
    Listed(Vec<[u8; 3]>),
}

impl Colormap {
    /// Color for a value already normalised to [0, 1]. For `Listed` the
    /// value is the label itself.
    pub fn color(&self, t: f64) -> [u8; 3] {
        match self {
            Colormap::Gray => {
                let v = to_byte(t);
                [v, v, v]
            }
            Colormap::CoolWarm => {
                let t = t.clamp(0.0, 1.0);
                let seg = COOLWARM
                    .windows(2)
                    .find(|w| t <= w[1].0)
                    .unwrap_or(&COOLWARM[3..5]);
                let (t0, c0) = seg[0];
                let (t1, c1) = seg[1];
                let f = (t - t0) / (t1 - t0);
                [
                    to_byte(c0[0] + f * (c1[0] - c0[0])),
                    to_byte(c0[1] + f * (c1[1] - c0[1])),
                    to_byte(c0[2] + f * (c1[2] - c0[2])),
                ]
            }
            Colormap::OrRdR => {
                let t = t.clamp(0.0, 1.0) * (ORRD_R.len() - 1) as f64;
                let i = (t.floor() as usize).min(ORRD_R.len() - 2);
                let f = t - i as f64;
                let (a, b) = (ORRD_R[i], ORRD_R[i + 1]);
                [
                    lerp_u8(a[0], b[0], f),
                    lerp_u8(a[1], b[1], f),
                    lerp_u8(a[2], b[2], f),
                ]
            }
            Colormap::Listed(colors) => {
                if colors.is_empty() {
                    return [0, 0, 0];
                }
                let label = t.round().max(1.0) as usize;
                colors[(label - 1).min(colors.len() - 1)]
            }
        }
    }
}

fn to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn lerp_u8(a: u8, b: u8, f: f64) -> u8 {
    (a as f64 + f * (b as f64 - a as f64)).round() as u8
}

/// Alpha-blend `top` over `bottom`
pub fn blend(bottom: [u8; 3], top: [u8; 3], alpha: f64) -> [u8; 3] {
    let mix = |b: u8, t: u8| (b as f64 * (1.0 - alpha) + t as f64 * alpha).round() as u8;
    [mix(bottom[0], top[0]), mix(bottom[1], top[1]), mix(bottom[2], top[2])]
}
