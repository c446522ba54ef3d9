//! HUSL hue-rotation palettes and segmentation lookup tables.

use crate::error::Result;
use crate::types::LutEntry;
use std::io::Write;
use std::path::Path;

const M: [[f64; 3]; 3] = [
    [3.2406, -1.5372, -0.4986],
    [-0.9689, 1.8758, 0.0415],
    [0.0557, -0.2040, 1.0570],
];
const REF_Y: f64 = 1.0;
const REF_U: f64 = 0.19784;
const REF_V: f64 = 0.46834;
const LAB_E: f64 = 0.008856;
const LAB_K: f64 = 903.3;

const HUE_START: f64 = 0.01;
const SATURATION: f64 = 0.9;
const LIGHTNESS: f64 = 0.65;

fn max_chroma(l: f64, h: f64) -> f64 {
    let hrad = h.to_radians();
    let (sin_h, cos_h) = hrad.sin_cos();
    let sub1 = (l + 16.0).powi(3) / 1_560_896.0;
    let sub2 = if sub1 > LAB_E { sub1 } else { l / LAB_K };

    let mut result = f64::INFINITY;
    for row in M.iter() {
        let [m1, m2, m3] = *row;
        let top = (0.99915 * m1 + 1.05122 * m2 + 1.14460 * m3) * sub2;
        let rbottom = 0.86330 * m3 - 0.17266 * m2;
        let lbottom = 0.12949 * m3 - 0.38848 * m1;
        let bottom = (rbottom * sin_h + lbottom * cos_h) * sub2;
        for t in [0.0, 1.0] {
            let c = l * (top - 1.05122 * t) / (bottom + 0.17266 * sin_h * t);
            if c > 0.0 && c < result {
                result = c;
            }
        }
    }
    result
}

fn f_inv(t: f64) -> f64 {
    if t.powi(3) > LAB_E {
        t.powi(3)
    } else {
        (116.0 * t - 16.0) / LAB_K
    }
}

fn from_linear(c: f64) -> f64 {
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Convert HUSL (hue in degrees, saturation and lightness in 0..100) to sRGB
pub fn husl_to_rgb(h: f64, s: f64, l: f64) -> [f64; 3] {
    if l > 99.9999 {
        return [1.0, 1.0, 1.0];
    }
    if l < 0.00001 {
        return [0.0, 0.0, 0.0];
    }

    let c = max_chroma(l, h) / 100.0 * s;
    let hrad = h.to_radians();
    let u = hrad.cos() * c;
    let v = hrad.sin() * c;

    let var_y = f_inv((l + 16.0) / 116.0);
    let var_u = u / (13.0 * l) + REF_U;
    let var_v = v / (13.0 * l) + REF_V;
    let y = var_y * REF_Y;
    let x = -(9.0 * y * var_u) / ((var_u - 4.0) * var_v - var_u * var_v);
    let z = (9.0 * y - 15.0 * var_v * y - var_v * x) / (3.0 * var_v);

    let mut rgb = [0.0; 3];
    for (out, row) in rgb.iter_mut().zip(M.iter()) {
        *out = from_linear(row[0] * x + row[1] * y + row[2] * z);
    }
    rgb
}

/// `n` evenly spaced, maximally distinguishable colors with channels in [0, 1]
pub fn husl_palette(n: usize) -> Vec<[f64; 3]> {
    (0..n)
        .map(|i| {
            let hue = ((i as f64 / n as f64) + HUE_START) % 1.0 * 359.0;
            let rgb = husl_to_rgb(hue, SATURATION * 99.0, LIGHTNESS * 99.0);
            [
                rgb[0].clamp(0.0, 1.0),
                rgb[1].clamp(0.0, 1.0),
                rgb[2].clamp(0.0, 1.0),
            ]
        })
        .collect()
}

/// Same palette as 8-bit RGB, truncating like an integer cast
pub fn husl_palette_u8(n: usize) -> Vec<[u8; 3]> {
    husl_palette(n)
        .into_iter()
        .map(|c| [to_byte(c[0]), to_byte(c[1]), to_byte(c[2])])
        .collect()
}

fn to_byte(c: f64) -> u8 {
    (c * 255.0) as u8
}

/// Lookup table for `n` labels: `Unknown` in black at id 0, `roi_<i>` after.
/// Alpha is reserved and always 0.
pub fn lookup_table(n: usize) -> Vec<LutEntry> {
    let mut rows = Vec::with_capacity(n + 1);
    rows.push(LutEntry {
        id: 0,
        name: "Unknown".to_string(),
        rgba: [0, 0, 0, 0],
    });
    for (i, rgb) in husl_palette_u8(n).into_iter().enumerate() {
        let id = i + 1;
        rows.push(LutEntry {
            id,
            name: format!("roi_{}", id),
            rgba: [rgb[0], rgb[1], rgb[2], 0],
        });
    }
    rows
}

/// Write a lookup table as tab-separated text that Freeview can load
pub fn write_lookup_table(path: &Path, rows: &[LutEntry]) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "#ID\tROI\tR\tG\tB\tA")?;
    for row in rows {
        writeln!(
            file,
            "{}\t{}\t{}\t{}\t{}\t{}",
            row.id, row.name, row.rgba[0], row.rgba[1], row.rgba[2], row.rgba[3]
        )?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_palette_matches_reference_colors() {
        let p = husl_palette(3);
        assert!((p[0][0] - 0.96780).abs() < 1e-4);
        assert!((p[0][1] - 0.44127).abs() < 1e-4);
        assert!((p[0][2] - 0.53581).abs() < 1e-4);
        assert_eq!(husl_palette_u8(2), vec![[246, 112, 136], [53, 172, 164]]);
        assert_eq!(husl_palette_u8(3)[2], [59, 163, 236]);
    }

    #[test]
    fn test_palette_is_deterministic() {
        assert_eq!(husl_palette(7), husl_palette(7));
        assert!(husl_palette(0).is_empty());
    }

    #[test]
    fn test_lookup_table_invariants() {
        for n in [0usize, 1, 2, 5, 40] {
            let lut = lookup_table(n);
            assert_eq!(lut.len(), n + 1);
            assert_eq!(lut[0].name, "Unknown");
            assert_eq!(lut[0].rgba, [0, 0, 0, 0]);
            for (i, row) in lut.iter().enumerate() {
                assert_eq!(row.id, i);
                assert_eq!(row.rgba[3], 0);
                if i > 0 {
                    assert_eq!(row.name, format!("roi_{}", i));
                }
            }
        }
    }

    #[test]
    fn test_write_lookup_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zstat1_threshold_seg.txt");
        write_lookup_table(&path, &lookup_table(2)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#ID\tROI\tR\tG\tB\tA");
        assert_eq!(lines[1], "0\tUnknown\t0\t0\t0\t0");
        assert_eq!(lines[2], "1\troi_1\t246\t112\t136\t0");
        assert_eq!(lines.len(), 3);
    }
}
