use crate::canvas::style::RenderingStyle;
use crate::types::Rgb;

/// Entries in a [`ColorScheme`] lookup table.
pub const LUT_SIZE: usize = 256;

/// Hermite smoothstep: smooth transition from 0 to 1 between edge0 and edge1.
fn smoothstep(x: f32, edge0: f32, edge1: f32) -> f32 {
    if edge1 <= edge0 {
        return if x >= edge0 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mix(a: Rgb, b: Rgb, t: f32) -> Rgb {
    let lerp = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2])]
}

/// Lookup table turning spectrum intensities into colors.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorScheme {
    lut: Vec<Rgb>,
}

impl ColorScheme {
    /// Build a gradient through `stops`, given as `(position, color)` with
    /// positions ascending in `[0, 1]`. Neighboring stops blend with a smoothstep.
    pub fn from_stops(stops: &[(f32, Rgb)]) -> Self {
        let lut = (0..LUT_SIZE)
            .map(|i| {
                let x = i as f32 / (LUT_SIZE - 1) as f32;
                match stops.iter().position(|&(pos, _)| pos >= x) {
                    None => stops.last().map_or([0; 3], |s| s.1),
                    Some(0) => stops[0].1,
                    Some(hi) => {
                        let (p0, c0) = stops[hi - 1];
                        let (p1, c1) = stops[hi];
                        mix(c0, c1, smoothstep(x, p0, p1))
                    }
                }
            })
            .collect();
        Self { lut }
    }

    pub fn greyscale() -> Self {
        Self::from_stops(&[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])])
    }

    /// The spectrum palette for `style`.
    pub fn spectrum(style: RenderingStyle) -> Self {
        match style {
            RenderingStyle::Normal => Self::from_stops(&[
                (0.0, [0, 0, 0]),
                (0.3, [20, 30, 140]),
                (0.55, [0, 170, 190]),
                (0.8, [240, 220, 40]),
                (1.0, [255, 255, 255]),
            ]),
            RenderingStyle::Inactive => Self::from_stops(&[
                (0.0, [0, 0, 0]),
                (1.0, [150, 150, 150]),
            ]),
            RenderingStyle::Selected => Self::from_stops(&[
                (0.0, [40, 40, 60]),
                (0.3, [60, 60, 170]),
                (0.55, [60, 200, 220]),
                (0.8, [250, 235, 90]),
                (1.0, [255, 255, 255]),
            ]),
            RenderingStyle::Primary => Self::from_stops(&[
                (0.0, [10, 10, 10]),
                (0.3, [90, 20, 120]),
                (0.55, [220, 60, 60]),
                (0.8, [255, 190, 40]),
                (1.0, [255, 255, 255]),
            ]),
        }
    }

    /// Color for `value`, clamped to `[0, 1]`. NaN maps like zero.
    pub fn map(&self, value: f32) -> Rgb {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        self.lut[(v * (self.lut.len() - 1) as f32).round() as usize]
    }
}

/// Colors used to paint one waveform tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaveformColors {
    pub background: Rgb,
    pub peak: Rgb,
    pub average: Rgb,
    pub zero_line: Rgb,
}

impl WaveformColors {
    pub fn for_style(style: RenderingStyle) -> Self {
        match style {
            RenderingStyle::Normal => Self {
                background: [10, 10, 10],
                peak: [102, 170, 102],
                average: [160, 220, 160],
                zero_line: [51, 51, 51],
            },
            RenderingStyle::Inactive => Self {
                background: [10, 10, 10],
                peak: [80, 80, 80],
                average: [110, 110, 110],
                zero_line: [40, 40, 40],
            },
            RenderingStyle::Selected => Self {
                background: [24, 44, 70],
                peak: [120, 190, 240],
                average: [190, 225, 250],
                zero_line: [60, 80, 110],
            },
            RenderingStyle::Primary => Self {
                background: [20, 20, 20],
                peak: [230, 210, 90],
                average: [250, 240, 170],
                zero_line: [70, 70, 70],
            },
        }
    }
}
