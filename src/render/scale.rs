/// Fill for zero prices, which mean "no data" on the price maps.
pub const NA_COLOR: &str = "#808080";
/// Fill for units without a row in the current frame.
pub const NO_DATA_COLOR: &str = "#eeeeee";

type Rgb = [u8; 3];

const PLASMA: &[(f64, Rgb)] = &[
    (0.0, [0x0d, 0x08, 0x87]),
    (0.111, [0x46, 0x03, 0x9f]),
    (0.222, [0x72, 0x01, 0xa8]),
    (0.333, [0x9c, 0x17, 0x9e]),
    (0.444, [0xbd, 0x37, 0x86]),
    (0.556, [0xd8, 0x57, 0x6b]),
    (0.667, [0xed, 0x79, 0x53]),
    (0.778, [0xfb, 0x9f, 0x3a]),
    (0.889, [0xfd, 0xca, 0x26]),
    (1.0, [0xf0, 0xf9, 0x21]),
];

const TURBO: &[(f64, Rgb)] = &[
    (0.0, [0x30, 0x12, 0x3b]),
    (0.07, [0x41, 0x45, 0xab]),
    (0.14, [0x46, 0x75, 0xed]),
    (0.21, [0x39, 0xa2, 0xfc]),
    (0.28, [0x1b, 0xcf, 0xd4]),
    (0.35, [0x24, 0xec, 0xa6]),
    (0.42, [0x61, 0xfc, 0x6c]),
    (0.49, [0xa4, 0xfc, 0x3b]),
    (0.56, [0xd1, 0xe8, 0x34]),
    (0.63, [0xf3, 0xc6, 0x3a]),
    (0.70, [0xfe, 0x9b, 0x2d]),
    (0.77, [0xf3, 0x63, 0x15]),
    (0.84, [0xd9, 0x38, 0x06]),
    (0.91, [0xb1, 0x19, 0x01]),
    (1.0, [0x7a, 0x04, 0x02]),
];

const BLUE_RED: &[(f64, Rgb)] = &[(0.0, [0x00, 0x00, 0xff]), (1.0, [0xff, 0x00, 0x00])];

// Purple (favours listings) through white at zero to teal (favours rentals).
const DIVERGING: &[(f64, Rgb)] = &[
    (0.0, [0x7c, 0x1d, 0x6f]),
    (0.25, [0xe3, 0x4f, 0x6f]),
    (0.4999, [0xff, 0xe9, 0xa3]),
    (0.4999, [0xff, 0xff, 0xff]),
    (0.5001, [0xff, 0xff, 0xff]),
    (0.5001, [0xf7, 0xfe, 0xae]),
    (0.75, [0x46, 0xae, 0xa0]),
    (1.0, [0x04, 0x52, 0x75]),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Palette {
    Plasma,
    Turbo,
    BlueRed,
    Diverging,
}

impl Palette {
    fn stops(self) -> &'static [(f64, Rgb)] {
        match self {
            Palette::Plasma => PLASMA,
            Palette::Turbo => TURBO,
            Palette::BlueRed => BLUE_RED,
            Palette::Diverging => DIVERGING,
        }
    }
}

/// A palette stretched over a value domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub palette: Palette,
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    /// Sequential scale over the observed range.
    pub fn sequential<I>(palette: Palette, values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if min > max {
            return Self { palette, min: 0.0, max: 0.0 };
        }
        Self { palette, min, max }
    }

    /// Diverging scale centred on zero, symmetric about the largest magnitude.
    pub fn centred<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let extent = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        Self {
            palette: Palette::Diverging,
            min: -extent,
            max: extent,
        }
    }

    /// Position of `value` in the domain, clamped to `[0, 1]`.
    pub fn position(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    /// Hex colour for `value`, interpolated between palette stops.
    pub fn color(&self, value: f64) -> String {
        hex(sample(self.palette.stops(), self.position(value)))
    }

    /// CSS `linear-gradient` stops for the legend bar.
    pub fn gradient_css(&self) -> String {
        let stops: Vec<String> = self
            .palette
            .stops()
            .iter()
            .map(|(at, rgb)| format!("{} {:.2}%", hex(*rgb), at * 100.0))
            .collect();
        format!("linear-gradient(to right, {})", stops.join(", "))
    }
}

fn sample(stops: &[(f64, Rgb)], t: f64) -> Rgb {
    let Some(&(_, first)) = stops.first() else {
        return [0, 0, 0];
    };
    for pair in stops.windows(2) {
        let (lo_at, lo) = pair[0];
        let (hi_at, hi) = pair[1];
        if t > hi_at {
            continue;
        }
        if hi_at - lo_at <= f64::EPSILON {
            return hi;
        }
        let f = ((t - lo_at) / (hi_at - lo_at)).clamp(0.0, 1.0);
        return [lerp(lo[0], hi[0], f), lerp(lo[1], hi[1], f), lerp(lo[2], hi[2], f)];
    }
    stops.last().map(|&(_, rgb)| rgb).unwrap_or(first)
}

fn lerp(a: u8, b: u8, f: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * f).round() as u8
}

fn hex(rgb: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}
