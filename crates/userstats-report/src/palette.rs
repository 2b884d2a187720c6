//! Chart colours.

use plotters::style::RGBColor;

pub const BACKGROUND: RGBColor = RGBColor(255, 255, 255);
pub const TEXT: RGBColor = RGBColor(40, 40, 40);

/// Default bar colour for single-series charts.
pub const PRIMARY: RGBColor = RGBColor(31, 119, 180);
pub const SECONDARY: RGBColor = RGBColor(255, 127, 14);
/// Average price bars.
pub const SKY: RGBColor = RGBColor(135, 206, 235);

/// Categorical colours, cycled for pie slices.
pub const SERIES: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

const HEAT_LOW: RGBColor = RGBColor(255, 247, 236);
const HEAT_HIGH: RGBColor = RGBColor(179, 0, 0);

pub fn series_color(index: usize) -> RGBColor {
    SERIES[index % SERIES.len()]
}

/// `n` categorical colours, repeating after ten.
pub fn series(n: usize) -> Vec<RGBColor> {
    (0..n).map(series_color).collect()
}

/// Heatmap cell colour for a share in `[0, 1]`; out-of-range values clamp.
pub fn heat_color(fraction: f64) -> RGBColor {
    let t = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(
        lerp(HEAT_LOW.0, HEAT_HIGH.0),
        lerp(HEAT_LOW.1, HEAT_HIGH.1),
        lerp(HEAT_LOW.2, HEAT_HIGH.2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_cycles() {
        assert_eq!(series_color(0), series_color(10));
        assert_eq!(series(12).len(), 12);
        assert_ne!(series_color(0), series_color(1));
    }

    #[test]
    fn test_heat_color_endpoints() {
        assert_eq!(heat_color(0.0), HEAT_LOW);
        assert_eq!(heat_color(1.0), HEAT_HIGH);
    }

    #[test]
    fn test_heat_color_clamps() {
        assert_eq!(heat_color(-3.0), HEAT_LOW);
        assert_eq!(heat_color(7.5), HEAT_HIGH);
        assert_eq!(heat_color(f64::NAN), HEAT_LOW);
    }
}
