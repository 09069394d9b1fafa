//! Palette sampling for per-instance sphere colors.
//!
//! Colors are interpolated piecewise-linearly in linear RGB, ordered by
//! instance index: the first instance gets the first stop, the last instance
//! gets the last stop, everything else blends between neighbouring stops.

use bevy::prelude::*;

/// Sample the palette at `ratio` in `[0, 1]`.
///
/// Returns the last stop exactly when `ratio` lands on or past it, so the
/// endpoints never pick up interpolation error.
pub fn color_at(stops: &[LinearRgba], ratio: f32) -> LinearRgba {
    let Some((&last, _)) = stops.split_last() else {
        return LinearRgba::WHITE;
    };
    if stops.len() == 1 {
        return last;
    }

    let scaled = ratio.clamp(0.0, 1.0) * (stops.len() - 1) as f32;
    let index = scaled.floor() as usize;
    if index >= stops.len() - 1 {
        return last;
    }

    let alpha = scaled - index as f32;
    let (start, end) = (stops[index], stops[index + 1]);
    LinearRgba::new(
        start.red + alpha * (end.red - start.red),
        start.green + alpha * (end.green - start.green),
        start.blue + alpha * (end.blue - start.blue),
        start.alpha + alpha * (end.alpha - start.alpha),
    )
}

/// One color per instance, `count` entries.
pub fn sample_palette(palette: &[Color], count: usize) -> Vec<Color> {
    let stops: Vec<LinearRgba> = palette.iter().map(|c| c.to_linear()).collect();
    let span = count.saturating_sub(1).max(1) as f32;

    (0..count)
        .map(|i| Color::LinearRgba(color_at(&stops, i as f32 / span)))
        .collect()
}
