//! Turns escape counts into colors by sweeping around a hue wheel.
//! Saturation and value are fixed at full; only the hue moves.

use crate::escape::EscapeResult;

/// Degrees of hue per (smoothed) iteration.
pub const HUE_PER_ITERATION: f32 = 5.0;

/// One 24-bit color.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Pixel {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Pixel {
    /// Points inside the set.
    pub const BLACK: Pixel = Pixel { r: 0, g: 0, b: 0 };

    /// Constructor.
    pub fn new(r: u8, g: u8, b: u8) -> Pixel {
        Pixel { r, g, b }
    }
}

/// The response of a single channel to a hue angle, in degrees.  A
/// trapezoid: ramps up over [0, 60), holds over [60, 180), ramps down
/// over [180, 240), and is dark for the rest of the circle.
pub fn hue2rgb(t: f32) -> u8 {
    let t = t.rem_euclid(360.0);
    if t < 60.0 {
        (255.0 * t / 60.0) as u8
    } else if t < 180.0 {
        255
    } else if t < 240.0 {
        (255.0 * (4.0 - t / 60.0)) as u8
    } else {
        0
    }
}

/// The color at a given point on the hue wheel.  Green leads, red
/// trails by 120 degrees, blue by 240.
pub fn hue_to_pixel(hue: f32) -> Pixel {
    Pixel {
        r: hue2rgb(hue + 120.0),
        g: hue2rgb(hue),
        b: hue2rgb(hue + 240.0),
    }
}

/// Map an escape result to a color.  Bounded points are always black.
pub fn colorize(result: EscapeResult, hue_step: f32) -> Pixel {
    match result {
        EscapeResult::Bounded => Pixel::BLACK,
        EscapeResult::Escaped(count) => hue_to_pixel(hue_step * count),
    }
}
