//! The escape-time evaluator.  Iterates z <- z^2 + c from z = 0 and
//! reports how quickly c runs away, as a continuous count rather than
//! a whole number of steps, so that neighbouring pixels do not fall
//! into visible bands.

use num::Complex;

/// Squared escape radius.  Larger than the classic 4 so the smoothing
/// term below stays well behaved.
pub const ESCAPE_RADIUS_SQR: f64 = 64.0;

/// The escape radius itself.  `SMOOTHING_BASE.powi(2)` must equal
/// `ESCAPE_RADIUS_SQR`; change one, change the other.
pub const SMOOTHING_BASE: f64 = 8.0;

/// What happened to a point after at most `max_iterations` steps.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum EscapeResult {
    /// The orbit left the escape radius after this many (smoothed)
    /// iterations.
    Escaped(f32),
    /// The orbit stayed inside for every iteration we tried.
    Bounded,
}

impl EscapeResult {
    /// The smoothed count, if the point escaped.
    pub fn count(&self) -> Option<f32> {
        match *self {
            EscapeResult::Escaped(n) => Some(n),
            EscapeResult::Bounded => None,
        }
    }
}

/// This is our classic iterator function, which either returns the
/// (smoothed) number of iterations it took to escape the Mandelbrot
/// set, or reports that the point is bounded.
///
/// Points that escape almost at once would get a negative smoothed
/// count; those are reported as 0.
///
/// The check happens on every step, so |z|^2 never exceeds
/// (64 + |c|)^2 + |c| before we stop: for any finite c that is far
/// from overflowing an f64.
pub fn escape(point: Complex<f64>, max_iterations: u32) -> EscapeResult {
    let (mut a, mut b) = (0.0_f64, 0.0_f64);
    for i in 0..max_iterations {
        let na = a * a - b * b + point.re;
        b = 2.0 * a * b + point.im;
        a = na;
        let norm_sqr = a * a + b * b;
        if norm_sqr > ESCAPE_RADIUS_SQR {
            let smooth = f64::from(i) - norm_sqr.sqrt().ln() / SMOOTHING_BASE.ln();
            return EscapeResult::Escaped(smooth.max(0.0) as f32);
        }
    }
    EscapeResult::Bounded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_and_base_agree() {
        assert_eq!(SMOOTHING_BASE * SMOOTHING_BASE, ESCAPE_RADIUS_SQR);
    }

    #[test]
    fn origin_never_escapes() {
        for &limit in &[1, 2, 10, 100, 10_000] {
            assert_eq!(escape(Complex::new(0.0, 0.0), limit), EscapeResult::Bounded);
        }
    }

    #[test]
    fn cardioid_points_are_bounded() {
        assert_eq!(escape(Complex::new(-0.75, 0.0), 100), EscapeResult::Bounded);
        assert_eq!(escape(Complex::new(-1.0, 0.0), 1000), EscapeResult::Bounded);
        assert_eq!(escape(Complex::new(0.25, 0.0), 100), EscapeResult::Bounded);
    }

    #[test]
    fn far_points_escape_within_one_step() {
        for &c in &[
            Complex::new(9.0, 0.0),
            Complex::new(0.0, -12.5),
            Complex::new(-40.0, 40.0),
            Complex::new(1.0e6, 3.0),
        ] {
            match escape(c, 100) {
                EscapeResult::Escaped(n) => {
                    assert!(n >= 0.0 && n < 1.0, "{:?} gave {}", c, n)
                }
                EscapeResult::Bounded => panic!("{:?} should escape", c),
            }
        }
    }

    #[test]
    fn points_well_outside_radius_two_count_zero() {
        for &c in &[Complex::new(2.5, 0.0), Complex::new(0.0, 3.0), Complex::new(6.0, -6.0)] {
            match escape(c, 100) {
                EscapeResult::Escaped(n) => assert_eq!(n, 0.0, "{:?}", c),
                EscapeResult::Bounded => panic!("{:?} should escape", c),
            }
        }
    }

    #[test]
    fn points_just_outside_radius_two_linger() {
        // -2.01 creeps along the real axis and only passes 8 at i = 5
        let n = escape(Complex::new(-2.01, 0.0), 100).count().unwrap();
        assert!((n - 3.7365).abs() < 1e-3, "{}", n);
        let n = escape(Complex::new(2.05, 0.0), 100).count().unwrap();
        assert!(n > 0.0 && n < 1.0, "{}", n);
    }

    #[test]
    fn counts_are_finite_at_huge_inputs() {
        match escape(Complex::new(1.0e150, -1.0e150), 10) {
            EscapeResult::Escaped(n) => assert!(n.is_finite()),
            EscapeResult::Bounded => panic!("huge point should escape"),
        }
    }

    #[test]
    fn smoothed_count_matches_formula() {
        // c = 2.1: z1 = 2.1, z2 = 6.51, z3 = 44.4801, first past 8 at i = 2
        let z3: f64 = 6.51 * 6.51 + 2.1;
        let expected = 2.0 - z3.ln() / 8.0_f64.ln();
        match escape(Complex::new(2.1, 0.0), 100) {
            EscapeResult::Escaped(n) => assert!((f64::from(n) - expected).abs() < 1e-5),
            EscapeResult::Bounded => panic!("2.1 should escape"),
        }
    }

    #[test]
    fn quick_escapes_are_clamped_to_zero() {
        // c = 3: z2 = 12, so the raw count 1 - log8(12) is negative
        assert_eq!(escape(Complex::new(3.0, 0.0), 100), EscapeResult::Escaped(0.0));
    }

    #[test]
    fn limit_of_zero_is_bounded() {
        assert_eq!(escape(Complex::new(100.0, 0.0), 0), EscapeResult::Bounded);
    }
}
