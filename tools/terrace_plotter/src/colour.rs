//! Colour maps for terrace figures.
//!
//! `rainbow` follows the usual analytic rainbow ramp (purple → red);
//! `reds` is a white → dark red multi-stop ramp.

pub type Rgb = [u8; 3];

pub const WHITE: Rgb = [255, 255, 255];

#[derive(Debug, Clone, Copy)]
struct ColourStop {
    t: f64,
    colour: Rgb,
}

const fn stop(t: f64, r: u8, g: u8, b: u8) -> ColourStop {
    ColourStop { t, colour: [r, g, b] }
}

const REDS_STOPS: &[ColourStop] = &[
    stop(0.00, 255, 245, 240),
    stop(0.25, 252, 187, 161),
    stop(0.50, 251, 106, 74),
    stop(0.75, 203, 24, 29),
    stop(1.00, 103, 0, 13),
];

fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn lerp_colour(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    [lerp(c1[0], c2[0]), lerp(c1[1], c2[1]), lerp(c1[2], c2[2])]
}

fn multi_stop(stops: &[ColourStop], t: f64) -> Rgb {
    if t <= stops[0].t {
        return stops[0].colour;
    }
    for pair in stops.windows(2) {
        if t <= pair[1].t {
            let ratio = (t - pair[0].t) / (pair[1].t - pair[0].t);
            return lerp_colour(pair[0].colour, pair[1].colour, ratio);
        }
    }
    stops[stops.len() - 1].colour
}

/// Rainbow ramp at `t` ∈ [0, 1]:
///   r = |2t − 0.5|, g = sin(πt), b = cos(πt/2), each clipped to [0, 1].
pub fn rainbow(t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let pi = std::f64::consts::PI;
    [
        to_u8((2.0 * t - 0.5).abs()),
        to_u8((pi * t).sin()),
        to_u8((pi * t / 2.0).cos()),
    ]
}

/// Sequential white → dark red ramp at `t` ∈ [0, 1].
pub fn reds(t: f64) -> Rgb {
    multi_stop(REDS_STOPS, t.clamp(0.0, 1.0))
}

/// `n` rainbow colours sampled evenly from both ends of the ramp.
pub fn discrete_rainbow(n: usize) -> Vec<Rgb> {
    match n {
        0 => Vec::new(),
        1 => vec![rainbow(0.0)],
        _ => (0..n).map(|i| rainbow(i as f64 / (n - 1) as f64)).collect(),
    }
}

/// Bin `value` into one of `n` equal classes over `[lo, hi]`.
pub fn discrete_index(value: f64, lo: f64, hi: f64, n: usize) -> usize {
    if n <= 1 || !(hi > lo) {
        return 0;
    }
    let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
    ((t * n as f64).floor() as usize).min(n - 1)
}

/// `over` composited on `under` with opacity `alpha`.
pub fn blend(under: Rgb, over: Rgb, alpha: f32) -> Rgb {
    let a = alpha.clamp(0.0, 1.0) as f64;
    lerp_colour(under, over, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rainbow_endpoints() {
        assert_eq!(rainbow(0.0), [128, 0, 255]);
        assert_eq!(rainbow(1.0), [255, 0, 0]);
        // Out of range clamps.
        assert_eq!(rainbow(-3.0), rainbow(0.0));
    }

    #[test]
    fn reds_endpoints_and_midpoint() {
        assert_eq!(reds(0.0), [255, 245, 240]);
        assert_eq!(reds(0.5), [251, 106, 74]);
        assert_eq!(reds(1.0), [103, 0, 13]);
    }

    #[test]
    fn discrete_rainbow_spans_ramp() {
        assert!(discrete_rainbow(0).is_empty());
        assert_eq!(discrete_rainbow(1), vec![rainbow(0.0)]);
        let five = discrete_rainbow(5);
        assert_eq!(five.len(), 5);
        assert_eq!(five[0], rainbow(0.0));
        assert_eq!(five[4], rainbow(1.0));
    }

    #[test]
    fn discrete_index_bins_evenly() {
        assert_eq!(discrete_index(1.0, 1.0, 9.0, 4), 0);
        assert_eq!(discrete_index(3.0, 1.0, 9.0, 4), 1);
        assert_eq!(discrete_index(8.9, 1.0, 9.0, 4), 3);
        assert_eq!(discrete_index(9.0, 1.0, 9.0, 4), 3);
        assert_eq!(discrete_index(5.0, 5.0, 5.0, 4), 0);
    }

    #[test]
    fn blend_weights_overlay() {
        assert_eq!(blend([0, 0, 0], WHITE, 0.0), [0, 0, 0]);
        assert_eq!(blend([0, 0, 0], WHITE, 1.0), WHITE);
        assert_eq!(blend([0, 0, 0], [100, 200, 50], 0.8), [80, 160, 40]);
    }
}
