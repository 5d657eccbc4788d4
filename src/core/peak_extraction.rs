//! Strict local extrema of a sampled curve.

use serde::{Deserialize, Serialize};

/// Interior local minima (valleys) and maxima (peaks), as cent positions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extrema {
    pub valleys: Vec<i32>,
    pub peaks: Vec<i32>,
}

/// Scan `ys` for strict local extrema; index `i` is reported at `i + from`.
///
/// Endpoints are never flagged and plateaus (ties on either side) are neither.
pub fn find_extrema(ys: &[f32], from: i32) -> Extrema {
    let mut out = Extrema::default();
    if ys.len() < 3 {
        return out;
    }
    for (i, w) in ys.windows(3).enumerate() {
        let (prev, y, next) = (w[0], w[1], w[2]);
        let x = from + i as i32 + 1;
        if y < prev && y < next {
            out.valleys.push(x);
        }
        if y > prev && y > next {
            out.peaks.push(x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_valley_in_bowl() {
        let ex = find_extrema(&[3.0, 1.0, 0.0, 1.0, 3.0], -2);
        assert_eq!(ex.valleys, vec![0]);
        assert!(ex.peaks.is_empty());
    }

    #[test]
    fn monotonic_curve_has_no_extrema() {
        let ys: Vec<f32> = (0..50).map(|i| i as f32 * 0.5).collect();
        assert_eq!(find_extrema(&ys, 0), Extrema::default());
        let rev: Vec<f32> = ys.iter().rev().copied().collect();
        assert_eq!(find_extrema(&rev, 0), Extrema::default());
    }

    #[test]
    fn plateaus_are_not_extrema() {
        let ex = find_extrema(&[2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 2.0], 0);
        assert!(ex.valleys.is_empty());
        assert!(ex.peaks.is_empty());
    }

    #[test]
    fn endpoints_are_never_flagged() {
        let ex = find_extrema(&[0.0, 1.0, 0.0, 1.0, 0.0], 10);
        assert_eq!(ex.peaks, vec![11, 13]);
        assert_eq!(ex.valleys, vec![12]);
    }

    #[test]
    fn short_curves_have_no_interior() {
        assert_eq!(find_extrema(&[], 0), Extrema::default());
        assert_eq!(find_extrema(&[1.0, 0.0], 0), Extrema::default());
    }
}
