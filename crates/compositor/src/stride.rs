use crate::quality::MapQuality;

/// Largest stride considered when searching for the best one.
pub const MAX_STRIDE: usize = 47;

/// Stride used when the sphere does not cover the whole canvas.
pub const DISC_STRIDE: usize = 8;

/// Finest stride allowed in high quality.
pub const HIGH_QUALITY_STRIDE: usize = 4;

/// Stride that best tiles a scanline of `width` pixels: the first `it` in
/// `1..=47` minimizing `(width - 1) % it + (width - 1) / it`.
pub fn optimal_stride(width: usize) -> usize {
    if width <= 1 {
        return 1;
    }
    let span = width - 1;
    let mut best = 1;
    let mut best_eval = span;
    for it in 1..=MAX_STRIDE {
        let eval = span % it + span / it;
        if eval < best_eval {
            best_eval = eval;
            best = it;
        }
    }
    best
}

/// Stride for one frame.
///
/// `covers_canvas` is true when the projected sphere reaches every canvas
/// corner, i.e. `(w² + h²) / 4 < r²`.
pub fn frame_stride(n_best: usize, quality: MapQuality, covers_canvas: bool) -> usize {
    let base = if covers_canvas { n_best } else { DISC_STRIDE };
    match quality {
        MapQuality::Print => 1,
        MapQuality::High => base.clamp(1, HIGH_QUALITY_STRIDE),
        _ => base.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::{frame_stride, optimal_stride};
    use crate::quality::MapQuality;

    fn brute_force(width: usize) -> usize {
        let span = width - 1;
        (1..=47usize)
            .min_by_key(|it| (span % it + span / it, *it))
            .expect("non-empty range")
    }

    #[test]
    fn width_361_picks_45() {
        assert_eq!(optimal_stride(361), 45);
        assert_eq!(optimal_stride(361), brute_force(361));
    }

    #[test]
    fn matches_first_argmin_for_many_widths() {
        for width in 2..2000 {
            assert_eq!(optimal_stride(width), brute_force(width), "width {width}");
        }
    }

    #[test]
    fn degenerate_widths_use_one() {
        assert_eq!(optimal_stride(0), 1);
        assert_eq!(optimal_stride(1), 1);
        assert_eq!(optimal_stride(2), 1);
    }

    #[test]
    fn quality_tiers() {
        assert_eq!(frame_stride(45, MapQuality::Print, true), 1);
        assert_eq!(frame_stride(45, MapQuality::High, true), 4);
        assert_eq!(frame_stride(3, MapQuality::High, true), 3);
        assert_eq!(frame_stride(45, MapQuality::Normal, true), 45);
        assert_eq!(frame_stride(45, MapQuality::Normal, false), 8);
        assert_eq!(frame_stride(45, MapQuality::Low, false), 8);
    }
}
