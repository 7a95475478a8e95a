pub const OPACITY_TRANSPARENT: f32 = 0.0;
pub const OPACITY_OPAQUE: f32 = 1.0;

pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * clamp01(t)
}

/// Linear opacity interpolation driven one scheduler tick at a time.
///
/// A fade is single-use: once it has emitted its final sample it stays finished,
/// and running it again requires a fresh value. The final sample is always the
/// exact target, independent of how the tick sizes summed up.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeInterpolator {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
    finished: bool,
}

impl FadeInterpolator {
    pub fn new(from: f32, to: f32, duration_seconds: f32) -> Self {
        Self {
            from: clamp01(from),
            to: clamp01(to),
            duration: duration_seconds,
            elapsed: 0.0,
            finished: false,
        }
    }

    pub fn from(&self) -> f32 {
        self.from
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advances by one tick and returns the sample for it, or `None` once the
    /// final sample has already been produced.
    pub fn advance(&mut self, dt_seconds: f32) -> Option<f32> {
        if self.finished {
            return None;
        }

        // Non-positive or non-finite durations complete on the first tick.
        if self.duration <= 0.0 || !self.duration.is_finite() {
            self.finished = true;
            return Some(self.to);
        }

        let step = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        self.elapsed += step;

        if self.elapsed >= self.duration {
            self.finished = true;
            return Some(self.to);
        }

        Some(clamp01(lerp(self.from, self.to, self.elapsed / self.duration)))
    }

    /// Jumps to the logical end of the fade and returns the target.
    pub fn finish(&mut self) -> f32 {
        self.finished = true;
        if self.duration.is_finite() && self.elapsed < self.duration {
            self.elapsed = self.duration;
        }
        self.to
    }

    pub fn samples(self, dt_seconds: f32) -> FadeSamples {
        FadeSamples {
            fade: self,
            dt_seconds,
        }
    }
}

/// Iterator view of a fade with a fixed tick size.
#[derive(Debug, Clone)]
pub struct FadeSamples {
    fade: FadeInterpolator,
    dt_seconds: f32,
}

impl Iterator for FadeSamples {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dt_seconds <= 0.0 && !self.fade.is_finished() && self.fade.duration > 0.0 {
            // A zero tick would never reach the end.
            return Some(self.fade.finish());
        }
        self.fade.advance(self.dt_seconds)
    }
}

pub fn fade(from: f32, to: f32, duration_seconds: f32, dt_seconds: f32) -> FadeSamples {
    FadeInterpolator::new(from, to, duration_seconds).samples(dt_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn final_sample_is_exact_target_for_positive_durations() {
        for (from, to, duration) in [
            (0.0, 1.0, 1.0),
            (1.0, 0.0, 0.37),
            (0.2, 0.9, 2.5),
            (0.7, 0.7, 0.1),
            (0.0, 1.0, DT * 0.5),
        ] {
            let last = fade(from, to, duration, DT).last().expect("at least one sample");
            assert_eq!(last, to, "from={from} to={to} duration={duration}");
        }
    }

    #[test]
    fn zero_duration_emits_single_target_sample() {
        let samples: Vec<f32> = fade(0.3, 1.0, 0.0, DT).collect();
        assert_eq!(samples, vec![1.0]);
    }

    #[test]
    fn negative_duration_completes_immediately() {
        let samples: Vec<f32> = fade(1.0, 0.0, -2.0, DT).collect();
        assert_eq!(samples, vec![0.0]);
    }

    #[test]
    fn samples_are_monotonic_and_within_unit_range() {
        let samples: Vec<f32> = fade(0.0, 1.0, 0.5, DT).collect();
        assert!(samples.len() >= 29 && samples.len() <= 31);
        for pair in samples.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(samples.iter().all(|value| (0.0..=1.0).contains(value)));
    }

    #[test]
    fn overshooting_tick_is_clamped_to_target() {
        let mut fade = FadeInterpolator::new(0.0, 1.0, 0.1);
        assert_eq!(fade.advance(5.0), Some(1.0));
        assert!(fade.is_finished());
        assert_eq!(fade.advance(DT), None);
    }

    #[test]
    fn inputs_are_clamped_to_unit_range() {
        let fade = FadeInterpolator::new(-3.0, 4.0, 1.0);
        assert_eq!(fade.from(), 0.0);
        assert_eq!(fade.target(), 1.0);
    }

    #[test]
    fn negative_tick_does_not_rewind_elapsed() {
        let mut fade = FadeInterpolator::new(0.0, 1.0, 1.0);
        fade.advance(0.25);
        fade.advance(-1.0);
        assert_eq!(fade.elapsed(), 0.25);
    }

    #[test]
    fn finish_jumps_to_target_and_stops_sampling() {
        let mut fade = FadeInterpolator::new(1.0, 0.0, 2.0);
        fade.advance(0.5);
        assert_eq!(fade.finish(), 0.0);
        assert!(fade.is_finished());
        assert_eq!(fade.advance(DT), None);
    }

    #[test]
    fn zero_tick_iterator_terminates() {
        let samples: Vec<f32> = fade(0.0, 1.0, 1.0, 0.0).collect();
        assert_eq!(samples, vec![1.0]);
    }
}
