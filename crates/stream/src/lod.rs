use proxim_common::Tier;

use crate::config::ConfigError;

/// Ascending distance boundaries partitioning space into detail tiers.
///
/// `bounds[i]` is the exclusive upper bound of `Detail(i)`: a distance equal
/// to a boundary already belongs to the next tier. Past the last boundary
/// objects are `Culled`.
#[derive(Debug, Clone, PartialEq)]
pub struct LodThresholds {
    bounds: Vec<f32>,
}

impl LodThresholds {
    /// Validate boundaries as given. They must be finite, non-negative and
    /// strictly ascending.
    pub fn new(bounds: Vec<f32>) -> Result<Self, ConfigError> {
        if bounds.is_empty() {
            return Err(ConfigError::EmptyThresholds);
        }
        if bounds.len() > usize::from(u8::MAX) {
            return Err(ConfigError::TooManyThresholds(bounds.len()));
        }
        for (index, &value) in bounds.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { index, value });
            }
            if index > 0 && value <= bounds[index - 1] {
                return Err(ConfigError::NonMonotonicThresholds {
                    index,
                    previous: bounds[index - 1],
                    value,
                });
            }
        }
        Ok(Self { bounds })
    }

    /// Drop unusable values, sort and deduplicate, then validate.
    pub fn normalized(mut bounds: Vec<f32>) -> Result<Self, ConfigError> {
        bounds.retain(|b| b.is_finite() && *b >= 0.0);
        bounds.sort_by(f32::total_cmp);
        bounds.dedup();
        Self::new(bounds)
    }

    pub fn bounds(&self) -> &[f32] {
        &self.bounds
    }

    /// Number of detail tiers before `Culled`.
    pub fn detail_levels(&self) -> usize {
        self.bounds.len()
    }

    /// Map a distance to its tier. Monotonic non-decreasing in `distance`;
    /// NaN is treated as infinitely far.
    pub fn classify(&self, distance: f32) -> Tier {
        if distance.is_nan() {
            return Tier::Culled;
        }
        let crossed = self.bounds.partition_point(|&bound| bound <= distance);
        self.tier_at(crossed)
    }

    /// Position of a tier on this scale: `Detail(i)` is `i`, `Culled` is
    /// `detail_levels()`. Detail levels past the scale clamp to it.
    pub fn rank(&self, tier: Tier) -> usize {
        match tier {
            Tier::Detail(level) => usize::from(level).min(self.bounds.len()),
            Tier::Culled => self.bounds.len(),
        }
    }

    fn tier_at(&self, rank: usize) -> Tier {
        if rank >= self.bounds.len() {
            Tier::Culled
        } else {
            // rank < bounds.len() <= 255
            Tier::Detail(rank as u8)
        }
    }

    /// Tiers visited going from `from` to `to`, excluding `from` and ending
    /// with `to`. Empty when both sit at the same rank.
    pub fn path(&self, from: Tier, to: Tier) -> Vec<Tier> {
        let start = self.rank(from);
        let end = self.rank(to);
        if start < end {
            (start + 1..=end).map(|rank| self.tier_at(rank)).collect()
        } else {
            (end..start).rev().map(|rank| self.tier_at(rank)).collect()
        }
    }
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            bounds: vec![15.0, 30.0, 50.0, 80.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> LodThresholds {
        LodThresholds::new(vec![15.0, 30.0, 50.0, 80.0]).unwrap()
    }

    #[test]
    fn classify_reference_distances() {
        let t = thresholds();
        assert_eq!(t.classify(10.0), Tier::Detail(0));
        assert_eq!(t.classify(20.0), Tier::Detail(1));
        assert_eq!(t.classify(49.9), Tier::Detail(2));
        assert_eq!(t.classify(80.5), Tier::Culled);
    }

    #[test]
    fn boundaries_belong_to_the_upper_tier() {
        let t = thresholds();
        let eps = 1e-3;
        for &bound in t.bounds() {
            let below = t.classify(bound - eps);
            let at = t.classify(bound);
            let above = t.classify(bound + eps);
            assert!(below < at, "{below} should be below {at} at {bound}");
            assert!(at <= above);
        }
        assert_eq!(t.classify(80.0), Tier::Culled);
        assert_eq!(t.classify(15.0), Tier::Detail(1));
    }

    #[test]
    fn classify_is_monotonic() {
        let t = thresholds();
        let mut previous = t.classify(0.0);
        for step in 1..2000 {
            let tier = t.classify(step as f32 * 0.05);
            assert!(previous <= tier);
            previous = tier;
        }
        assert_eq!(previous, Tier::Culled);
    }

    #[test]
    fn odd_distances() {
        let t = thresholds();
        assert_eq!(t.classify(-5.0), Tier::Detail(0));
        assert_eq!(t.classify(f32::INFINITY), Tier::Culled);
        assert_eq!(t.classify(f32::NAN), Tier::Culled);
    }

    #[test]
    fn validation_errors() {
        assert_eq!(LodThresholds::new(vec![]), Err(ConfigError::EmptyThresholds));
        assert_eq!(
            LodThresholds::new(vec![10.0, 10.0]),
            Err(ConfigError::NonMonotonicThresholds {
                index: 1,
                previous: 10.0,
                value: 10.0
            })
        );
        assert!(matches!(
            LodThresholds::new(vec![10.0, f32::INFINITY]),
            Err(ConfigError::InvalidThreshold { index: 1, .. })
        ));
        assert!(matches!(
            LodThresholds::new(vec![-1.0]),
            Err(ConfigError::InvalidThreshold { index: 0, .. })
        ));
        assert_eq!(
            LodThresholds::new((0..300).map(|i| i as f32).collect()),
            Err(ConfigError::TooManyThresholds(300))
        );
    }

    #[test]
    fn normalization_sorts_and_dedups() {
        let t = LodThresholds::normalized(vec![80.0, f32::NAN, 15.0, 30.0, 15.0, -2.0]).unwrap();
        assert_eq!(t.bounds(), &[15.0, 30.0, 80.0]);
        assert_eq!(
            LodThresholds::normalized(vec![f32::NAN]),
            Err(ConfigError::EmptyThresholds)
        );
    }

    #[test]
    fn path_visits_intermediate_tiers() {
        let t = thresholds();
        assert_eq!(
            t.path(Tier::Detail(0), Tier::Culled),
            vec![Tier::Detail(1), Tier::Detail(2), Tier::Detail(3), Tier::Culled]
        );
        assert_eq!(
            t.path(Tier::Culled, Tier::Detail(1)),
            vec![Tier::Detail(3), Tier::Detail(2), Tier::Detail(1)]
        );
        assert!(t.path(Tier::Detail(2), Tier::Detail(2)).is_empty());
    }

    #[test]
    fn out_of_scale_tiers_clamp() {
        let t = LodThresholds::new(vec![10.0]).unwrap();
        assert_eq!(t.rank(Tier::Detail(9)), 1);
        assert_eq!(t.rank(Tier::Culled), 1);
        assert_eq!(t.detail_levels(), 1);
    }
}
