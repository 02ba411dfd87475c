// src/impact/magnitude.rs
use serde::{Deserialize, Serialize};

/// Bucketed severity of a percent price change, ordered from smallest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Negligible,
    Minimal,
    Moderate,
    Significant,
    Major,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Unchanged,
}

impl Direction {
    pub fn of(percent_change: f64) -> Self {
        if percent_change > 0.0 {
            Direction::Up
        } else if percent_change < 0.0 {
            Direction::Down
        } else {
            Direction::Unchanged
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Unchanged => "unchanged",
        }
    }
}

/// Lower bounds (inclusive) of each non-negligible class, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeThresholds {
    pub minimal: f64,
    pub moderate: f64,
    pub significant: f64,
    pub major: f64,
    pub extreme: f64,
}

impl Default for MagnitudeThresholds {
    fn default() -> Self {
        Self {
            minimal: 0.1,
            moderate: 0.3,
            significant: 0.5,
            major: 1.0,
            extreme: 2.0,
        }
    }
}

impl MagnitudeThresholds {
    /// First match wins, largest threshold first. NaN falls through to negligible.
    pub fn classify(&self, percent_change: f64) -> Magnitude {
        let a = percent_change.abs();
        if a >= self.extreme {
            Magnitude::Extreme
        } else if a >= self.major {
            Magnitude::Major
        } else if a >= self.significant {
            Magnitude::Significant
        } else if a >= self.moderate {
            Magnitude::Moderate
        } else if a >= self.minimal {
            Magnitude::Minimal
        } else {
            Magnitude::Negligible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive_lower_bounds() {
        let t = MagnitudeThresholds::default();
        assert_eq!(t.classify(0.0), Magnitude::Negligible);
        assert_eq!(t.classify(0.099), Magnitude::Negligible);
        assert_eq!(t.classify(0.1), Magnitude::Minimal);
        assert_eq!(t.classify(-0.3), Magnitude::Moderate);
        assert_eq!(t.classify(0.5), Magnitude::Significant);
        assert_eq!(t.classify(-1.0), Magnitude::Major);
        assert_eq!(t.classify(1.99), Magnitude::Major);
        assert_eq!(t.classify(2.0), Magnitude::Extreme);
        assert_eq!(t.classify(f64::INFINITY), Magnitude::Extreme);
        assert_eq!(t.classify(f64::NAN), Magnitude::Negligible);
    }

    #[test]
    fn classification_is_monotonic_in_abs_value() {
        let t = MagnitudeThresholds::default();
        let mut prev = Magnitude::Negligible;
        let mut x = 0.0;
        while x < 3.0 {
            let m = t.classify(x);
            assert!(m >= prev, "magnitude decreased at {x}");
            assert_eq!(m, t.classify(-x));
            prev = m;
            x += 0.01;
        }
    }

    #[test]
    fn direction_from_sign() {
        assert_eq!(Direction::of(0.01), Direction::Up);
        assert_eq!(Direction::of(-0.01), Direction::Down);
        assert_eq!(Direction::of(0.0), Direction::Unchanged);
        assert_eq!(Direction::of(-0.0), Direction::Unchanged);
    }
}
