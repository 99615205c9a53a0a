use serde::Serialize;
use std::fmt;

/// A size bracket `[lower_pyeong, lower_pyeong + width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SizeBracket {
    pub lower_pyeong: u32,
    pub width: u32,
}

impl fmt::Display for SizeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width <= 1 {
            write!(f, "{}평", self.lower_pyeong)
        } else {
            write!(f, "{}~{}평", self.lower_pyeong, self.lower_pyeong + self.width - 1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketPolicy {
    pub width_pyeong: u32,
}

impl Default for BracketPolicy {
    fn default() -> Self {
        Self { width_pyeong: 1 }
    }
}

impl BracketPolicy {
    /// Floors the area to the bracket grid. Listings without a usable area
    /// have no bracket.
    pub fn bracket_for(&self, area_pyeong: f64) -> Option<SizeBracket> {
        if !area_pyeong.is_finite() || area_pyeong <= 0.0 {
            return None;
        }
        let width = self.width_pyeong.max(1);
        let whole = area_pyeong.floor() as u32;
        Some(SizeBracket {
            lower_pyeong: whole - whole % width,
            width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bracket_floors_to_whole_pyeong() {
        let policy = BracketPolicy::default();
        assert_eq!(policy.bracket_for(25.71).unwrap().lower_pyeong, 25);
        assert_eq!(policy.bracket_for(25.0).unwrap().lower_pyeong, 25);
        assert_eq!(policy.bracket_for(24.99).unwrap().lower_pyeong, 24);
        assert_eq!(policy.bracket_for(0.0), None);
        assert_eq!(policy.bracket_for(f64::NAN), None);
    }

    #[test]
    fn test_wider_brackets_and_labels() {
        let policy = BracketPolicy { width_pyeong: 5 };
        let b = policy.bracket_for(33.9).unwrap();
        assert_eq!(b.lower_pyeong, 30);
        assert_eq!(b.to_string(), "30~34평");
        assert_eq!(BracketPolicy::default().bracket_for(33.9).unwrap().to_string(), "33평");
    }
}
