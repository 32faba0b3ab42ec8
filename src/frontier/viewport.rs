use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Pan and zoom of the view over the chain, as reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportTransform {
    pub pan_x: f64,
    pub pan_y: f64,
    pub scale: f64,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        ViewportTransform {
            pan_x: 0.0,
            pan_y: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseTransformError {
    #[error("expected `panX panY scale`, got {0} values")]
    ValueCount(usize),
    #[error("invalid number")]
    Number(#[from] std::num::ParseFloatError),
}

impl FromStr for ViewportTransform {
    type Err = ParseTransformError;

    /// whitespace separated `panX panY scale`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(f64::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        match values.as_slice() {
            [pan_x, pan_y, scale] => Ok(ViewportTransform {
                pan_x: *pan_x,
                pan_y: *pan_y,
                scale: *scale,
            }),
            other => Err(ParseTransformError::ValueCount(other.len())),
        }
    }
}

/// Node indices covered by the viewport, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    pub left: i64,
    pub right: i64,
}

impl VisibleRange {
    /// true if `index` lies in the range but not on its left edge, which
    /// means the view shows room left of it
    pub fn extends_left_of(&self, index: u64) -> bool {
        let index = index as i64;
        self.left < index && index <= self.right
    }

    /// true if `index` lies in the range but not on its right edge
    pub fn extends_right_of(&self, index: u64) -> bool {
        let index = index as i64;
        self.left <= index && index < self.right
    }
}

/// Pixel layout of the rendered chain: node `i` is drawn at
/// `pan_x + i * (node_width + padding) * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Geometry {
    pub node_width: f64,
    pub padding: f64,
    pub viewport_width: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            node_width: 100.0,
            padding: 10.0,
            viewport_width: 1200.0,
        }
    }
}

impl Geometry {
    /// `None` when the transform cannot be mapped to indices (zero,
    /// negative or non finite scale).
    pub fn visible_range(&self, transform: &ViewportTransform) -> Option<VisibleRange> {
        let unit = (self.node_width + self.padding) * transform.scale;
        if !(unit.is_finite() && unit > 0.0 && transform.pan_x.is_finite()) {
            return None;
        }
        let left = (-transform.pan_x / unit).floor();
        let right = ((self.viewport_width - transform.pan_x) / unit).floor();
        Some(VisibleRange {
            left: left as i64,
            right: right as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(pan_x: f64, scale: f64) -> ViewportTransform {
        ViewportTransform {
            pan_x,
            pan_y: 0.0,
            scale,
        }
    }

    #[test]
    fn visible_range_follows_pan_and_zoom() {
        let geometry = Geometry::default();
        assert_eq!(
            geometry.visible_range(&transform(0.0, 1.0)),
            Some(VisibleRange { left: 0, right: 10 })
        );
        assert_eq!(
            geometry.visible_range(&transform(-1100.0, 1.0)),
            Some(VisibleRange { left: 10, right: 20 })
        );
        assert_eq!(
            geometry.visible_range(&transform(0.0, 0.5)),
            Some(VisibleRange { left: 0, right: 21 })
        );
        assert_eq!(
            geometry.visible_range(&transform(550.0, 1.0)),
            Some(VisibleRange { left: -5, right: 5 })
        );
    }

    #[test]
    fn degenerate_scale_shows_nothing() {
        let geometry = Geometry::default();
        assert_eq!(geometry.visible_range(&transform(0.0, 0.0)), None);
        assert_eq!(geometry.visible_range(&transform(0.0, -1.0)), None);
        assert_eq!(geometry.visible_range(&transform(0.0, f64::NAN)), None);
    }

    #[test]
    fn edges_are_excluded_from_the_load_decision() {
        let range = VisibleRange { left: 2, right: 8 };
        assert!(range.extends_left_of(5));
        assert!(!range.extends_left_of(2));
        assert!(range.extends_left_of(8));
        assert!(!range.extends_left_of(9));
        assert!(range.extends_right_of(2));
        assert!(!range.extends_right_of(8));
    }

    #[test]
    fn transform_parses_from_a_line() {
        assert_eq!(
            "-10 0 2".parse::<ViewportTransform>(),
            Ok(transform(-10.0, 2.0))
        );
        assert_eq!(
            "1 2".parse::<ViewportTransform>(),
            Err(ParseTransformError::ValueCount(2))
        );
    }
}
