//! Resize engine - cover-fit and forced-aspect layout
//!
//! Converts the container's measured size into the placement of the
//! backend player element. Geometry is never patched in place: every
//! resize signal produces a fresh [`Layout`].

use serde::{Deserialize, Serialize};

/// Placement of the player element relative to its container
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub width: f64,
    pub height: f64,
    pub offset_left: f64,
    pub offset_top: f64,
}

impl Geometry {
    /// Geometry filling a box exactly, without offset
    pub fn filling(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            offset_left: 0.0,
            offset_top: 0.0,
        }
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} @ ({}, {})",
            self.width, self.height, self.offset_left, self.offset_top
        )
    }
}

/// Result of one layout pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// New container height, set only in force-aspect mode
    pub container_height: Option<f64>,
    /// Player element placement
    pub player: Geometry,
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Compute the player placement for a container.
///
/// In force-aspect mode the container height is derived from its width
/// and the player fills it. Otherwise, with `fit_container` the player
/// covers the container and is centered on the cropped axis, which can
/// produce negative offsets. Without it the player takes the container size.
pub fn compute_geometry(
    container_width: f64,
    container_height: f64,
    ratio: f64,
    force_aspect: bool,
    fit_container: bool,
) -> Layout {
    let width = container_width.max(0.0);
    let height = container_height.max(0.0);

    if !(ratio.is_finite() && ratio > 0.0) {
        return Layout {
            container_height: None,
            player: Geometry::filling(width, height),
        };
    }

    if force_aspect {
        let derived = round_to(width / ratio, 3);
        return Layout {
            container_height: Some(derived),
            player: Geometry::filling(width, derived),
        };
    }

    if !fit_container {
        return Layout {
            container_height: None,
            player: Geometry::filling(width, height),
        };
    }

    let player = if width / ratio < height {
        // Height-constrained: crop left and right
        let scaled_width = (height * ratio).ceil();
        Geometry {
            width: scaled_width,
            height,
            offset_left: (width - scaled_width) / 2.0,
            offset_top: 0.0,
        }
    } else {
        // Width-constrained: crop top and bottom
        let scaled_height = (width / ratio).ceil();
        Geometry {
            width,
            height: scaled_height,
            offset_left: 0.0,
            offset_top: (height - scaled_height) / 2.0,
        }
    };

    Layout {
        container_height: None,
        player,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDESCREEN: f64 = 16.0 / 9.0;

    #[test]
    fn test_wide_container_crops_vertically() {
        let layout = compute_geometry(1000.0, 300.0, 1.778, false, true);
        assert_eq!(layout.container_height, None);
        assert_eq!(layout.player.width, 1000.0);
        assert_eq!(layout.player.height, 563.0);
        assert_eq!(layout.player.offset_left, 0.0);
        assert_eq!(layout.player.offset_top, -131.5);
    }

    #[test]
    fn test_tall_container_crops_horizontally() {
        let layout = compute_geometry(400.0, 800.0, WIDESCREEN, false, true);
        assert_eq!(layout.player.height, 800.0);
        assert_eq!(layout.player.width, 1423.0);
        assert_eq!(layout.player.offset_left, -511.5);
        assert_eq!(layout.player.offset_top, 0.0);
    }

    #[test]
    fn test_force_aspect_derives_container_height() {
        let layout = compute_geometry(800.0, 120.0, WIDESCREEN, true, true);
        assert_eq!(layout.container_height, Some(450.0));
        assert_eq!(layout.player, Geometry::filling(800.0, 450.0));
    }

    #[test]
    fn test_force_aspect_rounds_to_three_places() {
        let layout = compute_geometry(800.0, 0.0, 1.778, true, false);
        assert_eq!(layout.container_height, Some(449.944));
        assert_eq!(layout.player.height, 449.944);
    }

    #[test]
    fn test_pass_through_without_fit() {
        let layout = compute_geometry(640.0, 480.0, WIDESCREEN, false, false);
        assert_eq!(layout.player, Geometry::filling(640.0, 480.0));
    }

    #[test]
    fn test_cover_always_covers() {
        for &(w, h) in &[(1.0, 1.0), (1920.0, 1080.0), (320.0, 900.0), (2560.0, 200.0), (777.0, 437.0)] {
            for &ratio in &[1.0, 4.0 / 3.0, WIDESCREEN, 2.39] {
                let g = compute_geometry(w, h, ratio, false, true).player;
                assert!(g.width >= w, "{}x{} r={} -> {}", w, h, ratio, g);
                assert!(g.height >= h, "{}x{} r={} -> {}", w, h, ratio, g);
                if g.offset_left != 0.0 {
                    assert_eq!(g.offset_top, 0.0);
                    assert_eq!(g.offset_left, (w - g.width) / 2.0);
                } else {
                    assert_eq!(g.offset_top, (h - g.height) / 2.0);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        let zero = compute_geometry(0.0, 0.0, WIDESCREEN, false, true);
        assert_eq!(zero.player, Geometry::filling(0.0, 0.0));

        let negative = compute_geometry(-10.0, -5.0, WIDESCREEN, false, false);
        assert_eq!(negative.player, Geometry::filling(0.0, 0.0));

        let bad_ratio = compute_geometry(100.0, 50.0, 0.0, true, true);
        assert_eq!(bad_ratio.container_height, None);
        assert_eq!(bad_ratio.player, Geometry::filling(100.0, 50.0));
    }
}
