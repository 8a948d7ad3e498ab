use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use tileforge_core::ZoomLevels;

/// Resampling method used when deriving a zoom level from a neighbouring one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resampling {
	#[default]
	Nearest,
	Bilinear,
	Cubic,
	CubicSpline,
	Lanczos,
	Average,
	Mode,
	Gauss,
}

/// Zoom levels that are computed by the user process.
///
/// Zoom levels below `min` are derived from the zoom level above them using `lower`;
/// zoom levels above `max` are derived from the zoom level below them using `higher`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Baselevels {
	pub min: u8,
	pub max: u8,
	#[serde(default)]
	pub lower: Resampling,
	#[serde(default)]
	pub higher: Resampling,
}

/// How a zoom level outside of the baselevels is derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaselevelRole {
	/// Downsampled from the four children at `zoom + 1`.
	Lower(Resampling),
	/// Upsampled from the parent at `zoom - 1`.
	Higher(Resampling),
}

impl Baselevels {
	pub fn new(min: u8, max: u8) -> Baselevels {
		Baselevels {
			min,
			max,
			lower: Resampling::default(),
			higher: Resampling::default(),
		}
	}

	/// Checks that the baselevels lie inside the configured zoom levels.
	pub fn validate(&self, zoom_levels: &ZoomLevels) -> Result<()> {
		ensure!(
			self.min <= self.max,
			"baselevels min ({}) must be <= max ({})",
			self.min,
			self.max
		);
		ensure!(
			zoom_levels.contains(self.min) && zoom_levels.contains(self.max),
			"baselevels {}..={} must lie inside zoom levels {zoom_levels:?}",
			self.min,
			self.max
		);
		Ok(())
	}

	/// Zoom levels computed by the user process.
	pub fn processed(&self) -> ZoomLevels {
		ZoomLevels {
			min: self.min,
			max: self.max,
		}
	}

	/// Returns how `zoom` is derived, or `None` if it is computed directly.
	pub fn role(&self, zoom: u8) -> Option<BaselevelRole> {
		if zoom < self.min {
			Some(BaselevelRole::Lower(self.lower))
		} else if zoom > self.max {
			Some(BaselevelRole::Higher(self.higher))
		} else {
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roles_around_baselevels() {
		let baselevels = Baselevels {
			lower: Resampling::Average,
			higher: Resampling::Bilinear,
			..Baselevels::new(3, 4)
		};
		assert_eq!(baselevels.role(2), Some(BaselevelRole::Lower(Resampling::Average)));
		assert_eq!(baselevels.role(3), None);
		assert_eq!(baselevels.role(4), None);
		assert_eq!(baselevels.role(5), Some(BaselevelRole::Higher(Resampling::Bilinear)));
	}

	#[test]
	fn validates_against_zoom_levels() {
		let zooms = ZoomLevels::new(0, 5).unwrap();
		assert!(Baselevels::new(2, 3).validate(&zooms).is_ok());
		assert!(Baselevels::new(4, 6).validate(&zooms).is_err());
		assert!(Baselevels::new(3, 2).validate(&zooms).is_err());
	}
}
