//! Screen geometry for Xvfb's `-screen 0 <geometry>` argument.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Screen configuration in `WIDTHxHEIGHTxDEPTH` form.
///
/// Rendered verbatim as the geometry argument of the supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Screen width in pixels
    pub width: u32,
    /// Screen height in pixels
    pub height: u32,
    /// Color depth in bits
    pub depth: u32,
}

impl ScreenConfig {
    /// Create a new screen configuration.
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

impl Default for ScreenConfig {
    /// The default screen configuration for screen 0 (`1280x720x24`).
    fn default() -> Self {
        Self::new(1280, 720, 24)
    }
}

impl fmt::Display for ScreenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// Errors from parsing a `WIDTHxHEIGHTxDEPTH` geometry string.
#[derive(Debug, Error)]
pub enum ScreenConfigError {
    /// The string did not have exactly three `x`-separated fields
    #[error("Invalid screen geometry '{0}': expected WIDTHxHEIGHTxDEPTH")]
    Malformed(String),

    /// A field was present but not a positive integer
    #[error("Invalid screen geometry '{geometry}': bad {field} value")]
    BadField {
        geometry: String,
        field: &'static str,
    },
}

impl FromStr for ScreenConfig {
    type Err = ScreenConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('x');
        let (Some(w), Some(h), Some(d), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ScreenConfigError::Malformed(s.to_string()));
        };

        let parse = |raw: &str, field: &'static str| {
            raw.parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| ScreenConfigError::BadField {
                    geometry: s.to_string(),
                    field,
                })
        };

        Ok(Self {
            width: parse(w, "width")?,
            height: parse(h, "height")?,
            depth: parse(d, "depth")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry() {
        assert_eq!(ScreenConfig::default().to_string(), "1280x720x24");
    }

    #[test]
    fn parse_round_trips() {
        let cfg: ScreenConfig = "800x600x16".parse().unwrap();
        assert_eq!(cfg, ScreenConfig::new(800, 600, 16));
        assert_eq!(cfg.to_string(), "800x600x16");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("800x600".parse::<ScreenConfig>().is_err());
        assert!("800x600x16x2".parse::<ScreenConfig>().is_err());
        assert!("800x0x16".parse::<ScreenConfig>().is_err());
        assert!("widexhighxdeep".parse::<ScreenConfig>().is_err());
    }

    #[test]
    fn serializes_as_struct() {
        let json = serde_json::to_string(&ScreenConfig::default()).unwrap();
        assert!(json.contains("\"width\":1280"));
    }
}
