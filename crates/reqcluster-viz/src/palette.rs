//! Cluster color palette.

use image::Rgb;

use crate::error::VizError;

/// A palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedColor {
    pub name: &'static str,
    pub rgb: [u8; 3],
}

impl NamedColor {
    pub const fn new(name: &'static str, rgb: [u8; 3]) -> Self {
        Self { name, rgb }
    }

    pub fn pixel(&self) -> Rgb<u8> {
        Rgb(self.rgb)
    }
}

/// Default cluster colors, indexed by cluster id.
pub const DEFAULT_COLORS: [NamedColor; 12] = [
    NamedColor::new("red", [0xFF, 0x00, 0x00]),
    NamedColor::new("blue", [0x00, 0x00, 0xFF]),
    NamedColor::new("green", [0x00, 0x80, 0x00]),
    NamedColor::new("orange", [0xFF, 0xA5, 0x00]),
    NamedColor::new("purple", [0x80, 0x00, 0x80]),
    NamedColor::new("yellow", [0xFF, 0xFF, 0x00]),
    NamedColor::new("cyan", [0x00, 0xFF, 0xFF]),
    NamedColor::new("magenta", [0xFF, 0x00, 0xFF]),
    NamedColor::new("lime", [0x00, 0xFF, 0x00]),
    NamedColor::new("pink", [0xFF, 0xC0, 0xCB]),
    NamedColor::new("brown", [0xA5, 0x2A, 0x2A]),
    NamedColor::new("gray", [0x80, 0x80, 0x80]),
];

/// Ordered set of distinct colors; cluster `i` is drawn with color `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<NamedColor>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS.to_vec(),
        }
    }
}

impl Palette {
    pub fn new(colors: Vec<NamedColor>) -> Self {
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color(&self, cluster: usize) -> Option<&NamedColor> {
        self.colors.get(cluster)
    }

    /// Fail unless every cluster id in `[0, groups)` has a color.
    pub fn ensure_covers(&self, groups: usize) -> Result<(), VizError> {
        if groups > self.colors.len() {
            return Err(VizError::InsufficientPalette {
                groups,
                palette: self.colors.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_palette() {
        let palette = Palette::default();
        assert_eq!(palette.len(), 12);
        assert_eq!(palette.color(0).unwrap().name, "red");
        assert_eq!(palette.color(11).unwrap().name, "gray");
        assert!(palette.color(12).is_none());
    }

    #[test]
    fn test_default_colors_are_distinct() {
        let distinct: HashSet<[u8; 3]> = DEFAULT_COLORS.iter().map(|c| c.rgb).collect();
        assert_eq!(distinct.len(), DEFAULT_COLORS.len());
    }

    #[test]
    fn test_ensure_covers() {
        let palette = Palette::default();
        assert!(palette.ensure_covers(1).is_ok());
        assert!(palette.ensure_covers(12).is_ok());
        assert!(matches!(
            palette.ensure_covers(13),
            Err(VizError::InsufficientPalette {
                groups: 13,
                palette: 12
            })
        ));
    }

    #[test]
    fn test_custom_palette() {
        let palette = Palette::new(vec![NamedColor::new("black", [0, 0, 0])]);
        assert_eq!(palette.color(0).unwrap().pixel(), Rgb([0, 0, 0]));
        assert!(palette.ensure_covers(2).is_err());
    }
}
