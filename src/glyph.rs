//! Brightness to glyph mapping.

/// Density ramp ordered from darkest to brightest.
pub const DENSITY_RAMP: &str =
    "  `.-':_,^=;><+!rc*/z?sLTv)J7(|Fi{C}fI31tlu[neoZ5Yxjya]2ESwqkP6h9d4VpOGbUAKXHm8RD#$Bg0MNWQ%&@";

/// Glyphs for the banded policy, one per band.
pub const BAND_GLYPHS: &[u8] = b" .-+*#@";

/// Lower edges of bands 1..=6; band 0 covers everything below 35.
pub const BAND_BOUNDARIES: [u8; 6] = [35, 70, 105, 140, 175, 210];

/// Policy for turning a brightness level into a display character.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlyphMapper {
    /// Continuous mapping over the full density ramp
    #[default]
    Ramp,
    /// Seven fixed brightness bands
    Bands,
}

impl GlyphMapper {
    /// Glyphs this policy chooses from, darkest first.
    pub fn glyphs(self) -> &'static [u8] {
        match self {
            GlyphMapper::Ramp => DENSITY_RAMP.as_bytes(),
            GlyphMapper::Bands => BAND_GLYPHS,
        }
    }

    /// Index into [`glyphs`](Self::glyphs) for a brightness level.
    pub fn level(self, brightness: u8) -> usize {
        match self {
            GlyphMapper::Ramp => {
                let top = DENSITY_RAMP.len() - 1;
                (brightness as usize * top / 255).min(top)
            }
            GlyphMapper::Bands => BAND_BOUNDARIES
                .iter()
                .take_while(|&&edge| brightness >= edge)
                .count(),
        }
    }

    pub fn map(self, brightness: u8) -> char {
        self.glyphs()[self.level(brightness)] as char
    }
}
