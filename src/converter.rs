use crate::glyph::GlyphMapper;
use crate::{PlayerError, Result};
use image::{GenericImageView, Pixel};
use std::fmt;

/// A terminal-sized grid of glyphs for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphGrid {
    /// Glyphs in row-major order
    cells: Vec<char>,
    /// Grid width in characters
    width: u16,
    /// Grid height in characters
    height: u16,
}

impl GlyphGrid {
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Iterate over the grid one row at a time, top first
    pub fn rows(&self) -> impl Iterator<Item = &[char]> {
        self.cells.chunks(self.width as usize)
    }
}

impl fmt::Display for GlyphGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            for &glyph in row {
                write!(f, "{}", glyph)?;
            }
        }
        Ok(())
    }
}

/// Decoded image to glyph grid converter
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameRasterizer {
    glyphs: GlyphMapper,
}

impl FrameRasterizer {
    /// Create a new rasterizer using the given glyph policy
    pub fn new(glyphs: GlyphMapper) -> Self {
        Self { glyphs }
    }

    /// Sample `image` down to a `width` x `height` grid of glyphs.
    ///
    /// Cell `(row, col)` takes the source pixel at
    /// `(col * src_width / width, row * src_height / height)`; no interpolation.
    pub fn rasterize<I>(&self, image: &I, width: u16, height: u16) -> Result<GlyphGrid>
    where
        I: GenericImageView,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        if width == 0 || height == 0 {
            return Err(PlayerError::InvalidGridSize { width, height });
        }

        let (src_width, src_height) = image.dimensions();
        if src_width == 0 || src_height == 0 {
            return Err(PlayerError::EmptyImage);
        }

        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height as u64 {
            let y = (row * src_height as u64 / height as u64) as u32;
            for col in 0..width as u64 {
                let x = (col * src_width as u64 / width as u64) as u32;
                let brightness = brightness(image.get_pixel(x, y));
                cells.push(self.glyphs.map(brightness));
            }
        }

        Ok(GlyphGrid {
            cells,
            width,
            height,
        })
    }
}

/// Unweighted mean of the red, green and blue channels
fn brightness<P: Pixel<Subpixel = u8>>(pixel: P) -> u8 {
    let [r, g, b] = pixel.to_rgb().0;
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}
