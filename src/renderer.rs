use crate::converter::GlyphGrid;
use crate::Result;
use crossterm::{
    cursor::{Hide, MoveToNextLine, MoveToPreviousLine, RestorePosition, SavePosition, Show},
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use log::debug;
use std::io::{stdout, BufWriter, Stdout, Write};

/// Output buffer size; large enough to hold a full frame on common terminals.
const FRAME_BUFFER_CAPACITY: usize = 64 * 1024;

/// A drawing area that receives one glyph grid per frame.
pub trait Surface {
    /// Reserve a blank `width` x `height` region plus one status row and remember its origin.
    fn initialize(&mut self, width: u16, height: u16) -> Result<()>;

    /// Re-establish the region after the terminal geometry changed.
    fn resize(&mut self, width: u16, height: u16) -> Result<()>;

    /// Overwrite the region in place. `None` leaves the status row empty.
    fn present(&mut self, grid: &GlyphGrid, status: Option<&str>) -> Result<()>;

    /// Leave the terminal usable: cursor visible and below the region.
    fn restore(&mut self) -> Result<()>;
}

/// In-place terminal renderer for glyph grids
pub struct TerminalCanvas<W: Write = Stdout> {
    out: BufWriter<W>,
    width: u16,
    height: u16,
    active: bool,
}

impl TerminalCanvas<Stdout> {
    /// Canvas drawing to standard output
    pub fn stdout() -> Self {
        Self::new(stdout())
    }
}

impl<W: Write> TerminalCanvas<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: BufWriter::with_capacity(FRAME_BUFFER_CAPACITY, writer),
            width: 0,
            height: 0,
            active: false,
        }
    }

    /// Underlying writer; only holds what has been flushed.
    pub fn get_ref(&self) -> &W {
        self.out.get_ref()
    }

    /// Current region size (grid rows, not counting the status row)
    pub fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Write blank rows for the grid and status line, then return to the first row and save it.
    fn blank_region(&mut self, width: u16, height: u16) -> Result<()> {
        let blank = " ".repeat(width as usize);
        for _ in 0..height {
            queue!(self.out, Print(&blank), Print("\n"))?;
        }
        queue!(self.out, Print(&blank))?;
        if height > 0 {
            queue!(self.out, MoveToPreviousLine(height))?;
        } else {
            queue!(self.out, Print("\r"))?;
        }
        queue!(self.out, SavePosition)?;

        self.width = width;
        self.height = height;
        Ok(())
    }
}

impl<W: Write> Surface for TerminalCanvas<W> {
    fn initialize(&mut self, width: u16, height: u16) -> Result<()> {
        queue!(self.out, Hide)?;
        self.blank_region(width, height)?;
        self.out.flush()?;
        self.active = true;
        Ok(())
    }

    fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        if !self.active {
            return self.initialize(width, height);
        }
        queue!(self.out, RestorePosition, Clear(ClearType::FromCursorDown))?;
        self.blank_region(width, height)?;
        self.out.flush()?;
        Ok(())
    }

    fn present(&mut self, grid: &GlyphGrid, status: Option<&str>) -> Result<()> {
        if !self.active {
            self.initialize(grid.width(), grid.height())?;
        }

        queue!(self.out, RestorePosition)?;
        let mut line = String::with_capacity(grid.width() as usize);
        for row in grid.rows() {
            line.clear();
            line.extend(row.iter());
            queue!(self.out, Print(&line), Print("\n"))?;
        }

        match status {
            Some(text) => queue!(self.out, Print(text))?,
            None => queue!(self.out, Clear(ClearType::CurrentLine))?,
        }

        self.out.flush()?;
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        queue!(self.out, RestorePosition)?;
        if self.height > 0 {
            queue!(self.out, MoveToNextLine(self.height))?;
        }
        queue!(self.out, Print("\n"), Show)?;
        self.out.flush()?;
        debug!("Terminal restored");
        Ok(())
    }
}

impl<W: Write> Drop for TerminalCanvas<W> {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Format the status row, padded with spaces to `term_width`.
///
/// Returns `None` when the text does not fit on one row.
pub fn status_line(frame: usize, fps: u32, width: u16, height: u16, term_width: u16) -> Option<String> {
    let text = format!("frame={} fps={} out={}x{}", frame, fps, width, height);
    let term_width = term_width as usize;
    if text.len() > term_width {
        return None;
    }
    Some(format!("{:<term_width$}", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::FrameRasterizer;
    use crate::glyph::GlyphMapper;
    use image::{Rgb, RgbImage};

    fn ansi<C: crossterm::Command>(command: C) -> Vec<u8> {
        let mut buf = Vec::new();
        queue!(buf, command).unwrap();
        buf
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    fn white_grid(width: u16, height: u16) -> GlyphGrid {
        let image = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        FrameRasterizer::new(GlyphMapper::Bands)
            .rasterize(&image, width, height)
            .unwrap()
    }

    #[test]
    fn test_status_line_padding() {
        let status = status_line(3, 24, 80, 23, 40).unwrap();
        assert_eq!(status.len(), 40);
        assert!(status.starts_with("frame=3 fps=24 out=80x23"));
        assert!(status.ends_with(' '));
    }

    #[test]
    fn test_status_line_exact_fit() {
        let text = "frame=0 fps=10 out=5x4";
        let status = status_line(0, 10, 5, 4, text.len() as u16).unwrap();
        assert_eq!(status, text);
    }

    #[test]
    fn test_status_line_omitted_when_too_wide() {
        assert_eq!(status_line(120, 24, 10, 4, 10), None);
    }

    #[test]
    fn test_initialize_writes_blank_region() {
        let mut canvas = TerminalCanvas::new(Vec::new());
        canvas.initialize(4, 2).unwrap();

        let out = canvas.get_ref().clone();
        assert_eq!(count(&out, b"    \n"), 2);
        assert_eq!(count(&out, &ansi(SavePosition)), 1);
        assert_eq!(count(&out, &ansi(Hide)), 1);
        assert_eq!(canvas.dimensions(), (4, 2));
        assert!(canvas.is_active());
    }

    #[test]
    fn test_present_returns_to_origin_each_frame() {
        let mut canvas = TerminalCanvas::new(Vec::new());
        canvas.initialize(3, 2).unwrap();
        let start = canvas.get_ref().len();

        let grid = white_grid(3, 2);
        canvas.present(&grid, Some("ok ")).unwrap();
        let first = canvas.get_ref()[start..].to_vec();
        canvas.present(&grid, Some("ok ")).unwrap();
        let second = canvas.get_ref()[start + first.len()..].to_vec();

        let restore = ansi(RestorePosition);
        assert!(first.starts_with(&restore));
        assert_eq!(first, second);
        assert_eq!(first[restore.len()..], *b"@@@\n@@@\nok ");
        assert_eq!(count(&first, &ansi(Clear(ClearType::All))), 0);
    }

    #[test]
    fn test_present_flushes_whole_frame() {
        let mut canvas = TerminalCanvas::new(Vec::new());
        canvas.initialize(2, 1).unwrap();
        let before = canvas.get_ref().len();
        canvas.present(&white_grid(2, 1), None).unwrap();

        let frame = &canvas.get_ref()[before..];
        assert!(frame.ends_with(&ansi(Clear(ClearType::CurrentLine))));
    }

    #[test]
    fn test_present_initializes_lazily() {
        let mut canvas = TerminalCanvas::new(Vec::new());
        canvas.present(&white_grid(2, 2), None).unwrap();
        assert!(canvas.is_active());
        assert_eq!(canvas.dimensions(), (2, 2));
    }

    #[test]
    fn test_resize_clears_below_origin() {
        let mut canvas = TerminalCanvas::new(Vec::new());
        canvas.initialize(2, 2).unwrap();
        let before = canvas.get_ref().len();
        canvas.resize(5, 3).unwrap();

        let out = &canvas.get_ref()[before..];
        let mut expected = ansi(RestorePosition);
        expected.extend(ansi(Clear(ClearType::FromCursorDown)));
        assert!(out.starts_with(&expected));
        assert_eq!(count(out, b"     \n"), 3);
        assert_eq!(canvas.dimensions(), (5, 3));
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut canvas = TerminalCanvas::new(Vec::new());
        canvas.initialize(2, 2).unwrap();
        canvas.restore().unwrap();
        let len = canvas.get_ref().len();
        canvas.restore().unwrap();

        assert_eq!(canvas.get_ref().len(), len);
        assert!(canvas.get_ref().ends_with(&ansi(Show)));
        assert!(!canvas.is_active());
    }
}
