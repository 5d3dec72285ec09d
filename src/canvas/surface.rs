use crate::types::{Point, Rect, Rgb};

/// A pixel surface the renderer paints into.
pub trait Canvas {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn fill_rect(&mut self, rect: Rect, color: Rgb);

    /// Copy `src` with its top-left corner at `dest`, touching only pixels inside `clip`.
    fn blit(&mut self, src: &Bitmap, dest: Point, clip: Rect);
}

/// 24-bit RGB image, row-major, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let i = self.offset(x, y);
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        let i = self.offset(x, y);
        self.pixels[i..i + 3].copy_from_slice(&color);
    }

    pub fn fill(&mut self, color: Rgb) {
        for px in self.pixels.chunks_exact_mut(3) {
            px.copy_from_slice(&color);
        }
    }

    /// Vertical line in column `x` covering rows `y0..=y1` (in either order), clipped.
    pub fn draw_vline(&mut self, x: u32, y0: i32, y1: i32, color: Rgb) {
        if x >= self.width || self.height == 0 {
            return;
        }
        let last = self.height as i32 - 1;
        let (top, bottom) = (y0.min(y1).max(0), y0.max(y1).min(last));
        for y in top..=bottom {
            self.set_pixel(x, y as u32, color);
        }
    }

    /// Copy of the sub-rectangle `rect`, which must lie inside the bitmap.
    pub fn crop(&self, rect: Rect) -> Bitmap {
        let mut out = Bitmap::new(rect.width.max(0) as u32, rect.height.max(0) as u32);
        out.blit(self, Point::new(-rect.x, -rect.y), out.bounds());
        out
    }
}

impl Canvas for Bitmap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        let area = rect.intersect(&self.bounds());
        if area.is_empty() {
            return;
        }
        for y in area.y..area.bottom() {
            let start = self.offset(area.x as u32, y as u32);
            let end = start + area.width as usize * 3;
            for px in self.pixels[start..end].chunks_exact_mut(3) {
                px.copy_from_slice(&color);
            }
        }
    }

    fn blit(&mut self, src: &Bitmap, dest: Point, clip: Rect) {
        let placed = Rect::new(dest.x, dest.y, src.width as i32, src.height as i32);
        let area = placed.intersect(&clip).intersect(&self.bounds());
        if area.is_empty() {
            return;
        }
        let row_bytes = area.width as usize * 3;
        for y in area.y..area.bottom() {
            let from = src.offset((area.x - dest.x) as u32, (y - dest.y) as u32);
            let to = self.offset(area.x as u32, y as u32);
            self.pixels[to..to + row_bytes].copy_from_slice(&src.pixels[from..from + row_bytes]);
        }
    }
}
