use std::io::{self, Write};

/// Packs an opaque color as `0xAARRGGBB`.
pub const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    0xff00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

pub const fn red(c: u32) -> u8 {
    (c >> 16) as u8
}

pub const fn green(c: u32) -> u8 {
    (c >> 8) as u8
}

pub const fn blue(c: u32) -> u8 {
    c as u8
}

/// Row-major ARGB pixel buffer the compositor draws into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: usize, height: usize, fill: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        self.pixels[y * self.width + x] = color;
    }

    pub fn row(&self, y: usize) -> &[u32] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        &mut self.pixels[y * self.width..(y + 1) * self.width]
    }

    /// Copies `[x0, x1)` of row `src` into row `dst`.
    pub fn copy_row_span(&mut self, src: usize, dst: usize, x0: usize, x1: usize) {
        let start = src * self.width;
        self.pixels
            .copy_within(start + x0..start + x1, dst * self.width + x0);
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Binary PPM (`P6`), alpha dropped.
    pub fn write_ppm<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for &c in &self.pixels {
            bytes.extend_from_slice(&[red(c), green(c), blue(c)]);
        }
        out.write_all(&bytes)?;
        out.flush()
    }
}
