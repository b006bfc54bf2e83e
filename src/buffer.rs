//! The pixel store.  A flat, row-major run of pixels, indexed as
//! `x + y * width`, plus the row bands used to hand disjoint pieces
//! of it to separate writers.

use crate::colors::Pixel;
use crate::error::{MandelError, Result};

/// A horizontal band of whole rows: `rows` rows starting at
/// `first_row`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelRegion {
    /// Index of the top row of the band.
    pub first_row: usize,
    /// Number of rows in the band.
    pub rows: usize,
}

impl PixelRegion {
    /// The whole of an image `height` rows tall.
    pub fn full(height: usize) -> PixelRegion {
        PixelRegion {
            first_row: 0,
            rows: height,
        }
    }

    /// One past the last row of the band.
    pub fn end_row(&self) -> usize {
        self.first_row + self.rows
    }

    /// Describes a band with no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Split `height` rows into `parts` contiguous bands that never
/// overlap and together cover every row.  Bands differ in size by at
/// most one row; when there are more parts than rows, the extra bands
/// are empty.
pub fn partition_rows(height: usize, parts: usize) -> Vec<PixelRegion> {
    if parts == 0 {
        return vec![];
    }
    let base = height / parts;
    let extra = height % parts;
    let mut first_row = 0;
    (0..parts)
        .map(|i| {
            let rows = base + if i < extra { 1 } else { 0 };
            let region = PixelRegion { first_row, rows };
            first_row += rows;
            region
        })
        .collect()
}

/// An owned width x height image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer {
    width: usize,
    height: usize,
    pixels: Vec<Pixel>,
}

/// Allocate `len` black pixels, reporting failure instead of aborting.
pub(crate) fn allocate(len: usize) -> Result<Vec<Pixel>> {
    let mut pixels: Vec<Pixel> = Vec::new();
    pixels
        .try_reserve_exact(len)
        .map_err(|_| MandelError::Allocation { pixels: len })?;
    pixels.resize(len, Pixel::BLACK);
    Ok(pixels)
}

impl ImageBuffer {
    /// A black image.  Fails if the pixels cannot be allocated.
    pub fn new(width: usize, height: usize) -> Result<ImageBuffer> {
        let len = width
            .checked_mul(height)
            .ok_or(MandelError::Allocation { pixels: usize::max_value() })?;
        Ok(ImageBuffer {
            width,
            height,
            pixels: allocate(len)?,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// All of the pixels, row by row from the top.
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// The pixel at column x, row y.
    pub fn get(&self, x: usize, y: usize) -> Pixel {
        self.pixels[x + y * self.width]
    }

    /// Overwrite the pixel at column x, row y.
    pub fn set(&mut self, x: usize, y: usize, pixel: Pixel) {
        self.pixels[x + y * self.width] = pixel;
    }

    /// Row y, left to right.
    pub fn row(&self, y: usize) -> &[Pixel] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    /// Copy a rendered band into place.
    pub fn copy_band(&mut self, region: PixelRegion, band: &[Pixel]) -> Result<()> {
        if region.end_row() > self.height || band.len() != region.rows * self.width {
            return Err(MandelError::InvalidArgument(format!(
                "band of {} pixels does not fit rows {}..{} of a {}x{} image",
                band.len(),
                region.first_row,
                region.end_row(),
                self.width,
                self.height
            )));
        }
        let start = region.first_row * self.width;
        self.pixels[start..start + band.len()].copy_from_slice(band);
        Ok(())
    }

    /// Split the image into mutable slices, one per region.  The
    /// regions must be in order, must not overlap, and must lie
    /// inside the image; gaps between them are allowed.
    pub fn split_bands_mut(
        &mut self,
        regions: &[PixelRegion],
    ) -> Result<Vec<(PixelRegion, &mut [Pixel])>> {
        let width = self.width;
        let height = self.height;
        let mut rest: &mut [Pixel] = &mut self.pixels;
        let mut cursor = 0;
        let mut bands = Vec::with_capacity(regions.len());
        for &region in regions {
            if region.first_row < cursor || region.end_row() > height {
                return Err(MandelError::InvalidArgument(format!(
                    "rows {}..{} overlap another band or leave the image",
                    region.first_row,
                    region.end_row()
                )));
            }
            let skip = (region.first_row - cursor) * width;
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(skip);
            let (band, tail) = tail.split_at_mut(region.rows * width);
            bands.push((region, band));
            rest = tail;
            cursor = region.end_row();
        }
        Ok(bands)
    }

    /// The pixels as packed RGB bytes, for encoders that want them.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for p in self.pixels.iter() {
            bytes.extend_from_slice(&[p.r, p.g, p.b]);
        }
        bytes
    }
}
