// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The renderer: for each pixel, map it to the complex plane, find
//! out how fast it escapes, and color it.  Pixels are independent of
//! one another, so a band of rows can be rendered by anyone who owns
//! that band.

use itertools::iproduct;
use std::time::Instant;

use crate::buffer::{allocate, partition_rows, ImageBuffer, PixelRegion};
use crate::colors::{colorize, Pixel};
use crate::error::{MandelError, Result};
use crate::escape::escape;
use crate::planes::{Coord, PlaneMapper, ViewState};

/// Holds the (clamped) view and the coloring parameters.  Once built
/// it is never mutated, so it can be shared by reference between
/// threads.
pub struct Renderer {
    plane: PlaneMapper,
    hue_step: f32,
}

impl Renderer {
    /// Requires the view to render and the hue step, in degrees per
    /// iteration.  Views larger than the supported maximum are
    /// clamped here.
    pub fn new(view: &ViewState, hue_step: f32) -> Renderer {
        Renderer {
            plane: PlaneMapper::new(view),
            hue_step,
        }
    }

    /// The view actually being rendered, after clamping.
    pub fn view(&self) -> &ViewState {
        self.plane.view()
    }

    /// The color of a single pixel.
    #[inline]
    pub fn pixel(&self, px: usize, py: usize) -> Pixel {
        let point = self.plane.pixel_to_point(&Coord(px, py));
        colorize(escape(point, self.view().max_iterations), self.hue_step)
    }

    /// Render one band of rows into a slice that holds exactly that
    /// band.
    pub fn render_into(&self, region: PixelRegion, band: &mut [Pixel]) -> Result<()> {
        let width = self.view().width;
        if band.len() != region.rows * width {
            return Err(MandelError::InvalidArgument(format!(
                "{} pixels cannot hold {} rows of {}",
                band.len(),
                region.rows,
                width
            )));
        }
        let coords = iproduct!(region.first_row..region.end_row(), 0..width);
        for ((row, column), pixel) in coords.zip(band.iter_mut()) {
            *pixel = self.pixel(column, row);
        }
        Ok(())
    }

    /// Render one band of rows into a freshly allocated slice.
    pub fn render_region(&self, region: PixelRegion) -> Result<Vec<Pixel>> {
        if region.end_row() > self.view().height {
            return Err(MandelError::InvalidArgument(format!(
                "rows {}..{} lie outside an image {} rows tall",
                region.first_row,
                region.end_row(),
                self.view().height
            )));
        }
        let mut band = allocate(region.rows * self.view().width)?;
        self.render_into(region, &mut band)?;
        Ok(band)
    }

    /// The main function for single-threaded rendering.
    pub fn render(&self) -> Result<ImageBuffer> {
        let view = *self.view();
        let begin = Instant::now();
        let mut image = ImageBuffer::new(view.width, view.height)?;
        for (region, band) in image.split_bands_mut(&[PixelRegion::full(view.height)])? {
            self.render_into(region, band)?;
        }
        info!("time: {:.6}", begin.elapsed().as_secs_f64());
        Ok(image)
    }

    /// A multi-threaded version of the render function.  Each thread
    /// owns one band of rows outright; no two bands overlap, so no
    /// locking is needed.
    pub fn render_threaded(&self, threads: usize) -> Result<ImageBuffer> {
        let view = *self.view();
        let begin = Instant::now();
        let mut image = ImageBuffer::new(view.width, view.height)?;
        let regions = partition_rows(view.height, threads.max(1));
        {
            let bands = image.split_bands_mut(&regions)?;
            let results: Vec<Result<()>> = crossbeam::scope(|spawner| {
                let handles: Vec<_> = bands
                    .into_iter()
                    .map(|(region, band)| spawner.spawn(move |_| self.render_into(region, band)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join()
                            .unwrap_or_else(|_| Err(MandelError::WorkerPanicked { rank: 0 }))
                    })
                    .collect()
            })
            .map_err(|_| MandelError::WorkerPanicked { rank: 0 })?;
            for result in results {
                result?;
            }
        }
        info!(
            "time: {:.6} ({} threads)",
            begin.elapsed().as_secs_f64(),
            regions.len()
        );
        Ok(image)
    }
}

/// Render a whole view on the calling thread.
pub fn render(view: &ViewState, hue_step: f32) -> Result<ImageBuffer> {
    Renderer::new(view, hue_step).render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::HUE_PER_ITERATION;
    use crate::planes::MAX_WIDTH_HEIGHT;
    use num::Complex;

    fn small_view() -> ViewState {
        ViewState::new(Complex::new(-0.75, 0.0), 200.0, 100, 100, 100).unwrap()
    }

    #[test]
    fn center_of_the_set_is_black() {
        let image = render(&small_view(), HUE_PER_ITERATION).unwrap();
        assert_eq!(image.get(50, 50), Pixel::BLACK);
    }

    #[test]
    fn seahorse_valley_is_colored() {
        // just above the cusp at -0.75, points escape in roughly pi/d
        // iterations for a distance d off the real axis
        let image = render(&small_view(), HUE_PER_ITERATION).unwrap();
        assert_ne!(image.get(50, 30), Pixel::BLACK);
        assert_ne!(image.get(50, 70), Pixel::BLACK);
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = render(&small_view(), HUE_PER_ITERATION).unwrap();
        let b = render(&small_view(), HUE_PER_ITERATION).unwrap();
        assert_eq!(a.to_rgb_bytes(), b.to_rgb_bytes());
    }

    #[test]
    fn threaded_render_matches_single() {
        let renderer = Renderer::new(&small_view(), HUE_PER_ITERATION);
        let single = renderer.render().unwrap();
        for &threads in &[1, 3, 4, 7, 150] {
            assert_eq!(renderer.render_threaded(threads).unwrap(), single);
        }
    }

    #[test]
    fn regions_match_the_full_image() {
        let renderer = Renderer::new(&small_view(), HUE_PER_ITERATION);
        let full = renderer.render().unwrap();
        let region = PixelRegion { first_row: 40, rows: 20 };
        let band = renderer.render_region(region).unwrap();
        assert_eq!(band.len(), 20 * 100);
        assert_eq!(&band[..100], full.row(40));
        assert_eq!(&band[1900..], full.row(59));
    }

    #[test]
    fn regions_outside_the_image_are_refused() {
        let renderer = Renderer::new(&small_view(), HUE_PER_ITERATION);
        assert!(renderer
            .render_region(PixelRegion { first_row: 90, rows: 20 })
            .is_err());
    }

    #[test]
    fn mismatched_slices_are_refused() {
        let renderer = Renderer::new(&small_view(), HUE_PER_ITERATION);
        let mut band = vec![Pixel::BLACK; 150];
        let region = PixelRegion { first_row: 0, rows: 2 };
        match renderer.render_into(region, &mut band) {
            Err(MandelError::InvalidArgument(_)) => (),
            other => panic!("expected an invalid argument, got {:?}", other),
        }
        assert!(band.iter().all(|p| *p == Pixel::BLACK));
    }

    #[test]
    fn oversized_views_are_clamped_before_allocation() {
        let view = ViewState::new(Complex::new(0.0, 0.0), 1.0, 1, MAX_WIDTH_HEIGHT * 4, 1).unwrap();
        let renderer = Renderer::new(&view, HUE_PER_ITERATION);
        assert_eq!(renderer.view().width, MAX_WIDTH_HEIGHT);
        let image = renderer.render().unwrap();
        assert_eq!(image.width(), MAX_WIDTH_HEIGHT);
        assert_eq!(image.pixels().len(), MAX_WIDTH_HEIGHT);
    }
}
