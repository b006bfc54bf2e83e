//! Contains the ViewState and PlaneMapper structs, which describe a
//! relationship between a rectangle on the integral plane with an
//! origin at 0,0, and a window onto the complex plane given by a
//! center point and a zoom factor.
use num::Complex;

use crate::error::{MandelError, Result};

/// The largest width or height we are willing to allocate for.
/// Anything larger is clamped, not refused.
pub const MAX_WIDTH_HEIGHT: usize = 28_000;

/// Describes the x, y of a pixel in the image.  x is the column, y
/// the row, both counted from the top left.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coord(pub usize, pub usize);

/// Everything needed to describe one render: where we are looking,
/// how closely, how hard, and at what resolution.  Once a render
/// pass begins, the view is not touched again.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewState {
    /// Real part of the point at the center of the image.
    pub center_x: f64,
    /// Imaginary part of the point at the center of the image.
    pub center_y: f64,
    /// Pixels per unit on the complex plane.
    pub zoom: f64,
    /// Iterations before a point is declared bounded.
    pub max_iterations: u32,
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            center_x: -1.186_340_599_860_225,
            center_y: -0.303_652_988_644_423,
            zoom: 350.0,
            max_iterations: 100,
            width: 1024,
            height: 1024,
        }
    }
}

impl ViewState {
    /// Constructor.  Rejects views that cannot describe an image:
    /// non-positive zoom, zero iterations, or an empty resolution.
    pub fn new(
        center: Complex<f64>,
        zoom: f64,
        max_iterations: u32,
        width: usize,
        height: usize,
    ) -> Result<ViewState> {
        if !(zoom > 0.0) || !zoom.is_finite() {
            return Err(MandelError::InvalidArgument(format!(
                "zoom must be a positive number, got {}",
                zoom
            )));
        }
        if !center.re.is_finite() || !center.im.is_finite() {
            return Err(MandelError::InvalidArgument(
                "center must be a finite point".to_string(),
            ));
        }
        if max_iterations == 0 {
            return Err(MandelError::InvalidArgument(
                "iteration count must be at least 1".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(MandelError::InvalidArgument(format!(
                "image size {}x{} is empty",
                width, height
            )));
        }
        Ok(ViewState {
            center_x: center.re,
            center_y: center.im,
            zoom,
            max_iterations,
            width,
            height,
        })
    }

    /// The same view with width and height clamped to
    /// MAX_WIDTH_HEIGHT.
    pub fn clamped(&self) -> ViewState {
        let width = self.width.min(MAX_WIDTH_HEIGHT);
        let height = self.height.min(MAX_WIDTH_HEIGHT);
        if width != self.width || height != self.height {
            warn!(
                "requested {}x{} exceeds the supported maximum, rendering {}x{}",
                self.width, self.height, width, height
            );
        }
        ViewState {
            width,
            height,
            ..*self
        }
    }

    /// The total number of pixels in the image.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Describes that the image has no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The point at the center of the view.
    pub fn center(&self) -> Complex<f64> {
        Complex::new(self.center_x, self.center_y)
    }
}

/// Given the column and row of a pixel, return the complex number
/// the pixel stands for.  Each call is computed from scratch, so no
/// error accumulates as we walk across a row.
#[inline]
pub fn pixel_to_plane(px: usize, py: usize, view: &ViewState) -> Complex<f64> {
    Complex::new(
        (px as f64 - (view.width / 2) as f64) / view.zoom + view.center_x,
        (py as f64 - (view.height / 2) as f64) / view.zoom + view.center_y,
    )
}

/// Maps the pixels of a (clamped) view onto the complex plane.  The
/// coordinates of every column and every row are computed once, up
/// front, into tables sized to the actual image.
#[derive(Debug)]
pub struct PlaneMapper {
    view: ViewState,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl PlaneMapper {
    /// Constructor.  Clamps the view before building the tables.
    pub fn new(view: &ViewState) -> PlaneMapper {
        let view = view.clamped();
        let xs = (0..view.width)
            .map(|px| pixel_to_plane(px, 0, &view).re)
            .collect();
        let ys = (0..view.height)
            .map(|py| pixel_to_plane(0, py, &view).im)
            .collect();
        PlaneMapper { view, xs, ys }
    }

    /// The clamped view this mapper was built for.
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Given a pixel on the integral plane, return the equivalent
    /// point on the complex plane.
    #[inline]
    pub fn pixel_to_point(&self, coord: &Coord) -> Complex<f64> {
        Complex::new(self.xs[coord.0], self.ys[coord.1])
    }
}
