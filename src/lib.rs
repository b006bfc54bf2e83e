#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mandelbrot renderer
//!
//! The Mandelbrot set is the set of points c on the complex plane for
//! which repeatedly squaring z and adding c, starting from zero, never
//! runs off to infinity.  Points outside the set are colored by how
//! quickly they run away; points inside are black.  Rather than count
//! whole iterations, which paints the picture in flat bands, we use a
//! continuous count that blends smoothly from one band to the next,
//! and sweep the count around a hue wheel.
//!
//! Rendering can be spread over a small farm: a coordinator (rank 0)
//! and any number of workers, talking only by messages.  The
//! coordinator hands out one piece of work per worker, waits until
//! all of them have answered, tells them all to stop, and writes the
//! image.

extern crate crossbeam;
extern crate failure;
extern crate image;
extern crate itertools;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;

pub mod buffer;
pub mod colors;
pub mod comm;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod escape;
pub mod farm;
pub mod output;
pub mod planes;
pub mod render;

pub use buffer::{ImageBuffer, PixelRegion};
pub use colors::{colorize, Pixel};
pub use config::RenderConfig;
pub use coordinator::{Coordinator, PassOptions, Polling, Protocol};
pub use error::MandelError;
pub use escape::{escape, EscapeResult};
pub use farm::run_farm;
pub use planes::{pixel_to_plane, PlaneMapper, ViewState};
pub use render::Renderer;
