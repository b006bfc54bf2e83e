// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The error type shared by the renderer, the encoders, and the
//! coordinator protocol.

use failure::Fail;
use std::io;

/// Everything that can go wrong during a render pass.
#[derive(Debug, Fail)]
pub enum MandelError {
    /// The pixel buffer could not be allocated.
    #[fail(display = "could not allocate a buffer of {} pixels", pixels)]
    Allocation {
        /// Number of pixels requested.
        pixels: usize,
    },

    /// The coordinator gave up waiting on workers that never reported.
    #[fail(display = "workers {:?} did not report before the deadline", pending)]
    WorkerStalled {
        /// Ranks still outstanding when the deadline passed.
        pending: Vec<usize>,
    },

    /// A rank's inbox has been dropped.
    #[fail(display = "rank {} is no longer reachable", rank)]
    Disconnected {
        /// The unreachable rank.
        rank: usize,
    },

    /// A message arrived that the receiver's state does not allow.
    #[fail(display = "protocol violation from rank {}: {}", rank, reason)]
    Protocol {
        /// The sender of the offending message.
        rank: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A worker hit an error of its own and gave up on its item.
    #[fail(display = "worker {} failed: {}", rank, reason)]
    WorkerFailed {
        /// The worker's rank.
        rank: usize,
        /// The worker's own account of the error.
        reason: String,
    },

    /// A worker thread panicked before it could terminate.
    #[fail(display = "worker {} panicked", rank)]
    WorkerPanicked {
        /// The worker's rank.
        rank: usize,
    },

    /// Writing the image failed.
    #[fail(display = "{}", _0)]
    Io(#[cause] io::Error),

    /// The `image` crate refused to encode the buffer.
    #[fail(display = "{}", _0)]
    Image(#[cause] image::ImageError),

    /// A caller-supplied value made no sense.
    #[fail(display = "invalid argument: {}", _0)]
    InvalidArgument(String),
}

impl From<io::Error> for MandelError {
    fn from(err: io::Error) -> Self {
        MandelError::Io(err)
    }
}

impl From<image::ImageError> for MandelError {
    fn from(err: image::ImageError) -> Self {
        MandelError::Image(err)
    }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, MandelError>;
