//! The settings for one run, with the defaults baked in.

use std::path::PathBuf;
use std::time::Instant;

use crate::colors::HUE_PER_ITERATION;
use crate::coordinator::PassOptions;
use crate::error::Result;
use crate::farm::run_farm;
use crate::output::write_image;
use crate::planes::ViewState;
use crate::render::Renderer;

/// Where the image goes when nobody says otherwise.
pub const DEFAULT_OUTPUT: &str = "temp.bmp";

/// Everything needed to produce one image file.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// What to render.
    pub view: ViewState,
    /// Degrees of hue per iteration.
    pub hue_step: f32,
    /// Where to write it.
    pub output: PathBuf,
    /// Number of worker ranks besides the coordinator.
    pub workers: usize,
    /// Protocol, polling, and timeout for the pass.
    pub pass: PassOptions,
    /// Skip the farm and render on this thread alone.
    pub single: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            view: ViewState::default(),
            hue_step: HUE_PER_ITERATION,
            output: PathBuf::from(DEFAULT_OUTPUT),
            workers: num_cpus::get(),
            pass: PassOptions::default(),
            single: false,
        }
    }
}

impl RenderConfig {
    /// Render the configured view and write it out.
    pub fn run(&self) -> Result<()> {
        let renderer = Renderer::new(&self.view, self.hue_step);
        let begin = Instant::now();
        let image = if self.single {
            renderer.render()?
        } else {
            let (image, report, _) = run_farm(self.workers, &renderer, self.pass)?;
            info!(
                "{} of {} workers reported, {} terminations sent",
                report.completions.len(),
                report.assignment.len(),
                report.terminations_sent
            );
            image
        };
        info!("total render time: {:.6}", begin.elapsed().as_secs_f64());
        write_image(&self.output, &image)
    }
}
