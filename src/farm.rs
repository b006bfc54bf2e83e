//! Starting a farm: one coordinator and a number of workers, each on
//! its own thread, each with its own context.

use crate::buffer::ImageBuffer;
use crate::comm::{world, ProcessContext, Role};
use crate::coordinator::{run_worker, Coordinator, PassOptions, PassReport, WorkerReport};
use crate::error::{MandelError, Result};
use crate::render::Renderer;

/// What a rank produced.
#[derive(Debug)]
pub enum Outcome {
    /// The coordinator's image and its account of the pass.
    Coordinated(ImageBuffer, PassReport),
    /// A worker's account of itself.
    Worked(WorkerReport),
}

/// The entry point for any rank: coordinate if we are rank 0, work
/// otherwise.
pub fn run_process(
    ctx: ProcessContext,
    renderer: &Renderer,
    options: PassOptions,
) -> Result<Outcome> {
    match ctx.role() {
        Role::Coordinator => {
            let mut coordinator = Coordinator::new(ctx, options)?;
            let (image, report) = coordinator.run(renderer)?;
            Ok(Outcome::Coordinated(image, report))
        }
        Role::Worker => run_worker(ctx, renderer).map(Outcome::Worked),
    }
}

/// Run a whole pass with `workers` workers.  The coordinator runs on
/// the calling thread; every worker gets a thread of its own.
pub fn run_farm(
    workers: usize,
    renderer: &Renderer,
    options: PassOptions,
) -> Result<(ImageBuffer, PassReport, Vec<WorkerReport>)> {
    let mut ctxs = world(workers + 1);
    let worker_ctxs: Vec<ProcessContext> = ctxs.drain(1..).collect();
    let coordinator = ctxs
        .pop()
        .ok_or_else(|| MandelError::InvalidArgument("empty world".to_string()))?;

    crossbeam::scope(|spawner| {
        let handles: Vec<_> = worker_ctxs
            .into_iter()
            .map(|ctx| {
                let rank = ctx.rank;
                (rank, spawner.spawn(move |_| run_process(ctx, renderer, options)))
            })
            .collect();

        let coordinated = run_process(coordinator, renderer, options);

        let mut reports = Vec::with_capacity(handles.len());
        for (rank, handle) in handles {
            match handle.join() {
                Ok(Ok(Outcome::Worked(report))) => reports.push(report),
                Ok(Ok(Outcome::Coordinated(..))) => {
                    return Err(MandelError::Protocol {
                        rank,
                        reason: "a worker claimed to coordinate".to_string(),
                    })
                }
                Ok(Err(e)) => {
                    warn!("worker {} failed: {}", rank, e);
                    if coordinated.is_ok() {
                        return Err(e);
                    }
                }
                Err(_) => return Err(MandelError::WorkerPanicked { rank }),
            }
        }

        match coordinated? {
            Outcome::Coordinated(image, report) => Ok((image, report, reports)),
            Outcome::Worked(_) => Err(MandelError::Protocol {
                rank: 0,
                reason: "the coordinator worked".to_string(),
            }),
        }
    })
    .map_err(|_| MandelError::WorkerPanicked { rank: 0 })?
}
