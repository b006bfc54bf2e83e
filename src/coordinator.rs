// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The coordinator and worker sides of a render pass.
//!
//! The coordinator hands every worker one work item, waits until
//! every worker has answered, tells every worker to stop, and then
//! produces the image.  There are two protocols:
//!
//! * `Protocol::Token` hands each worker an integer token, which the
//!   worker doubles and returns.  The workers contribute nothing to
//!   the picture; once the barrier is passed the coordinator renders
//!   the whole image itself.  This is the historical behavior and is
//!   kept so that the message traffic can be compared against it.
//!
//! * `Protocol::Bands` hands each worker a disjoint band of rows.  The
//!   worker renders the band and sends the pixels back, and the
//!   coordinator copies them into place.  No rendering is repeated.

use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::{Duration, Instant};

use crate::buffer::{partition_rows, ImageBuffer, PixelRegion};
use crate::comm::{Envelope, Message, ProcessContext, Role, COORDINATOR};
use crate::error::{MandelError, Result};
use crate::render::Renderer;

/// How the work of a pass is divided up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    /// Workers echo a token; the coordinator renders everything.
    Token,
    /// Workers render bands of rows and ship them back.
    Bands,
}

/// How the coordinator waits for completions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Polling {
    /// Probe the inbox without blocking, over and over.
    Spin,
    /// Sleep in a receive until something arrives from anyone.
    Blocking,
}

/// Knobs for a render pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PassOptions {
    /// How work is divided.
    pub protocol: Protocol,
    /// How completions are awaited.
    pub polling: Polling,
    /// How long to wait for the last completion before giving up.
    /// None waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PassOptions {
    fn default() -> Self {
        PassOptions {
            protocol: Protocol::Token,
            polling: Polling::Spin,
            timeout: None,
        }
    }
}

/// Where the coordinator is in a pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing sent yet.
    Idle,
    /// Handing out work.
    Dispatching,
    /// Waiting for answers.
    Collecting,
    /// Every worker has answered.
    AllComplete,
    /// Workers told to stop; producing the image.
    Terminating,
}

/// Where a worker is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Blocked on the next message from the coordinator.
    WaitingForMessage,
    /// Told to stop.
    Terminated,
}

/// The piece of a pass given to one worker.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkItem {
    /// An opaque token to be answered.
    Token(i32),
    /// Rows to render.
    Rows(PixelRegion),
}

impl WorkItem {
    fn message(&self) -> Message {
        match *self {
            WorkItem::Token(n) => Message::DoWork(n),
            WorkItem::Rows(region) => Message::RenderRows(region),
        }
    }
}

/// Which worker got which item.  Built once per pass.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkAssignment {
    items: BTreeMap<usize, WorkItem>,
}

impl WorkAssignment {
    /// One item per worker, for workers ranked 1 through `workers`.
    /// Under the token protocol each worker's token is its rank;
    /// under the band protocol the rows of an image `height` tall
    /// are split into disjoint bands.
    pub fn build(protocol: Protocol, workers: usize, height: usize) -> WorkAssignment {
        let items = match protocol {
            Protocol::Token => (1..=workers)
                .map(|rank| (rank, WorkItem::Token(rank as i32)))
                .collect(),
            Protocol::Bands => partition_rows(height, workers)
                .into_iter()
                .enumerate()
                .map(|(i, region)| (i + 1, WorkItem::Rows(region)))
                .collect(),
        };
        WorkAssignment { items }
    }

    /// The item given to `worker`.
    pub fn get(&self, worker: usize) -> Option<&WorkItem> {
        self.items.get(&worker)
    }

    /// Every worker and its item, in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &WorkItem)> {
        self.items.iter().map(|(rank, item)| (*rank, item))
    }

    /// The number of workers with an item.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Describes an assignment with nobody in it.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A worker's answer.  Only used to know who is finished; for bands,
/// the token is the number of rows received.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompletionRecord {
    /// The worker that answered.
    pub worker: usize,
    /// What it answered with.
    pub token: i32,
}

/// What happened during a pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PassReport {
    /// Who was given what.
    pub assignment: WorkAssignment,
    /// Answers, in the order they arrived.
    pub completions: Vec<CompletionRecord>,
    /// How many termination messages went out.
    pub terminations_sent: usize,
    /// Every state the coordinator passed through, in order.
    pub states: Vec<CoordinatorState>,
}

impl PassReport {
    /// The state the coordinator finished in.
    pub fn final_state(&self) -> Option<CoordinatorState> {
        self.states.last().cloned()
    }
}

/// What a worker did before it was told to stop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    /// The worker's rank.
    pub rank: usize,
    /// The number of items it completed.
    pub items_done: usize,
    /// The state it finished in.
    pub state: WorkerState,
}

/// Rank 0's side of a pass.
pub struct Coordinator {
    ctx: ProcessContext,
    options: PassOptions,
    state: CoordinatorState,
    states: Vec<CoordinatorState>,
}

impl Coordinator {
    /// Takes ownership of the coordinator's context.  Fails for any
    /// rank but 0.
    pub fn new(ctx: ProcessContext, options: PassOptions) -> Result<Coordinator> {
        if ctx.role() != Role::Coordinator {
            return Err(MandelError::InvalidArgument(format!(
                "rank {} cannot coordinate",
                ctx.rank
            )));
        }
        Ok(Coordinator {
            ctx,
            options,
            state: CoordinatorState::Idle,
            states: vec![CoordinatorState::Idle],
        })
    }

    /// Where the coordinator is now.
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    fn enter(&mut self, state: CoordinatorState) {
        debug!("coordinator: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.states.push(state);
    }

    /// Tell every worker to stop.  Returns how many were told.
    fn broadcast_terminate(&self) -> Result<usize> {
        let mut sent = 0;
        for rank in 1..self.ctx.size {
            self.ctx.comm.send(rank, Message::Terminate)?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Best-effort termination for when the pass has already failed.
    fn abandon(&self) {
        for rank in 1..self.ctx.size {
            let _ = self.ctx.comm.send(rank, Message::Terminate);
        }
    }

    /// Wait for the next message from anyone, honouring the polling
    /// mode and the deadline.  None means the deadline passed.
    fn next_completion(&mut self, deadline: Option<Instant>) -> Result<Option<Envelope>> {
        match self.options.polling {
            Polling::Spin => loop {
                if let Some(envelope) = self.ctx.comm.try_recv_any()? {
                    return Ok(Some(envelope));
                }
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                }
                thread::yield_now();
            },
            Polling::Blocking => match deadline {
                None => self.ctx.comm.recv_any().map(Some),
                Some(deadline) => {
                    let left = deadline
                        .checked_duration_since(Instant::now())
                        .unwrap_or_default();
                    self.ctx.comm.recv_any_timeout(left)
                }
            },
        }
    }

    /// Check an answer against the assignment and, for bands, put the
    /// pixels where they belong.
    fn accept(
        &self,
        assignment: &WorkAssignment,
        pending: &BTreeSet<usize>,
        envelope: Envelope,
        image: &mut Option<ImageBuffer>,
    ) -> Result<CompletionRecord> {
        let worker = envelope.source;
        let violation = |reason: &str| MandelError::Protocol {
            rank: worker,
            reason: reason.to_string(),
        };
        if let Message::Failed(reason) = envelope.message {
            warn!("worker {} failed: {}", worker, reason);
            return Err(MandelError::WorkerFailed {
                rank: worker,
                reason,
            });
        }
        if !pending.contains(&worker) {
            return Err(violation("answered without outstanding work"));
        }
        match (assignment.get(worker), envelope.message) {
            (Some(WorkItem::Token(_)), Message::DoWork(token)) => {
                debug!("Received {} from worker {}", token, worker);
                Ok(CompletionRecord { worker, token })
            }
            (Some(WorkItem::Rows(assigned)), Message::Band(region, pixels)) => {
                if region != *assigned {
                    return Err(violation("returned rows it was not given"));
                }
                let image = image
                    .as_mut()
                    .ok_or_else(|| violation("sent rows under the token protocol"))?;
                image.copy_band(region, &pixels)?;
                debug!(
                    "Received rows {}..{} from worker {}",
                    region.first_row,
                    region.end_row(),
                    worker
                );
                Ok(CompletionRecord {
                    worker,
                    token: region.rows as i32,
                })
            }
            _ => Err(violation("sent an unexpected message")),
        }
    }

    /// Dispatch, collect, terminate.  On failure the workers are still
    /// told to stop, so that none of them is left blocked.
    fn barrier(
        &mut self,
        assignment: &WorkAssignment,
        image: &mut Option<ImageBuffer>,
    ) -> Result<(Vec<CompletionRecord>, usize)> {
        let outcome = self.dispatch_and_collect(assignment, image);
        if outcome.is_err() {
            self.abandon();
        }
        let completions = outcome?;
        self.enter(CoordinatorState::AllComplete);
        let terminations = self.broadcast_terminate()?;
        self.enter(CoordinatorState::Terminating);
        Ok((completions, terminations))
    }

    fn dispatch_and_collect(
        &mut self,
        assignment: &WorkAssignment,
        image: &mut Option<ImageBuffer>,
    ) -> Result<Vec<CompletionRecord>> {
        self.enter(CoordinatorState::Dispatching);
        for (worker, item) in assignment.iter() {
            self.ctx.comm.send(worker, item.message())?;
            debug!("Sent {:?} to worker {}", item, worker);
        }

        self.enter(CoordinatorState::Collecting);
        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        let mut pending: BTreeSet<usize> = assignment.iter().map(|(rank, _)| rank).collect();
        let mut completions = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let envelope = match self.next_completion(deadline)? {
                Some(envelope) => envelope,
                None => {
                    let pending: Vec<usize> = pending.into_iter().collect();
                    warn!("gave up waiting on workers {:?}", pending);
                    return Err(MandelError::WorkerStalled { pending });
                }
            };
            let record = self.accept(assignment, &pending, envelope, image)?;
            pending.remove(&record.worker);
            completions.push(record);
        }
        Ok(completions)
    }

    /// Run one pass over `renderer`'s view.
    pub fn run(&mut self, renderer: &Renderer) -> Result<(ImageBuffer, PassReport)> {
        let view = *renderer.view();
        info!(
            "coordinating {} workers over a {}x{} image",
            self.ctx.workers(),
            view.width,
            view.height
        );
        let assignment =
            WorkAssignment::build(self.options.protocol, self.ctx.workers(), view.height);
        let mut image = match self.options.protocol {
            Protocol::Token => None,
            Protocol::Bands => match ImageBuffer::new(view.width, view.height) {
                Ok(image) => Some(image),
                Err(e) => {
                    self.abandon();
                    return Err(e);
                }
            },
        };

        let (completions, terminations_sent) = self.barrier(&assignment, &mut image)?;

        // nobody rendered anything unless a worker was given rows
        let image = match image {
            Some(image) if !assignment.is_empty() => image,
            _ => renderer.render()?,
        };
        let report = PassReport {
            assignment,
            completions,
            terminations_sent,
            states: self.states.clone(),
        };
        Ok((image, report))
    }
}

/// A worker's side of a pass: answer the coordinator until told to
/// stop.  If anything goes wrong the coordinator is told why before
/// the error is returned, so that it is not left waiting.
pub fn run_worker(mut ctx: ProcessContext, renderer: &Renderer) -> Result<WorkerReport> {
    if ctx.role() != Role::Worker {
        return Err(MandelError::InvalidArgument(
            "rank 0 cannot work".to_string(),
        ));
    }
    let outcome = serve(&mut ctx, renderer);
    if let Err(ref e) = outcome {
        warn!("worker {} giving up: {}", ctx.rank, e);
        let _ = ctx.comm.send(COORDINATOR, Message::Failed(e.to_string()));
    }
    outcome
}

fn serve(ctx: &mut ProcessContext, renderer: &Renderer) -> Result<WorkerReport> {
    let mut report = WorkerReport {
        rank: ctx.rank,
        items_done: 0,
        state: WorkerState::WaitingForMessage,
    };
    while report.state == WorkerState::WaitingForMessage {
        let envelope = ctx.comm.recv_from(COORDINATOR)?;
        match envelope.message {
            Message::DoWork(token) => {
                ctx.comm
                    .send(COORDINATOR, Message::DoWork(token.wrapping_shl(1)))?;
                report.items_done += 1;
            }
            Message::RenderRows(region) => {
                let band = renderer.render_region(region)?;
                ctx.comm.send(COORDINATOR, Message::Band(region, band))?;
                report.items_done += 1;
            }
            Message::Terminate => {
                debug!("worker {} terminating", ctx.rank);
                report.state = WorkerState::Terminated;
            }
            Message::Band(..) | Message::Failed(_) => {
                return Err(MandelError::Protocol {
                    rank: envelope.source,
                    reason: format!("sent {:?} to a worker", envelope.tag()),
                })
            }
        }
    }
    Ok(report)
}
