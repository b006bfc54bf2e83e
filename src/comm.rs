//! Rank-addressed message passing between the members of a farm.
//!
//! Every rank owns a single inbox.  Every other rank holds a sender
//! into it, so messages from one sender to one receiver arrive in the
//! order they were sent; nothing is promised about the interleaving
//! of different senders.  A rank holds no sender into its own inbox,
//! so once every peer has gone away its receives report a
//! disconnection instead of blocking forever.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::collections::VecDeque;
use std::time::Duration;

use crate::buffer::PixelRegion;
use crate::colors::Pixel;
use crate::error::{MandelError, Result};

/// The rank of the coordinator in every world.
pub const COORDINATOR: usize = 0;

/// Message tags.  The numeric values of the first two are the ones
/// used on the wire by the token protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    /// Work to do, or the answer to it.
    DoWork = 0,
    /// Stop.
    Terminate = 1,
    /// Rendered rows on their way back to the coordinator.
    Band = 2,
    /// A worker could not finish its item.
    Failed = 3,
}

/// Everything that can travel between ranks.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A work token, or a worker's answer to one.
    DoWork(i32),
    /// Render these rows and send them back.
    RenderRows(PixelRegion),
    /// The rows a worker rendered.
    Band(PixelRegion, Vec<Pixel>),
    /// No more work is coming.
    Terminate,
    /// The sender gave up, for the given reason.
    Failed(String),
}

impl Message {
    /// The tag this message is sent under.
    pub fn tag(&self) -> Tag {
        match *self {
            Message::DoWork(_) | Message::RenderRows(_) => Tag::DoWork,
            Message::Band(..) => Tag::Band,
            Message::Terminate => Tag::Terminate,
            Message::Failed(_) => Tag::Failed,
        }
    }
}

/// A message together with the rank that sent it.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Sender's rank.
    pub source: usize,
    /// The message.
    pub message: Message,
}

impl Envelope {
    /// The tag of the enclosed message.
    pub fn tag(&self) -> Tag {
        self.message.tag()
    }
}

/// One rank's view of the world: its inbox, and a way to reach
/// everybody else.
pub struct Communicator {
    rank: usize,
    inbox: Receiver<Envelope>,
    peers: Vec<Option<Sender<Envelope>>>,
    stash: VecDeque<Envelope>,
}

impl Communicator {
    /// Send a message to `dest`.  Fails if `dest` does not exist, is
    /// ourselves, or has already shut down.
    pub fn send(&self, dest: usize, message: Message) -> Result<()> {
        let peer = match self.peers.get(dest) {
            Some(Some(peer)) => peer,
            _ => {
                return Err(MandelError::InvalidArgument(format!(
                    "rank {} cannot send to rank {}",
                    self.rank, dest
                )))
            }
        };
        peer.send(Envelope {
            source: self.rank,
            message,
        })
        .map_err(|_| MandelError::Disconnected { rank: dest })
    }

    /// Block until a message from `source` arrives.  Messages from
    /// other ranks that turn up in the meantime are kept, in order,
    /// for later receives.
    pub fn recv_from(&mut self, source: usize) -> Result<Envelope> {
        if let Some(at) = self.stash.iter().position(|e| e.source == source) {
            if let Some(envelope) = self.stash.remove(at) {
                return Ok(envelope);
            }
        }
        loop {
            let envelope = self
                .inbox
                .recv()
                .map_err(|_| MandelError::Disconnected { rank: source })?;
            if envelope.source == source {
                return Ok(envelope);
            }
            self.stash.push_back(envelope);
        }
    }

    /// Take the next message from anybody, if one is waiting.  Never
    /// blocks.
    pub fn try_recv_any(&mut self) -> Result<Option<Envelope>> {
        if let Some(envelope) = self.stash.pop_front() {
            return Ok(Some(envelope));
        }
        match self.inbox.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(MandelError::Disconnected { rank: self.rank }),
        }
    }

    /// Block until a message from anybody arrives.
    pub fn recv_any(&mut self) -> Result<Envelope> {
        if let Some(envelope) = self.stash.pop_front() {
            return Ok(envelope);
        }
        self.inbox
            .recv()
            .map_err(|_| MandelError::Disconnected { rank: self.rank })
    }

    /// Block until a message from anybody arrives, or until `timeout`
    /// passes, in which case we return None.
    pub fn recv_any_timeout(&mut self, timeout: Duration) -> Result<Option<Envelope>> {
        if let Some(envelope) = self.stash.pop_front() {
            return Ok(Some(envelope));
        }
        match self.inbox.recv_timeout(timeout) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(MandelError::Disconnected { rank: self.rank })
            }
        }
    }
}

/// What a rank does for a living.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Rank 0: hands out work and waits for it to come back.
    Coordinator,
    /// Everyone else.
    Worker,
}

/// Everything a rank needs to know about itself.  Built once, handed
/// to the rank's entry point, and owned by it from then on.
pub struct ProcessContext {
    /// This rank.
    pub rank: usize,
    /// How many ranks there are, coordinator included.
    pub size: usize,
    /// The way to talk to the others.
    pub comm: Communicator,
}

impl ProcessContext {
    /// Rank 0 coordinates; everybody else works.
    pub fn role(&self) -> Role {
        if self.rank == COORDINATOR {
            Role::Coordinator
        } else {
            Role::Worker
        }
    }

    /// The number of workers in the world.
    pub fn workers(&self) -> usize {
        self.size - 1
    }
}

/// Build the contexts for a world of `size` ranks, indexed by rank.
pub fn world(size: usize) -> Vec<ProcessContext> {
    let (senders, inboxes): (Vec<Sender<Envelope>>, Vec<Receiver<Envelope>>) =
        (0..size).map(|_| channel::unbounded()).unzip();
    inboxes
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| {
            let peers = senders
                .iter()
                .enumerate()
                .map(|(dest, s)| if dest == rank { None } else { Some(s.clone()) })
                .collect();
            ProcessContext {
                rank,
                size,
                comm: Communicator {
                    rank,
                    inbox,
                    peers,
                    stash: VecDeque::new(),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_follow_rank() {
        let ctxs = world(3);
        assert_eq!(ctxs[0].role(), Role::Coordinator);
        assert_eq!(ctxs[1].role(), Role::Worker);
        assert_eq!(ctxs[2].role(), Role::Worker);
        assert!(ctxs.iter().all(|c| c.size == 3 && c.workers() == 2));
    }

    #[test]
    fn tags_match_messages() {
        assert_eq!(Message::DoWork(3).tag(), Tag::DoWork);
        assert_eq!(Message::Terminate.tag(), Tag::Terminate);
        assert_eq!(Message::Failed("out of memory".to_string()).tag(), Tag::Failed);
        assert_eq!(Tag::DoWork as i32, 0);
        assert_eq!(Tag::Terminate as i32, 1);
    }

    #[test]
    fn messages_between_a_pair_stay_in_order() {
        let mut ctxs = world(2);
        for i in 0..100 {
            ctxs[1].comm.send(0, Message::DoWork(i)).unwrap();
        }
        for i in 0..100 {
            let e = ctxs[0].comm.recv_from(1).unwrap();
            assert_eq!(e.source, 1);
            assert_eq!(e.message, Message::DoWork(i));
        }
    }

    #[test]
    fn recv_from_keeps_other_senders_waiting() {
        let mut ctxs = world(3);
        ctxs[2].comm.send(0, Message::DoWork(20)).unwrap();
        ctxs[1].comm.send(0, Message::DoWork(10)).unwrap();
        ctxs[2].comm.send(0, Message::DoWork(21)).unwrap();
        assert_eq!(ctxs[0].comm.recv_from(1).unwrap().message, Message::DoWork(10));
        assert_eq!(ctxs[0].comm.recv_from(2).unwrap().message, Message::DoWork(20));
        let next = ctxs[0].comm.try_recv_any().unwrap().unwrap();
        assert_eq!((next.source, next.message), (2, Message::DoWork(21)));
    }

    #[test]
    fn probing_an_empty_inbox_does_not_block() {
        let mut ctxs = world(2);
        assert!(ctxs[0].comm.try_recv_any().unwrap().is_none());
        assert!(ctxs[0]
            .comm
            .recv_any_timeout(Duration::from_millis(10))
            .unwrap()
            .is_none());
    }

    #[test]
    fn nobody_sends_to_themselves() {
        let ctxs = world(2);
        assert!(ctxs[0].comm.send(0, Message::Terminate).is_err());
        assert!(ctxs[0].comm.send(7, Message::Terminate).is_err());
    }

    #[test]
    fn departed_ranks_are_reported() {
        let mut ctxs = world(2);
        let worker = ctxs.pop().unwrap();
        drop(worker);
        match ctxs[0].comm.send(1, Message::Terminate) {
            Err(MandelError::Disconnected { rank: 1 }) => (),
            other => panic!("expected a disconnection, got {:?}", other),
        }
        assert!(ctxs[0].comm.recv_any().is_err());
    }
}
