//! Fixed-size worker group and its blocking collectives.
//!
//! A [`WorkerGroup`] runs one job SPMD-style: every rank executes the same
//! closure on its own OS thread with its own [`WorkerContext`]. Rank 0 is
//! the root. The only communication is through the collectives on the
//! context (`scatter`, `broadcast`, `gather`, `gather_sorted`, `barrier`),
//! which every rank must call in the same order.
//!
//! Each run gets a fresh star of crossbeam channels between the root and
//! every other rank. A rank's endpoints drop when its job returns, so a
//! peer blocked on it wakes with [`TransportFault::PeerDisconnected`]
//! instead of hanging.

use std::ops::Deref;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::compute::{ComputeFactory, LocalCompute};
use crate::dataset::Element;
use crate::error::{Result, ShardError, TransportFault};
use crate::merge::merge_regions;
use crate::plan::ShardTable;

/// A worker-local copy of one contiguous region of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    rank: usize,
    offset: usize,
    data: Vec<Element>,
}

impl Shard {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Position of the first element in the full dataset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Element] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<Element> {
        self.data
    }

    /// Replace the contents with a computed buffer of the same length.
    pub fn replace(&mut self, data: Vec<Element>) -> Result<()> {
        if data.len() != self.data.len() {
            return Err(ShardError::ShapeMismatch {
                what: "computed shard",
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        self.data = data;
        Ok(())
    }
}

/// Read-only copy of a broadcast operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedOperand(Vec<Element>);

impl Deref for SharedOperand {
    type Target = [Element];

    fn deref(&self) -> &[Element] {
        &self.0
    }
}

enum Message {
    Scatter(Vec<Element>),
    Broadcast(Vec<Element>),
    Gather(Vec<Element>),
    Arrive,
    Release,
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Scatter(_) => "scatter",
            Message::Broadcast(_) => "broadcast",
            Message::Gather(_) => "gather",
            Message::Arrive => "arrive",
            Message::Release => "release",
        }
    }
}

/// One end of a root <-> rank link.
struct Link {
    peer: usize,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Link {
    fn pair(a: usize, b: usize) -> (Link, Link) {
        let (tx_ab, rx_ab) = unbounded();
        let (tx_ba, rx_ba) = unbounded();
        (
            Link {
                peer: b,
                tx: tx_ab,
                rx: rx_ba,
            },
            Link {
                peer: a,
                tx: tx_ba,
                rx: rx_ab,
            },
        )
    }
}

enum Endpoints {
    /// Links to ranks `1..size`, in rank order.
    Root(Vec<Link>),
    Worker(Link),
}

/// Per-rank handle for one run: identity, transport endpoints and the
/// rank's compute backend. Everything it owns is released when the rank's
/// job returns.
pub struct WorkerContext {
    rank: usize,
    size: usize,
    endpoints: Endpoints,
    compute: Option<Box<dyn LocalCompute>>,
}

impl WorkerContext {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    /// Build this rank's compute backend from `factory`.
    pub fn attach(&mut self, factory: &dyn ComputeFactory) -> Result<()> {
        let backend = factory.create(self.rank)?;
        tracing::trace!(rank = self.rank, backend = backend.name(), "backend attached");
        self.compute = Some(backend);
        Ok(())
    }

    /// The backend installed by [`WorkerContext::attach`].
    pub fn compute(&mut self) -> Result<&mut (dyn LocalCompute + 'static)> {
        let rank = self.rank;
        match self.compute.as_deref_mut() {
            Some(backend) => Ok(backend),
            None => Err(ShardError::ComputeFailure {
                rank,
                reason: "no compute backend attached".to_string(),
            }),
        }
    }

    fn fault(&self, fault: TransportFault) -> ShardError {
        ShardError::transport(self.rank, fault)
    }

    fn send(&self, link: &Link, msg: Message) -> Result<()> {
        link.tx
            .send(msg)
            .map_err(|_| self.fault(TransportFault::PeerDisconnected(link.peer)))
    }

    fn recv(&self, link: &Link) -> Result<Message> {
        link.rx
            .recv()
            .map_err(|_| self.fault(TransportFault::PeerDisconnected(link.peer)))
    }

    fn recv_payload(&self, link: &Link, expected: &'static str, len: usize) -> Result<Vec<Element>> {
        let msg = self.recv(link)?;
        let got = msg.kind();
        let payload = match msg {
            Message::Scatter(p) if expected == "scatter" => p,
            Message::Gather(p) if expected == "gather" => p,
            _ => return Err(self.fault(TransportFault::ProtocolMismatch { expected, got })),
        };
        if payload.len() != len {
            return Err(self.fault(TransportFault::LengthMismatch {
                expected: len,
                actual: payload.len(),
            }));
        }
        Ok(payload)
    }

    fn recv_signal(&self, link: &Link, expected: &'static str) -> Result<()> {
        let msg = self.recv(link)?;
        let got = msg.kind();
        match msg {
            Message::Arrive if expected == "arrive" => Ok(()),
            Message::Release if expected == "release" => Ok(()),
            _ => Err(self.fault(TransportFault::ProtocolMismatch { expected, got })),
        }
    }

    fn check_table(&self, table: &ShardTable) -> Result<()> {
        if table.workers() != self.size {
            return Err(ShardError::ShapeMismatch {
                what: "shard table",
                expected: self.size,
                actual: table.workers(),
            });
        }
        Ok(())
    }

    /// Distribute `dataset` over the group according to `table`.
    ///
    /// The root must pass `Some(dataset)` with `dataset.len() ==
    /// table.total()`; other ranks pass `None` (any value is ignored).
    pub fn scatter(&mut self, dataset: Option<&[Element]>, table: &ShardTable) -> Result<Shard> {
        self.check_table(table)?;
        let rank = self.rank;

        let data = match &self.endpoints {
            Endpoints::Root(peers) => {
                let data = dataset.ok_or_else(|| self.fault(TransportFault::MissingRootData))?;
                if data.len() != table.total() {
                    return Err(ShardError::ShapeMismatch {
                        what: "scatter dataset",
                        expected: table.total(),
                        actual: data.len(),
                    });
                }
                for link in peers {
                    let region = data[table.range(link.peer)].to_vec();
                    self.send(link, Message::Scatter(region))?;
                }
                data[table.range(0)].to_vec()
            }
            Endpoints::Worker(root) => self.recv_payload(root, "scatter", table.count(rank))?,
        };

        Ok(Shard {
            rank,
            offset: table.offset(rank),
            data,
        })
    }

    /// Deliver an identical copy of the root's `operand` to every rank.
    pub fn broadcast(&mut self, operand: Option<&[Element]>) -> Result<SharedOperand> {
        match &self.endpoints {
            Endpoints::Root(peers) => {
                let operand =
                    operand.ok_or_else(|| self.fault(TransportFault::MissingRootData))?;
                for link in peers {
                    self.send(link, Message::Broadcast(operand.to_vec()))?;
                }
                Ok(SharedOperand(operand.to_vec()))
            }
            Endpoints::Worker(root) => {
                let msg = self.recv(root)?;
                match msg {
                    Message::Broadcast(p) => Ok(SharedOperand(p)),
                    other => Err(self.fault(TransportFault::ProtocolMismatch {
                        expected: "broadcast",
                        got: other.kind(),
                    })),
                }
            }
        }
    }

    /// Collect every shard into its canonical region at the root.
    ///
    /// Returns `Some(dataset)` of length `table.total()` on the root and
    /// `None` on every other rank.
    pub fn gather(&mut self, shard: Shard, table: &ShardTable) -> Result<Option<Vec<Element>>> {
        self.check_table(table)?;
        if shard.len() != table.count(self.rank) {
            return Err(ShardError::ShapeMismatch {
                what: "gathered shard",
                expected: table.count(self.rank),
                actual: shard.len(),
            });
        }

        match &self.endpoints {
            Endpoints::Root(peers) => {
                let mut out = vec![0; table.total()];
                out[table.range(0)].copy_from_slice(shard.as_slice());
                for link in peers {
                    let part = self.recv_payload(link, "gather", table.count(link.peer))?;
                    out[table.range(link.peer)].copy_from_slice(&part);
                }
                Ok(Some(out))
            }
            Endpoints::Worker(root) => {
                self.send(root, Message::Gather(shard.into_vec()))?;
                Ok(None)
            }
        }
    }

    /// Gather locally sorted shards and K-way merge them at the root.
    pub fn gather_sorted(&mut self, shard: Shard, table: &ShardTable) -> Result<Option<Vec<Element>>> {
        Ok(self
            .gather(shard, table)?
            .map(|placed| merge_regions(&placed, table)))
    }

    /// Block until every rank has reached the barrier.
    pub fn barrier(&mut self) -> Result<()> {
        match &self.endpoints {
            Endpoints::Root(peers) => {
                for link in peers {
                    self.recv_signal(link, "arrive")?;
                }
                for link in peers {
                    self.send(link, Message::Release)?;
                }
            }
            Endpoints::Worker(root) => {
                self.send(root, Message::Arrive)?;
                self.recv_signal(root, "release")?;
            }
        }
        Ok(())
    }
}

/// A fixed-size group of ranks. The size never changes for the group's
/// lifetime; a different worker count needs a new group.
#[derive(Debug)]
pub struct WorkerGroup {
    size: usize,
}

impl WorkerGroup {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(ShardError::InvalidPartition { workers: size });
        }
        tracing::debug!(workers = size, "worker group established");
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn connect(&self) -> Vec<Endpoints> {
        let mut root_links = Vec::with_capacity(self.size - 1);
        let mut workers = Vec::with_capacity(self.size - 1);
        for rank in 1..self.size {
            let (root_end, worker_end) = Link::pair(0, rank);
            root_links.push(root_end);
            workers.push(Endpoints::Worker(worker_end));
        }
        let mut endpoints = Vec::with_capacity(self.size);
        endpoints.push(Endpoints::Root(root_links));
        endpoints.extend(workers);
        endpoints
    }

    /// Run `job` on every rank and return the per-rank outputs in rank
    /// order.
    ///
    /// If any rank fails, the whole run fails with the root-cause error:
    /// the first failure in rank order that is not a cascaded disconnect,
    /// or the first disconnect if that is all there is. A panicking rank
    /// reports [`TransportFault::Panicked`].
    pub fn run<T, F>(&self, job: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&mut WorkerContext) -> Result<T> + Sync,
    {
        let size = self.size;
        let job = &job;

        let outcomes: Vec<Result<T>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .connect()
                .into_iter()
                .enumerate()
                .map(|(rank, endpoints)| {
                    let spawned = thread::Builder::new()
                        .name(format!("shard-rank-{rank}"))
                        .spawn_scoped(scope, move || {
                            let mut ctx = WorkerContext {
                                rank,
                                size,
                                endpoints,
                                compute: None,
                            };
                            let out = job(&mut ctx);
                            if let Err(e) = &out {
                                tracing::debug!(rank, error = %e, "rank failed");
                            }
                            out
                        });
                    (rank, spawned)
                })
                .collect();

            handles
                .into_iter()
                .map(|(rank, spawned)| match spawned {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(ShardError::transport(rank, TransportFault::Panicked))),
                    Err(e) => Err(ShardError::transport(rank, TransportFault::Spawn(e.to_string()))),
                })
                .collect()
        });

        let mut values = Vec::with_capacity(size);
        let mut cascade = None;
        for outcome in outcomes {
            match outcome {
                Ok(v) => values.push(v),
                Err(e) if e.is_cascade() => {
                    cascade.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        match cascade {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Backend;

    #[test]
    fn test_group_of_zero_rejected() {
        assert_eq!(
            WorkerGroup::new(0).unwrap_err(),
            ShardError::InvalidPartition { workers: 0 }
        );
    }

    #[test]
    fn test_ranks_and_size() {
        let group = WorkerGroup::new(4).unwrap();
        let ids = group.run(|ctx| Ok((ctx.rank(), ctx.size(), ctx.is_root()))).unwrap();
        assert_eq!(
            ids,
            vec![(0, 4, true), (1, 4, false), (2, 4, false), (3, 4, false)]
        );
    }

    #[test]
    fn test_threads_are_named() {
        let group = WorkerGroup::new(2).unwrap();
        let names = group
            .run(|_| Ok(thread::current().name().map(str::to_string)))
            .unwrap();
        assert_eq!(
            names,
            vec![Some("shard-rank-0".to_string()), Some("shard-rank-1".to_string())]
        );
    }

    #[test]
    fn test_scatter_uneven() {
        let data: Vec<Element> = (0..10).collect();
        let table = ShardTable::plan(10, 4).unwrap();
        let group = WorkerGroup::new(4).unwrap();

        let shards = group
            .run(|ctx| {
                let input = ctx.is_root().then_some(data.as_slice());
                ctx.scatter(input, &table)
            })
            .unwrap();

        assert_eq!(shards[0].as_slice(), &[0, 1, 2]);
        assert_eq!(shards[1].as_slice(), &[3, 4, 5]);
        assert_eq!(shards[2].as_slice(), &[6, 7]);
        assert_eq!(shards[3].as_slice(), &[8, 9]);
        assert_eq!(shards[3].offset(), 8);
        assert_eq!(shards[2].rank(), 2);
    }

    #[test]
    fn test_scatter_gather_identity_with_empty_shards() {
        let data: Vec<Element> = vec![7, -3, 5];
        let table = ShardTable::plan(3, 8).unwrap();
        let group = WorkerGroup::new(8).unwrap();

        let out = group
            .run(|ctx| {
                let input = ctx.is_root().then_some(data.as_slice());
                let shard = ctx.scatter(input, &table)?;
                ctx.gather(shard, &table)
            })
            .unwrap();

        assert_eq!(out[0].as_deref(), Some(&data[..]));
        assert!(out[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_broadcast_identical_everywhere() {
        let operand: Vec<Element> = (0..16).collect();
        let group = WorkerGroup::new(3).unwrap();
        let copies = group
            .run(|ctx| {
                let input = ctx.is_root().then_some(operand.as_slice());
                ctx.broadcast(input)
            })
            .unwrap();

        for copy in copies {
            assert_eq!(&*copy, &operand[..]);
        }
    }

    #[test]
    fn test_gather_sorted_merges_at_root() {
        let data: Vec<Element> = vec![9, 1, 8, 2, 7, 3, 6, 4, 5];
        let table = ShardTable::plan(data.len(), 3).unwrap();
        let group = WorkerGroup::new(3).unwrap();

        let out = group
            .run(|ctx| {
                let input = ctx.is_root().then_some(data.as_slice());
                let mut shard = ctx.scatter(input, &table)?;
                shard.as_mut_slice().sort_unstable();
                ctx.gather_sorted(shard, &table)
            })
            .unwrap();

        assert_eq!(out[0], Some((1..=9).collect()));
    }

    #[test]
    fn test_barrier_completes() {
        let group = WorkerGroup::new(5).unwrap();
        let out = group
            .run(|ctx| {
                ctx.barrier()?;
                ctx.barrier()?;
                Ok(ctx.rank())
            })
            .unwrap();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_single_rank_group() {
        let data: Vec<Element> = vec![3, 1, 2];
        let table = ShardTable::plan(3, 1).unwrap();
        let group = WorkerGroup::new(1).unwrap();
        let out = group
            .run(|ctx| {
                ctx.barrier()?;
                let shard = ctx.scatter(Some(data.as_slice()), &table)?;
                ctx.gather_sorted(shard, &table)
            })
            .unwrap();
        assert_eq!(out, vec![Some(vec![3, 1, 2])]);
    }

    #[test]
    fn test_root_without_data() {
        let table = ShardTable::plan(4, 2).unwrap();
        let group = WorkerGroup::new(2).unwrap();
        let err = group.run(|ctx| ctx.scatter(None, &table)).unwrap_err();
        assert_eq!(
            err,
            ShardError::TransportFailure {
                rank: 0,
                fault: TransportFault::MissingRootData
            }
        );
    }

    #[test]
    fn test_table_size_must_match_group() {
        let table = ShardTable::plan(4, 3).unwrap();
        let group = WorkerGroup::new(2).unwrap();
        let err = group
            .run(|ctx| ctx.scatter(Some(&[1, 2, 3, 4][..]), &table))
            .unwrap_err();
        assert!(matches!(err, ShardError::ShapeMismatch { what: "shard table", .. }));
    }

    #[test]
    fn test_failing_rank_reports_root_cause() {
        let data: Vec<Element> = (0..8).collect();
        let table = ShardTable::plan(8, 4).unwrap();
        let group = WorkerGroup::new(4).unwrap();

        let err = group
            .run(|ctx| {
                let input = ctx.is_root().then_some(data.as_slice());
                let shard = ctx.scatter(input, &table)?;
                if ctx.rank() == 2 {
                    return Err(ShardError::ComputeFailure {
                        rank: 2,
                        reason: "injected".to_string(),
                    });
                }
                ctx.gather(shard, &table)
            })
            .unwrap_err();

        assert_eq!(
            err,
            ShardError::ComputeFailure {
                rank: 2,
                reason: "injected".to_string()
            }
        );
    }

    #[test]
    fn test_panicking_rank() {
        let group = WorkerGroup::new(3).unwrap();
        let err = group
            .run(|ctx| {
                if ctx.rank() == 1 {
                    panic!("worker blew up");
                }
                ctx.barrier()
            })
            .unwrap_err();
        assert_eq!(
            err,
            ShardError::TransportFailure {
                rank: 1,
                fault: TransportFault::Panicked
            }
        );
    }

    #[test]
    fn test_protocol_mismatch() {
        let table = ShardTable::plan(2, 2).unwrap();
        let group = WorkerGroup::new(2).unwrap();
        let err = group
            .run(|ctx| {
                if ctx.is_root() {
                    ctx.broadcast(Some(&[1, 2][..]))?;
                    Ok(())
                } else {
                    ctx.scatter(None, &table).map(|_| ())
                }
            })
            .unwrap_err();
        assert_eq!(
            err,
            ShardError::TransportFailure {
                rank: 1,
                fault: TransportFault::ProtocolMismatch {
                    expected: "scatter",
                    got: "broadcast"
                }
            }
        );
    }

    #[test]
    fn test_group_reusable_across_runs() {
        let group = WorkerGroup::new(3).unwrap();
        for _ in 0..3 {
            let out = group.run(|ctx| ctx.barrier().map(|_| ctx.rank())).unwrap();
            assert_eq!(out, vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_attach_and_compute() {
        let group = WorkerGroup::new(2).unwrap();
        let out = group
            .run(|ctx| {
                assert!(ctx.compute().is_err());
                ctx.attach(&Backend::Sequential)?;
                let mut v = vec![3, 1, 2];
                ctx.compute()?.sort(&mut v)?;
                Ok(v)
            })
            .unwrap();
        assert_eq!(out, vec![vec![1, 2, 3], vec![1, 2, 3]]);
    }

    #[test]
    fn test_shard_replace_length_checked() {
        let mut shard = Shard {
            rank: 0,
            offset: 0,
            data: vec![1, 2],
        };
        assert!(shard.replace(vec![3, 4]).is_ok());
        assert_eq!(shard.as_slice(), &[3, 4]);
        assert!(shard.replace(vec![1]).is_err());
    }
}
