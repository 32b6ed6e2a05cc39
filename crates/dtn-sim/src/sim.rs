//! The `Sim` struct and its event loop.

use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::{debug, info, trace, warn};

use dtn_contact::{ContactChange, ContactDetector};
use dtn_core::{DropReason, MessageId, NodeId, SimConfig, SimDuration, SimEvent, SimTime, TimedEvent};
use dtn_mobility::World;
use dtn_routing::{DecisionContext, RoutingDecision, RoutingPolicy};
use dtn_schedule::{EventQueue, Scheduled};
use dtn_store::{BufferedCopy, Hop, Message, MessageBuffer, MessageTable};

use crate::bridge::{ConvergenceLayer, WireBundle};
use crate::generator::{MessageGenerator, MessageSpec};
use crate::node::{NodeSpec, NodeState};
use crate::{ControlCommand, RunStatus, SimObserver, SimResult, StopHandle};

// ── Internal actions ──────────────────────────────────────────────────────────

/// What the event queue carries.  Observers never see these; they see the
/// [`SimEvent`]s the handlers emit.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Action {
    /// Advance mobility, sweep expired copies, detect contact changes.
    WorldUpdate,
    Create(MessageSpec),
    /// Draw the next message from the generator.
    Generate,
    /// Eager TTL expiry of every copy of a message.
    Expire(MessageId),
    TransferDone { link: (NodeId, NodeId), seq: u64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TransferKind {
    /// The sender's copy goes away once the receiver has it.
    Forward,
    Replicate,
}

#[derive(Clone, Debug)]
struct Pending {
    msg:  MessageId,
    from: NodeId,
    to:   NodeId,
}

#[derive(Clone, Debug)]
struct Transfer {
    msg:     MessageId,
    from:    NodeId,
    to:      NodeId,
    kind:    TransferKind,
    seq:     u64,
    /// Replication tokens taken from the sender at start.
    taken:   u32,
    /// Replication tokens the receiver's copy gets.
    give:    u32,
    /// Encoded bundle for bridged receivers.
    payload: Option<Vec<u8>>,
}

/// One active contact: a FIFO of offered transfers, at most one in flight.
#[derive(Debug)]
struct Link {
    start:  SimTime,
    queue:  VecDeque<Pending>,
    active: Option<Transfer>,
}

// ── Sim ───────────────────────────────────────────────────────────────────────

/// A single simulation run.
///
/// Everything the run touches is owned here: the event queue and clock,
/// the world, the contact detector, node buffers, the message table, and
/// the routing policy.  Runs are `Send` and share nothing, so independent
/// runs can execute on different threads.
///
/// # Event loop
///
/// ```text
/// pop the earliest action (ties in scheduling order)
///   WorldUpdate     → TTL sweep, energy, mobility, contact changes
///                     (downs, then ups; each up offers both buffers)
///   Create/Generate → new message at its source, offered on live contacts
///   Expire          → drop every remaining copy
///   TransferDone    → deliver or relay, then start the link's next transfer
/// hand the emitted events to the observer
/// ```
///
/// Create via [`SimBuilder`](crate::SimBuilder).
pub struct Sim {
    pub(crate) config:            SimConfig,
    pub(crate) purge_on_delivery: bool,
    pub(crate) queue:             EventQueue<Action>,
    pub(crate) world:             World,
    pub(crate) detector:          ContactDetector,
    pub(crate) specs:             Vec<NodeSpec>,
    pub(crate) nodes:             Vec<NodeState>,
    pub(crate) table:             MessageTable,
    pub(crate) policy:            Box<dyn RoutingPolicy>,
    pub(crate) generator:         Option<MessageGenerator>,
    pub(crate) bridge:            Option<Box<dyn ConvergenceLayer>>,
    pub(crate) stop:              StopHandle,
    links:      BTreeMap<(NodeId, NodeId), Link>,
    outbox:     Vec<TimedEvent>,
    next_seq:   u64,
    dispatched: u64,
    finished:   bool,
}

impl Sim {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        config:            SimConfig,
        purge_on_delivery: bool,
        world:             World,
        detector:          ContactDetector,
        specs:             Vec<NodeSpec>,
        policy:            Box<dyn RoutingPolicy>,
        generator:         Option<MessageGenerator>,
        bridge:            Option<Box<dyn ConvergenceLayer>>,
    ) -> Self {
        let nodes = specs.iter().map(NodeState::new).collect();
        Self {
            config,
            purge_on_delivery,
            queue: EventQueue::new(),
            world,
            detector,
            specs,
            nodes,
            table: MessageTable::new(),
            policy,
            generator,
            bridge,
            stop: StopHandle::new(),
            links: BTreeMap::new(),
            outbox: Vec::new(),
            next_seq: 0,
            dispatched: 0,
            finished: false,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_spec(&self, node: NodeId) -> &NodeSpec {
        &self.specs[node.index()]
    }

    pub fn buffer(&self, node: NodeId) -> &MessageBuffer {
        &self.nodes[node.index()].buffer
    }

    pub fn messages(&self) -> &MessageTable {
        &self.table
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn detector(&self) -> &ContactDetector {
        &self.detector
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn is_active(&self, node: NodeId) -> bool {
        self.nodes[node.index()].active
    }

    /// Remaining energy of a battery-powered node.
    pub fn energy(&self, node: NodeId) -> Option<f64> {
        self.nodes[node.index()].energy
    }

    /// Put a node to sleep or wake it.  Contacts follow at the next world
    /// update.  A depleted node cannot be woken.
    pub fn set_active(&mut self, node: NodeId, active: bool) {
        let state = &mut self.nodes[node.index()];
        state.active = active && !state.is_depleted();
    }

    /// Actions still queued.
    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    /// Actions dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn transfers_in_flight(&self) -> usize {
        self.links.values().filter(|l| l.active.is_some()).count()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Queue a message for creation at `spec.time`.
    pub fn schedule_message(&mut self, spec: MessageSpec) -> SimResult<()> {
        spec.validate(self.nodes.len())?;
        self.queue.schedule(spec.time, Action::Create(spec))?;
        Ok(())
    }

    // ── Running ───────────────────────────────────────────────────────────

    /// Run to `config.end_time`, then [`finish`](Self::finish).
    pub fn run<O: SimObserver + ?Sized>(&mut self, observer: &mut O) -> SimResult<RunStatus> {
        info!(
            nodes  = self.nodes.len(),
            policy = self.policy.name(),
            model  = self.world.model_name(),
            end    = %self.config.end_time,
            seed   = self.config.seed,
            "run started"
        );
        let status = self.run_until(self.config.end_time, observer)?;
        self.finish(observer);
        Ok(status)
    }

    /// Dispatch every action scheduled before `end`, then move the clock to
    /// `end`.  Stops early if the [`StopHandle`] fires.
    pub fn run_until<O: SimObserver + ?Sized>(&mut self, end: SimTime, observer: &mut O) -> SimResult<RunStatus> {
        loop {
            if self.stop.is_stopped() {
                info!(time = %self.now(), "run stopped");
                return Ok(RunStatus::Stopped);
            }
            match self.queue.peek_time() {
                Some(t) if t < end => {
                    self.step(observer)?;
                }
                _ => break,
            }
        }
        if end > self.now() {
            self.queue.advance_to(end)?;
        }
        Ok(RunStatus::Completed)
    }

    /// Dispatch exactly one action.  Returns `false` if the queue was empty.
    pub fn step<O: SimObserver + ?Sized>(&mut self, observer: &mut O) -> SimResult<bool> {
        let Some(next) = self.queue.pop() else {
            return Ok(false);
        };
        self.dispatch(next)?;
        self.flush(observer);
        Ok(true)
    }

    /// Like [`run_until`](Self::run_until), checking `commands` between
    /// actions.  While paused the loop blocks on the channel; if the sender
    /// hangs up while paused the run resumes.  Does not call `finish`.
    pub fn run_controlled<O: SimObserver + ?Sized>(
        &mut self,
        end:      SimTime,
        observer: &mut O,
        commands: &Receiver<ControlCommand>,
    ) -> SimResult<RunStatus> {
        let mut paused = false;
        let mut steps: u64 = 0;
        loop {
            loop {
                match commands.try_recv() {
                    Ok(cmd) => {
                        if apply_command(cmd, &mut paused, &mut steps) {
                            info!(time = %self.now(), "terminate requested");
                            return Ok(RunStatus::Stopped);
                        }
                    }
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
            if self.stop.is_stopped() {
                return Ok(RunStatus::Stopped);
            }
            if paused && steps == 0 {
                match commands.recv() {
                    Ok(cmd) => {
                        if apply_command(cmd, &mut paused, &mut steps) {
                            info!(time = %self.now(), "terminate requested");
                            return Ok(RunStatus::Stopped);
                        }
                    }
                    Err(_) => {
                        warn!("control channel closed while paused; resuming");
                        paused = false;
                    }
                }
                continue;
            }
            match self.queue.peek_time() {
                Some(t) if t < end => {
                    self.step(observer)?;
                    if paused {
                        steps = steps.saturating_sub(1);
                    }
                }
                _ => {
                    if end > self.now() {
                        self.queue.advance_to(end)?;
                    }
                    return Ok(RunStatus::Completed);
                }
            }
        }
    }

    /// End the run: close every open contact (reporting `ContactDown`, not
    /// `LinkLost`), abandon in-flight transfers, and notify the observer.
    /// Idempotent.
    pub fn finish<O: SimObserver + ?Sized>(&mut self, observer: &mut O) {
        if self.finished {
            return;
        }
        self.finished = true;
        let now = self.now();
        for change in self.detector.close_all(now) {
            let (a, b) = change.pair();
            let start = match self.links.remove(&(a, b)) {
                Some(link) => {
                    if let Some(t) = link.active {
                        self.nodes[t.from.index()].buffer.set_sending(t.msg, false);
                        self.restore_tokens(&t);
                    }
                    link.start
                }
                None => now,
            };
            self.policy.on_contact_down(a, b, start, now);
            self.emit(SimEvent::ContactDown { a, b });
        }
        self.links.clear();
        self.flush(observer);
        info!(time = %now, dispatched = self.dispatched, messages = self.table.len(), "run finished");
        observer.on_sim_end(now);
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    fn dispatch(&mut self, next: Scheduled<Action>) -> SimResult<()> {
        self.dispatched += 1;
        match next.event {
            Action::WorldUpdate => self.world_update(),
            Action::Create(spec) => self.create_message(spec),
            Action::Generate => self.generate(),
            Action::Expire(msg) => self.expire(msg),
            Action::TransferDone { link, seq } => self.complete_transfer(link, seq),
        }
    }

    fn emit(&mut self, event: SimEvent) {
        self.outbox.push(TimedEvent::new(self.queue.now(), event));
    }

    fn flush<O: SimObserver + ?Sized>(&mut self, observer: &mut O) {
        let mut events = std::mem::take(&mut self.outbox);
        for ev in &events {
            if observer.handles(ev.kind()) {
                observer.on_event(ev);
            }
        }
        events.clear();
        self.outbox = events;
    }

    // ── World updates and contacts ────────────────────────────────────────

    fn world_update(&mut self) -> SimResult<()> {
        let now = self.now();
        self.sweep_expired()?;

        for (i, node) in self.nodes.iter_mut().enumerate() {
            if !node.active {
                continue;
            }
            let cost = self.specs[i].energy.map_or(0.0, |e| e.scan_cost);
            if node.spend(cost) || node.is_depleted() {
                node.active = false;
                info!(node = i, time = %now, "battery depleted; node dormant");
            }
        }

        self.world.advance_to(now);
        let positions = self.world.positions(now);
        let enabled: Vec<bool> = self.nodes.iter().map(|n| n.active).collect();
        let changes = self.detector.update(now, &positions, &enabled)?;
        trace!(time = %now, changes = changes.len(), active = self.detector.active_count(), "world update");

        for change in changes {
            match change {
                ContactChange::Down { a, b } => self.contact_down(a, b),
                ContactChange::Up { a, b } => self.contact_up(a, b)?,
            }
        }

        let interval = self.config.update_interval;
        let next = now + interval;
        if !interval.is_zero() && next < self.config.end_time {
            self.queue.schedule(next, Action::WorldUpdate)?;
        }
        Ok(())
    }

    fn contact_up(&mut self, a: NodeId, b: NodeId) -> SimResult<()> {
        let now = self.now();
        debug!(a = a.0, b = b.0, time = %now, "contact up");
        self.policy.on_contact_up(a, b, now);
        self.links.insert((a, b), Link { start: now, queue: VecDeque::new(), active: None });
        self.emit(SimEvent::ContactUp { a, b });

        // Deliverable messages first, then the rest; a→b before b→a.
        let mut deliverable = Vec::new();
        let mut other = Vec::new();
        for (from, to) in [(a, b), (b, a)] {
            for msg in self.nodes[from.index()].buffer.ids() {
                match self.table.get(msg) {
                    Some(m) if m.destination == to => deliverable.push((msg, from, to)),
                    Some(_) => other.push((msg, from, to)),
                    None => {}
                }
            }
        }
        for (msg, from, to) in deliverable.into_iter().chain(other) {
            self.offer(msg, from, to)?;
        }
        self.start_next((a, b))
    }

    fn contact_down(&mut self, a: NodeId, b: NodeId) {
        let now = self.now();
        let link = self.links.remove(&(a, b));
        let start = link.as_ref().map_or(now, |l| l.start);
        debug!(a = a.0, b = b.0, time = %now, lasted = %now.since(start), "contact down");
        self.emit(SimEvent::ContactDown { a, b });
        self.policy.on_contact_down(a, b, start, now);

        if let Some(Link { active: Some(t), .. }) = link {
            self.nodes[t.from.index()].buffer.set_sending(t.msg, false);
            self.restore_tokens(&t);
            debug!(msg = t.msg.0, from = t.from.0, to = t.to.0, "transfer aborted: link lost");
            // Purged messages are finished; a late abort is not a loss.
            let purged = self.purge_on_delivery && self.table.get(t.msg).is_some_and(Message::is_delivered);
            if !purged {
                self.emit(SimEvent::MessageDropped { msg: t.msg, node: t.to, reason: DropReason::LinkLost });
            }
        }
    }

    // ── Routing ───────────────────────────────────────────────────────────

    fn decision_context(&self, from: NodeId, to: NodeId, msg: &Message) -> DecisionContext {
        let now = self.now();
        DecisionContext {
            now,
            local: from,
            peer:  to,
            contact_start: self.links.get(&NodeId::pair(from, to)).map_or(now, |l| l.start),
            estimated_contact_duration: self.detector.log().mean_duration(from, to),
            local_occupancy: self.nodes[from.index()].buffer.occupancy(),
            peer_occupancy:  self.nodes[to.index()].buffer.occupancy(),
            remaining_ttl_fraction: msg.remaining_fraction(now),
        }
    }

    /// Ask the policy about `msg` from `from` to `to` and queue a transfer
    /// on their link if it says so.
    fn offer(&mut self, msg: MessageId, from: NodeId, to: NodeId) -> SimResult<()> {
        let now = self.now();
        let key = NodeId::pair(from, to);
        let Some(link) = self.links.get(&key) else {
            return Ok(());
        };
        let queued = link.queue.iter().any(|p| p.msg == msg && p.to == to)
            || link.active.as_ref().is_some_and(|t| t.msg == msg && t.to == to);
        let Some(copy) = self.nodes[from.index()].buffer.get(msg).copied() else {
            return Ok(());
        };
        let Some(m) = self.table.get(msg) else {
            return Ok(());
        };
        if queued
            || m.is_delivered()
            || m.holders.contains(&to)
            || self.nodes[to.index()].buffer.contains(msg)
        {
            return Ok(());
        }
        if m.is_expired(now) {
            self.drop_copy(from, msg, DropReason::TtlExpired)?;
            return Ok(());
        }

        let ctx = self.decision_context(from, to, m);
        match self.policy.decide(m, &copy, &ctx) {
            RoutingDecision::Drop(reason) => {
                self.drop_copy(from, msg, reason)?;
            }
            decision if decision.sends_to(to) => {
                if let Some(link) = self.links.get_mut(&key) {
                    link.queue.push_back(Pending { msg, from, to });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Offer a message `node` just gained on each of its open contacts.
    fn offer_new(&mut self, node: NodeId, msg: MessageId) -> SimResult<()> {
        let peers: Vec<NodeId> = self
            .links
            .keys()
            .filter_map(|&(a, b)| {
                if a == node {
                    Some(b)
                } else if b == node {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();
        for peer in peers {
            self.offer(msg, node, peer)?;
            self.start_next(NodeId::pair(node, peer))?;
        }
        Ok(())
    }

    // ── Transfers ─────────────────────────────────────────────────────────

    fn transfer_time(&self, from: NodeId, to: NodeId, size: u64) -> SimDuration {
        let speed = self.specs[from.index()].tx_speed.min(self.specs[to.index()].tx_speed);
        SimDuration::from_secs_f64(size as f64 / speed)
    }

    /// Start the next valid queued transfer on an idle link.
    fn start_next(&mut self, key: (NodeId, NodeId)) -> SimResult<()> {
        loop {
            let now = self.now();
            let Some(link) = self.links.get_mut(&key) else {
                return Ok(());
            };
            if link.active.is_some() {
                return Ok(());
            }
            let Some(p) = link.queue.pop_front() else {
                return Ok(());
            };

            let Some(m) = self.table.get(p.msg) else {
                continue;
            };
            let Some(copy) = self.nodes[p.from.index()].buffer.get(p.msg).copied() else {
                continue;
            };
            if m.is_delivered() || m.holders.contains(&p.to) || self.nodes[p.to.index()].buffer.contains(p.msg) {
                continue;
            }
            if m.is_expired(now) {
                self.drop_copy(p.from, p.msg, DropReason::TtlExpired)?;
                continue;
            }
            // Tokens may have moved since the offer; ask again.
            let ctx = self.decision_context(p.from, p.to, m);
            let kind = match self.policy.decide(m, &copy, &ctx) {
                RoutingDecision::Forward(n) if n == p.to => TransferKind::Forward,
                RoutingDecision::Replicate(ns) if ns.contains(&p.to) => TransferKind::Replicate,
                _ => continue,
            };
            let size = m.size;
            let wire = self.specs[p.to.index()].bridge.is_some().then(|| WireBundle::from_message(m));

            let radio_time = self.transfer_time(p.from, p.to, size);
            let (duration, payload) = match (wire, self.specs[p.to.index()].bridge.as_deref(), self.bridge.as_mut()) {
                (Some(wire), Some(address), Some(cl)) => {
                    let sent = wire.encode().and_then(|bytes| {
                        cl.send_payload(address, &bytes).map(|c| (c.duration, bytes))
                    });
                    match sent {
                        Ok((d, bytes)) => (d, Some(bytes)),
                        Err(e) => {
                            warn!(msg = p.msg.0, to = p.to.0, error = %e, "convergence layer refused payload");
                            continue;
                        }
                    }
                }
                _ => (radio_time, None),
            };

            let (taken, give) = match kind {
                TransferKind::Replicate => {
                    let split = self.policy.split_copies(copy.tokens);
                    (copy.tokens.saturating_sub(split.keep), split.give)
                }
                TransferKind::Forward => (0, 0),
            };
            let sender = &mut self.nodes[p.from.index()];
            if let Some(c) = sender.buffer.get_mut(p.msg) {
                c.tokens -= taken;
            }
            sender.buffer.set_sending(p.msg, true);
            let cost = self.specs[p.from.index()].energy.map_or(0.0, |e| e.transmit_cost * size as f64);
            if sender.spend(cost) {
                debug!(node = p.from.0, "battery depleted while transmitting");
            }

            self.next_seq += 1;
            let seq = self.next_seq;
            self.queue.schedule(now + duration, Action::TransferDone { link: key, seq })?;
            if let Some(link) = self.links.get_mut(&key) {
                link.active = Some(Transfer { msg: p.msg, from: p.from, to: p.to, kind, seq, taken, give, payload });
            }
            debug!(msg = p.msg.0, from = p.from.0, to = p.to.0, duration = %duration, "transfer started");
            self.emit(SimEvent::TransferStarted { msg: p.msg, from: p.from, to: p.to });
            return Ok(());
        }
    }

    fn complete_transfer(&mut self, key: (NodeId, NodeId), seq: u64) -> SimResult<()> {
        let now = self.now();
        // A missing link or a different seq means the transfer was aborted
        // or cancelled, and that path already did the bookkeeping.
        let t = match self.links.get_mut(&key) {
            Some(link) if link.active.as_ref().is_some_and(|t| t.seq == seq) => link.active.take(),
            _ => None,
        };
        let Some(t) = t else {
            trace!(seq, "stale transfer completion ignored");
            return Ok(());
        };
        let (msg, from, to) = (t.msg, t.from, t.to);
        self.nodes[from.index()].buffer.set_sending(msg, false);

        let Some(m) = self.table.get(msg) else {
            return self.start_next(key);
        };
        let delivered = m.is_delivered();
        let expired = m.is_expired(now);
        let is_destination = m.destination == to;

        if delivered {
            self.emit(SimEvent::TransferComplete { msg, from, to });
            return self.start_next(key);
        }

        let received = match (t.payload.as_deref(), self.bridge.as_mut()) {
            (Some(bytes), Some(cl)) => Some(cl.on_receive(bytes)),
            _ => None,
        };
        if let Some(received) = received {
            match received {
                Ok(received) if received.id == msg => {}
                Ok(received) => {
                    warn!(expected = msg.0, got = received.id.0, "convergence layer returned the wrong bundle");
                    self.restore_tokens(&t);
                    self.emit(SimEvent::MessageDropped { msg, node: to, reason: DropReason::LinkLost });
                    return self.start_next(key);
                }
                Err(e) => {
                    warn!(msg = msg.0, error = %e, "convergence layer receive failed");
                    self.restore_tokens(&t);
                    self.emit(SimEvent::MessageDropped { msg, node: to, reason: DropReason::LinkLost });
                    return self.start_next(key);
                }
            }
        }

        if expired {
            // The receiver never held it; only the sender's copy is lost.
            debug!(msg = msg.0, node = from.0, "expired in flight");
            self.drop_copy(from, msg, DropReason::TtlExpired)?;
            return self.start_next(key);
        }
        self.emit(SimEvent::TransferComplete { msg, from, to });

        let sender = self.nodes[from.index()]
            .buffer
            .get(msg)
            .copied()
            .unwrap_or_else(|| BufferedCopy::new(msg, now));

        if is_destination {
            if let Some(m) = self.table.get_mut(msg) {
                m.delivered_at = Some(now);
                m.hops.push(Hop { from, to, time: now });
            }
            if let Some(c) = self.nodes[from.index()].buffer.get_mut(msg) {
                c.forwards += 1;
            }
            self.emit(SimEvent::MessageRelayed { msg, from, to });
            self.emit(SimEvent::MessageDelivered { msg, from, to });
            debug!(msg = msg.0, node = to.0, hops = sender.hop_count + 1, "delivered");
            if self.purge_on_delivery || t.kind == TransferKind::Forward {
                self.purge(msg);
            }
            return self.start_next(key);
        }

        let give = match t.kind {
            TransferKind::Replicate => t.give,
            TransferKind::Forward => sender.tokens,
        };
        let mut copy = BufferedCopy::new(msg, now);
        copy.tokens = give;
        copy.hop_count = sender.hop_count + 1;

        match self.nodes[to.index()].buffer.enqueue(copy, &self.table) {
            Ok(evicted) => {
                for e in evicted {
                    self.forget_holder(e.msg, to);
                    debug!(msg = e.msg.0, node = to.0, "evicted");
                    self.emit(SimEvent::MessageDropped { msg: e.msg, node: to, reason: DropReason::Evicted });
                }
                if let Some(m) = self.table.get_mut(msg) {
                    m.holders.insert(to);
                    m.hops.push(Hop { from, to, time: now });
                }
                if let Some(c) = self.nodes[from.index()].buffer.get_mut(msg) {
                    c.forwards += 1;
                }
                self.emit(SimEvent::MessageRelayed { msg, from, to });
                if t.kind == TransferKind::Forward {
                    self.nodes[from.index()].buffer.remove(msg, &self.table);
                    self.forget_holder(msg, from);
                }
                self.offer_new(to, msg)?;
            }
            Err(e) => {
                debug!(msg = msg.0, node = to.0, error = %e, "receiver could not store message");
                self.restore_tokens(&t);
                self.emit(SimEvent::MessageDropped { msg, node: to, reason: DropReason::CapacityExceeded });
            }
        }
        self.start_next(key)
    }

    /// Return the tokens a failed replication took from its sender.
    fn restore_tokens(&mut self, t: &Transfer) {
        if let Some(c) = self.nodes[t.from.index()].buffer.get_mut(t.msg) {
            c.tokens = c.tokens.saturating_add(t.taken);
        }
    }

    /// Silently remove every remaining copy of a delivered message.
    fn purge(&mut self, msg: MessageId) {
        let holders: Vec<NodeId> = match self.table.get_mut(msg) {
            Some(m) => std::mem::take(&mut m.holders).into_iter().collect(),
            None => return,
        };
        for h in holders {
            self.nodes[h.index()].buffer.remove(msg, &self.table);
        }
        for link in self.links.values_mut() {
            link.queue.retain(|p| p.msg != msg);
        }
    }

    // ── Messages ──────────────────────────────────────────────────────────

    fn create_message(&mut self, spec: MessageSpec) -> SimResult<()> {
        let now = self.now();
        let src = spec.source;
        let id = self.table.create(src, spec.destination, now, spec.ttl, spec.size, spec.priority);
        let tokens = match self.table.get(id) {
            Some(m) => self.policy.on_message_created(m),
            None => 1,
        };
        let mut copy = BufferedCopy::new(id, now);
        copy.tokens = tokens;

        debug!(msg = id.0, src = src.0, dst = spec.destination.0, size = spec.size, "message created");
        self.emit(SimEvent::MessageCreated { msg: id, node: src });
        self.queue.schedule(now + spec.ttl, Action::Expire(id))?;

        match self.nodes[src.index()].buffer.enqueue(copy, &self.table) {
            Ok(evicted) => {
                for e in evicted {
                    self.forget_holder(e.msg, src);
                    debug!(msg = e.msg.0, node = src.0, "evicted");
                    self.emit(SimEvent::MessageDropped { msg: e.msg, node: src, reason: DropReason::Evicted });
                }
                if let Some(m) = self.table.get_mut(id) {
                    m.holders.insert(src);
                }
                self.offer_new(src, id)
            }
            Err(e) => {
                debug!(msg = id.0, node = src.0, error = %e, "source could not store message");
                self.emit(SimEvent::MessageDropped { msg: id, node: src, reason: DropReason::CapacityExceeded });
                Ok(())
            }
        }
    }

    fn generate(&mut self) -> SimResult<()> {
        let now = self.now();
        let Some(generator) = self.generator.as_mut() else {
            return Ok(());
        };
        let (spec, next) = generator.next(now);
        if let Some(t) = next.filter(|&t| t < self.config.end_time) {
            self.queue.schedule(t, Action::Generate)?;
        }
        self.create_message(spec)
    }

    fn expire(&mut self, msg: MessageId) -> SimResult<()> {
        let holders: Vec<NodeId> = self
            .table
            .get(msg)
            .map(|m| m.holders.iter().copied().collect())
            .unwrap_or_default();
        for h in holders {
            self.drop_copy(h, msg, DropReason::TtlExpired)?;
        }
        Ok(())
    }

    /// Lazy TTL path: remove copies whose deadline has passed.
    fn sweep_expired(&mut self) -> SimResult<()> {
        let now = self.now();
        for i in 0..self.nodes.len() {
            let node = NodeId(i as u32);
            let expired = self.nodes[i].buffer.take_expired(now, &self.table);
            for c in expired {
                self.forget_holder(c.msg, node);
                self.emit(SimEvent::MessageDropped { msg: c.msg, node, reason: DropReason::TtlExpired });
                self.cancel_sends(node, c.msg)?;
            }
        }
        Ok(())
    }

    /// Remove `node`'s copy of `msg`, cancelling any transfer it feeds.
    /// Returns whether there was a copy.
    fn drop_copy(&mut self, node: NodeId, msg: MessageId, reason: DropReason) -> SimResult<bool> {
        if self.nodes[node.index()].buffer.remove(msg, &self.table).is_none() {
            return Ok(false);
        }
        self.forget_holder(msg, node);
        debug!(msg = msg.0, node = node.0, %reason, "copy dropped");
        self.emit(SimEvent::MessageDropped { msg, node, reason });
        self.cancel_sends(node, msg)?;
        Ok(true)
    }

    /// Clear every active transfer of `msg` out of `node` and start the
    /// next queued transfer on each freed link.  Emits nothing: the drop
    /// of the sender's copy already accounts for the message.
    fn cancel_sends(&mut self, node: NodeId, msg: MessageId) -> SimResult<()> {
        let mut freed = Vec::new();
        for (&key, link) in self.links.iter_mut() {
            if link.active.as_ref().is_some_and(|t| t.from == node && t.msg == msg) {
                if let Some(t) = link.active.take() {
                    freed.push((key, t));
                }
            }
        }
        for (key, t) in freed {
            self.restore_tokens(&t);
            debug!(msg = msg.0, from = node.0, to = t.to.0, "transfer cancelled");
            self.start_next(key)?;
        }
        Ok(())
    }

    fn forget_holder(&mut self, msg: MessageId, node: NodeId) {
        if let Some(m) = self.table.get_mut(msg) {
            m.holders.remove(&node);
        }
    }
}

/// Returns `true` for `Terminate`.
fn apply_command(cmd: ControlCommand, paused: &mut bool, steps: &mut u64) -> bool {
    match cmd {
        ControlCommand::Pause => {
            *paused = true;
            *steps = 0;
        }
        ControlCommand::Resume => *paused = false,
        ControlCommand::Step(n) => {
            *paused = true;
            *steps = n;
        }
        ControlCommand::Terminate => return true,
    }
    false
}
