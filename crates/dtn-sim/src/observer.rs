//! Event sinks fed by [`Sim`](crate::Sim) as the run progresses.

use dtn_core::{EventKind, SimTime, TimedEvent};

/// Receives every public event of a run, in dispatch order.
///
/// All methods have default no-op implementations.
///
/// # Example — delivery counter
///
/// ```rust,ignore
/// struct Delivered(u64);
///
/// impl SimObserver for Delivered {
///     fn handles(&self, kind: EventKind) -> bool {
///         kind == EventKind::MessageDelivered
///     }
///     fn on_event(&mut self, _event: &TimedEvent) {
///         self.0 += 1;
///     }
/// }
/// ```
pub trait SimObserver {
    /// Filter: `on_event` is only called for kinds this returns `true` for.
    fn handles(&self, _kind: EventKind) -> bool {
        true
    }

    fn on_event(&mut self, _event: &TimedEvent) {}

    /// Called once when the run is finished, after the closing contact
    /// events.
    fn on_sim_end(&mut self, _time: SimTime) {}
}

impl<O: SimObserver + ?Sized> SimObserver for &mut O {
    fn handles(&self, kind: EventKind) -> bool {
        (**self).handles(kind)
    }

    fn on_event(&mut self, event: &TimedEvent) {
        (**self).on_event(event)
    }

    fn on_sim_end(&mut self, time: SimTime) {
        (**self).on_sim_end(time)
    }
}

impl<O: SimObserver + ?Sized> SimObserver for Box<O> {
    fn handles(&self, kind: EventKind) -> bool {
        (**self).handles(kind)
    }

    fn on_event(&mut self, event: &TimedEvent) {
        (**self).on_event(event)
    }

    fn on_sim_end(&mut self, time: SimTime) {
        (**self).on_sim_end(time)
    }
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

/// Keeps every event it sees.  Mostly for tests and small runs.
#[derive(Default, Debug)]
pub struct EventRecorder {
    pub events: Vec<TimedEvent>,
    pub ended:  Option<SimTime>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &TimedEvent> + '_ {
        self.events.iter().filter(move |e| e.kind() == kind)
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).count()
    }
}

impl SimObserver for EventRecorder {
    fn on_event(&mut self, event: &TimedEvent) {
        self.events.push(event.clone());
    }

    fn on_sim_end(&mut self, time: SimTime) {
        self.ended = Some(time);
    }
}

/// Fans events out to several observers in registration order.  Each
/// observer's own `handles` filter is applied.
#[derive(Default)]
pub struct ObserverSet<'a> {
    observers: Vec<Box<dyn SimObserver + 'a>>,
}

impl<'a> ObserverSet<'a> {
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub fn push(&mut self, observer: impl SimObserver + 'a) {
        self.observers.push(Box::new(observer));
    }

    pub fn with(mut self, observer: impl SimObserver + 'a) -> Self {
        self.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl SimObserver for ObserverSet<'_> {
    fn handles(&self, kind: EventKind) -> bool {
        self.observers.iter().any(|o| o.handles(kind))
    }

    fn on_event(&mut self, event: &TimedEvent) {
        let kind = event.kind();
        for o in &mut self.observers {
            if o.handles(kind) {
                o.on_event(event);
            }
        }
    }

    fn on_sim_end(&mut self, time: SimTime) {
        for o in &mut self.observers {
            o.on_sim_end(time);
        }
    }
}
