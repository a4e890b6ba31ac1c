//! Ordered record of everything the simulated subsystems saw

use std::fmt;

use common::{Rect, Step};

use crate::platform::Library;

/// Kinds of native resource the simulation hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Display,
    Update,
    Element,
    GraphicsDisplay,
    Surface,
    Context,
    CurrentBinding,
    Source,
    Packet,
    Decoder,
    Frame,
    Image,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A resource as the journal tracks it.
pub type Entry = (ResourceKind, u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Init(Library),
    Deinit(Library),
    Acquire { kind: ResourceKind, id: u32 },
    Release { kind: ResourceKind, id: u32 },
    /// An update dropped without submit.
    Abandoned(ResourceKind),
    /// An injected failure fired.
    Fault(Step),
    PacketSent,
    Eof,
    Clear(Rect),
    Upload,
    Draw,
    Present,
    /// A call the real library would have rejected or crashed on.
    Violation(String),
}

#[derive(Debug, Default)]
pub struct Journal {
    events: Vec<Event>,
    live: Vec<Entry>,
    next_id: u32,
}

impl Journal {
    pub fn record(&mut self, event: Event) {
        if let Event::Violation(what) = &event {
            log::warn!("sim: violation: {}", what);
        }
        self.events.push(event);
    }

    pub fn violation(&mut self, what: impl Into<String>) {
        self.record(Event::Violation(what.into()));
    }

    /// Hand out a fresh id for `kind` and mark it live.
    pub fn acquire(&mut self, kind: ResourceKind) -> u32 {
        self.next_id += 1;
        let id = self.next_id;
        self.live.push((kind, id));
        self.record(Event::Acquire { kind, id });
        id
    }

    /// Mark a resource released. Releasing a dead one is a violation.
    pub fn release(&mut self, kind: ResourceKind, id: u32) -> bool {
        match self.live.iter().position(|entry| *entry == (kind, id)) {
            Some(index) => {
                self.live.remove(index);
                self.record(Event::Release { kind, id });
                true
            }
            None => {
                self.violation(format!("release of dead {} {}", kind, id));
                false
            }
        }
    }

    pub fn is_live(&self, kind: ResourceKind, id: u32) -> bool {
        self.live.contains(&(kind, id))
    }

    pub fn live_of(&self, kind: ResourceKind) -> Vec<u32> {
        self.live
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.clone()
    }

    /// Live resources in acquisition order.
    pub fn live(&self) -> Vec<Entry> {
        self.live.clone()
    }

    /// Every release, in order.
    pub fn releases(&self) -> Vec<Entry> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Release { kind, id } => Some((*kind, *id)),
                _ => None,
            })
            .collect()
    }

    /// Ids ever acquired for `kind`.
    pub fn acquired(&self, kind: ResourceKind) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Acquire { kind: k, id } if *k == kind => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn presents(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Present).count()
    }

    pub fn violations(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Violation(what) => Some(what.clone()),
                _ => None,
            })
            .collect()
    }

    /// Resources live when `step`'s fault fired, and the order in which those
    /// same resources were released afterwards.
    ///
    /// Resources acquired after the fault (the update used to remove an
    /// element, say) are left out of both lists.
    pub fn unwind_after(&self, step: Step) -> Option<(Vec<Entry>, Vec<Entry>)> {
        let fault = self
            .events
            .iter()
            .position(|event| *event == Event::Fault(step))?;

        let mut live = Vec::new();
        for event in &self.events[..fault] {
            match event {
                Event::Acquire { kind, id } => live.push((*kind, *id)),
                Event::Release { kind, id } => live.retain(|entry| *entry != (*kind, *id)),
                _ => {}
            }
        }

        let released = self.events[fault..]
            .iter()
            .filter_map(|event| match event {
                Event::Release { kind, id } if live.contains(&(*kind, *id)) => Some((*kind, *id)),
                _ => None,
            })
            .collect();
        Some((live, released))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_tracking() {
        let mut journal = Journal::default();
        let display = journal.acquire(ResourceKind::Display);
        let element = journal.acquire(ResourceKind::Element);
        assert_eq!(
            journal.live(),
            vec![
                (ResourceKind::Display, display),
                (ResourceKind::Element, element)
            ]
        );
        assert!(journal.release(ResourceKind::Element, element));
        assert!(!journal.release(ResourceKind::Element, element));
        assert_eq!(journal.violations().len(), 1);
        assert_eq!(journal.live_of(ResourceKind::Display), vec![display]);
    }

    #[test]
    fn test_unwind_after_fault() {
        let mut journal = Journal::default();
        let display = journal.acquire(ResourceKind::Display);
        let element = journal.acquire(ResourceKind::Element);
        journal.record(Event::Fault(Step::GraphicsBind));
        let update = journal.acquire(ResourceKind::Update);
        journal.release(ResourceKind::Update, update);
        journal.release(ResourceKind::Element, element);
        journal.release(ResourceKind::Display, display);

        let (live, released) = journal.unwind_after(Step::GraphicsBind).unwrap();
        assert_eq!(
            live,
            vec![
                (ResourceKind::Display, display),
                (ResourceKind::Element, element)
            ]
        );
        assert_eq!(
            released,
            vec![
                (ResourceKind::Element, element),
                (ResourceKind::Display, display)
            ]
        );
        assert!(journal.unwind_after(Step::Present).is_none());
    }
}
