//! Deterministic in-process simulation of all four subsystems
//!
//! The simulated compositor, GPU layer, decoder and drawing layer share one
//! [`SimCore`]: a [`Journal`] of every acquire and release, the set of
//! committed overlay elements, the current GPU binding and a one-shot fault
//! that makes the call belonging to a chosen [`Step`] fail.
//!
//! The simulation checks the ordering rules the real libraries depend on and
//! records a [`Event::Violation`] instead of crashing when one is broken.

mod compositor;
mod decode;
mod drawing;
mod graphics;
mod journal;

pub use compositor::SimCompositor;
pub use decode::{SimDecode, SimDecoder, SimFormat, SimFrame, SimPacket, SimSource, SimStream};
pub use drawing::SimDrawing;
pub use graphics::SimGraphics;
pub use journal::{Entry, Event, Journal, ResourceKind};

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use common::{ElementHandle, GraphicsAttributes, Step};

use crate::orchestrator::Subsystems;

/// What the simulated hardware looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSettings {
    pub display_size: (u32, u32),
    /// Number of displays; valid indices are `0..displays`.
    pub displays: u32,
    /// Framebuffer configurations the GPU layer offers.
    pub configs: Vec<GraphicsAttributes>,
    pub frame_size: (u32, u32),
    /// Packets the decoder needs before it yields a frame.
    pub priming_depth: u32,
    /// Packets the source holds before end of stream.
    pub stream_packets: u32,
    /// Stream index of each packet read, cycled.
    pub stream_pattern: Vec<usize>,
    /// Time one packet read takes.
    pub packet_interval: Duration,
    /// Paths that open successfully.
    pub sources: Vec<String>,
    /// Known input format short names.
    pub formats: Vec<String>,
    /// Codec of stream 0. Only "rawvideo" and "mjpeg" have decoders.
    pub codec: String,
    /// The call for this step fails once.
    pub fail_at: Option<Step>,
}

impl Default for SimSettings {
    fn default() -> Self {
        let config = |red, green, blue, alpha| GraphicsAttributes {
            red,
            green,
            blue,
            alpha,
            luminance: Some(0),
            samples: 1,
        };
        Self {
            display_size: (1024, 768),
            displays: 1,
            configs: vec![config(5, 6, 5, 0), config(8, 8, 8, 0), config(8, 8, 8, 8)],
            frame_size: (640, 480),
            priming_depth: 1,
            stream_packets: 16,
            stream_pattern: vec![0],
            packet_interval: Duration::ZERO,
            sources: vec!["/dev/video0".to_string()],
            formats: vec!["v4l2".to_string(), "rawvideo".to_string()],
            codec: "rawvideo".to_string(),
            fail_at: None,
        }
    }
}

/// State shared by the simulated subsystems.
#[derive(Debug)]
pub struct SimCore {
    pub journal: Journal,
    settings: SimSettings,
    fault: Option<Step>,
    release_faults: Vec<ResourceKind>,
    /// Committed element id → display id.
    committed: HashMap<u32, u32>,
    /// Surface id → element id it was created on.
    surfaces: HashMap<u32, u32>,
    /// Current (surface, context, binding) ids.
    current: Option<(u32, u32, u32)>,
    /// Update id → queued changes.
    updates: HashMap<u32, Vec<PendingOp>>,
    /// Image id → size.
    images: HashMap<u32, (u32, u32)>,
}

#[derive(Debug, Clone, Copy)]
enum PendingOp {
    Add { element: u32, display: u32 },
    Remove { element: u32 },
}

impl SimCore {
    fn new(settings: SimSettings) -> Self {
        Self {
            journal: Journal::default(),
            fault: settings.fail_at,
            settings,
            release_faults: Vec::new(),
            committed: HashMap::new(),
            surfaces: HashMap::new(),
            current: None,
            updates: HashMap::new(),
            images: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    pub fn is_committed(&self, element: ElementHandle) -> bool {
        self.committed.contains_key(&element.0)
    }

    /// Acquire and commit an element outside any update, for driving the GPU
    /// layer on its own.
    pub fn commit_test_element(&mut self) -> ElementHandle {
        let id = self.journal.acquire(ResourceKind::Element);
        self.committed.insert(id, 0);
        ElementHandle(id)
    }

    /// Make the next release of `kind` fail and leave the resource live.
    pub fn fail_release(&mut self, kind: ResourceKind) {
        self.release_faults.push(kind);
    }

    /// Arm a one-shot fault for `step`.
    pub fn fail_at(&mut self, step: Step) {
        self.fault = Some(step);
    }

    /// Whether the call for `step` should fail now. Disarms the fault.
    fn inject(&mut self, step: Step) -> bool {
        if self.fault == Some(step) {
            self.fault = None;
            self.journal.record(Event::Fault(step));
            log::debug!("sim: injecting failure at {}", step);
            true
        } else {
            false
        }
    }

    /// Release through the journal unless a release fault is armed.
    fn release(&mut self, kind: ResourceKind, id: u32) -> bool {
        if let Some(index) = self.release_faults.iter().position(|k| *k == kind) {
            self.release_faults.remove(index);
            log::debug!("sim: failing release of {} {}", kind, id);
            return false;
        }
        self.journal.release(kind, id)
    }

    fn require_current(&mut self, call: &str) {
        if self.current.is_none() {
            self.journal
                .violation(format!("{} without a current context", call));
        }
    }
}

type Shared = Rc<RefCell<SimCore>>;

/// One simulated machine.
pub struct SimWorld {
    pub compositor: SimCompositor,
    pub graphics: SimGraphics,
    pub decode: SimDecode,
    pub drawing: SimDrawing,
    core: Shared,
}

impl SimWorld {
    pub fn new(settings: SimSettings) -> Self {
        let core: Shared = Rc::new(RefCell::new(SimCore::new(settings)));
        Self {
            compositor: SimCompositor::new(core.clone()),
            graphics: SimGraphics::new(core.clone()),
            decode: SimDecode::new(core.clone()),
            drawing: SimDrawing::new(core.clone()),
            core,
        }
    }

    pub fn core(&self) -> Ref<'_, SimCore> {
        self.core.borrow()
    }

    pub fn core_mut(&self) -> RefMut<'_, SimCore> {
        self.core.borrow_mut()
    }

    /// Handles onto the same simulated machine, for an orchestrator to own.
    pub fn subsystems(&self) -> Subsystems<SimCompositor, SimGraphics, SimDecode, SimDrawing> {
        Subsystems {
            compositor: self.compositor.clone(),
            graphics: self.graphics.clone(),
            decode: self.decode.clone(),
            drawing: self.drawing.clone(),
        }
    }
}
