//! Layout engine: participant grid sizing and the picture-in-picture resize
//! gesture.

use super::session::SessionEpoch;

/// Viewport width class for responsive breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportClass {
    Narrow,
    Wide,
}

impl ViewportClass {
    /// Classify a viewport width against the narrow/wide threshold.
    pub fn from_width(width: u16, narrow_below: u16) -> Self {
        if width < narrow_below {
            ViewportClass::Narrow
        } else {
            ViewportClass::Wide
        }
    }
}

/// Grid arrangement for a given roster size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: usize,
    /// Upper bound on the stage width in px, widening with the roster.
    pub max_width_px: u32,
}

/// Choose the grid for `count` tiles.
///
/// A step function of `count`: 1 tile → 1 column, 2 → 2 (1 when narrow),
/// 3–4 → 2, 5–6 → 3 (2 when narrow), 7–9 → 3, 10+ → 4 (3 when narrow).
pub fn grid_layout(count: usize, viewport: ViewportClass) -> GridLayout {
    let narrow = viewport == ViewportClass::Narrow;
    let (columns, max_width_px) = match count {
        0 | 1 => (1, 1024),
        2 => (if narrow { 1 } else { 2 }, 1152),
        3 | 4 => (2, 1152),
        5 | 6 => (if narrow { 2 } else { 3 }, 1280),
        7..=9 => (3, 1600),
        _ => (if narrow { 3 } else { 4 }, 1800),
    };
    let tiles = count.max(1);
    GridLayout {
        columns,
        rows: tiles.div_ceil(columns),
        max_width_px,
    }
}

pub const PIP_MIN_WIDTH: u32 = 200;
pub const PIP_MAX_WIDTH: u32 = 600;
pub const PIP_DEFAULT_WIDTH: u32 = 280;

/// Height for a PiP width at a fixed 16:9 ratio, rounded to the nearest px.
pub fn pip_height_for(width: u32) -> u32 {
    (width * 9 + 8) / 16
}

/// Self-view overlay size during screen share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipDimensions {
    pub width: u32,
    pub height: u32,
}

impl PipDimensions {
    /// Dimensions for `width`, clamped to the allowed range.
    pub fn from_width(width: i64) -> Self {
        let width = width.clamp(PIP_MIN_WIDTH as i64, PIP_MAX_WIDTH as i64) as u32;
        Self {
            width,
            height: pip_height_for(width),
        }
    }
}

impl Default for PipDimensions {
    fn default() -> Self {
        Self::from_width(PIP_DEFAULT_WIDTH as i64)
    }
}

/// Identity of one drag gesture. Carries the owning session's epoch so a
/// gesture from a previous session never matches the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureId {
    epoch: SessionEpoch,
    seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    gesture: GestureId,
    start_x: i64,
    start_width: u32,
}

/// PiP size plus the in-flight resize gesture, if any.
///
/// The handle sits at the overlay's top-left corner while the bottom-right
/// corner stays fixed, so moving the pointer left grows the overlay.
#[derive(Debug, Clone)]
pub struct PipResizer {
    epoch: SessionEpoch,
    dims: PipDimensions,
    drag: Option<Drag>,
    next_seq: u64,
}

impl PipResizer {
    pub fn new(epoch: SessionEpoch) -> Self {
        Self {
            epoch,
            dims: PipDimensions::default(),
            drag: None,
            next_seq: 0,
        }
    }

    pub fn dimensions(&self) -> PipDimensions {
        self.dims
    }

    pub fn is_resizing(&self) -> bool {
        self.drag.is_some()
    }

    /// Start a drag at pointer column `x`. Replaces any unfinished gesture.
    pub fn begin(&mut self, x: i64) -> GestureId {
        self.next_seq += 1;
        let gesture = GestureId {
            epoch: self.epoch,
            seq: self.next_seq,
        };
        self.drag = Some(Drag {
            gesture,
            start_x: x,
            start_width: self.dims.width,
        });
        gesture
    }

    /// Apply a pointer move. Ignored unless `gesture` is the live one.
    pub fn drag(&mut self, gesture: GestureId, x: i64) -> bool {
        let Some(drag) = self.drag.filter(|d| d.gesture == gesture) else {
            return false;
        };
        let next = PipDimensions::from_width(drag.start_width as i64 + (drag.start_x - x));
        let changed = next != self.dims;
        self.dims = next;
        changed
    }

    /// Release the gesture. Ignored unless `gesture` is the live one.
    pub fn end(&mut self, gesture: GestureId) -> bool {
        if self.drag.is_some_and(|d| d.gesture == gesture) {
            self.drag = None;
            true
        } else {
            false
        }
    }

    /// Drop any in-flight gesture without changing the size.
    pub fn cancel(&mut self) {
        self.drag = None;
    }
}
