//! Playback position tracking through the order list.
//!
//! Two structures share the order-walking logic: [`Cursor`] is the mainline
//! position (always fully resolved), [`Jump`] is the pending target queued
//! by the Bxx/Cxx effects, whose row and order halves may be set
//! independently.

use crate::format::{ORDER_END, ORDER_MARKER, ROWS_PER_PATTERN, Row, S3mFile};

/// The mainline playback position: row within pattern, order within the
/// order list, and the pattern that order resolves to.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Cursor {
    pub row: usize,
    pub order: usize,
    pub pattern: usize,
}

impl Cursor {
    /// Move to row 0 of the first playable order.
    /// Returns true if the walk already wrapped (degenerate order lists).
    pub fn reset(&mut self, file: &S3mFile) -> bool {
        self.row = 0;
        self.set_order(0, file)
    }

    /// Jump to `order`, skipping markers and wrapping at the end of the
    /// list. Returns true when the song end was crossed.
    pub fn set_order(&mut self, order: usize, file: &S3mFile) -> bool {
        let (order, pattern, done) = resolve_order(order, file);
        self.order = order;
        self.pattern = pattern;
        done
    }

    /// Advance one row, rolling over into the next order at row 64.
    /// Returns true when the song end was crossed.
    pub fn next_row(&mut self, file: &S3mFile) -> bool {
        self.row += 1;
        if self.row >= ROWS_PER_PATTERN {
            self.row = 0;
            self.set_order(self.order + 1, file)
        } else {
            false
        }
    }

    /// Overwrite whichever halves of the position `jump` carries.
    /// Returns true iff anything was overwritten.
    pub fn apply(&mut self, jump: &Jump) -> bool {
        let mut applied = false;
        if let Some(row) = jump.row {
            self.row = row;
            applied = true;
        }
        if let Some(target) = jump.target {
            self.order = target.order;
            self.pattern = target.pattern;
            applied = true;
        }
        applied
    }

    /// The row the cursor points at.
    pub fn current_row<'a>(&self, file: &'a S3mFile) -> &'a Row {
        &file.patterns[self.pattern].rows[self.row]
    }
}

/// A resolved (order, pattern) pair queued by Bxx.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JumpTarget {
    pub order: usize,
    pub pattern: usize,
}

/// Pending jump queued during row dispatch and applied at the row boundary.
///
/// Cxx alone sets only `row`; Bxx sets both halves. Either half may be
/// absent, which [`Cursor::apply`] leaves untouched.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Jump {
    pub row: Option<usize>,
    pub target: Option<JumpTarget>,
}

impl Jump {
    /// Queue a row-within-pattern target.
    pub fn set_row(&mut self, row: usize) {
        debug_assert!(row < ROWS_PER_PATTERN);
        self.row = Some(row.min(ROWS_PER_PATTERN - 1));
    }

    /// Queue an order target, resolving markers the same way the mainline
    /// cursor does. Returns true when the song end was crossed.
    pub fn set_order(&mut self, order: usize, file: &S3mFile) -> bool {
        let (order, pattern, done) = resolve_order(order, file);
        self.target = Some(JumpTarget { order, pattern });
        done
    }

    /// Whether an order target has been queued (Cxx checks this before
    /// defaulting to the next order).
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Drop any queued target.
    pub fn clear(&mut self) {
        *self = Jump::default();
    }
}

/// Walk the order list from `order`, skipping [`ORDER_MARKER`] entries and
/// wrapping to the front past [`ORDER_END`] or the end of the list.
///
/// Returns the settled order, its pattern, and whether the song end was
/// crossed on the way. The loader guarantees at least one playable entry,
/// so the walk terminates.
fn resolve_order(start: usize, file: &S3mFile) -> (usize, usize, bool) {
    let mut order = start;
    let mut done = false;
    while order >= file.num_orders
        || file.orders[order] == ORDER_MARKER
        || file.orders[order] == ORDER_END
    {
        if order < file.num_orders && file.orders[order] == ORDER_END {
            done = true;
        }
        order += 1;
        if order >= file.num_orders {
            order = 0;
            done = true;
        }
    }
    (order, file.orders[order] as usize, done)
}
