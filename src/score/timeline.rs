//! Beat-by-beat cursor over an interpreted score.
//!
//! The cursor starts at `1|1` and steps with
//! [`Interpreter::next_location_infos`], so it visits every whole beat plus
//! every state declared in between, and jumps over fermata holds. Scores
//! without `END` never run out; bound them with [`Timeline::with_limit`].

use super::{Interpreter, Location, LocationInfos};

/// A read cursor over the scheduled occurrences of a score.
pub struct Timeline<'a> {
    interpreter: &'a Interpreter,
    cursor: Option<Location>,
    emitted: usize,
    limit: Option<usize>,
}

impl<'a> Timeline<'a> {
    /// Create a cursor positioned before the first beat.
    pub fn new(interpreter: &'a Interpreter) -> Self {
        Self {
            interpreter,
            cursor: None,
            emitted: 0,
            limit: None,
        }
    }

    /// Stop after yielding `limit` occurrences.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Peek at the next occurrence without advancing the cursor.
    pub fn peek_next(&self) -> Option<LocationInfos> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return None;
        }
        match self.cursor {
            None => self
                .interpreter
                .location_infos(Location::START.bar, Location::START.beat)
                .ok(),
            Some(at) => self
                .interpreter
                .next_location_infos(at.bar, at.beat)
                .ok()
                .flatten(),
        }
    }

    /// Yield every occurrence strictly before `position` seconds.
    pub fn drain_until(&mut self, position: f64) -> Vec<LocationInfos> {
        let mut drained = Vec::new();
        while let Some(infos) = self.peek_next() {
            if infos.position >= position {
                break;
            }
            self.advance(&infos);
            drained.push(infos);
        }
        drained
    }

    /// Last location yielded, if any.
    pub fn location(&self) -> Option<Location> {
        self.cursor
    }

    /// Number of occurrences yielded since the last reset.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Move the cursor back before the first beat.
    pub fn reset(&mut self) {
        self.cursor = None;
        self.emitted = 0;
    }

    fn advance(&mut self, infos: &LocationInfos) {
        self.cursor = Some(infos.location);
        self.emitted += 1;
    }
}

impl Iterator for Timeline<'_> {
    type Item = LocationInfos;

    fn next(&mut self) -> Option<Self::Item> {
        let infos = self.peek_next()?;
        self.advance(&infos);
        Some(infos)
    }
}
