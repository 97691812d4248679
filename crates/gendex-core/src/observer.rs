//! Per-call hooks around reads and searches.
//!
//! An observer is handed to one operation and consulted at three points.
//! `begin` and `result_found` may stop the operation by returning
//! `ControlFlow::Break(())`; `end` always runs, canceled or not.
use std::ops::ControlFlow;
use std::time::Duration;

use crate::types::SearchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Search,
}

#[derive(Debug, Clone)]
pub struct BeginEvent<'a> {
    pub operation: Operation,
    pub sources: &'a [String],
    pub query: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct EndEvent<'a> {
    pub operation: Operation,
    pub sources: &'a [String],
    pub results: usize,
    pub canceled: bool,
    pub elapsed: Duration,
}

pub trait SearchObserver {
    fn begin(&mut self, _event: &BeginEvent<'_>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn result_found(&mut self, _result: &SearchResult) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn end(&mut self, _event: &EndEvent<'_>) {}
}

/// Observer that never interferes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unobserved;

impl SearchObserver for Unobserved {}

/// Cancels in `begin`. Handy for dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelAtBegin;

impl SearchObserver for CancelAtBegin {
    fn begin(&mut self, _event: &BeginEvent<'_>) -> ControlFlow<()> {
        ControlFlow::Break(())
    }
}

/// Stops accepting results once `limit` have been seen.
#[derive(Debug, Clone, Copy)]
pub struct StopAfter {
    limit: usize,
    seen: usize,
}

impl StopAfter {
    pub fn new(limit: usize) -> Self {
        Self { limit, seen: 0 }
    }
}

impl SearchObserver for StopAfter {
    fn result_found(&mut self, _result: &SearchResult) -> ControlFlow<()> {
        if self.seen >= self.limit {
            return ControlFlow::Break(());
        }
        self.seen += 1;
        ControlFlow::Continue(())
    }
}
