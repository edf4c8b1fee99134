//! Dependency grouping for hybrid execution
//!
//! Splits the ordered step list into maximal runs of independent steps
//! (parallel groups) separated by dependent steps, each of which forms a
//! sequential group of its own. Original order is preserved.

use crate::models::ToolCall;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum GroupKind {
    Parallel,
    Sequential,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Parallel => f.write_str("parallel"),
            GroupKind::Sequential => f.write_str("sequential"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionGroup<'a> {
    pub kind: GroupKind,
    pub calls: Vec<&'a ToolCall>,
}

impl<'a> ExecutionGroup<'a> {
    pub fn steps(&self) -> Vec<u32> {
        self.calls.iter().map(|call| call.step).collect()
    }
}

/// Partition calls into parallel runs and sequential singletons.
///
/// A dependent step always lands after every group emitted before it, so by
/// the time it runs, the only variables it can see come from earlier groups.
pub fn group_by_dependency(calls: &[ToolCall]) -> Vec<ExecutionGroup<'_>> {
    let mut groups = Vec::new();
    let mut buffer: Vec<&ToolCall> = Vec::new();

    for call in calls {
        if call.is_independent() {
            buffer.push(call);
            continue;
        }

        if !buffer.is_empty() {
            groups.push(ExecutionGroup {
                kind: GroupKind::Parallel,
                calls: std::mem::take(&mut buffer),
            });
        }

        groups.push(ExecutionGroup {
            kind: GroupKind::Sequential,
            calls: vec![call],
        });
    }

    if !buffer.is_empty() {
        groups.push(ExecutionGroup {
            kind: GroupKind::Parallel,
            calls: buffer,
        });
    }

    groups
}
