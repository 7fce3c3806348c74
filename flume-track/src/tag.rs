// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The unique [`Tag`] assigned to every tracked simulation object.

use std::fmt;

/// A unique identifier for a tracked simulation object.
///
/// Tags are allocated by a [`Tracker`](crate::Tracker) and are unique within
/// that tracker for the lifetime of the process.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tag(pub u64);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
