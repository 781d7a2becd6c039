//! Bounded record of the poses visited by the optimizer.

use std::collections::VecDeque;

use kornia_lie::SE3F64;

/// Ordered pose snapshots: the starting pose followed by one pose per iteration.
///
/// At most `capacity` poses are kept; once full, the oldest snapshot is dropped. A zero
/// capacity disables recording while still counting the snapshots.
#[derive(Debug, Clone, Default)]
pub struct DebugTrajectory {
    capacity: usize,
    poses: VecDeque<SE3F64>,
    total_recorded: usize,
}

impl DebugTrajectory {
    /// Create an empty trajectory keeping at most `capacity` poses.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            poses: VecDeque::with_capacity(capacity.min(1024)),
            total_recorded: 0,
        }
    }

    pub(crate) fn push(&mut self, pose: SE3F64) {
        self.total_recorded += 1;
        if self.capacity == 0 {
            return;
        }
        if self.poses.len() == self.capacity {
            self.poses.pop_front();
        }
        self.poses.push_back(pose);
    }

    /// Maximum number of poses kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of poses kept.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Whether no pose is kept.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Number of snapshots taken during the solve, kept or not.
    pub fn total_recorded(&self) -> usize {
        self.total_recorded
    }

    /// Number of snapshots dropped because of the capacity bound.
    pub fn dropped(&self) -> usize {
        self.total_recorded - self.poses.len()
    }

    /// Iterate over the kept poses, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SE3F64> {
        self.poses.iter()
    }

    /// Iterate over the kept poses with their snapshot index, oldest first.
    ///
    /// Index 0 is the starting pose and index `i` the pose after iteration `i`, so the
    /// first kept pose is numbered [`Self::dropped`].
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &SE3F64)> {
        (self.dropped()..).zip(self.poses.iter())
    }

    /// The most recent pose, if any.
    pub fn last(&self) -> Option<&SE3F64> {
        self.poses.back()
    }

    /// Copy the kept poses into a vector, oldest first.
    pub fn to_vec(&self) -> Vec<SE3F64> {
        self.poses.iter().copied().collect()
    }
}
