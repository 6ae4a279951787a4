//! Outcome of executing one dynamic update.

/// What happened when an update was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// The material may reach outside the region; the update was handed back
    /// for the global phase.
    NonLocal,
    /// The material hook ran.
    Done,
    /// The block no longer takes dynamic updates. The update is dropped.
    NotDynamic,
    /// The chunk is not loaded. The update is dropped.
    NotLoaded,
    /// The chunk is not populated yet. The update is dropped.
    NotPopulated,
}

impl UpdateResult {
    /// Returns true unless the update has to run in the global phase.
    #[must_use]
    pub const fn is_local(self) -> bool {
        !matches!(self, Self::NonLocal)
    }

    /// Returns true if the material hook ran.
    #[must_use]
    pub const fn is_executed(self) -> bool {
        matches!(self, Self::Done)
    }
}
