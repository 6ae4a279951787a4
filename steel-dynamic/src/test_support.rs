//! In-memory region and material doubles for the scheduler tests.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use steel_utils::{BlockKey, ChunkKey};

use crate::error::HookError;
use crate::inbox::UpdateInbox;
use crate::material::{ChunkState, DynamicBlock, DynamicMaterial, EffectRange, RegionAccess};

/// A region where every chunk is populated unless told otherwise.
#[derive(Default)]
pub(crate) struct TestRegion {
    states: Mutex<FxHashMap<ChunkKey, ChunkState>>,
    materials: Mutex<FxHashMap<BlockKey, Arc<dyn DynamicMaterial<TestRegion>>>>,
    modified: Mutex<FxHashSet<ChunkKey>>,
}

impl TestRegion {
    pub(crate) fn populated() -> Self {
        Self::default()
    }

    pub(crate) fn set_state(&self, chunk: ChunkKey, state: ChunkState) {
        self.states.lock().insert(chunk, state);
    }

    pub(crate) fn place(&self, pos: BlockKey, material: RecordingMaterial) -> Arc<RecordingMaterial> {
        let material = Arc::new(material);
        self.place_shared(pos, material.clone());
        material
    }

    pub(crate) fn place_shared(&self, pos: BlockKey, material: Arc<RecordingMaterial>) {
        self.materials.lock().insert(pos, material);
    }

    pub(crate) fn is_modified(&self, chunk: ChunkKey) -> bool {
        self.modified.lock().contains(&chunk)
    }
}

impl RegionAccess for TestRegion {
    fn chunk_state(&self, chunk: ChunkKey) -> ChunkState {
        self.states
            .lock()
            .get(&chunk)
            .copied()
            .unwrap_or(ChunkState::Populated)
    }

    fn dynamic_material(&self, pos: BlockKey) -> Option<Arc<dyn DynamicMaterial<Self>>> {
        self.materials.lock().get(&pos).cloned()
    }

    fn mark_modified(&self, chunk: ChunkKey) {
        self.modified.lock().insert(chunk);
    }
}

/// A hook invocation seen by [`RecordingMaterial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    First {
        pos: BlockKey,
        current_time: u64,
    },
    Update {
        pos: BlockKey,
        update_time: u64,
        data: i32,
    },
}

/// Records every hook call, optionally rescheduling itself or failing.
pub(crate) struct RecordingMaterial {
    range: EffectRange,
    reschedule: Option<u64>,
    fail: bool,
    rerequest: Mutex<Option<Arc<UpdateInbox>>>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingMaterial {
    pub(crate) fn new(range: EffectRange) -> Self {
        Self {
            range,
            reschedule: None,
            fail: false,
            rerequest: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn rescheduling(range: EffectRange, delay: u64) -> Self {
        Self {
            reschedule: Some(delay),
            ..Self::new(range)
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(EffectRange::None)
        }
    }

    /// Requests one more reset of its own block the first time it is reset.
    pub(crate) fn rerequesting(inbox: Arc<UpdateInbox>) -> Self {
        Self {
            rerequest: Mutex::new(Some(inbox)),
            ..Self::new(EffectRange::None)
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl DynamicMaterial<TestRegion> for RecordingMaterial {
    fn dynamic_range(&self) -> EffectRange {
        self.range
    }

    fn on_first_update(
        &self,
        block: &mut DynamicBlock<'_, TestRegion>,
        current_time: u64,
    ) -> Result<(), HookError> {
        self.calls.lock().push(Call::First {
            pos: block.pos(),
            current_time,
        });
        if let Some(inbox) = self.rerequest.lock().take() {
            inbox.request_reset_block(block.pos());
        }
        Ok(())
    }

    fn on_dynamic_update(
        &self,
        block: &mut DynamicBlock<'_, TestRegion>,
        update_time: u64,
        data: i32,
    ) -> Result<(), HookError> {
        if self.fail {
            return Err("material refused the update".into());
        }
        self.calls.lock().push(Call::Update {
            pos: block.pos(),
            update_time,
            data,
        });
        if let Some(delay) = self.reschedule {
            block.queue_update(update_time + delay, data, false)?;
        }
        Ok(())
    }
}
