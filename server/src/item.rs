use shared::{Direction, ItemUpdate, Stack};

/// One item in motion on the authoritative side.
///
/// Pure state holder: transitions are driven by the segment simulation
/// (`grid`) and the sync policy (`sync`). `input` is the face the item
/// entered through, `output` the face it is heading toward; `progress`
/// runs 0..=255 along that edge with the midpoint at 128.
#[derive(Debug, Clone)]
pub struct TransitItem {
    pub id: u16,
    pub input: Option<Direction>,
    pub output: Option<Direction>,
    pub progress: u8,
    pub reached_center: bool,
    pub stuck: bool,
    /// Segment crossings since the last full sync of this item.
    pub blocks_since_sync: u8,
    stack: Stack,
    /// Content hash recorded when the stack was last synced; `None`
    /// until the first full update goes out.
    synced_hash: Option<u64>,
}

impl TransitItem {
    pub fn new(id: u16, stack: Stack, input: Option<Direction>) -> Self {
        Self {
            id,
            input,
            output: None,
            progress: 0,
            reached_center: false,
            stuck: false,
            blocks_since_sync: 0,
            stack,
            synced_hash: None,
        }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    pub fn into_stack(self) -> Stack {
        self.stack
    }

    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    /// True when the observer's copy of the stack cannot be trusted:
    /// never synced, or changed since the last full update.
    pub fn stack_dirty(&self) -> bool {
        self.synced_hash != Some(self.stack.content_hash())
    }

    /// Records that a full update for the current stack went out.
    pub fn mark_synced(&mut self) {
        self.synced_hash = Some(self.stack.content_hash());
        self.blocks_since_sync = 0;
    }

    /// Builds the wire message for this item; `full` attaches the stack.
    pub fn to_update(&self, full: bool) -> ItemUpdate {
        ItemUpdate {
            id: self.id,
            input: self.input,
            output: self.output,
            reached_center: self.reached_center,
            stuck: self.stuck,
            progress: self.progress,
            stack: if full { Some(self.stack.clone()) } else { None },
        }
    }
}
