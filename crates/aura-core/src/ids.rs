use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Note,
    Event,
}

impl EntityKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Note => "note",
            Self::Event => "event",
        }
    }
}

/// Process-wide source of entity identifiers. Shared between router turns
/// and direct UI dispatches, so implementations must be callable concurrently.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: EntityKind) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self, _kind: EntityKind) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic ids (`task-1`, `note-2`, ...). One counter across all kinds.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, kind: EntityKind) -> String {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", kind.prefix())
    }
}
