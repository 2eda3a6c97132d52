use std::fmt::{Display, Formatter};

/// Tag that identifies a logical memory space on a [`Device`](crate::Device) (e.g., `"device"`, `"pinned_host"`,
/// or `"unpinned_host"`).
///
/// A memory kind may be left unspecified, in which case the runtime picks the default memory of each device. Two
/// memory kinds are equal if and only if both are specified and textually equal, or both are unspecified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MemoryKind {
    kind: Option<String>,
}

impl MemoryKind {
    /// Creates a new specified [`MemoryKind`].
    pub fn new<K: Into<String>>(kind: K) -> Self {
        Self { kind: Some(kind.into()) }
    }

    /// Creates a new unspecified [`MemoryKind`].
    pub fn unspecified() -> Self {
        Self { kind: None }
    }

    /// Returns the memory kind string, or [`None`] if this [`MemoryKind`] is unspecified.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

impl Display for MemoryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{kind}"),
            None => write!(f, "(unspecified)"),
        }
    }
}
