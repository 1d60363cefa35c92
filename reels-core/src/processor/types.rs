use crate::store::ReelMetadata;

/// A processed reel as handed back by the processor. Cache hits and fresh
/// creations are indistinguishable to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Reel {
    pub id: String,
    pub metadata: ReelMetadata,
}
