//! Property tests for lifecycle and rewind invariants.

mod lifecycle_props;
mod rewind_props;
