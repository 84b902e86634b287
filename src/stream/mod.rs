//! Streaming primitives for generated replies.

mod tee;

pub use tee::{settled, tee, tee_tracked, TeeState, TeeStream};
