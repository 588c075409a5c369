//! Device control plane: owned state, the strip capability, command
//! dispatch and reply emission.

pub mod dispatch;
pub mod emitter;
pub mod state;
pub mod strip;
