//! QLP wire protocol.
//!
//! The protocol follows a layered structure:
//! - `layout`: byte offsets, seeds and constants (source of truth)
//! - `reader`: bounds-checked byte access
//! - `codec`: frame encoding and client-side decoding
//! - `validator`: the ordered inbound check chain
//! - `command`: CONTROL envelope and command table
//! - `error`: explicit, actionable errors
//!
//! Nothing here performs I/O.

pub mod codec;
pub mod command;
pub mod error;
pub mod layout;
pub mod reader;
pub mod types;
pub mod validator;
