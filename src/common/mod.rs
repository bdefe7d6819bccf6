//! Common types and abstractions
//!
//! - Stream: byte stream under the session layer
//! - Address: server endpoint representation
//! - Registry: expiring slots shared between tasks
//! - NetCommand / CommandRunner: OS command execution

mod address;
pub mod command;
pub mod registry;
mod stream;

pub use address::Address;
pub use command::{CommandRunner, NetCommand, SystemRunner};
pub use registry::Registry;
pub use stream::{AsyncReadWrite, Stream};

// Re-export error types from crate root
pub use crate::error::{Error, Result};
