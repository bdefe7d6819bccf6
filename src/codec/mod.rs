//! Packet codec
//!
//! Each tunneled IP packet passes through two optional stages:
//! - obfuscation: a self-inverse XOR mask (traffic shaping, not secrecy)
//! - compression: snappy blocks with a length header
//!
//! Outbound order is mask then compress; inbound undoes them in reverse.

mod compress;
mod obfs;
mod pipeline;

pub use compress::{compress, decompress};
pub use obfs::{mask, mask_in_place, MASK_KEY};
pub use pipeline::Pipeline;
