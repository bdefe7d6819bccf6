//! Outbound/inbound packet transform

use std::borrow::Cow;

use crate::config::Config;
use crate::error::Result;

use super::{compress, decompress, mask_in_place};

/// Enabled codec stages for a tunnel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub compress: bool,
    pub obfs: bool,
}

impl Pipeline {
    pub fn new(compress: bool, obfs: bool) -> Self {
        Self { compress, obfs }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.compress, config.obfs)
    }

    /// Interface packet to wire payload: `compress(mask(raw))`
    pub fn encode<'a>(&self, raw: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let mut out = Cow::Borrowed(raw);
        if self.obfs {
            mask_in_place(out.to_mut());
        }
        if self.compress {
            out = Cow::Owned(compress(&out)?);
        }
        Ok(out)
    }

    /// Wire payload to interface packet: `mask(decompress(payload))`
    pub fn decode(&self, payload: Vec<u8>) -> Result<Vec<u8>> {
        let mut out = if self.compress {
            decompress(&payload)?
        } else {
            payload
        };
        if self.obfs {
            mask_in_place(&mut out);
        }
        Ok(out)
    }
}
