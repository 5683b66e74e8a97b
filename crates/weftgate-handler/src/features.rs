//! Capability negotiation between guest and host.
//!
//! The guest declares which capabilities it needs (buffered request
//! bodies, a buffered response, trailers) and the host answers with what
//! it actually grants. This transport grants every requested capability —
//! the interesting part is that the answer changes how the response sink
//! is constructed for every transaction afterwards.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A bitset of guest-visible capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Features(u32);

impl Features {
    pub const NONE: Features = Features(0);
    /// Request bodies are buffered so the guest can read them without
    /// starving the downstream stage.
    pub const BUFFER_REQUEST: Features = Features(1);
    /// The response is captured in memory and flushed at finalization,
    /// making status, headers, and body rewritable after the handoff.
    pub const BUFFER_RESPONSE: Features = Features(1 << 1);
    /// Trailer read/write support.
    pub const TRAILERS: Features = Features(1 << 2);

    /// All capabilities this host knows about.
    pub const ALL: Features = Features(0b111);

    /// Reconstruct a set from its raw bits, dropping unknown bits.
    pub const fn from_bits(bits: u32) -> Features {
        Features(bits & Features::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Features {
    type Output = Features;

    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

impl BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Features) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (flag, label) in [
            (Features::BUFFER_REQUEST, "buffer-request"),
            (Features::BUFFER_RESPONSE, "buffer-response"),
            (Features::TRAILERS, "trailers"),
        ] {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(label)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Process-wide capability store, populated once before the transport
/// starts accepting requests.
///
/// Every requested capability is granted because this transport supports
/// all feature variants unconditionally; the granted set may still be a
/// superset of any single request, since grants accumulate. Merging is
/// bit-or, so repeated or concurrent negotiation is order-independent.
#[derive(Debug, Default)]
pub struct FeatureNegotiator {
    granted: Features,
}

impl FeatureNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `requested` into the granted set and return the result.
    pub fn negotiate(&mut self, requested: Features) -> Features {
        self.granted |= requested;
        tracing::debug!(granted = %self.granted, "features negotiated");
        self.granted
    }

    /// The capabilities granted so far.
    pub fn granted(&self) -> Features {
        self.granted
    }
}
