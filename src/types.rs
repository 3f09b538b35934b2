use derive_more::{Display, From, Into};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;

#[derive(Clone, Debug)]
#[repr(transparent)]
pub struct Interruptor(Arc<AtomicBool>);

impl Interruptor {
    pub fn new() -> Self {
        Interruptor(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(SeqCst)
    }
}

impl Default for Interruptor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, From, Into, Display,
)]
#[repr(transparent)]
pub struct StreamId(pub u64);

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, From, Into, Display,
)]
#[repr(transparent)]
pub struct EventId(pub u64);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum ByteOrder {
    #[display(fmt = "le")]
    LittleEndian,
    #[display(fmt = "be")]
    BigEndian,
    /// Defers to the trace's byte order
    #[display(fmt = "native")]
    Native,
}

impl ByteOrder {
    /// Replace `Native` with the trace-level order.
    pub fn resolve(self, trace_order: ByteOrder) -> ByteOrder {
        match self {
            ByteOrder::Native => trace_order,
            o => o,
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "le" | "little" | "little_endian" => Ok(ByteOrder::LittleEndian),
            // "network" is big endian
            "be" | "big" | "big_endian" | "network" => Ok(ByteOrder::BigEndian),
            "native" => Ok(ByteOrder::Native),
            other => Err(format!("'{other}' is not a byte order")),
        }
    }
}

/// Text encoding of strings and character integers.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display)]
pub enum Encoding {
    #[default]
    #[display(fmt = "none")]
    None,
    #[display(fmt = "UTF8")]
    Utf8,
    #[display(fmt = "ASCII")]
    Ascii,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Encoding::None),
            "UTF8" | "utf8" => Ok(Encoding::Utf8),
            "ASCII" | "ascii" => Ok(Encoding::Ascii),
            other => Err(format!("'{other}' is not an encoding")),
        }
    }
}
