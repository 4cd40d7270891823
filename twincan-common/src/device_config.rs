//! Node config file
//!
//! A NodeConfig is loaded from a TOML file and carries the deployment specific parameters of a
//! node: its identity, its role on a dual-core part, the heartbeat period, and the timing of each
//! PDO slot. The PDO producers and handlers themselves are code and are registered by the
//! application; the config only supplies their periods and timeouts.
//!
//! # An example TOML file
//!
//! ```toml
//! node_id = 5
//! role = "primary"
//! mode = "dual_core"
//! heartbeat_period = 1000
//!
//! # Transmit PDO 1 every 100ms
//! [[tpdo]]
//! slot = 0
//! period = 100
//!
//! # Receive PDO 3 is considered stale after 500ms of silence
//! [[rpdo]]
//! slot = 2
//! timeout = 500
//! ```
//!
//! PDO slots are zero-based: slot 0 is TPDO1/RPDO1. Slots not listed are disabled. A period or
//! timeout of 0 disables the slot or its timeout check.
use std::collections::HashSet;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};

use crate::{cob::NUM_PDOS, Mode, NodeId, Role};

/// Error returned when loading a node config fails
#[derive(Debug, Snafu)]
pub enum LoadError {
    /// An IO error occured while reading the file
    #[snafu(display("IO error: {source}"))]
    Io {
        /// The underlying IO error
        source: std::io::Error,
    },
    /// An error occured in the TOML parser
    #[snafu(display("Toml parse error: {source}"))]
    TomlParsing {
        /// The toml error which led to this error
        source: toml::de::Error,
    },
    /// The node ID is outside of 1..=127
    #[snafu(display("Invalid node ID {value}, must be in 1..=127"))]
    InvalidNodeId {
        /// The configured value
        value: u8,
    },
    /// A PDO slot is out of range
    #[snafu(display("Invalid {kind} slot {slot}, must be less than {NUM_PDOS}"))]
    InvalidSlot {
        /// "tpdo" or "rpdo"
        kind: &'static str,
        /// The configured slot
        slot: usize,
    },
    /// The same PDO slot is configured more than once
    #[snafu(display("Multiple definitions of {kind} slot {slot}"))]
    DuplicateSlot {
        /// "tpdo" or "rpdo"
        kind: &'static str,
        /// The duplicated slot
        slot: usize,
    },
}

/// Timing of one transmit PDO
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TpdoConfig {
    /// Zero-based slot
    pub slot: usize,
    /// Transmit period in ms
    pub period: u32,
}

/// Timing of one receive PDO
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RpdoConfig {
    /// Zero-based slot
    pub slot: usize,
    /// Staleness timeout in ms
    #[serde(default)]
    pub timeout: u32,
}

fn default_role() -> Role {
    Role::Primary
}

fn default_mode() -> Mode {
    Mode::SingleCore
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNodeConfig {
    node_id: u8,
    #[serde(default = "default_role")]
    role: Role,
    #[serde(default = "default_mode")]
    mode: Mode,
    #[serde(default)]
    heartbeat_period: u32,
    #[serde(default)]
    tpdo: Vec<TpdoConfig>,
    #[serde(default)]
    rpdo: Vec<RpdoConfig>,
}

/// Deployment parameters for a node
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// The node ID
    pub node_id: NodeId,
    /// The role of the node
    pub role: Role,
    /// Single or dual core operation
    pub mode: Mode,
    /// Heartbeat period in ms, 0 to disable
    pub heartbeat_period: u32,
    /// Transmit PDO timing
    pub tpdo: Vec<TpdoConfig>,
    /// Receive PDO timing
    pub rpdo: Vec<RpdoConfig>,
}

impl NodeConfig {
    /// Try to read a config from a file
    pub fn load(config_path: impl AsRef<std::path::Path>) -> Result<Self, LoadError> {
        let config_str = std::fs::read_to_string(&config_path).context(IoSnafu)?;
        Self::load_from_str(&config_str)
    }

    /// Try to read a config from a &str
    pub fn load_from_str(config_str: &str) -> Result<Self, LoadError> {
        let raw: RawNodeConfig = toml::from_str(config_str).context(TomlParsingSnafu)?;
        let node_id = NodeId::new(raw.node_id)
            .map_err(|e| LoadError::InvalidNodeId { value: e.value })?;
        Self::validate_slots("tpdo", raw.tpdo.iter().map(|t| t.slot))?;
        Self::validate_slots("rpdo", raw.rpdo.iter().map(|r| r.slot))?;
        Ok(NodeConfig {
            node_id,
            role: raw.role,
            mode: raw.mode,
            heartbeat_period: raw.heartbeat_period,
            tpdo: raw.tpdo,
            rpdo: raw.rpdo,
        })
    }

    fn validate_slots(
        kind: &'static str,
        slots: impl Iterator<Item = usize>,
    ) -> Result<(), LoadError> {
        let mut found = HashSet::new();
        for slot in slots {
            if slot >= NUM_PDOS {
                return InvalidSlotSnafu { kind, slot }.fail();
            }
            if !found.insert(slot) {
                return DuplicateSlotSnafu { kind, slot }.fail();
            }
        }
        Ok(())
    }

    /// The configured period of a transmit PDO slot, or 0 if it is not configured
    pub fn tpdo_period(&self, slot: usize) -> u32 {
        self.tpdo
            .iter()
            .find(|t| t.slot == slot)
            .map(|t| t.period)
            .unwrap_or(0)
    }

    /// The configured timeout of a receive PDO slot, or 0 if it is not configured
    pub fn rpdo_timeout(&self, slot: usize) -> u32 {
        self.rpdo
            .iter()
            .find(|r| r.slot == slot)
            .map(|r| r.timeout)
            .unwrap_or(0)
    }
}
