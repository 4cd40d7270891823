//! Protocol vocabulary shared by the twincan crates.
//!
//! Most users will have no reason to depend on this crate directly, as it is re-exported by
//! `twincan-node`.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod atomic_cell;
pub use atomic_cell::AtomicCell;
pub mod cob;
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub mod device_config;
pub mod diagnostics;
pub mod messages;
pub mod node_id;
pub mod objects;
pub mod roles;
pub mod sdo;
pub mod traits;

pub use cob::{CobKind, CobTable, CommunicationObject, Direction};
pub use messages::{CanId, CanMessage};
pub use node_id::NodeId;
pub use roles::{Mode, Role};
