//! A CANopen-style fieldbus node engine for single and dual-core microcontrollers
//!
//! twincan-node implements the protocol side of a small CANopen server. It is no_std and performs
//! no heap allocation: all shared state is statically allocated by the application. It provides:
//!
//! * *NMT* state handling (PreOperational, Operational, Stopped) and a heartbeat producer.
//! * Four periodic transmit PDOs, each built by an application producer callback.
//! * Four receive PDOs, delivered to application handlers, with overrun detection and timeout
//!   reporting.
//! * An expedited *SDO* server answering reads and writes from an [object
//!   dictionary](object_dict).
//! * A split of the above across two cores which share memory, of which only one owns the CAN
//!   peripheral.
//!
//! # Getting Started
//!
//! ## Statics
//!
//! The receive interrupt and, on dual-core parts, the second core need `'static` access to the
//! node's shared state. Declare one [`SharedArena`] per bus, a [`NodeMbox`] for the receive
//! interrupt, and the clock and diagnostics sink:
//!
//! ```ignore
//! static CLOCK: SysTickClock = SysTickClock::new();
//! static DIAGNOSTICS: ErrorLog = ErrorLog::new();
//! #[link_section = ".shared_ram"]
//! static ARENA: SharedArena = SharedArena::new();
//! static NODE_MBOX: NodeMbox = NodeMbox::new(&ARENA, &CLOCK, &DIAGNOSTICS);
//! ```
//!
//! ## Node Creation
//!
//! The core owning the CAN peripheral builds the Primary node and registers its PDOs:
//!
//! ```ignore
//! let mut node = Node::builder(
//!     node_id,
//!     Role::Primary,
//!     Mode::SingleCore,
//!     &ARENA,
//!     &CLOCK,
//!     &DIAGNOSTICS,
//! )
//! .transport(&mut can, &NODE_MBOX)
//! .object_dict(&mut od_entries)
//! .heartbeat_period(1000)
//! .build()?;
//! node.register_tpdo(0, 100, &mut read_sensors)?;
//! node.register_rpdo(0, 500, &mut apply_setpoints)?;
//! node.enable()?;
//! ```
//!
//! In dual-core mode the other core builds a `Role::Secondary` node over the same arena, without a
//! transport. Either node, but only one, may own the object dictionary.
//!
//! ## Handling CAN messages
//!
//! During construction the node configures one transport slot per [communication
//! object](common::cob) and registers its [`NodeMbox`] as the transport's receive handler. The
//! transport calls it from the receive interrupt; transports which only know bus identifiers can
//! call [`NodeMbox::store_message`] instead.
//!
//! ## Running
//!
//! Each core calls [`Node::run`] periodically from its main loop. The [`NodeMbox`] provides a
//! callback which can be used to wake the main loop when a frame requires processing.
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod mailbox;
mod nmt;
mod node;
mod node_mbox;
pub mod object_dict;
pub mod pdo;
mod sdo_server;
pub mod shared_arena;

pub use twincan_common as common;

pub use nmt::NmtError;
pub use node::{BuildError, Node, NodeBuilder, NodeError};
pub use node_mbox::NodeMbox;
pub use shared_arena::SharedArena;
