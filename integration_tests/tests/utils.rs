#![allow(dead_code)]
use integration_tests::TestStatics;
use twincan_common::{
    messages::CanMessage,
    sdo::{SdoRequest, SdoResponse},
    Mode, NodeId, Role,
};
use twincan_node::{Node, NodeBuilder};

pub const NODE_ID: u8 = 1;
pub const RSDO_ID: u16 = 0x600 + NODE_ID as u16;
pub const TSDO_ID: u16 = 0x580 + NODE_ID as u16;
pub const HEARTBEAT_ID: u16 = 0x700 + NODE_ID as u16;

pub fn node_id() -> NodeId {
    NodeId::new(NODE_ID).unwrap()
}

pub fn upload(index: u16, sub: u8) -> [u8; 8] {
    SdoRequest::initiate_upload(index, sub).to_bytes()
}

pub fn download(index: u16, sub: u8, data: &[u8]) -> [u8; 8] {
    SdoRequest::expedited_download(index, sub, data).to_bytes()
}

/// Parse a frame transmitted by the node as an SDO response
pub fn sdo_response(msg: &CanMessage) -> SdoResponse {
    SdoResponse::try_from(msg.data()).unwrap()
}

/// Start a builder for node [`NODE_ID`] over the statics of `s`
pub fn builder<'a>(s: &TestStatics, role: Role, mode: Mode) -> NodeBuilder<'a> {
    Node::builder(node_id(), role, mode, s.arena, s.clock, s.diag)
}
