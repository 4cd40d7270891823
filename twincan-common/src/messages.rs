//! Frame level message types
//!
//! These are the payload layouts of the fixed-format communication objects: NMT commands,
//! heartbeats and emergencies. SDO frames live in [`crate::sdo`].
use int_enum::IntEnum;
use snafu::Snafu;

/// A CAN bus identifier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanId {
    /// A 29-bit identifier
    Extended(u32),
    /// An 11-bit identifier
    Std(u16),
}

impl CanId {
    /// Create an extended identifier
    pub const fn extended(id: u32) -> CanId {
        CanId::Extended(id)
    }

    /// Create a standard identifier
    pub const fn std(id: u16) -> CanId {
        CanId::Std(id)
    }

    /// Get the identifier as an integer
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Extended(id) => *id,
            CanId::Std(id) => *id as u32,
        }
    }

    /// Returns true for 29-bit identifiers
    pub fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }
}

/// The largest classic CAN payload
pub const MAX_DATA_LENGTH: usize = 8;

/// A classic CAN frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanMessage {
    /// Payload buffer. Only the first `dlc` bytes are valid.
    pub data: [u8; MAX_DATA_LENGTH],
    /// Payload length
    pub dlc: u8,
    /// Bus identifier
    pub id: CanId,
}

impl Default for CanMessage {
    fn default() -> Self {
        Self {
            data: [0; MAX_DATA_LENGTH],
            dlc: 0,
            id: CanId::Std(0),
        }
    }
}

impl CanMessage {
    /// Create a frame. Payload bytes beyond [`MAX_DATA_LENGTH`] are dropped.
    pub fn new(id: CanId, data: &[u8]) -> Self {
        let len = data.len().min(MAX_DATA_LENGTH);
        let mut buf = [0u8; MAX_DATA_LENGTH];
        buf[..len].copy_from_slice(&data[..len]);
        Self {
            id,
            dlc: len as u8,
            data: buf,
        }
    }

    /// Get the frame identifier
    pub fn id(&self) -> CanId {
        self.id
    }

    /// Get the valid payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[0..self.dlc as usize]
    }
}

/// NMT state of a node
///
/// The discriminant is the code sent in heartbeat frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NmtState {
    /// Node is still being constructed. Also the code of the boot-up frame.
    Initializing = 0,
    /// Node is stopped: no heartbeat, no PDOs
    Stopped = 4,
    /// Node is fully running
    Operational = 5,
    /// Node is constructed but not enabled
    PreOperational = 127,
}

/// NMT command specifier
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum NmtCommandCmd {
    Start = 1,
    Stop = 2,
    EnterPreOp = 128,
    ResetApp = 129,
    ResetComm = 130,
}

/// An NMT command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NmtCommand {
    /// The requested command
    pub cmd: NmtCommandCmd,
    /// The addressed node, or 0 for all nodes
    pub node: u8,
}

impl NmtCommand {
    /// Returns true if the command is addressed to `node_id` or broadcast
    pub fn addresses(&self, node_id: u8) -> bool {
        self.node == 0 || self.node == node_id
    }

    /// Serialize to the two byte frame payload
    pub fn to_bytes(&self) -> [u8; 2] {
        [self.cmd.into(), self.node]
    }
}

impl TryFrom<&[u8]> for NmtCommand {
    type Error = MessageError;

    fn try_from(payload: &[u8]) -> Result<Self, Self::Error> {
        if payload.len() < 2 {
            return MessageTooShortSnafu.fail();
        }
        let cmd = NmtCommandCmd::try_from(payload[0])
            .map_err(|value| MessageError::InvalidNmtCommand { value })?;
        Ok(NmtCommand {
            cmd,
            node: payload[1],
        })
    }
}

/// A heartbeat frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// The state of the producing node
    pub state: NmtState,
}

impl Heartbeat {
    /// Serialize to the single byte frame payload
    pub fn to_bytes(&self) -> [u8; 1] {
        [self.state.into()]
    }
}

impl TryFrom<&[u8]> for Heartbeat {
    type Error = MessageError;

    fn try_from(payload: &[u8]) -> Result<Self, Self::Error> {
        let first = *payload.first().ok_or(MessageError::MessageTooShort)?;
        let state = NmtState::try_from(first & 0x7f)
            .map_err(|value| MessageError::InvalidNmtState { value })?;
        Ok(Heartbeat { state })
    }
}

/// An emergency frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Emergency {
    /// The emergency error code
    pub code: u16,
    /// The current value of the error register
    pub register: u8,
    /// Manufacturer specific bytes
    pub vendor: [u8; 5],
}

impl Emergency {
    /// Serialize to the eight byte frame payload
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0; 8];
        bytes[0..2].copy_from_slice(&self.code.to_le_bytes());
        bytes[2] = self.register;
        bytes[3..8].copy_from_slice(&self.vendor);
        bytes
    }
}

impl TryFrom<&[u8]> for Emergency {
    type Error = MessageError;

    fn try_from(payload: &[u8]) -> Result<Self, Self::Error> {
        if payload.len() < 8 {
            return MessageTooShortSnafu.fail();
        }
        let mut vendor = [0; 5];
        vendor.copy_from_slice(&payload[3..8]);
        Ok(Emergency {
            code: u16::from_le_bytes([payload[0], payload[1]]),
            register: payload[2],
            vendor,
        })
    }
}

/// Error returned when a frame payload cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum MessageError {
    /// The payload is shorter than the message layout requires
    MessageTooShort,
    /// The NMT command byte is not a known command
    #[snafu(display("Unexpected NMT command: {value}"))]
    InvalidNmtCommand {
        /// The value found in the message
        value: u8,
    },
    /// The NMT state integer in the message is not a valid NMT state
    #[snafu(display("Invalid NMT state: {value}"))]
    InvalidNmtState {
        /// The value found in the message
        value: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nmt_command_parse() {
        let cmd = NmtCommand::try_from([1u8, 0].as_slice()).unwrap();
        assert_eq!(NmtCommandCmd::Start, cmd.cmd);
        assert!(cmd.addresses(12));

        let cmd = NmtCommand::try_from([2u8, 5].as_slice()).unwrap();
        assert_eq!(NmtCommandCmd::Stop, cmd.cmd);
        assert!(cmd.addresses(5));
        assert!(!cmd.addresses(6));

        assert_eq!(
            Err(MessageError::InvalidNmtCommand { value: 3 }),
            NmtCommand::try_from([3u8, 0].as_slice())
        );
        assert_eq!(
            Err(MessageError::MessageTooShort),
            NmtCommand::try_from([1u8].as_slice())
        );
    }

    #[test]
    fn test_heartbeat_codes() {
        assert_eq!([0x7f], Heartbeat { state: NmtState::PreOperational }.to_bytes());
        assert_eq!([0x05], Heartbeat { state: NmtState::Operational }.to_bytes());
        assert_eq!([0x04], Heartbeat { state: NmtState::Stopped }.to_bytes());
        assert_eq!([0x00], Heartbeat { state: NmtState::Initializing }.to_bytes());
        assert_eq!(
            Err(MessageError::InvalidNmtState { value: 3 }),
            Heartbeat::try_from([3u8].as_slice())
        );
    }

    #[test]
    fn test_emergency_layout() {
        let emcy = Emergency {
            code: 0x8130,
            register: 0x11,
            vendor: [1, 2, 3, 4, 5],
        };
        assert_eq!([0x30, 0x81, 0x11, 1, 2, 3, 4, 5], emcy.to_bytes());
    }

    #[test]
    fn test_can_message_truncates_long_payload() {
        let msg = CanMessage::new(CanId::std(0x123), &[0xaa; 10]);
        assert_eq!(8, msg.data().len());
        assert_eq!(CanId::Std(0x123), msg.id());
        assert!(!msg.id().is_extended());
    }

    #[test]
    fn test_can_id_width() {
        let ext = CanId::extended(0x1234_5678);
        assert!(ext.is_extended());
        assert_eq!(0x1234_5678, ext.raw());
        assert!(!CanId::std(0x7ff).is_extended());
    }
}
