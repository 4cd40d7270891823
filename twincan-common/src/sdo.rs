//! Expedited SDO frame codec
//!
//! Only the expedited subset of the SDO protocol is supported: a single 8-byte frame carries the
//! whole value in each direction.
//!
//! Frame layout:
//!
//! | Byte | Bits | Field |
//! | ---- | ---- | ----- |
//! | 0    | 0    | `s`: size indicated |
//! | 0    | 1    | `e`: expedited |
//! | 0    | 2-3  | `n`: number of unused data bytes |
//! | 0    | 4    | reserved |
//! | 0    | 5-7  | command specifier |
//! | 1-2  |      | object index, little endian |
//! | 3    |      | sub index |
//! | 4-7  |      | data, little endian |
use int_enum::IntEnum;
use snafu::Snafu;

/// The length of every SDO frame
pub const SDO_FRAME_LEN: usize = 8;

/// Client command specifier (CCS) values in SDO request frames
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ClientCommand {
    DownloadSegment = 0,
    /// Write a value
    InitiateDownload = 1,
    /// Read a value
    InitiateUpload = 2,
    ReqUploadSegment = 3,
    Abort = 4,
    ReqBlockUpload = 5,
    ReqBlockDownload = 6,
}

/// Server command specifier (SCS) values in SDO response frames
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ServerCommand {
    SegmentUpload = 0,
    SegmentDownload = 1,
    /// Response to a read
    Upload = 2,
    /// Acknowledge a download command
    Download = 3,
    Abort = 4,
}

/// SDO abort codes
///
/// Used as the error type of object accessors. Expedited responders in this crate never send abort
/// frames; a failed access produces no response at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum AbortCode {
    /// Client/server command specifier not valid or unknown
    InvalidCommandSpecifier = 0x0504_0001,
    /// Unsupported access to an object
    UnsupportedAccess = 0x0601_0000,
    /// Attempt to read a write only object
    WriteOnly = 0x0601_0001,
    /// Attempt to write a read only object
    ReadOnly = 0x0601_0002,
    /// Object does not exist in the dictionary
    NoSuchObject = 0x0602_0000,
    /// Access failed due to hardware error
    HardwareError = 0x0606_0000,
    /// Data type does not match, length of service parameter too high
    DataTypeMismatchLengthHigh = 0x0607_0012,
    /// Data type does not match, length of service parameter too low
    DataTypeMismatchLengthLow = 0x0607_0013,
    /// Sub-index does not exist
    NoSuchSubIndex = 0x0609_0011,
    /// Invalid value for parameter (download only)
    InvalidValue = 0x0609_0030,
    /// Value of parameter too high (download only)
    ValueTooHigh = 0x0609_0031,
    /// Value of parameter too low (download only)
    ValueTooLow = 0x0609_0032,
    /// General error
    GeneralError = 0x0800_0000,
    /// Data cannot be transferred or stored to the application because of the device state
    CantStoreDeviceState = 0x0800_0022,
}

/// Error returned when an SDO frame cannot be decoded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum SdoError {
    /// SDO frames are always 8 bytes
    #[snafu(display("SDO frame must be 8 bytes, got {len}"))]
    WrongLength {
        /// Length of the rejected frame
        len: usize,
    },
    /// The command specifier is not part of the expedited subset
    #[snafu(display("Unsupported SDO command specifier {value}"))]
    UnsupportedCommand {
        /// The raw specifier
        value: u8,
    },
    /// A download was requested without the expedited flag
    NotExpedited,
}

fn header_byte(command: u8, n: u8, e: bool, s: bool) -> u8 {
    (command << 5) | ((n & 0x3) << 2) | ((e as u8) << 1) | (s as u8)
}

fn write_address(frame: &mut [u8; SDO_FRAME_LEN], index: u16, sub: u8) {
    frame[1..3].copy_from_slice(&index.to_le_bytes());
    frame[3] = sub;
}

fn read_address(frame: &[u8]) -> (u16, u8) {
    (u16::from_le_bytes([frame[1], frame[2]]), frame[3])
}

fn read_data(frame: &[u8]) -> [u8; 4] {
    [frame[4], frame[5], frame[6], frame[7]]
}

/// An expedited SDO request from a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdoRequest {
    /// Write a value of up to 4 bytes
    InitiateDownload {
        /// Number of unused bytes in data, valid when `s` is set
        n: u8,
        /// Expedited flag, always set
        e: bool,
        /// Size indicated flag
        s: bool,
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
        /// Value, little endian
        data: [u8; 4],
    },
    /// Read a value
    InitiateUpload {
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
    },
}

impl SdoRequest {
    /// Create an expedited download (write) request
    ///
    /// At most 4 bytes of `data` are used.
    pub fn expedited_download(index: u16, sub: u8, data: &[u8]) -> Self {
        let len = data.len().min(4);
        let mut msg_data = [0; 4];
        msg_data[0..len].copy_from_slice(&data[..len]);
        SdoRequest::InitiateDownload {
            n: (4 - len) as u8,
            e: true,
            s: true,
            index,
            sub,
            data: msg_data,
        }
    }

    /// Create an upload (read) request
    pub fn initiate_upload(index: u16, sub: u8) -> Self {
        SdoRequest::InitiateUpload { index, sub }
    }

    /// Get the object index addressed by the request
    pub fn index(&self) -> u16 {
        match self {
            SdoRequest::InitiateDownload { index, .. }
            | SdoRequest::InitiateUpload { index, .. } => *index,
        }
    }

    /// Get the sub index addressed by the request
    pub fn sub(&self) -> u8 {
        match self {
            SdoRequest::InitiateDownload { sub, .. } | SdoRequest::InitiateUpload { sub, .. } => {
                *sub
            }
        }
    }

    /// Serialize the request to a frame payload
    pub fn to_bytes(&self) -> [u8; SDO_FRAME_LEN] {
        let mut frame = [0; SDO_FRAME_LEN];
        match *self {
            SdoRequest::InitiateDownload {
                n,
                e,
                s,
                index,
                sub,
                data,
            } => {
                frame[0] = header_byte(ClientCommand::InitiateDownload.into(), n, e, s);
                write_address(&mut frame, index, sub);
                frame[4..8].copy_from_slice(&data);
            }
            SdoRequest::InitiateUpload { index, sub } => {
                frame[0] = header_byte(ClientCommand::InitiateUpload.into(), 0, false, false);
                write_address(&mut frame, index, sub);
            }
        }
        frame
    }
}

impl TryFrom<&[u8]> for SdoRequest {
    type Error = SdoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != SDO_FRAME_LEN {
            return WrongLengthSnafu { len: value.len() }.fail();
        }
        let ccs = value[0] >> 5;
        let ccs = ClientCommand::try_from(ccs)
            .map_err(|value| SdoError::UnsupportedCommand { value })?;
        let (index, sub) = read_address(value);

        match ccs {
            ClientCommand::InitiateDownload => {
                let n = (value[0] >> 2) & 0x3;
                let e = (value[0] & (1 << 1)) != 0;
                let s = (value[0] & (1 << 0)) != 0;
                if !e {
                    return NotExpeditedSnafu.fail();
                }
                Ok(SdoRequest::InitiateDownload {
                    n,
                    e,
                    s,
                    index,
                    sub,
                    data: read_data(value),
                })
            }
            ClientCommand::InitiateUpload => Ok(SdoRequest::InitiateUpload { index, sub }),
            other => UnsupportedCommandSnafu {
                value: u8::from(other),
            }
            .fail(),
        }
    }
}

/// An expedited SDO response from the server
///
/// Responses always mark the transfer as expedited with size indicated and zero unused bytes, i.e.
/// a 4-byte transfer, whatever the size of the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdoResponse {
    /// Response to an upload (read), carrying the value
    ConfirmUpload {
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
        /// Value, little endian, zero padded
        data: [u8; 4],
    },
    /// Response to a download (write)
    ConfirmDownload {
        /// Object index
        index: u16,
        /// Object sub-index
        sub: u8,
    },
}

impl SdoResponse {
    /// Create an upload response
    pub fn upload_acknowledge(index: u16, sub: u8, data: [u8; 4]) -> Self {
        SdoResponse::ConfirmUpload { index, sub, data }
    }

    /// Create a download response
    pub fn download_acknowledge(index: u16, sub: u8) -> Self {
        SdoResponse::ConfirmDownload { index, sub }
    }

    /// Serialize the response to a frame payload
    pub fn to_bytes(&self) -> [u8; SDO_FRAME_LEN] {
        let mut frame = [0; SDO_FRAME_LEN];
        match *self {
            SdoResponse::ConfirmUpload { index, sub, data } => {
                frame[0] = header_byte(ServerCommand::Upload.into(), 0, true, true);
                write_address(&mut frame, index, sub);
                frame[4..8].copy_from_slice(&data);
            }
            SdoResponse::ConfirmDownload { index, sub } => {
                frame[0] = header_byte(ServerCommand::Download.into(), 0, true, true);
                write_address(&mut frame, index, sub);
            }
        }
        frame
    }
}

impl TryFrom<&[u8]> for SdoResponse {
    type Error = SdoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != SDO_FRAME_LEN {
            return WrongLengthSnafu { len: value.len() }.fail();
        }
        let scs = value[0] >> 5;
        let scs = ServerCommand::try_from(scs)
            .map_err(|value| SdoError::UnsupportedCommand { value })?;
        let (index, sub) = read_address(value);
        match scs {
            ServerCommand::Upload => Ok(SdoResponse::ConfirmUpload {
                index,
                sub,
                data: read_data(value),
            }),
            ServerCommand::Download => Ok(SdoResponse::ConfirmDownload { index, sub }),
            other => UnsupportedCommandSnafu {
                value: u8::from(other),
            }
            .fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_request_layout() {
        let frame = SdoRequest::initiate_upload(0x1017, 2).to_bytes();
        assert_eq!([0x40, 0x17, 0x10, 0x02, 0, 0, 0, 0], frame);
        assert_eq!(
            Ok(SdoRequest::InitiateUpload {
                index: 0x1017,
                sub: 2
            }),
            SdoRequest::try_from(frame.as_slice())
        );
    }

    #[test]
    fn test_expedited_download_layout() {
        let frame = SdoRequest::expedited_download(0x2000, 1, &[0x34, 0x12]).to_bytes();
        // ccs=1, n=2, e=1, s=1
        assert_eq!([0x2B, 0x00, 0x20, 0x01, 0x34, 0x12, 0, 0], frame);
    }

    #[test]
    fn test_responses_are_four_byte_expedited() {
        let frame = SdoResponse::upload_acknowledge(0x1000, 0, 42u32.to_le_bytes()).to_bytes();
        assert_eq!([0x43, 0x00, 0x10, 0x00, 42, 0, 0, 0], frame);
        let frame = SdoResponse::download_acknowledge(0x2001, 3).to_bytes();
        assert_eq!([0x63, 0x01, 0x20, 0x03, 0, 0, 0, 0], frame);
    }

    #[test]
    fn test_rejects_non_expedited_frames() {
        assert_eq!(
            Err(SdoError::WrongLength { len: 4 }),
            SdoRequest::try_from([0x40u8, 0, 0x10, 0].as_slice())
        );
        // Segmented download initiate
        assert_eq!(
            Err(SdoError::NotExpedited),
            SdoRequest::try_from([0x21u8, 0, 0x10, 0, 4, 0, 0, 0].as_slice())
        );
        // Block download
        assert_eq!(
            Err(SdoError::UnsupportedCommand { value: 6 }),
            SdoRequest::try_from([0xC0u8, 0, 0x10, 0, 0, 0, 0, 0].as_slice())
        );
        // ccs 7 is undefined
        assert_eq!(
            Err(SdoError::UnsupportedCommand { value: 7 }),
            SdoRequest::try_from([0xE0u8, 0, 0x10, 0, 0, 0, 0, 0].as_slice())
        );
    }
}
