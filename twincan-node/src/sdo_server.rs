//! Expedited SDO responder
//!
//! Each request is answered from the object dictionary or not at all: unknown objects, access
//! violations, accessor errors and malformed frames are dropped without an abort frame.
use defmt_or_log::debug;
use twincan_common::sdo::{SdoRequest, SdoResponse};

use crate::object_dict::ObjectDict;

/// Serves SDO requests against an object dictionary
#[derive(Debug)]
pub(crate) struct SdoServer<'a> {
    od: ObjectDict<'a>,
}

impl<'a> SdoServer<'a> {
    pub fn new(od: ObjectDict<'a>) -> Self {
        Self { od }
    }

    /// Decode a request frame and build the response, if any
    pub fn handle_frame(&self, frame: &[u8]) -> Option<SdoResponse> {
        let req = match SdoRequest::try_from(frame) {
            Ok(req) => req,
            Err(_) => {
                debug!("Dropping malformed SDO request");
                return None;
            }
        };
        self.handle_request(&req)
    }

    /// Build the response to a request, if any
    pub fn handle_request(&self, req: &SdoRequest) -> Option<SdoResponse> {
        let (index, sub) = (req.index(), req.sub());
        let Some(entry) = self.od.find(index, sub) else {
            debug!("SDO request for missing object 0x{:x} sub {}", index, sub);
            return None;
        };

        let result = match req {
            SdoRequest::InitiateUpload { .. } => entry
                .read()
                .map(|data| SdoResponse::upload_acknowledge(index, sub, data)),
            // An indicated size must match the data type; without one the data type decides
            SdoRequest::InitiateDownload { n, s, .. }
                if *s && 4 - *n as usize != entry.data_type.size() =>
            {
                debug!(
                    "SDO download to 0x{:x} sub {} has {} bytes, expected {}",
                    index,
                    sub,
                    4 - *n,
                    entry.data_type.size()
                );
                return None;
            }
            SdoRequest::InitiateDownload { data, .. } => entry
                .write(data)
                .map(|_| SdoResponse::download_acknowledge(index, sub)),
        };

        match result {
            Ok(resp) => Some(resp),
            Err(abort) => {
                debug!(
                    "SDO access to 0x{:x} sub {} failed: 0x{:x}",
                    index, sub, abort as u32
                );
                None
            }
        }
    }
}
