//! Error taxonomy for the core decoder.
//!
//! Header-parsing failures are fatal and carry the byte offset at which they
//! were detected. Per-marker and per-string problems are not represented
//! here at all — they are recovered locally by the caller and attached to
//! [`crate::model::Datafile::warnings`] as a [`Warning`] instead, per the
//! recovery policy: the rest of the file still parses.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcqError {
    #[error("unexpected end of data while reading {field} at offset {offset}")]
    InsufficientData { field: &'static str, offset: u64 },

    #[error("file revision {found} is below the minimum supported revision {minimum}")]
    UnsupportedRevision { found: i32, minimum: i32 },

    #[error("neither magic-detection strategy found an in-range file revision")]
    NoValidByteOrder,

    #[error("foreign data header length could not be reconciled with the channel datatype headers")]
    ForeignHeaderAmbiguous,

    #[error("zlib inflate failed for channel {channel}")]
    ChecksumOrInflateError {
        channel: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("source is not seekable")]
    SeekError(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Non-fatal problems discovered while parsing a file that otherwise parses
/// cleanly. Attached to [`crate::model::Datafile::warnings`] rather than
/// returned as an error.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Warning {
    /// A marker's `channel_number` did not match any channel's `order_num`.
    UnresolvedMarkerChannel { marker_index: usize, order_num: i32 },
    /// No candidate text encoding decoded a string losslessly; a lossy
    /// decode was substituted.
    LossyStringDecode {
        context: &'static str,
        bytes_preview: Vec<u8>,
    },
    /// The Foreign Data Header's declared length did not match reality and
    /// the scan-forward recovery strategy (§4.2 strategy 2) was used.
    ForeignHeaderLengthRecovered { declared_len: u32, recovered_len: u32 },
}
