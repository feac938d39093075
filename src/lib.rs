//!
//! # acqknowledge
//! A reader for BIOPAC AcqKnowledge (`.acq`) physiological-recording files.
//!
//! The format spans file revisions 30 through 180+, exists in uncompressed
//! interleaved and per-channel zlib-compressed storage modes, and comes in
//! both byte orders. This crate decodes the version-discriminated header
//! graph, resolves the on-disk sample layout, and exposes a uniform
//! [`model::Datafile`] plus a streaming [`iterator::SampleIterator`] so a
//! multi-gigabyte recording never has to be fully resident in memory.
//!
//! ## Reading a file
//! ```no_run
//! let datafile = acqknowledge::read_file_path("recording.acq").unwrap();
//! for channel in &datafile.channels {
//!     println!("{}: {} samples at {} Hz", channel.name, channel.point_count, channel.samples_per_second());
//! }
//! ```
//!
//! ## Crate status
//! * Writing `.acq` files is out of scope; this is a reader only.
//! * UI-only header fields (colors, toolbar state) are parsed where present
//!   in a schema but not surfaced on the public model.

pub mod byte_reader;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod iterator;
pub mod model;
pub mod pattern;
pub mod schema;
pub mod timestamp;
pub mod walker;

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

pub use error::{AcqError, Warning};
pub use model::{ByteOrderTag, Channel, Datafile, Journal, Marker, SampleDType};

use byte_reader::{sniff_byte_order, spool_to_seekable, ByteReader};
use iterator::{ChannelPlanMeta, SampleIterator, DEFAULT_CHUNK_SIZE};
use schema::{MAX_PLAUSIBLE_REVISION, MIN_SUPPORTED_REVISION};

fn channel_plan_meta(datafile: &Datafile) -> Vec<ChannelPlanMeta> {
    datafile
        .channels
        .iter()
        .map(|c| ChannelPlanMeta {
            frequency_divider: c.frequency_divider,
            sample_dtype: c.sample_dtype,
            point_count: c.point_count,
        })
        .collect()
}

/// Opens `source`, walks its header graph, and materialises every
/// channel's samples into `Datafile.channels[..].raw_data`.
pub fn read_file(source: impl Read + Seek) -> Result<Datafile, AcqError> {
    let (mut datafile, mut iterator) = open_file(source)?;
    let raw = iterator.read_all()?;
    for (channel, samples) in datafile.channels.iter_mut().zip(raw) {
        channel.set_raw_data(samples);
    }
    Ok(datafile)
}

/// Convenience wrapper around [`read_file`] for a filesystem path.
pub fn read_file_path(path: impl AsRef<Path>) -> Result<Datafile, AcqError> {
    let file = File::open(path)?;
    read_file(file)
}

/// Opens `source` and walks its header graph, returning the parsed
/// [`Datafile`] (with every channel's `raw_data` still empty) alongside a
/// [`SampleIterator`] that can materialise or stream the sample data on
/// demand.
pub fn open_file<R: Read + Seek>(mut source: R) -> Result<(Datafile, SampleIterator<R>), AcqError> {
    let order = sniff_byte_order(&mut source, MIN_SUPPORTED_REVISION, MAX_PLAUSIBLE_REVISION)?;
    let reader = ByteReader::new(source, order);

    log::debug!("walking header graph, byte order {order:?}");
    let result = walker::walk(reader)?;
    let channels = channel_plan_meta(&result.datafile);
    let iterator = SampleIterator::new(result.reader, result.layout, channels, DEFAULT_CHUNK_SIZE);

    Ok((result.datafile, iterator))
}

/// Spools a non-seekable `source` (e.g. standard input) into memory before
/// handing it to [`open_file`].
pub fn open_stream(source: impl Read) -> Result<(Datafile, SampleIterator<std::io::Cursor<Vec<u8>>>), AcqError> {
    let spooled = spool_to_seekable(source)?;
    open_file(spooled)
}
