//! File Walker (Component D): orchestrates the fixed traversal order and
//! resolves the byte offsets the Sample Iterator needs.
//!
//! *Uncompressed:* graph → channels → foreign → datatypes → **data region**
//! → markers → journal.
//! *Compressed:* graph → channels → foreign → datatypes → markers → journal
//! → **N compression headers, each followed by its payload**.

use std::io::{Read, Seek};

use crate::byte_reader::{ByteOrder as Endian, ByteReader};
use crate::decoder::{decode_header, HeaderRecord};
use crate::encoding::{decode_legacy_string, TextEncoding};
use crate::error::{AcqError, Warning};
use crate::model::{
    ByteOrderTag, Channel, Datafile, ForeignDataBlock, HeaderBag, Journal, Marker, SampleDType,
};
use crate::schema;
use crate::timestamp::Timestamp;

/// Revision at which journal text switched from plain text to HTML.
/// Not recorded verbatim in any header field known to this crate; chosen
/// to match the "AcqKnowledge >= 4.2" prose in the format notes. See
/// DESIGN.md for the reasoning behind this specific revision number.
const JOURNAL_HTML_MIN_REVISION: i32 = 84;

/// Revision at which markers gained a `lChannel` field (see schema.rs).
const MARKER_CHANNEL_FIELD_REVISION: i32 = 60;

#[derive(Debug)]
pub struct CompressedSegment {
    pub offset: u64,
    pub compressed_len: u64,
    #[allow(dead_code)]
    pub uncompressed_len: u64,
}

#[derive(Debug)]
pub enum StorageLayout {
    Uncompressed {
        o_data: u64,
        data_region_length: u64,
    },
    Compressed {
        /// One entry per channel, in channel order.
        segments: Vec<CompressedSegment>,
    },
}

#[derive(Debug)]
pub struct WalkResult<R> {
    pub datafile: Datafile,
    pub layout: StorageLayout,
    pub reader: ByteReader<R>,
}

/// Reads any bytes between what the schema actually consumed and a header's
/// own declared `nLength` into `record.trailing_unknown`, so an unknown
/// revision with extra trailing fields doesn't misalign the next header and
/// the overrun bytes stay available for debugging rather than being
/// silently discarded. A no-op when the two already agree.
fn skip_to_declared_length<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    record: &mut HeaderRecord,
) -> Result<(), AcqError> {
    let declared = record.get_i32("nLength").unwrap_or(0).max(0) as u64;
    if declared > record.consumed {
        let extra = declared - record.consumed;
        record.trailing_unknown = reader.read_fixed("trailing_unknown", extra as usize)?;
        record.consumed = declared;
    }
    Ok(())
}

fn to_byte_order_tag(order: Endian) -> ByteOrderTag {
    match order {
        Endian::Little => ByteOrderTag::Little,
        Endian::Big => ByteOrderTag::Big,
    }
}

/// Decodes a string field, folding its winning [`TextEncoding`] into
/// `encoding_acc` (the file-wide "worst encoding used" tracked on
/// `Datafile.encoding`) and warning when no candidate decoded losslessly.
fn decode_string_field(
    record: &HeaderRecord,
    name: &str,
    warnings: &mut Vec<Warning>,
    encoding_acc: &mut TextEncoding,
) -> String {
    let bytes = record.get_bytes(name).unwrap_or(&[]);
    let (s, encoding, lossless) = decode_legacy_string(bytes);
    *encoding_acc = encoding_acc.worse(encoding);
    if !lossless {
        log::warn!("field {name} fell back to a lossy decode ({encoding:?})");
        warnings.push(Warning::LossyStringDecode {
            context: "channel/journal string",
            bytes_preview: bytes.iter().take(16).copied().collect(),
        });
    }
    s
}

/// Renders a marker's 4-byte type code as text. AcqKnowledge does not
/// publish an enum for these codes, so this follows the same convention
/// other chunk-based formats use for 4-byte tags (RIFF FourCC, etc.):
/// ASCII when every byte is printable, otherwise a hex dump of the raw
/// bytes as read.
fn marker_type_name(code: [u8; 4]) -> String {
    if code.iter().all(|&b| b.is_ascii_graphic() || b == b' ') {
        String::from_utf8_lossy(&code).trim_end().to_string()
    } else {
        format!("0x{:02X}{:02X}{:02X}{:02X}", code[0], code[1], code[2], code[3])
    }
}

/// Validates that `count` consecutive (dtype, size) pairs starting at the
/// reader's current position look like plausible Channel-Datatype Headers:
/// dtype in {1, 2}, size in {2, 8}, and dtype=1 (double) pairs with size=8,
/// dtype=2 (short) pairs with size=2.
fn looks_like_datatype_headers<R: Read + Seek>(reader: &mut ByteReader<R>, count: usize) -> bool {
    let start = match reader.tell() {
        Ok(p) => p,
        Err(_) => return false,
    };
    let mut ok = true;
    for _ in 0..count {
        let dtype = reader.read_i16("probe_dtype");
        let size = reader.read_i16("probe_size");
        match (dtype, size) {
            (Ok(1), Ok(8)) | (Ok(2), Ok(2)) => {}
            _ => {
                ok = false;
                break;
            }
        }
    }
    let _ = reader.seek(start);
    ok
}

fn read_foreign_data_block<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    revision: i32,
    n_channels: usize,
    warnings: &mut Vec<Warning>,
) -> Result<ForeignDataBlock, AcqError> {
    let header_start = reader.tell()?;
    let header = decode_header(reader, schema::FOREIGN_DATA_HEADER, revision, None)?;
    let declared_len = header.get_i32("nLength").unwrap_or(0).max(0) as u64;
    let after_fixed_fields = reader.tell()?;

    // Strategy 1: trust the declared length.
    let payload_len_1 = declared_len.saturating_sub(after_fixed_fields - header_start);
    reader.seek(after_fixed_fields + payload_len_1)?;
    if looks_like_datatype_headers(reader, n_channels) {
        reader.seek(after_fixed_fields)?;
        let raw_bytes = reader.read_fixed("foreign_data_payload", payload_len_1 as usize)?;
        return Ok(ForeignDataBlock { raw_bytes });
    }

    // Strategy 2: rewind and scan forward for the first position where the
    // channel-datatype-header signature holds.
    const MAX_SCAN: u64 = 1 << 20;
    let mut offset = 0u64;
    loop {
        if offset > MAX_SCAN {
            return Err(AcqError::ForeignHeaderAmbiguous);
        }
        reader.seek(after_fixed_fields + offset)?;
        if looks_like_datatype_headers(reader, n_channels) {
            break;
        }
        offset += 1;
    }

    log::warn!(
        "foreign data header declared length {declared_len} did not check out; \
         recovered via forward scan, actual length {offset}"
    );
    warnings.push(Warning::ForeignHeaderLengthRecovered {
        declared_len: declared_len as u32,
        recovered_len: offset as u32,
    });

    reader.seek(after_fixed_fields)?;
    let raw_bytes = reader.read_fixed("foreign_data_payload", offset as usize)?;
    reader.seek(after_fixed_fields + offset)?;
    Ok(ForeignDataBlock { raw_bytes })
}

struct ChannelHeaderInfo {
    order_num: i32,
    name: String,
    units: String,
    frequency_divider: u32,
    scale: f64,
    offset: f64,
    point_count: u64,
}

/// Walks a freshly-opened source through the whole header graph and
/// resolves the offsets the Sample Iterator needs, without reading any
/// sample data itself.
pub fn walk<R: Read + Seek>(mut reader: ByteReader<R>) -> Result<WalkResult<R>, AcqError> {
    let mut warnings = Vec::new();
    let mut text_encoding = TextEncoding::Utf8;

    log::debug!("walking graph header");
    let graph_start = reader.tell()?;
    let probe = decode_header(
        &mut reader,
        schema::GRAPH_HEADER,
        schema::MAX_PLAUSIBLE_REVISION,
        None,
    )?;
    let file_revision = probe.get_i32("nType").unwrap_or(0);
    if file_revision < schema::MIN_SUPPORTED_REVISION {
        return Err(AcqError::UnsupportedRevision {
            found: file_revision,
            minimum: schema::MIN_SUPPORTED_REVISION,
        });
    }
    reader.seek(graph_start)?;
    let mut graph = decode_header(&mut reader, schema::GRAPH_HEADER, file_revision, None)?;
    skip_to_declared_length(&mut reader, &mut graph)?;

    let samples_per_second = graph.get_f64("samplesPerSecond").unwrap_or(0.0);
    let n_channels = graph.get_i32("lChannels").unwrap_or(0).max(0) as usize;
    let is_compressed = graph.get_i32("isCompressed").unwrap_or(0) != 0;

    let mut graph_bag = HeaderBag::default();
    for key in ["nType", "lChannels", "samplesPerSecond", "isCompressed"] {
        if let Some(v) = graph.get(key) {
            graph_bag.raw.insert(key, format!("{v:?}"));
        }
    }

    log::debug!("reading {n_channels} channel headers");
    let mut channel_infos = Vec::with_capacity(n_channels);
    for idx in 0..n_channels {
        let mut ch = decode_header(&mut reader, schema::CHANNEL_HEADER, file_revision, None)?;
        skip_to_declared_length(&mut reader, &mut ch)?;
        let name = decode_string_field(&ch, "szCommentText", &mut warnings, &mut text_encoding);
        let units = decode_string_field(&ch, "szUnitsText", &mut warnings, &mut text_encoding);
        let divider = ch.get_i32("VariableSampleDivider").unwrap_or(1).max(1) as u32;
        channel_infos.push(ChannelHeaderInfo {
            order_num: ch.get_i32("nNum").unwrap_or(idx as i32),
            name,
            units,
            frequency_divider: divider.next_power_of_two(),
            scale: ch.get_f64("dAmplScale").unwrap_or(1.0),
            offset: ch.get_f64("dAmplOffset").unwrap_or(0.0),
            point_count: ch.get_i64("lNumSamples").unwrap_or(0).max(0) as u64,
        });
    }

    log::debug!("reading foreign data block");
    let foreign_data = read_foreign_data_block(&mut reader, file_revision, n_channels, &mut warnings)?;

    log::debug!("reading {n_channels} channel-datatype headers");
    let mut dtypes = Vec::with_capacity(n_channels);
    for _ in 0..n_channels {
        let dt = decode_header(&mut reader, schema::CHANNEL_DATATYPE_HEADER, file_revision, None)?;
        let code = dt.get_i32("dtype").unwrap_or(2);
        dtypes.push(if code == 1 { SampleDType::Float64 } else { SampleDType::Int16 });
    }

    let layout: StorageLayout;
    let channels: Vec<Channel>;
    let markers: Vec<Marker>;
    let journal: Journal;

    if !is_compressed {
        let o_data = reader.tell()?;
        let data_region_length: u64 = channel_infos
            .iter()
            .zip(dtypes.iter())
            .map(|(info, dtype)| info.point_count * dtype.size_bytes() as u64)
            .sum();

        channels = channel_infos
            .iter()
            .zip(dtypes.iter())
            .map(|(info, &dtype)| {
                Channel::new(
                    info.order_num,
                    info.name.clone(),
                    info.units.clone(),
                    info.frequency_divider,
                    samples_per_second,
                    info.point_count,
                    dtype,
                    info.scale,
                    info.offset,
                )
            })
            .collect();

        log::debug!("skipping data region ({data_region_length} bytes) to reach markers");
        reader.seek(o_data + data_region_length)?;

        log::debug!("reading marker block");
        let parsed_markers = read_marker_block(&mut reader, file_revision, &mut warnings, &mut text_encoding)?;
        markers = parsed_markers;

        log::debug!("reading journal block");
        journal = read_journal(&mut reader, file_revision, &mut warnings, &mut text_encoding)?;

        layout = StorageLayout::Uncompressed {
            o_data,
            data_region_length,
        };
    } else {
        log::debug!("reading marker block");
        let parsed_markers = read_marker_block(&mut reader, file_revision, &mut warnings, &mut text_encoding)?;
        markers = parsed_markers;

        log::debug!("reading journal block");
        journal = read_journal(&mut reader, file_revision, &mut warnings, &mut text_encoding)?;

        log::debug!("reading {n_channels} channel-compression headers");
        let mut segments = Vec::with_capacity(n_channels);
        let mut built_channels = Vec::with_capacity(n_channels);
        for (info, &dtype) in channel_infos.iter().zip(dtypes.iter()) {
            let mut ch_header =
                decode_header(&mut reader, schema::CHANNEL_COMPRESSION_HEADER, file_revision, None)?;
            skip_to_declared_length(&mut reader, &mut ch_header)?;
            let compressed_len = ch_header.get_u64("compressedDataLen").unwrap_or(0);
            let uncompressed_len = ch_header.get_u64("uncompressedDataLen").unwrap_or(0);
            let offset = reader.tell()?;
            reader.skip(compressed_len)?;
            segments.push(CompressedSegment {
                offset,
                compressed_len,
                uncompressed_len,
            });
            // Prefer the per-channel header's own count; fall back to the
            // uncompressed payload size when the header field is absent.
            let point_count = if info.point_count > 0 {
                info.point_count
            } else {
                uncompressed_len / dtype.size_bytes() as u64
            };
            built_channels.push(Channel::new(
                info.order_num,
                info.name.clone(),
                info.units.clone(),
                info.frequency_divider,
                samples_per_second,
                point_count,
                dtype,
                info.scale,
                info.offset,
            ));
        }
        channels = built_channels;
        layout = StorageLayout::Compressed { segments };
    }

    resolve_marker_warnings(&markers, &channels, &mut warnings);

    let datafile = Datafile {
        file_revision,
        is_compressed,
        byte_order: to_byte_order_tag(reader.byte_order()),
        samples_per_second,
        graph_header: graph_bag,
        channels,
        markers,
        journal,
        foreign_data,
        encoding: text_encoding,
        warnings,
    };

    Ok(WalkResult {
        datafile,
        layout,
        reader,
    })
}

fn read_marker_block<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    revision: i32,
    warnings: &mut Vec<Warning>,
    encoding_acc: &mut TextEncoding,
) -> Result<Vec<Marker>, AcqError> {
    let mut header = decode_header(reader, schema::MARKER_HEADER, revision, None)?;
    skip_to_declared_length(reader, &mut header)?;
    let count = header.get_i32("lMarkerCount").unwrap_or(0).max(0) as usize;

    let mut markers = Vec::with_capacity(count);
    for _ in 0..count {
        let item = decode_header(reader, schema::MARKER_ITEM_HEADER, revision, None)?;
        let label = decode_string_field(&item, "szText", warnings, encoding_acc);
        let style: [u8; 4] = item
            .get_bytes("mStyle")
            .and_then(|b| b.try_into().ok())
            .unwrap_or([0; 4]);
        let type_code: [u8; 4] = item
            .get_bytes("lType")
            .and_then(|b| b.try_into().ok())
            .unwrap_or(style);
        let created_at = item.get_f64("dCreatedAt").map(Timestamp::from_seconds_f64);
        let channel_number = if revision >= MARKER_CHANNEL_FIELD_REVISION {
            item.get_i32("lChannel").unwrap_or(-1)
        } else {
            -1
        };

        markers.push(Marker {
            global_sample_index: item.get_i64("lSample").unwrap_or(0),
            label,
            type_code,
            type_name: marker_type_name(type_code),
            style: Some(style),
            channel_number,
            created_at,
        });

        // Post-Marker Header: length known, semantics unknown; skip by its
        // declared length (§9 open question).
        let mut post = decode_header(reader, schema::POST_MARKER_HEADER, revision, None)?;
        skip_to_declared_length(reader, &mut post)?;
    }

    Ok(markers)
}

fn read_journal<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    revision: i32,
    warnings: &mut Vec<Warning>,
    encoding_acc: &mut TextEncoding,
) -> Result<Journal, AcqError> {
    let mut header = decode_header(reader, schema::JOURNAL_HEADER, revision, None)?;
    skip_to_declared_length(reader, &mut header)?;
    let len = header.get_i32("lJournalLen").unwrap_or(0).max(0) as usize;
    let bytes = reader.read_fixed("journal_text", len)?;
    let (text, encoding, lossless) = decode_legacy_string(&bytes);
    *encoding_acc = encoding_acc.worse(encoding);
    if !lossless {
        log::warn!("journal text fell back to a lossy decode ({encoding:?})");
        warnings.push(Warning::LossyStringDecode {
            context: "journal text",
            bytes_preview: bytes.iter().take(16).copied().collect(),
        });
    }
    Ok(Journal {
        text,
        is_html: revision >= JOURNAL_HTML_MIN_REVISION,
    })
}

fn resolve_marker_warnings(markers: &[Marker], channels: &[Channel], warnings: &mut Vec<Warning>) {
    for (i, marker) in markers.iter().enumerate() {
        if marker.is_global() {
            continue;
        }
        if channels.iter().all(|c| c.order_num != marker.channel_number) {
            log::warn!(
                "marker {i} references channel order_num {} which no channel has",
                marker.channel_number
            );
            warnings.push(Warning::UnresolvedMarkerChannel {
                marker_index: i,
                order_num: marker.channel_number,
            });
        }
    }
}
