//! Version-conditional header schemas.
//!
//! Each header kind's shape is described as a table of (name, kind,
//! min_revision, max_revision) rather than branching code: two revisions
//! that share 90% of fields but differ in a trailing block are expressed as
//! one extra row with a `min_revision`, not a new code path.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// Fixed-width byte blob of the given length.
    Fixed(usize),
    /// Length-prefixed string; the length prefix is `len_width` bytes wide.
    PString { len_width: u8 },
}

#[derive(Copy, Clone, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub min_revision: i32,
    pub max_revision: Option<i32>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind, min_revision: i32) -> Self {
        FieldSpec {
            name,
            kind,
            min_revision,
            max_revision: None,
        }
    }

    pub const fn until(name: &'static str, kind: FieldKind, min_revision: i32, max_revision: i32) -> Self {
        FieldSpec {
            name,
            kind,
            min_revision,
            max_revision: Some(max_revision),
        }
    }

    pub fn applies_to(&self, revision: i32) -> bool {
        revision >= self.min_revision && self.max_revision.map_or(true, |max| revision <= max)
    }
}

/// Minimum file revision this crate is able to interpret at all.
pub const MIN_SUPPORTED_REVISION: i32 = 30;
pub const MAX_PLAUSIBLE_REVISION: i32 = 200;

/// Graph Header: the file's root header. Its first field is always the
/// file revision itself (the magic/endian-detection probe reads exactly
/// this i32, see `byte_reader::sniff_byte_order`); `nLength` (declared
/// total header length) follows it.
pub const GRAPH_HEADER: &[FieldSpec] = &[
    FieldSpec::new("nType", FieldKind::I32, 30),
    FieldSpec::new("nLength", FieldKind::I32, 30),
    FieldSpec::new("version", FieldKind::F64, 30),
    FieldSpec::new("extItemFlag", FieldKind::I16, 30),
    FieldSpec::new("lChannels", FieldKind::I32, 30),
    FieldSpec::new("samplesPerSecond", FieldKind::F64, 30),
    FieldSpec::new("timeMarker", FieldKind::F64, 30),
    FieldSpec::new("executionOrderer", FieldKind::I16, 30),
    FieldSpec::new("measurementMode", FieldKind::I16, 30),
    // Compression flag: 0 = uncompressed interleaved, 1 = per-channel zlib.
    FieldSpec::new("isCompressed", FieldKind::I16, 34),
    FieldSpec::new("lExtFirstChannel", FieldKind::I32, 38),
    FieldSpec::new("firstTimeOffset", FieldKind::F64, 42),
];

/// Channel Header: one per acquired signal, repeated `lChannels` times.
pub const CHANNEL_HEADER: &[FieldSpec] = &[
    FieldSpec::new("nLength", FieldKind::I32, 30),
    FieldSpec::new("nNum", FieldKind::I32, 30),
    FieldSpec::new("szCommentText", FieldKind::PString { len_width: 1 }, 30),
    FieldSpec::new("rgbColor", FieldKind::Fixed(4), 30),
    FieldSpec::new("displayOrder", FieldKind::I16, 30),
    FieldSpec::new("voiceTagCount", FieldKind::I32, 30),
    FieldSpec::new("VariableSampleDivider", FieldKind::I16, 34),
    FieldSpec::new("nVerticalUnits1", FieldKind::I16, 30),
    FieldSpec::new("nVerticalUnits2", FieldKind::I16, 30),
    FieldSpec::new("dAmplScale", FieldKind::F64, 30),
    FieldSpec::new("dAmplOffset", FieldKind::F64, 30),
    FieldSpec::new("szUnitsText", FieldKind::PString { len_width: 1 }, 30),
    FieldSpec::new("dSamplesPerSecond", FieldKind::F64, 30),
    FieldSpec::new("bEnabled", FieldKind::I16, 30),
    // Expected number of samples acquired on this channel. Present from the
    // earliest supported revisions; this is the header source for
    // `Channel::point_count` (see spec.md §3).
    FieldSpec::new("lNumSamples", FieldKind::I32, 30),
    FieldSpec::new("rgbColor2", FieldKind::Fixed(4), 45),
];

pub const FOREIGN_DATA_HEADER: &[FieldSpec] = &[
    FieldSpec::new("nLength", FieldKind::I32, 30),
    FieldSpec::new("nType", FieldKind::I16, 30),
];

/// Channel-Datatype Header: one per channel, describes on-disk sample
/// representation. `dtype`: 1 = double, 2 = short. `size`: bytes per sample.
pub const CHANNEL_DATATYPE_HEADER: &[FieldSpec] = &[
    FieldSpec::new("dtype", FieldKind::I16, 30),
    FieldSpec::new("size", FieldKind::I16, 30),
];

pub const CHANNEL_COMPRESSION_HEADER: &[FieldSpec] = &[
    FieldSpec::new("nLength", FieldKind::I32, 68),
    FieldSpec::new("compressedDataLen", FieldKind::U32, 68),
    FieldSpec::new("uncompressedDataLen", FieldKind::U32, 68),
];

pub const MARKER_HEADER: &[FieldSpec] = &[
    FieldSpec::new("nLength", FieldKind::I32, 30),
    FieldSpec::new("lMarkerCount", FieldKind::I32, 30),
];

pub const MARKER_ITEM_HEADER: &[FieldSpec] = &[
    FieldSpec::new("lSample", FieldKind::I32, 30),
    FieldSpec::new("mStyle", FieldKind::Fixed(4), 30),
    FieldSpec::new("mFlags", FieldKind::I16, 30),
    FieldSpec::new("szText", FieldKind::PString { len_width: 2 }, 30),
    FieldSpec::new("lChannel", FieldKind::I32, 60),
    FieldSpec::new("lType", FieldKind::Fixed(4), 65),
    FieldSpec::new("dCreatedAt", FieldKind::F64, 72),
];

/// Post-Marker Header: only known field is its own declared length; its
/// semantics are otherwise undocumented, so the decoder only ever skips it.
pub const POST_MARKER_HEADER: &[FieldSpec] = &[FieldSpec::new("nLength", FieldKind::I32, 30)];

pub const JOURNAL_HEADER: &[FieldSpec] = &[
    FieldSpec::new("nLength", FieldKind::I32, 30),
    FieldSpec::new("lJournalLen", FieldKind::I32, 30),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_applies_within_range() {
        let f = FieldSpec::until("x", FieldKind::I16, 34, 44);
        assert!(!f.applies_to(33));
        assert!(f.applies_to(34));
        assert!(f.applies_to(44));
        assert!(!f.applies_to(45));
    }

    #[test]
    fn field_with_no_max_applies_forever() {
        let f = FieldSpec::new("x", FieldKind::I32, 30);
        assert!(f.applies_to(30));
        assert!(f.applies_to(9999));
        assert!(!f.applies_to(29));
    }
}
