//! Public data model (Component G): `Datafile`, `Channel`, `Marker`,
//! `Journal`, plus derived views (`data`, `time_index`, `upsampled_data`).
//!
//! `Datafile` uniquely owns every `Channel`, `Marker`, and the `Journal`.
//! `Marker` never owns a `Channel` — it stores `channel_number` and
//! resolves the back-reference through `Datafile::channel_by_order_num`,
//! avoiding an ownership cycle (see DESIGN.md).

use std::cell::RefCell;

use crate::encoding::TextEncoding;
use crate::error::Warning;
use crate::timestamp::Timestamp;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SampleDType {
    Int16,
    Float64,
}

impl SampleDType {
    pub fn size_bytes(self) -> usize {
        match self {
            SampleDType::Int16 => 2,
            SampleDType::Float64 => 8,
        }
    }
}

/// The raw, unscaled samples read for one channel. `Int16` channels still
/// need `scale`/`offset` applied to become `Channel::data()`; `Float64`
/// channels are their own scaled view (scale = 1, offset = 0 by
/// construction).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RawSamples {
    Int16(Vec<i16>),
    Float64(Vec<f64>),
}

impl RawSamples {
    pub fn len(&self) -> usize {
        match self {
            RawSamples::Int16(v) => v.len(),
            RawSamples::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_f64(&self, i: usize) -> f64 {
        match self {
            RawSamples::Int16(v) => v[i] as f64,
            RawSamples::Float64(v) => v[i],
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Channel {
    pub order_num: i32,
    pub name: String,
    pub units: String,
    pub frequency_divider: u32,
    base_rate: f64,
    pub point_count: u64,
    pub sample_dtype: SampleDType,
    pub scale: f64,
    pub offset: f64,
    raw_data: Option<RawSamples>,
    #[cfg_attr(feature = "serde", serde(skip))]
    data_cache: RefCell<Option<Vec<f64>>>,
}

impl Channel {
    pub fn new(
        order_num: i32,
        name: String,
        units: String,
        frequency_divider: u32,
        base_rate: f64,
        point_count: u64,
        sample_dtype: SampleDType,
        scale: f64,
        offset: f64,
    ) -> Channel {
        let (scale, offset) = match sample_dtype {
            SampleDType::Float64 => (1.0, 0.0),
            SampleDType::Int16 => (scale, offset),
        };
        Channel {
            order_num,
            name,
            units,
            frequency_divider,
            base_rate,
            point_count,
            sample_dtype,
            scale,
            offset,
            raw_data: None,
            data_cache: RefCell::new(None),
        }
    }

    pub fn sample_size_bytes(&self) -> usize {
        self.sample_dtype.size_bytes()
    }

    pub fn samples_per_second(&self) -> f64 {
        self.base_rate / self.frequency_divider as f64
    }

    pub fn raw_data(&self) -> Option<&RawSamples> {
        self.raw_data.as_ref()
    }

    pub fn set_raw_data(&mut self, data: RawSamples) {
        self.raw_data = Some(data);
        *self.data_cache.borrow_mut() = None;
    }

    /// `raw_data * scale + offset` as `f64`. Empty if samples have not been
    /// materialised yet.
    pub fn data(&self) -> Vec<f64> {
        if let Some(cached) = self.data_cache.borrow().as_ref() {
            return cached.clone();
        }
        let computed: Vec<f64> = match &self.raw_data {
            None => Vec::new(),
            Some(raw) => (0..raw.len())
                .map(|i| raw.get_f64(i) * self.scale + self.offset)
                .collect(),
        };
        *self.data_cache.borrow_mut() = Some(computed.clone());
        computed
    }

    /// `time_index[i] = i / samples_per_second`.
    pub fn time_index(&self) -> Vec<f64> {
        let sps = self.samples_per_second();
        (0..self.point_count).map(|i| i as f64 / sps).collect()
    }

    /// `upsampled_data[j] = raw_data[j / frequency_divider]`, length
    /// `point_count * frequency_divider`, aligned to the base rate.
    pub fn upsampled_data(&self) -> Vec<f64> {
        let raw = match &self.raw_data {
            None => return Vec::new(),
            Some(raw) => raw,
        };
        let divider = self.frequency_divider as usize;
        (0..raw.len() * divider)
            .map(|j| raw.get_f64(j / divider))
            .collect()
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Marker {
    pub global_sample_index: i64,
    pub label: String,
    pub type_code: [u8; 4],
    pub type_name: String,
    pub style: Option<[u8; 4]>,
    pub channel_number: i32,
    pub created_at: Option<Timestamp>,
}

impl Marker {
    pub fn is_global(&self) -> bool {
        self.channel_number < 0
    }

    /// `global_sample_index / channel.frequency_divider`, or `None` for a
    /// global marker.
    pub fn channel_sample_index(&self, divider: u32) -> Option<i64> {
        if self.is_global() {
            None
        } else {
            Some(self.global_sample_index / divider as i64)
        }
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Journal {
    pub text: String,
    pub is_html: bool,
}

/// An opaque byte range whose layout is unknown (§9 open question); the
/// bytes and length are preserved verbatim for round-tripping.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ForeignDataBlock {
    pub raw_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ByteOrderTag {
    Little,
    Big,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HeaderBag {
    pub raw: std::collections::HashMap<&'static str, String>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Datafile {
    pub file_revision: i32,
    pub is_compressed: bool,
    pub byte_order: ByteOrderTag,
    pub samples_per_second: f64,
    pub graph_header: HeaderBag,
    pub channels: Vec<Channel>,
    pub markers: Vec<Marker>,
    pub journal: Journal,
    pub foreign_data: ForeignDataBlock,
    pub encoding: TextEncoding,
    pub warnings: Vec<Warning>,
}

impl Datafile {
    pub fn channel_by_order_num(&self, order_num: i32) -> Option<&Channel> {
        self.channels.iter().find(|c| c.order_num == order_num)
    }

    /// Earliest non-`None` `created_at` across all markers, or `None` if no
    /// marker carries a creation time (pre-revision-72 files).
    pub fn earliest_marker_created_at(&self) -> Option<Timestamp> {
        self.markers
            .iter()
            .filter_map(|m| m.created_at)
            .fold(None, |acc, t| match acc {
                None => Some(t),
                Some(best) => Some(if t < best { t } else { best }),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_channel(dtype: SampleDType, divider: u32, scale: f64, offset: f64) -> Channel {
        Channel::new(0, "ch".into(), "V".into(), divider, 1000.0, 0, dtype, scale, offset)
    }

    #[test]
    fn float64_channel_forces_identity_scale_offset() {
        let ch = make_channel(SampleDType::Float64, 1, 5.0, 3.0);
        assert_eq!(ch.scale, 1.0);
        assert_eq!(ch.offset, 0.0);
    }

    #[test]
    fn int16_channel_keeps_scale_offset() {
        let ch = make_channel(SampleDType::Int16, 1, 2.0, -1.0);
        assert_eq!(ch.scale, 2.0);
        assert_eq!(ch.offset, -1.0);
    }

    #[test]
    fn data_applies_scale_and_offset() {
        let mut ch = make_channel(SampleDType::Int16, 1, 2.0, 1.0);
        ch.set_raw_data(RawSamples::Int16(vec![1, 2, 3]));
        assert_eq!(ch.data(), vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn upsampled_data_repeats_each_sample() {
        let mut ch = make_channel(SampleDType::Int16, 4, 1.0, 0.0);
        ch.set_raw_data(RawSamples::Int16(vec![10, 20]));
        assert_eq!(ch.upsampled_data(), vec![10.0, 10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 20.0]);
    }

    #[test]
    fn time_index_uses_divided_sample_rate() {
        let mut ch = make_channel(SampleDType::Int16, 2, 1.0, 0.0);
        ch.point_count = 3;
        ch.set_raw_data(RawSamples::Int16(vec![1, 2, 3]));
        assert_eq!(ch.time_index(), vec![0.0, 1.0 / 500.0, 2.0 / 500.0]);
    }

    #[test]
    fn global_marker_has_no_channel_sample_index() {
        let marker = Marker {
            global_sample_index: 40,
            label: "x".into(),
            type_code: *b"EVNT",
            type_name: "event".into(),
            style: None,
            channel_number: -1,
            created_at: None,
        };
        assert!(marker.is_global());
        assert_eq!(marker.channel_sample_index(4), None);
    }

    #[test]
    fn channel_marker_divides_by_divider() {
        let marker = Marker {
            global_sample_index: 40,
            label: "x".into(),
            type_code: *b"EVNT",
            type_name: "event".into(),
            style: None,
            channel_number: 0,
            created_at: None,
        };
        assert_eq!(marker.channel_sample_index(4), Some(10));
    }

    #[test]
    fn earliest_marker_created_at_ignores_none() {
        let mut df = make_empty_datafile();
        df.markers.push(Marker {
            global_sample_index: 0,
            label: "a".into(),
            type_code: *b"EVNT",
            type_name: "event".into(),
            style: None,
            channel_number: -1,
            created_at: Some(Timestamp::from_seconds_f64(100.0)),
        });
        df.markers.push(Marker {
            global_sample_index: 0,
            label: "b".into(),
            type_code: *b"EVNT",
            type_name: "event".into(),
            style: None,
            channel_number: -1,
            created_at: Some(Timestamp::from_seconds_f64(50.0)),
        });
        df.markers.push(Marker {
            global_sample_index: 0,
            label: "c".into(),
            type_code: *b"EVNT",
            type_name: "event".into(),
            style: None,
            channel_number: -1,
            created_at: None,
        });
        let earliest = df.earliest_marker_created_at().unwrap();
        assert!(earliest.is_same_as(Timestamp::from_seconds_f64(50.0), 1e-9));
    }

    fn make_empty_datafile() -> Datafile {
        Datafile {
            file_revision: 60,
            is_compressed: false,
            byte_order: ByteOrderTag::Little,
            samples_per_second: 1000.0,
            graph_header: HeaderBag::default(),
            channels: Vec::new(),
            markers: Vec::new(),
            journal: Journal::default(),
            foreign_data: ForeignDataBlock::default(),
            encoding: TextEncoding::Utf8,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Dividers restricted to powers of two, matching `Channel`'s own
    /// invariant that `frequency_divider` is a power of two.
    fn divider_strategy() -> impl Strategy<Value = u32> {
        (0u32..=6).prop_map(|shift| 1u32 << shift)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            rng_seed: proptest::test_runner::RngSeed::Fixed(0xACE0FBA5E),
            failure_persistence: None,
            .. ProptestConfig::default()
        })]

        /// Invariant 3: `upsampled_data`'s length is always
        /// `point_count * frequency_divider`, for any power-of-two divider
        /// and any point count.
        #[test]
        fn upsampled_data_len_matches_point_count_times_divider(
            divider in divider_strategy(),
            point_count in 0usize..200,
        ) {
            let mut ch = Channel::new(
                0, "ch".into(), "V".into(), divider, 1000.0, point_count as u64,
                SampleDType::Int16, 1.0, 0.0,
            );
            let raw: Vec<i16> = (0..point_count as i64).map(|i| i as i16).collect();
            ch.set_raw_data(RawSamples::Int16(raw));
            prop_assert_eq!(ch.upsampled_data().len(), point_count * divider as usize);
        }

        /// Invariant 7 restated over a synthetic in-memory `Datafile`: a
        /// marker whose `channel_number` equals some channel's `order_num`
        /// always resolves through `channel_by_order_num`, for any order_num.
        #[test]
        fn marker_channel_number_resolves_when_it_matches_a_channel(order_num in any::<i32>()) {
            let channel = Channel::new(order_num, "ch".into(), "V".into(), 1, 1000.0, 0, SampleDType::Int16, 1.0, 0.0);
            let datafile = Datafile {
                file_revision: 60,
                is_compressed: false,
                byte_order: ByteOrderTag::Little,
                samples_per_second: 1000.0,
                graph_header: HeaderBag::default(),
                channels: vec![channel],
                markers: Vec::new(),
                journal: Journal::default(),
                foreign_data: ForeignDataBlock::default(),
                encoding: TextEncoding::Utf8,
                warnings: Vec::new(),
            };
            prop_assert!(datafile.channel_by_order_num(order_num).is_some());
        }
    }
}
