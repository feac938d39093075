//! Sample Iterator (Component F): a lazy, restartable sequence of
//! per-channel sample chunks, covering both storage modes and mixed
//! sample widths.
//!
//! The iterator owns only the byte source and the offset map the Walker
//! resolved — never the `Datafile` — so materialise-all and streaming
//! callers both go through the same chunk-production path; `read_all`
//! is simply `for_each_chunk` with a consumer that appends instead of
//! forwarding to a callback.

use std::io::{Read, Seek};
use std::ops::ControlFlow;

use flate2::read::ZlibDecoder;

use crate::byte_reader::ByteReader;
use crate::error::AcqError;
use crate::model::{RawSamples, SampleDType};
use crate::pattern::{self, PlanChunk};
use crate::walker::StorageLayout;

/// Default chunk size in samples (per spec §4.3); implementation detail,
/// must not affect output, only resident memory in streaming mode.
pub const DEFAULT_CHUNK_SIZE: u64 = 1_000_000;

#[derive(Debug, Clone, Copy)]
pub struct ChannelPlanMeta {
    pub frequency_divider: u32,
    pub sample_dtype: SampleDType,
    pub point_count: u64,
}

/// A borrowed block of newly-read samples for one channel, handed to a
/// streaming consumer. `start_sample` is the index of `values[0]` within
/// that channel's raw data.
pub enum SampleChunk<'a> {
    Int16 { start_sample: u64, values: &'a [i16] },
    Float64 { start_sample: u64, values: &'a [f64] },
}

pub struct SampleIterator<R> {
    reader: ByteReader<R>,
    layout: StorageLayout,
    channels: Vec<ChannelPlanMeta>,
    chunk_size: u64,
}

impl<R: Read + Seek> SampleIterator<R> {
    pub fn new(
        reader: ByteReader<R>,
        layout: StorageLayout,
        channels: Vec<ChannelPlanMeta>,
        chunk_size: u64,
    ) -> Self {
        SampleIterator {
            reader,
            layout,
            channels,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Reads every channel's samples in full and returns them in channel
    /// order. Never mutates the stored offsets, so it can be called more
    /// than once on the same iterator with identical results.
    pub fn read_all(&mut self) -> Result<Vec<RawSamples>, AcqError> {
        let mut buffers: Vec<RawSamples> = self
            .channels
            .iter()
            .map(|c| match c.sample_dtype {
                SampleDType::Int16 => RawSamples::Int16(Vec::with_capacity(c.point_count as usize)),
                SampleDType::Float64 => RawSamples::Float64(Vec::with_capacity(c.point_count as usize)),
            })
            .collect();

        self.for_each_chunk(|ch_idx, _start, chunk| {
            match (&mut buffers[ch_idx], chunk) {
                (RawSamples::Int16(v), SampleChunk::Int16 { values, .. }) => v.extend_from_slice(values),
                (RawSamples::Float64(v), SampleChunk::Float64 { values, .. }) => v.extend_from_slice(values),
                _ => unreachable!("channel dtype is fixed at construction"),
            }
            ControlFlow::Continue(())
        })?;

        Ok(buffers)
    }

    /// Streams chunks to `consumer` as `(channel_index, start_sample,
    /// chunk)`. The consumer signals early stop with
    /// `ControlFlow::Break(())`; on a break, the source is released (by
    /// simply returning) and no further reads happen. Resident memory is
    /// bounded by `chunk_size` samples per channel at any one time.
    pub fn for_each_chunk(
        &mut self,
        mut consumer: impl FnMut(usize, u64, SampleChunk<'_>) -> ControlFlow<()>,
    ) -> Result<(), AcqError> {
        match &self.layout {
            StorageLayout::Uncompressed { o_data, .. } => {
                let o_data = *o_data;
                self.stream_uncompressed(o_data, &mut consumer)
            }
            StorageLayout::Compressed { segments } => {
                let segments = segments.clone_for_iteration();
                self.stream_compressed(&segments, &mut consumer)
            }
        }
    }

    fn stream_uncompressed(
        &mut self,
        o_data: u64,
        consumer: &mut impl FnMut(usize, u64, SampleChunk<'_>) -> ControlFlow<()>,
    ) -> Result<(), AcqError> {
        let dividers: Vec<u32> = self.channels.iter().map(|c| c.frequency_divider).collect();
        let point_counts: Vec<u64> = self.channels.iter().map(|c| c.point_count).collect();
        let plan = pattern::plan(&dividers, &point_counts);

        self.reader.seek(o_data)?;
        let mut cursor = vec![0u64; self.channels.len()];

        for PlanChunk { pattern, repetitions } in &plan {
            let reps_per_batch = (self.chunk_size / pattern.len().max(1) as u64).max(1);
            let mut reps_left = *repetitions;

            while reps_left > 0 {
                let batch_reps = reps_left.min(reps_per_batch);
                let mut int16_batches: Vec<Vec<i16>> = vec![Vec::new(); self.channels.len()];
                let mut f64_batches: Vec<Vec<f64>> = vec![Vec::new(); self.channels.len()];

                for _ in 0..batch_reps {
                    for &ch_idx in pattern {
                        match self.channels[ch_idx].sample_dtype {
                            SampleDType::Int16 => {
                                let v = self.reader.read_i16("sample_slot")?;
                                int16_batches[ch_idx].push(v);
                            }
                            SampleDType::Float64 => {
                                let v = self.reader.read_f64("sample_slot")?;
                                f64_batches[ch_idx].push(v);
                            }
                        }
                    }
                }

                for (ch_idx, meta) in self.channels.iter().enumerate() {
                    let start = cursor[ch_idx];
                    let flow = match meta.sample_dtype {
                        SampleDType::Int16 => {
                            let values = &int16_batches[ch_idx];
                            if values.is_empty() {
                                continue;
                            }
                            cursor[ch_idx] += values.len() as u64;
                            consumer(ch_idx, start, SampleChunk::Int16 { start_sample: start, values })
                        }
                        SampleDType::Float64 => {
                            let values = &f64_batches[ch_idx];
                            if values.is_empty() {
                                continue;
                            }
                            cursor[ch_idx] += values.len() as u64;
                            consumer(ch_idx, start, SampleChunk::Float64 { start_sample: start, values })
                        }
                    };
                    if flow.is_break() {
                        return Ok(());
                    }
                }

                reps_left -= batch_reps;
            }
        }

        Ok(())
    }

    fn stream_compressed(
        &mut self,
        segments: &[(u64, u64)],
        consumer: &mut impl FnMut(usize, u64, SampleChunk<'_>) -> ControlFlow<()>,
    ) -> Result<(), AcqError> {
        for (ch_idx, (&(offset, compressed_len), meta)) in segments.iter().zip(self.channels.iter()).enumerate() {
            self.reader.seek(offset)?;
            let compressed = self.reader.read_fixed("compressed_segment", compressed_len as usize)?;

            let mut decoder = ZlibDecoder::new(compressed.as_slice());
            let mut raw_bytes = Vec::new();
            decoder
                .read_to_end(&mut raw_bytes)
                .map_err(|source| AcqError::ChecksumOrInflateError { channel: ch_idx, source })?;

            // Compressed-segment payloads are little-endian regardless of
            // the file's own byte-order field (an observed invariant).
            let mut start = 0u64;
            match meta.sample_dtype {
                SampleDType::Int16 => {
                    let values: Vec<i16> = raw_bytes
                        .chunks_exact(2)
                        .map(|b| i16::from_le_bytes([b[0], b[1]]))
                        .collect();
                    for batch in values.chunks(self.chunk_size as usize) {
                        let flow = consumer(ch_idx, start, SampleChunk::Int16 { start_sample: start, values: batch });
                        start += batch.len() as u64;
                        if flow.is_break() {
                            return Ok(());
                        }
                    }
                }
                SampleDType::Float64 => {
                    let values: Vec<f64> = raw_bytes
                        .chunks_exact(8)
                        .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
                        .collect();
                    for batch in values.chunks(self.chunk_size as usize) {
                        let flow = consumer(ch_idx, start, SampleChunk::Float64 { start_sample: start, values: batch });
                        start += batch.len() as u64;
                        if flow.is_break() {
                            return Ok(());
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Small helper trait so `for_each_chunk` can borrow segment offsets
/// without cloning the whole `CompressedSegment` (which also carries an
/// uncompressed-length hint this module doesn't need).
trait SegmentsExt {
    fn clone_for_iteration(&self) -> Vec<(u64, u64)>;
}

impl SegmentsExt for Vec<crate::walker::CompressedSegment> {
    fn clone_for_iteration(&self) -> Vec<(u64, u64)> {
        self.iter().map(|s| (s.offset, s.compressed_len)).collect()
    }
}
