//! Fixed-capacity compute buffers and the parallel backend.
//!
//! The buffer layout mirrors a storage-buffer compute kernel:
//! - partials: `MAX_PARTIALS` × `[cent: f32, intensity: f32]`
//! - fixed offsets: `MAX_FIXED_OFFSETS` × `f32`
//! - kernel: `MAX_KERNEL_SAMPLES` × `f32`
//! - params: 32-byte little-endian block (see [`ComputeParams`])
//! - result: one 8-byte `{x: i32, y: f32}` entry per swept offset
//!
//! Inputs longer than a buffer are truncated to the prefix that fits.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::core::roughness_kernel::{RoughnessKernel, lookup};
use crate::core::spectrum::PartialSpectrum;
use crate::core::sweep::SweepRange;

pub const MAX_PARTIALS: usize = 1024;
pub const MAX_FIXED_OFFSETS: usize = 64;
pub const MAX_KERNEL_SAMPLES: usize = 4096;

pub const PARAMS_BLOCK_LEN: usize = 32;
pub const RESULT_ENTRY_LEN: usize = 8;

/// Failures below the orchestrator: dispatch, readback or wire decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("parameter block must be 32 bytes, got {0}")]
    MalformedParams(usize),
    #[error("parameter block out of bounds: {0}")]
    ParamsOutOfBounds(&'static str),
    #[error("result buffer holds {actual} bytes, expected {expected}")]
    ResultSize { expected: usize, actual: usize },
    #[error("result entry {index} carries x = {actual}, expected {expected}")]
    ResultOrder {
        index: usize,
        expected: i32,
        actual: i32,
    },
    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

/// Uniform parameter block.
///
/// Wire layout (little-endian, 32 bytes):
/// `u32 partial_count | u32 offset_count | u32 kernel_count | i32 from | i32 to |
///  i32 reserved | u32 pad | u32 pad`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComputeParams {
    pub partial_count: u32,
    pub offset_count: u32,
    pub kernel_count: u32,
    pub from: i32,
    pub to: i32,
}

impl ComputeParams {
    pub fn to_bytes(&self) -> [u8; PARAMS_BLOCK_LEN] {
        let mut buf = [0u8; PARAMS_BLOCK_LEN];
        LittleEndian::write_u32(&mut buf[0..4], self.partial_count);
        LittleEndian::write_u32(&mut buf[4..8], self.offset_count);
        LittleEndian::write_u32(&mut buf[8..12], self.kernel_count);
        LittleEndian::write_i32(&mut buf[12..16], self.from);
        LittleEndian::write_i32(&mut buf[16..20], self.to);
        // 20..32: reserved + padding, zero
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        if bytes.len() != PARAMS_BLOCK_LEN {
            return Err(BackendError::MalformedParams(bytes.len()));
        }
        let params = Self {
            partial_count: LittleEndian::read_u32(&bytes[0..4]),
            offset_count: LittleEndian::read_u32(&bytes[4..8]),
            kernel_count: LittleEndian::read_u32(&bytes[8..12]),
            from: LittleEndian::read_i32(&bytes[12..16]),
            to: LittleEndian::read_i32(&bytes[16..20]),
        };
        if params.partial_count as usize > MAX_PARTIALS {
            return Err(BackendError::ParamsOutOfBounds("partial_count"));
        }
        if params.offset_count as usize > MAX_FIXED_OFFSETS {
            return Err(BackendError::ParamsOutOfBounds("offset_count"));
        }
        if params.kernel_count as usize > MAX_KERNEL_SAMPLES {
            return Err(BackendError::ParamsOutOfBounds("kernel_count"));
        }
        if params.from > params.to {
            return Err(BackendError::ParamsOutOfBounds("from > to"));
        }
        Ok(params)
    }

    /// Number of swept offsets (`to - from + 1`).
    #[inline]
    pub fn sample_count(&self) -> usize {
        (self.to as i64 - self.from as i64 + 1).max(0) as usize
    }
}

/// Input buffers for one dispatch. Written once, read-only during compute.
#[derive(Clone, Debug)]
pub struct ComputeBuffers {
    /// Interleaved `[cent, intensity]`, `2 * MAX_PARTIALS` floats.
    pub partials: Vec<f32>,
    pub fixed_offsets: Vec<f32>,
    pub kernel: Vec<f32>,
    pub params: [u8; PARAMS_BLOCK_LEN],
}

impl ComputeBuffers {
    /// Marshal inputs into fixed-capacity buffers, truncating what does not fit.
    pub fn marshal(
        spectrum: &PartialSpectrum,
        fixed_offsets: &[i32],
        kernel: &RoughnessKernel,
        range: SweepRange,
    ) -> Self {
        let partials_in = spectrum.partials();
        let kernel_in = kernel.samples();
        let partial_count = partials_in.len().min(MAX_PARTIALS);
        let offset_count = fixed_offsets.len().min(MAX_FIXED_OFFSETS);
        let kernel_count = kernel_in.len().min(MAX_KERNEL_SAMPLES);

        if partial_count < partials_in.len()
            || offset_count < fixed_offsets.len()
            || kernel_count < kernel_in.len()
        {
            debug!(
                partials = partials_in.len(),
                offsets = fixed_offsets.len(),
                kernel = kernel_in.len(),
                "compute inputs exceed buffer capacity; truncating"
            );
        }

        let mut partials = vec![0.0f32; MAX_PARTIALS * 2];
        for (slot, p) in partials.chunks_exact_mut(2).zip(&partials_in[..partial_count]) {
            slot[0] = p.offset_cents;
            slot[1] = p.intensity;
        }

        let mut offsets = vec![0.0f32; MAX_FIXED_OFFSETS];
        for (slot, &f) in offsets.iter_mut().zip(&fixed_offsets[..offset_count]) {
            *slot = f as f32;
        }

        let mut kernel_buf = vec![0.0f32; MAX_KERNEL_SAMPLES];
        kernel_buf[..kernel_count].copy_from_slice(&kernel_in[..kernel_count]);

        let params = ComputeParams {
            partial_count: partial_count as u32,
            offset_count: offset_count as u32,
            kernel_count: kernel_count as u32,
            from: range.from,
            to: range.to,
        };

        Self {
            partials,
            fixed_offsets: offsets,
            kernel: kernel_buf,
            params: params.to_bytes(),
        }
    }
}

/// A capability that evaluates the roughness sum for every swept offset.
///
/// `dispatch` returns the raw result buffer (`RESULT_ENTRY_LEN` bytes per offset).
pub trait ComputeBackend: Send + Sync {
    fn name(&self) -> &str;
    fn dispatch(&self, buffers: &ComputeBuffers) -> Result<Vec<u8>, BackendError>;
}

/// Total roughness at swept offset `x` (one invocation of the compute kernel).
pub fn roughness_at(x: i32, buffers: &ComputeBuffers, params: &ComputeParams) -> f32 {
    let n_partials = params.partial_count as usize;
    let partials = &buffers.partials[..n_partials * 2];
    let offsets = &buffers.fixed_offsets[..params.offset_count as usize];
    let kernel = &buffers.kernel[..params.kernel_count as usize];
    let x = x as f32;

    let mut sum = 0.0f32;
    for &base in offsets {
        for fixed in partials.chunks_exact(2) {
            if fixed[1] == 0.0 {
                continue;
            }
            let fixed_pos = base + fixed[0];
            for swept in partials.chunks_exact(2) {
                if swept[1] == 0.0 {
                    continue;
                }
                let separation = (x + swept[0]) - fixed_pos;
                sum += fixed[1] * swept[1] * lookup(kernel, separation);
            }
        }
    }
    sum
}

/// CPU backend: one rayon task per swept offset on a dedicated pool.
pub struct RayonBackend {
    pool: ThreadPool,
}

impl RayonBackend {
    /// `threads = None` lets rayon pick the number of workers.
    pub fn new(threads: Option<usize>) -> Result<Self, BackendError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("sweep-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        debug!(threads = pool.current_num_threads(), "rayon sweep backend ready");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ComputeBackend for RayonBackend {
    fn name(&self) -> &str {
        "rayon"
    }

    fn dispatch(&self, buffers: &ComputeBuffers) -> Result<Vec<u8>, BackendError> {
        let params = ComputeParams::from_bytes(&buffers.params)?;
        let n = params.sample_count();
        let ys: Vec<f32> = self.pool.install(|| {
            (0..n)
                .into_par_iter()
                .map(|idx| roughness_at(params.from + idx as i32, buffers, &params))
                .collect()
        });

        let mut out = Vec::with_capacity(n * RESULT_ENTRY_LEN);
        for (idx, y) in ys.into_iter().enumerate() {
            out.write_i32::<LittleEndian>(params.from + idx as i32)
                .map_err(|err| BackendError::Dispatch(err.to_string()))?;
            out.write_f32::<LittleEndian>(y)
                .map_err(|err| BackendError::Dispatch(err.to_string()))?;
        }
        Ok(out)
    }
}

/// Decode a result buffer into `(x, y)` pairs, checking size and ordering.
pub fn decode_results(bytes: &[u8], params: &ComputeParams) -> Result<Vec<(i32, f32)>, BackendError> {
    let n = params.sample_count();
    let expected = n * RESULT_ENTRY_LEN;
    if bytes.len() != expected {
        return Err(BackendError::ResultSize {
            expected,
            actual: bytes.len(),
        });
    }
    bytes
        .chunks_exact(RESULT_ENTRY_LEN)
        .enumerate()
        .map(|(index, entry)| {
            let x = LittleEndian::read_i32(&entry[0..4]);
            let y = LittleEndian::read_f32(&entry[4..8]);
            let want = params.from + index as i32;
            if x != want {
                return Err(BackendError::ResultOrder {
                    index,
                    expected: want,
                    actual: x,
                });
            }
            Ok((x, y))
        })
        .collect()
}
