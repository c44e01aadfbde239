//! Metal accelerator backend.
//!
//! Setup reads an MSL source file, compiles it at runtime and builds one
//! compute pipeline for the configured entry point. The device, queue,
//! library and pipeline live in [`MetalCompute`] and are released when the
//! backend is dropped at the end of the worker's run.

use std::ffi::c_void;
use std::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_foundation::NSString;
use objc2_metal::{
    MTLBuffer, MTLCommandBuffer, MTLCommandBufferStatus, MTLCommandEncoder, MTLCommandQueue,
    MTLComputeCommandEncoder, MTLComputePipelineState, MTLCreateSystemDefaultDevice, MTLDevice,
    MTLLibrary, MTLResourceOptions, MTLSize,
};

use crate::dataset::Element;
use crate::error::{Result, ShardError};

use super::{square_tile, AcceleratorSpec, LocalCompute};

/// Side of the 2-D threadgroup used by the matrix kernel, shrunk to the
/// pipeline's thread limit.
const TILE: usize = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct MatMulParams {
    rows: u32,
    dim: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct BitonicParams {
    j: u32,
    k: u32,
    count: u32,
    _pad: u32,
}

fn setup_error(what: impl Into<String>) -> ShardError {
    ShardError::BackendSetupFailure(what.into())
}

pub struct MetalCompute {
    rank: usize,
    entry: String,
    device: Retained<ProtocolObject<dyn MTLDevice>>,
    queue: Retained<ProtocolObject<dyn MTLCommandQueue>>,
    _library: Retained<ProtocolObject<dyn MTLLibrary>>,
    pipeline: Retained<ProtocolObject<dyn MTLComputePipelineState>>,
}

impl MetalCompute {
    pub fn new(rank: usize, spec: &AcceleratorSpec) -> Result<Self> {
        let source = std::fs::read_to_string(&spec.source).map_err(|e| {
            setup_error(format!("cannot read {}: {e}", spec.source.display()))
        })?;

        let device =
            MTLCreateSystemDefaultDevice().ok_or_else(|| setup_error("no Metal device"))?;
        let queue = device
            .newCommandQueue()
            .ok_or_else(|| setup_error("failed to create command queue"))?;

        let ns_source = NSString::from_str(&source);
        let library = device
            .newLibraryWithSource_options_error(&ns_source, None)
            .map_err(|e| setup_error(format!("program build failed: {e:?}")))?;

        let fn_name = NSString::from_str(&spec.entry);
        let function = library
            .newFunctionWithName(&fn_name)
            .ok_or_else(|| setup_error(format!("entry point `{}` not found", spec.entry)))?;

        let pipeline = device
            .newComputePipelineStateWithFunction_error(&function)
            .map_err(|e| setup_error(format!("pipeline creation failed: {e:?}")))?;

        tracing::debug!(rank, entry = %spec.entry, device = %device.name(), "Metal backend ready");
        Ok(Self {
            rank,
            entry: spec.entry.clone(),
            device,
            queue,
            _library: library,
            pipeline,
        })
    }

    fn compute_error(&self, reason: impl Into<String>) -> ShardError {
        ShardError::ComputeFailure {
            rank: self.rank,
            reason: reason.into(),
        }
    }

    fn buffer_with_data(&self, data: &[Element]) -> Result<Retained<ProtocolObject<dyn MTLBuffer>>> {
        let ptr = NonNull::new(data.as_ptr() as *mut c_void)
            .ok_or_else(|| self.compute_error("null host buffer"))?;
        unsafe {
            self.device.newBufferWithBytes_length_options(
                ptr,
                std::mem::size_of_val(data),
                MTLResourceOptions::StorageModeShared,
            )
        }
        .ok_or_else(|| self.compute_error("device buffer allocation failed"))
    }

    fn buffer(&self, len: usize) -> Result<Retained<ProtocolObject<dyn MTLBuffer>>> {
        self.device
            .newBufferWithLength_options(
                len * std::mem::size_of::<Element>(),
                MTLResourceOptions::StorageModeShared,
            )
            .ok_or_else(|| self.compute_error("device buffer allocation failed"))
    }

    fn wait(&self, cmd: &ProtocolObject<dyn MTLCommandBuffer>) -> Result<()> {
        cmd.commit();
        cmd.waitUntilCompleted();
        if cmd.status() == MTLCommandBufferStatus::Error {
            return Err(self.compute_error(format!("`{}` command buffer failed", self.entry)));
        }
        Ok(())
    }
}

/// # Safety
/// `buffer` must hold at least `count` elements.
unsafe fn read_elements(buffer: &ProtocolObject<dyn MTLBuffer>, count: usize) -> Vec<Element> {
    let ptr = buffer.contents().as_ptr() as *const Element;
    std::slice::from_raw_parts(ptr, count).to_vec()
}

impl LocalCompute for MetalCompute {
    fn name(&self) -> &'static str {
        "accelerator"
    }

    fn threads(&self) -> usize {
        1
    }

    fn multiply(&mut self, rows: &[Element], operand: &[Element], dim: usize) -> Result<Vec<Element>> {
        super::check_operand(operand, dim)?;
        if rows.is_empty() || dim == 0 {
            return Ok(Vec::new());
        }
        let n_rows = rows.len() / dim;
        let params = MatMulParams {
            rows: n_rows as u32,
            dim: dim as u32,
        };

        let buf_a = self.buffer_with_data(rows)?;
        let buf_b = self.buffer_with_data(operand)?;
        let buf_c = self.buffer(rows.len())?;

        let cmd = self
            .queue
            .commandBuffer()
            .ok_or_else(|| self.compute_error("failed to create command buffer"))?;
        let enc = cmd
            .computeCommandEncoder()
            .ok_or_else(|| self.compute_error("failed to create encoder"))?;

        let tile = square_tile(TILE, self.pipeline.maxTotalThreadsPerThreadgroup());
        enc.setComputePipelineState(&self.pipeline);
        unsafe {
            enc.setBuffer_offset_atIndex(Some(&*buf_a), 0, 0);
            enc.setBuffer_offset_atIndex(Some(&*buf_b), 0, 1);
            enc.setBuffer_offset_atIndex(Some(&*buf_c), 0, 2);
            enc.setBytes_length_atIndex(
                NonNull::from(&params).cast(),
                std::mem::size_of_val(&params),
                3,
            );
        }
        enc.dispatchThreads_threadsPerThreadgroup(
            MTLSize {
                width: dim,
                height: n_rows,
                depth: 1,
            },
            MTLSize {
                width: tile,
                height: tile,
                depth: 1,
            },
        );
        enc.endEncoding();
        self.wait(&cmd)?;

        Ok(unsafe { read_elements(&buf_c, rows.len()) })
    }

    fn sort(&mut self, shard: &mut [Element]) -> Result<()> {
        if shard.len() <= 1 {
            return Ok(());
        }

        // Pad to a power of two; the padding sorts to the tail.
        let padded = shard.len().next_power_of_two();
        let mut host = shard.to_vec();
        host.resize(padded, Element::MAX);
        let buf = self.buffer_with_data(&host)?;

        let tg_width = self.pipeline.maxTotalThreadsPerThreadgroup().min(256).min(padded);
        let cmd = self
            .queue
            .commandBuffer()
            .ok_or_else(|| self.compute_error("failed to create command buffer"))?;

        let mut k = 2;
        while k <= padded {
            let mut j = k / 2;
            while j > 0 {
                let params = BitonicParams {
                    j: j as u32,
                    k: k as u32,
                    count: padded as u32,
                    _pad: 0,
                };
                let enc = cmd
                    .computeCommandEncoder()
                    .ok_or_else(|| self.compute_error("failed to create encoder"))?;
                enc.setComputePipelineState(&self.pipeline);
                unsafe {
                    enc.setBuffer_offset_atIndex(Some(&*buf), 0, 0);
                    enc.setBytes_length_atIndex(
                        NonNull::from(&params).cast(),
                        std::mem::size_of_val(&params),
                        1,
                    );
                }
                enc.dispatchThreads_threadsPerThreadgroup(
                    MTLSize {
                        width: padded,
                        height: 1,
                        depth: 1,
                    },
                    MTLSize {
                        width: tg_width,
                        height: 1,
                        depth: 1,
                    },
                );
                enc.endEncoding();
                j /= 2;
            }
            k *= 2;
        }
        self.wait(&cmd)?;

        let sorted = unsafe { read_elements(&buf, shard.len()) };
        shard.copy_from_slice(&sorted);
        Ok(())
    }
}

impl Drop for MetalCompute {
    fn drop(&mut self) {
        tracing::debug!(rank = self.rank, entry = %self.entry, "releasing Metal resources");
    }
}
