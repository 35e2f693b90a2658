//! Binding kernels and invoking them through the single-kernel ABI.

use std::sync::Arc;

use kbind_codegen::{KernelDescriptor, SideDataLayout};
use snafu::ensure;

use crate::binder::ShapeBinder;
use crate::config::BindConfig;
use crate::error::*;
use crate::jit::JitModule;
use crate::shape::DataDescriptor;
use crate::side_data::SideDataBlock;

/// The fixed ABI of every wrapper: `(dst_ptr, src_ptrs, extra_ptr) -> void`.
pub type SingleKernelFn = unsafe extern "C" fn(*mut u8, *const *const u8, *mut u8);

/// Bind `descriptor` with the default (conservative) configuration.
pub fn bind(descriptor: &KernelDescriptor) -> Result<UnboundKernel> {
    bind_with_config(descriptor, &BindConfig::default())
}

/// Plan the side-data layout, emit and JIT-compile the wrapper, and build the shape binder.
///
/// Layout planning runs first, so unsupported kinds, layouts and dimensions are
/// reported before the kernel source is even parsed.
#[tracing::instrument(skip_all, fields(kernel = %descriptor.function()))]
pub fn bind_with_config(descriptor: &KernelDescriptor, config: &BindConfig) -> Result<UnboundKernel> {
    let layout = SideDataLayout::plan(descriptor)?;
    let handle = JitModule::compile(descriptor, &layout, config)?;

    // SAFETY: the wrapper at this address was emitted with the `SingleKernelFn`
    // signature and lives as long as `handle`.
    let entry = unsafe { std::mem::transmute::<usize, SingleKernelFn>(handle.entry()) };
    let binder = ShapeBinder::new(descriptor, &layout);

    Ok(UnboundKernel {
        name: descriptor.function().to_string(),
        entry,
        layout: Arc::new(layout),
        binder: Arc::new(binder),
        handle: Arc::new(handle),
        inputs: descriptor.inputs().len(),
    })
}

/// A JIT-compiled wrapper whose dynamic shapes are not yet supplied.
///
/// Cloning shares the compiled module; `entry` is valid while any clone, any
/// [`BoundKernel`] made from it, or a retained [`UnboundKernel::handle`] is alive.
#[derive(Debug, Clone)]
pub struct UnboundKernel {
    name: String,
    entry: SingleKernelFn,
    layout: Arc<SideDataLayout>,
    binder: Arc<ShapeBinder>,
    handle: Arc<JitModule>,
    inputs: usize,
}

impl UnboundKernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> SingleKernelFn {
        self.entry
    }

    pub fn layout(&self) -> &SideDataLayout {
        &self.layout
    }

    pub fn binder(&self) -> &ShapeBinder {
        &self.binder
    }

    /// Keep-alive handle of the compiled module.
    pub fn handle(&self) -> &Arc<JitModule> {
        &self.handle
    }

    /// Number of source operands.
    pub fn arity(&self) -> usize {
        self.inputs
    }

    /// A zeroed side-data block for this kernel's layout.
    pub fn new_side_data(&self) -> SideDataBlock {
        SideDataBlock::new(&self.layout)
    }

    /// Allocate a side-data block and bind the shapes of `dst` and `srcs` into it.
    pub fn bind_shapes(&self, dst: &dyn DataDescriptor, srcs: &[&dyn DataDescriptor]) -> Result<BoundKernel> {
        let mut side_data = self.new_side_data();
        self.binder.bind(&mut side_data, dst, srcs)?;
        Ok(BoundKernel { kernel: self.clone(), side_data })
    }

    /// Invoke the wrapper once.
    ///
    /// # Safety
    ///
    /// `dst` and every pointer in `srcs` must be valid for the kind and shape of
    /// their operand, and `side_data` must hold the shapes of those operands.
    pub unsafe fn call(&self, dst: *mut u8, srcs: &[*const u8], side_data: &SideDataBlock) -> Result<()> {
        ensure!(srcs.len() == self.inputs, ArityMismatchSnafu { expected: self.inputs, actual: srcs.len() });
        let slots = self.layout.slot_count();
        ensure!(side_data.len() == slots, SideDataSizeSnafu { expected: slots, actual: side_data.len() });

        unsafe { (self.entry)(dst, srcs.as_ptr(), side_data.as_ptr().cast_mut()) };
        Ok(())
    }
}

/// A kernel together with a side-data block holding bound shapes.
#[derive(Debug, Clone)]
pub struct BoundKernel {
    kernel: UnboundKernel,
    side_data: SideDataBlock,
}

impl BoundKernel {
    pub fn kernel(&self) -> &UnboundKernel {
        &self.kernel
    }

    pub fn side_data(&self) -> &SideDataBlock {
        &self.side_data
    }

    pub fn side_data_mut(&mut self) -> &mut SideDataBlock {
        &mut self.side_data
    }

    /// Re-run the shape binder after shapes changed.
    pub fn rebind(&mut self, dst: &dyn DataDescriptor, srcs: &[&dyn DataDescriptor]) -> Result<()> {
        self.kernel.binder.bind(&mut self.side_data, dst, srcs)
    }

    /// Invoke the wrapper once with the bound side data.
    ///
    /// # Safety
    ///
    /// See [`UnboundKernel::call`].
    pub unsafe fn call(&self, dst: *mut u8, srcs: &[*const u8]) -> Result<()> {
        unsafe { self.kernel.call(dst, srcs, &self.side_data) }
    }

    /// Invoke the wrapper `count` times, advancing each operand by its byte stride.
    ///
    /// A stride of zero repeats the same operand for every element.
    ///
    /// # Safety
    ///
    /// Every `ptr + i * stride` for `i < count` must satisfy the contract of
    /// [`UnboundKernel::call`].
    pub unsafe fn call_strided(
        &self,
        dst: *mut u8,
        dst_stride: isize,
        srcs: &[*const u8],
        src_strides: &[isize],
        count: usize,
    ) -> Result<()> {
        let expected = self.kernel.inputs;
        ensure!(srcs.len() == expected, ArityMismatchSnafu { expected, actual: srcs.len() });
        ensure!(src_strides.len() == expected, ArityMismatchSnafu { expected, actual: src_strides.len() });

        let mut args = srcs.to_vec();
        for i in 0..count {
            let step = i as isize;
            for ((arg, src), stride) in args.iter_mut().zip(srcs).zip(src_strides) {
                *arg = src.wrapping_offset(step * stride);
            }
            unsafe { self.kernel.call(dst.wrapping_offset(step * dst_stride), &args, &self.side_data)? };
        }
        Ok(())
    }
}
