//! LLVM JIT compilation of the single-kernel wrapper.

use std::mem::ManuallyDrop;

use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use kbind_codegen::llvm::{emit_single_kernel, load_module};
use kbind_codegen::{KernelDescriptor, SideDataLayout};

use crate::config::BindConfig;
use crate::target::{host_machine, optimize, prepare_module};
use crate::{Error, Result};

/// A JIT-compiled module holding one single-kernel wrapper.
///
/// Uses Box<Context> for stable addressing and ManuallyDrop for correct drop order.
/// The machine code stays valid for as long as this value is alive.
pub struct JitModule {
    /// Owned context (heap-allocated, stable address).
    #[allow(dead_code)]
    context: Box<Context>,

    /// Module referencing the context (dropped before context).
    /// SAFETY: 'static lifetime is a lie, but safe because:
    /// 1. Context is boxed (stable address)
    /// 2. Module is dropped before Context in Drop impl
    module: ManuallyDrop<Module<'static>>,

    /// Execution engine referencing the module (dropped first).
    execution_engine: ManuallyDrop<ExecutionEngine<'static>>,

    /// Address of the wrapper's machine code.
    entry: usize,

    /// Wrapper symbol name.
    name: String,
}

// SAFETY: after construction only `entry` is read. The context, module and
// engine are never touched again until Drop, and the machine code is immutable.
unsafe impl Send for JitModule {}
unsafe impl Sync for JitModule {}

impl JitModule {
    /// Parse the kernel source, emit the wrapper, optimize and JIT-compile it.
    ///
    /// `layout` must have been planned from `descriptor`.
    pub fn compile(descriptor: &KernelDescriptor, layout: &SideDataLayout, config: &BindConfig) -> Result<Self> {
        let machine = host_machine(config)?;

        let context = Box::new(Context::create());
        // SAFETY: We extend lifetime to 'static, but maintain safety by:
        // 1. Context is boxed - stable address, won't move
        // 2. We manually control drop order in Drop impl
        // 3. Module/Engine never outlive the context
        let context_ref: &'static Context = unsafe { &*(context.as_ref() as *const Context) };

        let module = load_module(descriptor.source(), descriptor.function(), context_ref)?;
        let wrapper = emit_single_kernel(context_ref, &module, descriptor, layout)?;
        let name = wrapper.get_name().to_string_lossy().into_owned();

        prepare_module(&module, context_ref, &machine, config);
        optimize(&module, &machine, config)?;

        let execution_engine = module
            .create_jit_execution_engine(config.opt_level.codegen_level())
            .map_err(|e| Error::JitCompilation { reason: e.to_string() })?;

        let entry = match execution_engine.get_function_address(&name) {
            Ok(address) if address != 0 => address,
            _ => return Err(Error::FunctionNotFound { name }),
        };

        tracing::debug!(wrapper = %name, entry = format_args!("{entry:#x}"), "jit-compiled wrapper");

        Ok(Self {
            context,
            module: ManuallyDrop::new(module),
            execution_engine: ManuallyDrop::new(execution_engine),
            entry,
            name,
        })
    }

    /// Address of the compiled wrapper.
    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for JitModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitModule").field("name", &self.name).field("entry", &format_args!("{:#x}", self.entry)).finish()
    }
}

impl Drop for JitModule {
    fn drop(&mut self) {
        // SAFETY: Drop in reverse dependency order
        // ExecutionEngine -> Module -> Context
        unsafe {
            ManuallyDrop::drop(&mut self.execution_engine);
            ManuallyDrop::drop(&mut self.module);
        }
    }
}
