//! Loading kernel source into an inkwell module.

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;

use crate::descriptor::KernelSource;
use crate::error::*;

/// Parse `source` into a new module owned by `context`.
pub fn load_module<'ctx>(source: &KernelSource, name: &str, context: &'ctx Context) -> Result<Module<'ctx>> {
    let module = match source {
        KernelSource::Ir(ir) => {
            let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), name);
            context.create_module_from_ir(buffer)
        }
        KernelSource::Bitcode(bytes) => {
            let buffer = MemoryBuffer::create_from_memory_range_copy(bytes, name);
            Module::parse_bitcode_from_buffer(&buffer, context)
        }
    };
    module.map_err(|e| Error::KernelParse { reason: e.to_string() })
}
