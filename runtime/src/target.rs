//! Host target selection and the optimization pipeline.

use inkwell::attributes::AttributeLoc;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine};

use crate::config::{BindConfig, OptLevel};
use crate::{Error, Result};

/// Initialize the native target and create a machine for `config`.
pub fn host_machine(config: &BindConfig) -> Result<TargetMachine> {
    Target::initialize_native(&InitializationConfig::default()).map_err(|reason| Error::TargetInit { reason })?;

    let triple = TargetMachine::get_default_triple();
    let target = Target::from_triple(&triple).map_err(|e| Error::TargetInit { reason: e.to_string() })?;
    let cpu = target_cpu(config);

    target
        .create_target_machine(
            &triple,
            &cpu,
            &config.features,
            config.opt_level.codegen_level(),
            RelocMode::Default,
            CodeModel::JITDefault,
        )
        .ok_or_else(|| Error::TargetMachine { triple: triple.as_str().to_string_lossy().into_owned() })
}

fn target_cpu(config: &BindConfig) -> String {
    match &config.cpu {
        Some(cpu) => cpu.clone(),
        None => TargetMachine::get_host_cpu_name().to_string(),
    }
}

/// Stamp the machine's triple, data layout, cpu and features onto `module`.
///
/// The JIT picks its subtarget per function, so every defined function gets
/// the `target-cpu` and `target-features` attributes.
pub fn prepare_module(module: &Module<'_>, context: &Context, machine: &TargetMachine, config: &BindConfig) {
    module.set_triple(&machine.get_triple());
    module.set_data_layout(&machine.get_target_data().get_data_layout());

    let cpu = context.create_string_attribute("target-cpu", &target_cpu(config));
    let features = context.create_string_attribute("target-features", &config.features);
    for function in module.get_functions().filter(|f| f.count_basic_blocks() > 0) {
        function.remove_string_attribute(AttributeLoc::Function, "target-cpu");
        function.remove_string_attribute(AttributeLoc::Function, "target-features");
        function.add_attribute(AttributeLoc::Function, cpu);
        function.add_attribute(AttributeLoc::Function, features);
    }
}

/// Verify (if configured) and optimize `module`.
pub fn optimize(module: &Module<'_>, machine: &TargetMachine, config: &BindConfig) -> Result<()> {
    if config.verify {
        module.verify().map_err(|e| Error::Optimization { reason: format!("verification failed: {e}") })?;
    }

    if config.opt_level == OptLevel::None {
        return Ok(());
    }

    let options = PassBuilderOptions::create();
    options.set_loop_vectorization(config.vectorize);
    options.set_loop_slp_vectorization(config.vectorize);
    options.set_loop_unrolling(true);

    module
        .run_passes(config.opt_level.pipeline(), machine, options)
        .map_err(|e| Error::Optimization { reason: e.to_string() })?;

    tracing::trace!(pipeline = config.opt_level.pipeline(), ir = %module.print_to_string().to_string(), "optimized");
    Ok(())
}
