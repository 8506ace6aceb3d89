//! Crash-dump diagnostics.
//!
//! When dump-on-crash is enabled, a failed run prints the constants table,
//! code listing, register file and evaluation stack to stderr before the
//! error propagates. Stdout stays clean for emitted records.

use crate::vm::Vm;

pub(crate) fn dump_state(vm: &Vm) {
    eprintln!("====== VM STATE ======");
    dump_constants(vm);
    dump_code(vm);
    dump_registers(vm);
    dump_stack(vm);
    eprintln!("======================");
}

fn dump_constants(vm: &Vm) {
    eprintln!("Constants table:");
    for (index, constant) in vm.program.constants.iter().enumerate() {
        eprintln!("  [{index}] = {constant}");
    }
    if vm.program.constants.is_empty() {
        eprintln!("  <empty>");
    }
}

fn dump_code(vm: &Vm) {
    eprintln!("Code listing:");
    for (index, op) in vm.program.code.iter().enumerate() {
        let marker = if index == vm.pc { '*' } else { ' ' };
        eprintln!("  {marker} {index} : {op}");
    }
}

fn dump_registers(vm: &Vm) {
    eprintln!("Registers:");
    for (index, register) in vm.registers.iter().enumerate() {
        match register {
            Some(value) => eprintln!("  [{index}] = {value}"),
            None => eprintln!("  [{index}] = <empty>"),
        }
    }
    if vm.registers.is_empty() {
        eprintln!("  <empty>");
    }
}

fn dump_stack(vm: &Vm) {
    eprintln!("Stack:");
    for (depth, value) in vm.stack.iter().rev().enumerate() {
        let marker = if depth == 0 { '→' } else { '|' };
        eprintln!("  {marker} {value}");
    }
    if vm.stack.is_empty() {
        eprintln!("  <empty>");
    }
}
