use clap::{Parser, Subcommand};
use clap_num::maybe_hex;

use crate::chip8::Opcode;
use crate::u4;

/// Grammar of the interactive debugger prompt.
#[derive(Parser)]
#[command(multicall = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Resume execution.
    #[command(visible_alias = "r")]
    Run,

    /// Pause execution.
    #[command(visible_alias = "p")]
    Pause,

    /// Execute a single instruction.
    #[command(visible_alias = "s")]
    Step,

    /// Manage breakpoints.
    #[command(visible_alias = "b")]
    Breakpoint {
        #[command(subcommand)]
        action: BreakpointAction,
    },

    /// Write a register (v0-vf, i or pc).
    Set {
        #[arg(value_parser = parse_set_target)]
        target: SetTarget,
        #[arg(value_parser = maybe_hex::<u16>)]
        value: u16,
    },

    /// Dump a region of memory.
    #[command(visible_alias = "m")]
    Mem {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "64", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    /// Disassemble instructions.
    #[command(visible_alias = "d")]
    Disasm {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "16", value_parser = maybe_hex::<u16>)]
        count: u16,
    },

    #[command(visible_alias = "q")]
    Quit,
}

#[derive(Subcommand, Clone)]
pub enum BreakpointAction {
    #[command(visible_alias = "s")]
    Set {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "c")]
    Clear {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "l")]
    List,

    #[command(visible_alias = "ca")]
    ClearAll,
}

pub enum CommandResult {
    Ok,
    Breakpoints(Vec<u16>),
    MemDump { data: Vec<u8>, offset: u16 },
    Disasm { instructions: Vec<(u16, Opcode)>, offset: u16 },
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("error while executing cpu instruction: {0}")]
    Chip8Error(#[from] crate::chip8::Chip8Error),
    #[error("value out of range")]
    ValueOutOfRange,
}

#[derive(Clone)]
pub enum SetTarget {
    V(u4),
    I,
    Pc,
}

fn parse_set_target(s: &str) -> Result<SetTarget, String> {
    let lower = s.to_lowercase();

    match lower.as_str() {
        "index" | "i" => Ok(SetTarget::I),
        "pc" => Ok(SetTarget::Pc),

        _ if lower.starts_with('v') => match u8::from_str_radix(&lower[1..], 16) {
            Ok(val) if val < 16 => Ok(SetTarget::V(u4::new(val))),
            _ => Err(format!("Invalid register: '{}'", s)),
        },

        _ => Err(format!("Unknown set target: '{}'", s)),
    }
}
