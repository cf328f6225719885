use super::commands::{BreakpointAction, Command, CommandError, CommandResult, SetTarget};
use crate::chip8::{
    Chip8, Chip8Error, Display, FrameBuffer, KeypadState, NullAudio, Opcode, Runner, RunnerResult,
};
use crate::u4;
use std::collections::HashSet;

/// The machine configuration the debugger runs: stock screen and keypad,
/// no sound output.
pub type DebugChip8 = Chip8<FrameBuffer, KeypadState, NullAudio>;
type DebugRunner = Runner<FrameBuffer, KeypadState, NullAudio>;

/// Executes debugger commands against a machine that is either paused or
/// free-running with breakpoints.
pub struct Executor {
    is_running: bool,
    runner: DebugRunner,
    breakpoints: HashSet<u16>,
}

impl Executor {
    pub fn new(chip8: DebugChip8) -> Self {
        Self {
            is_running: false,
            runner: Runner::new(chip8),
            breakpoints: HashSet::new(),
        }
    }

    /// Advances execution when in running mode; pauses on breakpoints and
    /// on errors.
    pub fn poll(&mut self, dt: f32) -> Result<RunnerResult, Chip8Error> {
        if !self.is_running {
            return Ok(RunnerResult::Ok);
        }

        let result = self
            .runner
            .update_with_breakpoints(dt, Some(&self.breakpoints));

        if matches!(result, Err(_) | Ok(RunnerResult::HitBreakpoint)) {
            self.is_running = false;
        }

        result
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Run => {
                self.run();
                Ok(CommandResult::Ok)
            }
            Command::Pause => {
                self.pause();
                Ok(CommandResult::Ok)
            }
            Command::Step => {
                self.runner.chip8_mut().step()?;
                Ok(CommandResult::Ok)
            }
            Command::Breakpoint { action } => self.handle_breakpoint(action),
            Command::Set { target, value } => self.handle_set(target, value),
            Command::Mem { start, len } => Ok(self.handle_mem(start, len)),
            Command::Disasm { start, count } => Ok(self.handle_disasm(start, count)),
            Command::Quit => Ok(CommandResult::Quit),
        }
    }

    pub fn run(&mut self) {
        self.is_running = true;
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn display(&self) -> &Display<bool> {
        self.runner.chip8_ref().screen.pixels()
    }

    pub fn pc(&self) -> u16 {
        self.runner.chip8_ref().pc()
    }

    pub fn index(&self) -> u16 {
        self.runner.chip8_ref().index()
    }

    pub fn regs(&self) -> &[u8; 16] {
        self.runner.chip8_ref().regs()
    }

    pub fn stack(&self) -> &[u16] {
        self.runner.chip8_ref().stack()
    }

    pub fn delay_timer(&self) -> u8 {
        self.runner.chip8_ref().delay_timer()
    }

    pub fn sound_timer(&self) -> u8 {
        self.runner.chip8_ref().sound_timer()
    }

    pub fn keypad(&self) -> &[bool; 16] {
        self.runner.chip8_ref().keypad.keys()
    }

    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.runner.chip8_mut().keypad.set_key(key, pressed);
    }

    fn handle_breakpoint(
        &mut self,
        action: BreakpointAction,
    ) -> Result<CommandResult, CommandError> {
        match action {
            BreakpointAction::Set { addr } => {
                self.breakpoints.insert(addr);
            }
            BreakpointAction::Clear { addr } => {
                self.breakpoints.remove(&addr);
            }
            BreakpointAction::ClearAll => {
                self.breakpoints.clear();
            }
            BreakpointAction::List => {
                let mut breakpoints: Vec<u16> = self.breakpoints.iter().copied().collect();
                breakpoints.sort();
                return Ok(CommandResult::Breakpoints(breakpoints));
            }
        };

        Ok(CommandResult::Ok)
    }

    fn handle_set(&mut self, target: SetTarget, value: u16) -> Result<CommandResult, CommandError> {
        let chip8 = self.runner.chip8_mut();

        match target {
            SetTarget::V(reg) => {
                if value > 0xFF {
                    return Err(CommandError::ValueOutOfRange);
                }
                chip8.v[reg] = value as u8;
            }
            SetTarget::I => {
                if value > 0xFFF {
                    return Err(CommandError::ValueOutOfRange);
                }
                chip8.i = value;
            }
            SetTarget::Pc => {
                if value > 0xFFF {
                    return Err(CommandError::ValueOutOfRange);
                }
                chip8.pc = value;
            }
        }

        Ok(CommandResult::Ok)
    }

    fn handle_mem(&self, start: u16, len: u16) -> CommandResult {
        let memory = self.runner.chip8_ref().memory();

        let from = (start as usize).min(memory.len());
        let to = (from + len as usize).min(memory.len());

        CommandResult::MemDump {
            data: memory[from..to].to_vec(),
            offset: from as u16,
        }
    }

    fn handle_disasm(&self, start: u16, count: u16) -> CommandResult {
        let memory = self.runner.chip8_ref().memory();

        let instructions = (0..count as usize)
            .map_while(|i| {
                let addr = start as usize + i * 2;
                let (&msb, &lsb) = (memory.get(addr)?, memory.get(addr + 1)?);

                Some((
                    u16::from_be_bytes([msb, lsb]),
                    Opcode::decode(msb, lsb),
                ))
            })
            .collect();

        CommandResult::Disasm {
            instructions,
            offset: start,
        }
    }
}
