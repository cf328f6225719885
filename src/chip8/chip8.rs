use super::{
    Audio, Chip8Error, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, Keypad, Opcode, Screen,
    StepResult,
};

pub(crate) const PROG_START_ADDRESS: usize = 0x200;
pub(crate) const MEMORY_SIZE: usize = 4096;
pub(crate) const STACK_DEPTH: usize = 16;

/// The CHIP-8 virtual machine: memory, registers and timers, plus the
/// screen/keypad/audio collaborators it drives.
///
/// The collaborators are owned by the machine and accessed synchronously
/// from [`Chip8::step`] and [`Chip8::tick_timers`]; there is no other
/// coupling to the outside world.
pub struct Chip8<S, K, A> {
    /// 4KiB address space holding the font, the program and scratch data.
    pub(crate) memory: [u8; MEMORY_SIZE],

    /// Program counter: address of the next instruction.
    pub(crate) pc: u16,
    /// Index register: points at memory for sprite/BCD/register-block ops.
    pub(crate) i: u16,
    /// General-purpose registers V0-VF. VF doubles as the flag register.
    pub(crate) v: [u8; 16],

    /// Fixed-depth call stack of return addresses.
    pub(crate) stack: [u16; STACK_DEPTH],
    /// Number of return addresses currently on the stack.
    pub(crate) sp: usize,

    /// Delay timer: counts down to zero at 60Hz.
    pub(crate) delay: u8,
    /// Sound timer: counts down to zero at 60Hz, tone plays while non-zero.
    pub(crate) sound: u8,

    pub screen: S,
    pub keypad: K,
    pub audio: A,
}

impl<S: Screen, K: Keypad, A: Audio> Chip8<S, K, A> {
    /// Creates a machine with the built-in font loaded and the program
    /// counter at the start of the loadable region.
    pub fn new(screen: S, keypad: K, audio: A) -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);

        Chip8 {
            memory,
            pc: PROG_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: [0; STACK_DEPTH],
            sp: 0,
            delay: 0,
            sound: 0,
            screen,
            keypad,
            audio,
        }
    }

    /// Loads raw program bytes verbatim at 0x200 and resets the program
    /// counter. There is no header and no validation beyond the size check.
    pub fn load(&mut self, prog: &[u8]) -> Result<(), Chip8Error> {
        let prog_end = PROG_START_ADDRESS + prog.len();

        self.memory
            .get_mut(PROG_START_ADDRESS..prog_end)
            .ok_or(Chip8Error::ProgramTooLarge {
                size: prog.len(),
                max: MEMORY_SIZE - PROG_START_ADDRESS,
            })?
            .copy_from_slice(prog);

        self.pc = PROG_START_ADDRESS as u16;

        Ok(())
    }

    /// Executes a single instruction: fetch, decode, execute.
    pub fn step(&mut self) -> Result<StepResult, Chip8Error> {
        let (msb, lsb) = self.fetch()?;
        self.pc = self.pc.wrapping_add(2);

        self.execute(Opcode::decode(msb, lsb))
    }

    /// Counts the timers down. Must be called at a logical 60Hz,
    /// independently of how many instructions execute per frame.
    ///
    /// This is the only place the audio collaborator is driven: the tone is
    /// requested on while the sound timer is running down and off otherwise.
    pub fn tick_timers(&mut self) {
        if self.delay > 0 {
            self.delay -= 1;
        }

        if self.sound > 0 {
            self.sound -= 1;
            self.audio.set_tone_active(true);
        } else {
            self.audio.set_tone_active(false);
        }
    }

    /// Returns true while the sound timer is running, for frontends that
    /// poll instead of implementing [`Audio`].
    pub fn should_beep(&self) -> bool {
        self.sound > 0
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn regs(&self) -> &[u8; 16] {
        &self.v
    }

    /// The active portion of the call stack, bottom first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    /// Reads the two instruction bytes at the program counter.
    fn fetch(&self) -> Result<(u8, u8), Chip8Error> {
        let msb = self.mem_read(self.pc)?;
        let lsb = self.mem_read(self.pc.wrapping_add(1))?;

        Ok((msb, lsb))
    }

    pub(crate) fn mem_read(&self, addr: u16) -> Result<u8, Chip8Error> {
        self.memory
            .get(addr as usize)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })
    }

    pub(crate) fn mem_write(&mut self, addr: u16, value: u8) -> Result<(), Chip8Error> {
        *self
            .memory
            .get_mut(addr as usize)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })? = value;

        Ok(())
    }
}

impl<S: Screen + Default, K: Keypad + Default, A: Audio + Default> Default for Chip8<S, K, A> {
    fn default() -> Self {
        Self::new(S::default(), K::default(), A::default())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{FrameBuffer, KeypadState, NullAudio};
    use super::*;

    type TestChip8 = Chip8<FrameBuffer, KeypadState, NullAudio>;

    #[test]
    fn loads_font_at_construction() {
        let chip8 = TestChip8::default();

        assert_eq!(
            &chip8.memory()[FONT_START_ADDRESS..FONT_END_ADDRESS],
            &FONT
        );
    }

    #[test]
    fn rejects_oversized_program() {
        let mut chip8 = TestChip8::default();
        let max = MEMORY_SIZE - PROG_START_ADDRESS;

        let too_big = vec![0; max + 1];
        assert!(matches!(
            chip8.load(&too_big),
            Err(Chip8Error::ProgramTooLarge { size, max: m }) if size == max + 1 && m == max
        ));

        // Exactly filling the region is fine
        let just_fits = vec![0xAA; max];
        assert!(chip8.load(&just_fits).is_ok());
        assert_eq!(chip8.memory()[MEMORY_SIZE - 1], 0xAA);
    }

    #[test]
    fn timers_count_down_and_stop_at_zero() {
        let mut chip8 = TestChip8::default();
        chip8.delay = 2;
        chip8.sound = 1;

        chip8.tick_timers();
        assert_eq!(chip8.delay_timer(), 1);
        assert_eq!(chip8.sound_timer(), 0);

        chip8.tick_timers();
        chip8.tick_timers();
        assert_eq!(chip8.delay_timer(), 0);
        assert_eq!(chip8.sound_timer(), 0);
    }

    #[test]
    fn sound_timer_drives_the_audio_collaborator() {
        /// Records the last tone request.
        #[derive(Default)]
        struct ToneProbe {
            active: Option<bool>,
        }

        impl Audio for ToneProbe {
            fn set_tone_active(&mut self, active: bool) {
                self.active = Some(active);
            }
        }

        let mut chip8: Chip8<FrameBuffer, KeypadState, ToneProbe> = Chip8::default();

        chip8.sound = 2;
        chip8.tick_timers();
        assert_eq!(chip8.audio.active, Some(true));
        chip8.tick_timers();
        assert_eq!(chip8.audio.active, Some(true));
        chip8.tick_timers();
        assert_eq!(chip8.audio.active, Some(false));
    }

    #[test]
    fn fetch_past_end_of_memory_is_an_error() {
        let mut chip8 = TestChip8::default();
        chip8.pc = (MEMORY_SIZE - 1) as u16;

        assert!(matches!(
            chip8.step(),
            Err(Chip8Error::MemoryOutOfBounds { address }) if address == MEMORY_SIZE as u16
        ));
    }
}
