/// Result of a single fetch-decode-execute step.
pub enum StepResult {
    /// Keep executing instructions in the current frame.
    Continue,
    /// Stop executing until the next frame
    /// (after a draw, or while the key-wait instruction is parked).
    YieldFrame,
}

/// Fatal conditions of the CHIP-8 machine. None of these are recoverable;
/// the driver is expected to terminate the run and report them.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("program is too large ({size} bytes), {max} bytes available")]
    ProgramTooLarge { size: usize, max: usize },

    #[error("invalid opcode {opcode:#06X} at address {address:#05X}")]
    InvalidOpcode { opcode: u16, address: u16 },

    #[error("call stack overflow at address {address:#05X}")]
    StackOverflow { address: u16 },

    #[error("return with an empty call stack at address {address:#05X}")]
    StackUnderflow { address: u16 },

    #[error("memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: u16 },
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the 64x32 display grid, row-major.
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];
