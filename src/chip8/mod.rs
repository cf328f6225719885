mod bus;
mod chip8;
mod execute;
mod font;
mod opcode;
mod runner;
mod types;

pub use bus::*;
pub use chip8::*;
pub use font::*;
pub use opcode::*;
pub use runner::*;
pub use types::*;
