use crate::u4;

/// A decoded CHIP-8 instruction.
///
/// Operand fields follow the usual naming: `x`/`y` are register indices,
/// `n` a 4-bit count, `nn` an 8-bit immediate and `nnn` a 12-bit address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 00E0 - Clear the display.
    ClearScreen,
    /// 00EE - Return from a subroutine.
    Return,

    /// 1nnn - Jump to nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to nnn + V0.
    JumpOffset { nnn: u16 },
    /// 2nnn - Call the subroutine at nnn.
    Call { nnn: u16 },

    /// 3xnn - Skip the next instruction if Vx == nn.
    SkipEqImm { x: u4, nn: u8 },
    /// 4xnn - Skip the next instruction if Vx != nn.
    SkipNeImm { x: u4, nn: u8 },
    /// 5xy0 - Skip the next instruction if Vx == Vy.
    SkipEqReg { x: u4, y: u4 },
    /// 9xy0 - Skip the next instruction if Vx != Vy.
    SkipNeReg { x: u4, y: u4 },

    /// 6xnn - Set Vx = nn.
    LoadImm { x: u4, nn: u8 },
    /// 7xnn - Set Vx = Vx + nn, without touching VF.
    AddImm { x: u4, nn: u8 },

    /// 8xyN - Arithmetic and logic on Vx/Vy.
    Alu { x: u4, y: u4, op: AluOp },
    /// Cxnn - Set Vx = random byte AND nn.
    Rand { x: u4, nn: u8 },

    /// Annn - Set I = nnn.
    LoadIndex { nnn: u16 },
    /// Fx1E - Set I = I + Vx.
    AddIndex { x: u4 },

    /// Dxyn - XOR-draw an n-row sprite from I at (Vx, Vy).
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip the next instruction if the key in Vx is pressed.
    SkipKeyPressed { x: u4 },
    /// ExA1 - Skip the next instruction if the key in Vx is not pressed.
    SkipKeyNotPressed { x: u4 },
    /// Fx0A - Wait for a key press and store the key in Vx.
    WaitKey { x: u4 },

    /// Fx07 - Set Vx = delay timer.
    LoadFromDelay { x: u4 },
    /// Fx15 - Set the delay timer = Vx.
    SetDelay { x: u4 },
    /// Fx18 - Set the sound timer = Vx.
    SetSound { x: u4 },

    /// Fx29 - Point I at the font glyph for the low nibble of Vx.
    FontSprite { x: u4 },
    /// Fx33 - Store the BCD digits of Vx at I, I+1, I+2.
    StoreBcd { x: u4 },

    /// Fx55 - Store V0..=Vx into memory starting at I.
    StoreRegs { x: u4 },
    /// Fx65 - Load V0..=Vx from memory starting at I.
    LoadRegs { x: u4 },

    /// A 16-bit code that matches no known instruction.
    Invalid(u16),
}

/// The nine operations selected by the low nibble of an 8xyN instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    /// 8xy0 - Vx = Vy
    Copy,
    /// 8xy1 - Vx |= Vy
    Or,
    /// 8xy2 - Vx &= Vy
    And,
    /// 8xy3 - Vx ^= Vy
    Xor,
    /// 8xy4 - Vx += Vy, VF = carry
    Add,
    /// 8xy5 - Vx -= Vy, VF = no borrow
    Sub,
    /// 8xy6 - VF = Vx & 1, Vx >>= 1
    ShiftRight,
    /// 8xy7 - Vx = Vy - Vx, VF = no borrow
    SubRev,
    /// 8xyE - VF = Vx >> 7, Vx <<= 1
    ShiftLeft,
}

impl Opcode {
    /// Decodes the two raw bytes of an instruction.
    ///
    /// Total and pure: anything that matches no known pattern comes back
    /// as [`Opcode::Invalid`], never as a silent no-op.
    pub fn decode(msb: u8, lsb: u8) -> Self {
        let code = u16::from_be_bytes([msb, lsb]);

        let x = u4::new(msb & 0x0F);
        let y = u4::new(lsb >> 4);
        let n = u4::new(lsb & 0x0F);
        let nn = lsb;
        let nnn = code & 0x0FFF;

        // The top nibble selects a coarse group; groups 0, 8, E and F need
        // a secondary lookup on the rest of the code.
        match msb >> 4 {
            0x0 => match code {
                0x00E0 => Opcode::ClearScreen,
                0x00EE => Opcode::Return,
                _ => Opcode::Invalid(code),
            },
            0x1 => Opcode::Jump { nnn },
            0x2 => Opcode::Call { nnn },
            0x3 => Opcode::SkipEqImm { x, nn },
            0x4 => Opcode::SkipNeImm { x, nn },
            0x5 if lsb & 0x0F == 0 => Opcode::SkipEqReg { x, y },
            0x6 => Opcode::LoadImm { x, nn },
            0x7 => Opcode::AddImm { x, nn },
            0x8 => {
                let op = match lsb & 0x0F {
                    0x0 => AluOp::Copy,
                    0x1 => AluOp::Or,
                    0x2 => AluOp::And,
                    0x3 => AluOp::Xor,
                    0x4 => AluOp::Add,
                    0x5 => AluOp::Sub,
                    0x6 => AluOp::ShiftRight,
                    0x7 => AluOp::SubRev,
                    0xE => AluOp::ShiftLeft,
                    _ => return Opcode::Invalid(code),
                };
                Opcode::Alu { x, y, op }
            }
            0x9 if lsb & 0x0F == 0 => Opcode::SkipNeReg { x, y },
            0xA => Opcode::LoadIndex { nnn },
            0xB => Opcode::JumpOffset { nnn },
            0xC => Opcode::Rand { x, nn },
            0xD => Opcode::Draw { x, y, n },
            0xE => match nn {
                0x9E => Opcode::SkipKeyPressed { x },
                0xA1 => Opcode::SkipKeyNotPressed { x },
                _ => Opcode::Invalid(code),
            },
            0xF => match nn {
                0x07 => Opcode::LoadFromDelay { x },
                0x0A => Opcode::WaitKey { x },
                0x15 => Opcode::SetDelay { x },
                0x18 => Opcode::SetSound { x },
                0x1E => Opcode::AddIndex { x },
                0x29 => Opcode::FontSprite { x },
                0x33 => Opcode::StoreBcd { x },
                0x55 => Opcode::StoreRegs { x },
                0x65 => Opcode::LoadRegs { x },
                _ => Opcode::Invalid(code),
            },
            _ => Opcode::Invalid(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(code: u16) -> Opcode {
        let [msb, lsb] = code.to_be_bytes();
        Opcode::decode(msb, lsb)
    }

    #[test]
    fn decodes_direct_groups() {
        assert_eq!(decode(0x00E0), Opcode::ClearScreen);
        assert_eq!(decode(0x00EE), Opcode::Return);
        assert_eq!(decode(0x1ABC), Opcode::Jump { nnn: 0xABC });
        assert_eq!(decode(0x2123), Opcode::Call { nnn: 0x123 });
        assert_eq!(decode(0xA456), Opcode::LoadIndex { nnn: 0x456 });
        assert_eq!(decode(0xB789), Opcode::JumpOffset { nnn: 0x789 });
        assert_eq!(
            decode(0x6A42),
            Opcode::LoadImm {
                x: u4::new(0xA),
                nn: 0x42
            }
        );
    }

    #[test]
    fn extracts_operands_uniformly() {
        assert_eq!(
            decode(0xD123),
            Opcode::Draw {
                x: u4::new(1),
                y: u4::new(2),
                n: u4::new(3)
            }
        );
        assert_eq!(
            decode(0x3C7F),
            Opcode::SkipEqImm {
                x: u4::new(0xC),
                nn: 0x7F
            }
        );
    }

    #[test]
    fn decodes_alu_sub_table() {
        for (low, op) in [
            (0x0, AluOp::Copy),
            (0x1, AluOp::Or),
            (0x2, AluOp::And),
            (0x3, AluOp::Xor),
            (0x4, AluOp::Add),
            (0x5, AluOp::Sub),
            (0x6, AluOp::ShiftRight),
            (0x7, AluOp::SubRev),
            (0xE, AluOp::ShiftLeft),
        ] {
            assert_eq!(
                decode(0x8120 | low),
                Opcode::Alu {
                    x: u4::new(1),
                    y: u4::new(2),
                    op
                }
            );
        }
    }

    #[test]
    fn decodes_misc_group() {
        assert_eq!(decode(0xF107), Opcode::LoadFromDelay { x: u4::new(1) });
        assert_eq!(decode(0xF20A), Opcode::WaitKey { x: u4::new(2) });
        assert_eq!(decode(0xF315), Opcode::SetDelay { x: u4::new(3) });
        assert_eq!(decode(0xF418), Opcode::SetSound { x: u4::new(4) });
        assert_eq!(decode(0xF51E), Opcode::AddIndex { x: u4::new(5) });
        assert_eq!(decode(0xF629), Opcode::FontSprite { x: u4::new(6) });
        assert_eq!(decode(0xF733), Opcode::StoreBcd { x: u4::new(7) });
        assert_eq!(decode(0xF855), Opcode::StoreRegs { x: u4::new(8) });
        assert_eq!(decode(0xF965), Opcode::LoadRegs { x: u4::new(9) });
    }

    #[test]
    fn rejects_undefined_codes() {
        assert_eq!(decode(0xFFFF), Opcode::Invalid(0xFFFF));
        assert_eq!(decode(0x0000), Opcode::Invalid(0x0000));
        assert_eq!(decode(0x5121), Opcode::Invalid(0x5121));
        assert_eq!(decode(0x9121), Opcode::Invalid(0x9121));
        assert_eq!(decode(0x8128), Opcode::Invalid(0x8128));
        assert_eq!(decode(0xE19F), Opcode::Invalid(0xE19F));
        assert_eq!(decode(0xF1FF), Opcode::Invalid(0xF1FF));
    }
}
