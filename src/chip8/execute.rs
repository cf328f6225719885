use super::chip8::STACK_DEPTH;
use super::{
    AluOp, Audio, Chip8, Chip8Error, DISPLAY_X, DISPLAY_Y, FONT_CHAR_SIZE, FONT_START_ADDRESS,
    Keypad, Opcode, Screen, StepResult,
};
use crate::u4;

impl<S: Screen, K: Keypad, A: Audio> Chip8<S, K, A> {
    /// Applies one decoded instruction. The program counter has already
    /// been advanced past it, so jump targets simply overwrite `pc` and a
    /// skip adds a further 2.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<StepResult, Chip8Error> {
        match opcode {
            Opcode::ClearScreen => {
                self.screen.clear();
                self.screen.request_refresh();
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                if self.sp == STACK_DEPTH {
                    return Err(Chip8Error::StackOverflow {
                        address: self.pc.wrapping_sub(2),
                    });
                }
                self.stack[self.sp] = self.pc;
                self.sp += 1;
                self.pc = nnn;
            }
            Opcode::Return => {
                if self.sp == 0 {
                    return Err(Chip8Error::StackUnderflow {
                        address: self.pc.wrapping_sub(2),
                    });
                }
                self.sp -= 1;
                self.pc = self.stack[self.sp];
            }
            Opcode::SkipEqImm { x, nn } => {
                if self.v[x] == nn {
                    self.skip();
                }
            }
            Opcode::SkipNeImm { x, nn } => {
                if self.v[x] != nn {
                    self.skip();
                }
            }
            Opcode::SkipEqReg { x, y } => {
                if self.v[x] == self.v[y] {
                    self.skip();
                }
            }
            Opcode::SkipNeReg { x, y } => {
                if self.v[x] != self.v[y] {
                    self.skip();
                }
            }
            Opcode::LoadImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddImm { x, nn } => {
                // Wraps silently, no flag effect
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::Alu { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Rand { x, nn } => {
                self.v[x] = rand::random::<u8>() & nn;
            }
            Opcode::LoadIndex { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndex { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::SkipKeyPressed { x } => {
                if self.keypad.is_pressed(u4::new(self.v[x] & 0x0F)) {
                    self.skip();
                }
            }
            Opcode::SkipKeyNotPressed { x } => {
                if !self.keypad.is_pressed(u4::new(self.v[x] & 0x0F)) {
                    self.skip();
                }
            }
            Opcode::WaitKey { x } => {
                return Ok(self.execute_wait_key(x));
            }
            Opcode::LoadFromDelay { x } => {
                self.v[x] = self.delay;
            }
            Opcode::SetDelay { x } => {
                self.delay = self.v[x];
            }
            Opcode::SetSound { x } => {
                self.sound = self.v[x];
            }
            Opcode::FontSprite { x } => {
                let digit = (self.v[x] & 0x0F) as usize;
                self.i = (FONT_START_ADDRESS + digit * FONT_CHAR_SIZE) as u16;
            }
            Opcode::StoreBcd { x } => {
                let value = self.v[x];
                self.mem_write(self.i, value / 100)?;
                self.mem_write(self.i.wrapping_add(1), (value / 10) % 10)?;
                self.mem_write(self.i.wrapping_add(2), value % 10)?;
            }
            Opcode::StoreRegs { x } => {
                // I itself is left unchanged (CHIP-48 behavior)
                for offset in 0..=u16::from(x) {
                    self.mem_write(self.i.wrapping_add(offset), self.v[offset as usize])?;
                }
            }
            Opcode::LoadRegs { x } => {
                for offset in 0..=u16::from(x) {
                    self.v[offset as usize] = self.mem_read(self.i.wrapping_add(offset))?;
                }
            }
            Opcode::Invalid(opcode) => {
                return Err(Chip8Error::InvalidOpcode {
                    opcode,
                    address: self.pc.wrapping_sub(2),
                });
            }
        };

        Ok(StepResult::Continue)
    }

    /// Skip the next 2-byte instruction.
    fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: AluOp) {
        match op {
            AluOp::Copy => {
                self.v[x] = self.v[y];
            }
            AluOp::Or => {
                self.v[x] |= self.v[y];
            }
            AluOp::And => {
                self.v[x] &= self.v[y];
            }
            AluOp::Xor => {
                self.v[x] ^= self.v[y];
            }
            // For the three flag-setting operations below, the flag comes
            // from the pre-write operand values and is stored after the
            // result, so it wins when Vx aliases VF.
            AluOp::Add => {
                let (res, carry) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = carry as u8;
            }
            AluOp::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = !borrow as u8; // the flag means "no borrow"
            }
            AluOp::SubRev => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = res;
                self.v[0xF] = !borrow as u8;
            }
            // Shifts write the flag first, then the shifted value (CHIP-48:
            // the shift operates on Vx, not Vy).
            AluOp::ShiftRight => {
                self.v[0xF] = self.v[x] & 0x01;
                self.v[x] >>= 1;
            }
            AluOp::ShiftLeft => {
                self.v[0xF] = self.v[x] >> 7;
                self.v[x] <<= 1;
            }
        }
    }

    /// XOR-blits an `n`-row sprite read from memory at `I` to
    /// `(Vx mod 64, Vy mod 32)`, setting VF when any on pixel is erased.
    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<StepResult, Chip8Error> {
        let x_pos = self.v[x] as usize % DISPLAY_X;
        let y_pos = self.v[y] as usize % DISPLAY_Y;

        // Sprites clip at the screen edges, they do not wrap around
        let row_count = usize::from(n).min(DISPLAY_Y - y_pos);
        let col_count = 8.min(DISPLAY_X - x_pos);

        self.v[0xF] = 0;
        for row in 0..row_count {
            let sprite_byte = self.mem_read(self.i.wrapping_add(row as u16))?;

            for col in 0..col_count {
                // Each set bit flips the pixel underneath, MSB first
                if sprite_byte & (0x80 >> col) != 0 {
                    let (px, py) = (x_pos + col, y_pos + row);

                    if self.screen.get_pixel(px, py) {
                        self.screen.set_pixel(px, py, false);
                        self.v[0xF] = 1; // collision
                    } else {
                        self.screen.set_pixel(px, py, true);
                    }
                }
            }
        }

        self.screen.request_refresh();
        Ok(StepResult::YieldFrame)
    }

    fn execute_wait_key(&mut self, x: u4) -> StepResult {
        match self.keypad.first_pressed() {
            Some(key) => {
                self.v[x] = key.into();
                StepResult::Continue
            }
            None => {
                // Park the program counter on this instruction so the next
                // step retries it. The driver keeps ticking timers and
                // rendering in the meantime.
                self.pc = self.pc.wrapping_sub(2);
                StepResult::YieldFrame
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{FrameBuffer, KeypadState, NullAudio};
    use super::*;

    type TestChip8 = Chip8<FrameBuffer, KeypadState, NullAudio>;

    const PROG_START: u16 = 0x200;

    /// Loads a program given as 16-bit instruction words.
    fn load_words(chip8: &mut TestChip8, words: &[u16]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        chip8.load(&bytes).unwrap();
    }

    fn step(chip8: &mut TestChip8) {
        chip8.step().unwrap();
    }

    #[test]
    fn add_imm_wraps_without_flag() {
        let mut chip8 = TestChip8::default();
        load_words(&mut chip8, &[0x60FE, 0x7003, 0x7000]);

        step(&mut chip8); // V0 = 0xFE
        step(&mut chip8); // V0 += 3
        assert_eq!(chip8.regs()[0], 0x01);
        assert_eq!(chip8.regs()[0xF], 0);

        step(&mut chip8); // V0 += 0
        assert_eq!(chip8.regs()[0], 0x01);
    }

    #[test]
    fn carry_add_wraps_and_flags_only_on_overflow() {
        let mut chip8 = TestChip8::default();
        // V0 = 0, V1 = 255, V2 = 1; V0 += V1; V0 += V2
        load_words(&mut chip8, &[0x6000, 0x61FF, 0x6201, 0x8014, 0x8024]);

        for _ in 0..4 {
            step(&mut chip8);
        }
        // 0 + 255 = 255, no carry
        assert_eq!(chip8.regs()[0], 255);
        assert_eq!(chip8.regs()[0xF], 0);

        step(&mut chip8);
        // 255 + 1 wraps back to 0 with the carry flag set
        assert_eq!(chip8.regs()[0], 0);
        assert_eq!(chip8.regs()[0xF], 1);
    }

    #[test]
    fn carry_flag_wins_when_vf_is_the_destination() {
        let mut chip8 = TestChip8::default();
        // VF = 200, V1 = 100; VF += V1
        load_words(&mut chip8, &[0x6FC8, 0x6164, 0x8F14]);

        for _ in 0..3 {
            step(&mut chip8);
        }
        // The flag write happens after the result write
        assert_eq!(chip8.regs()[0xF], 1);
    }

    #[test]
    fn sub_sets_no_borrow_flag() {
        let mut chip8 = TestChip8::default();
        // V0 = 5, V1 = 3; V0 -= V1
        load_words(&mut chip8, &[0x6005, 0x6103, 0x8015]);
        for _ in 0..3 {
            step(&mut chip8);
        }
        assert_eq!(chip8.regs()[0], 2);
        assert_eq!(chip8.regs()[0xF], 1);

        let mut chip8 = TestChip8::default();
        // V0 = 3, V1 = 5; V0 -= V1
        load_words(&mut chip8, &[0x6003, 0x6105, 0x8015]);
        for _ in 0..3 {
            step(&mut chip8);
        }
        assert_eq!(chip8.regs()[0], 254);
        assert_eq!(chip8.regs()[0xF], 0);
    }

    #[test]
    fn sub_rev_uses_operands_in_reverse() {
        let mut chip8 = TestChip8::default();
        // V0 = 3, V1 = 5; V0 = V1 - V0
        load_words(&mut chip8, &[0x6003, 0x6105, 0x8017]);
        for _ in 0..3 {
            step(&mut chip8);
        }
        assert_eq!(chip8.regs()[0], 2);
        assert_eq!(chip8.regs()[0xF], 1);
    }

    #[test]
    fn shifts_capture_the_shifted_out_bit() {
        let mut chip8 = TestChip8::default();
        // V0 = 0x01; V0 >>= 1
        load_words(&mut chip8, &[0x6001, 0x8006]);
        step(&mut chip8);
        step(&mut chip8);
        assert_eq!(chip8.regs()[0], 0);
        assert_eq!(chip8.regs()[0xF], 1);

        let mut chip8 = TestChip8::default();
        // V0 = 0x80; V0 <<= 1
        load_words(&mut chip8, &[0x6080, 0x800E]);
        step(&mut chip8);
        step(&mut chip8);
        assert_eq!(chip8.regs()[0], 0);
        assert_eq!(chip8.regs()[0xF], 1);
    }

    #[test]
    fn logic_ops_leave_vf_alone() {
        let mut chip8 = TestChip8::default();
        // VF = 7; V0 = 0b1100, V1 = 0b1010; or/and/xor
        load_words(
            &mut chip8,
            &[0x6F07, 0x600C, 0x610A, 0x8011, 0x8012, 0x8013],
        );
        for _ in 0..6 {
            step(&mut chip8);
        }
        // 0x0C | 0x0A = 0x0E, & 0x0A = 0x0A, ^ 0x0A = 0
        assert_eq!(chip8.regs()[0], 0);
        assert_eq!(chip8.regs()[0xF], 7);
    }

    #[test]
    fn bcd_splits_decimal_digits() {
        let mut chip8 = TestChip8::default();
        // V0 = 255, I = 0x300, BCD V0
        load_words(&mut chip8, &[0x60FF, 0xA300, 0xF033]);
        for _ in 0..3 {
            step(&mut chip8);
        }
        assert_eq!(chip8.memory()[0x300..0x303], [2, 5, 5]);
    }

    #[test]
    fn draw_round_trip_clears_and_reports_collision() {
        let mut chip8 = TestChip8::default();
        // I = font glyph "0", draw 5 rows at (V0, V1) = (4, 6), twice
        load_words(&mut chip8, &[0x6004, 0x6106, 0xF229, 0xD015, 0xD015]);
        for _ in 0..4 {
            step(&mut chip8);
        }

        // First draw on an empty screen: pixels on, no collision
        assert!(chip8.screen.get_pixel(4, 6));
        assert_eq!(chip8.regs()[0xF], 0);

        step(&mut chip8);
        // Second identical draw erases everything and flags the collision
        let all_off = chip8
            .screen
            .pixels()
            .iter()
            .all(|row| row.iter().all(|&p| !p));
        assert!(all_off);
        assert_eq!(chip8.regs()[0xF], 1);
    }

    #[test]
    fn draw_clips_at_the_right_edge() {
        let mut chip8 = TestChip8::default();
        // Sprite of one 0xFF row drawn at (60, 0)
        chip8.load(&[0x60, 0x3C, 0x61, 0x00, 0xA2, 0x08, 0xD0, 0x11, 0xFF]).unwrap();
        for _ in 0..4 {
            step(&mut chip8);
        }

        for x in 60..DISPLAY_X {
            assert!(chip8.screen.get_pixel(x, 0));
        }
        // Nothing wrapped around to the left edge
        for x in 0..8 {
            assert!(!chip8.screen.get_pixel(x, 0));
        }
    }

    #[test]
    fn draw_clips_at_the_bottom_edge() {
        let mut chip8 = TestChip8::default();
        // I = font glyph "0" (5 rows of 0xF0-style bytes), drawn at (0, 30)
        load_words(&mut chip8, &[0x6000, 0x611E, 0xF029, 0xD015]);
        for _ in 0..4 {
            step(&mut chip8);
        }

        assert!(chip8.screen.get_pixel(0, 30));
        assert!(chip8.screen.get_pixel(0, 31));
        // Rows past the bottom were dropped, not wrapped to the top
        assert!(!chip8.screen.get_pixel(0, 0));
        assert!(!chip8.screen.get_pixel(0, 1));
    }

    #[test]
    fn draw_starting_position_wraps_modulo_screen() {
        let mut chip8 = TestChip8::default();
        // V0 = 64 (maps to column 0), one 0x80 row
        chip8.load(&[0x60, 0x40, 0xA2, 0x06, 0xD0, 0x11, 0x80]).unwrap();
        for _ in 0..3 {
            step(&mut chip8);
        }
        assert!(chip8.screen.get_pixel(0, 0));
    }

    #[test]
    fn clear_screen_turns_every_pixel_off() {
        let mut chip8 = TestChip8::default();
        load_words(&mut chip8, &[0x6000, 0xF029, 0xD005, 0x00E0]);
        for _ in 0..4 {
            step(&mut chip8);
        }
        let all_off = chip8
            .screen
            .pixels()
            .iter()
            .all(|row| row.iter().all(|&p| !p));
        assert!(all_off);
    }

    #[test]
    fn call_and_return_round_trip() {
        let mut chip8 = TestChip8::default();
        // 0x200: CALL 0x204; 0x202: (next); 0x204: RETURN
        load_words(&mut chip8, &[0x2204, 0x0000, 0x00EE]);

        step(&mut chip8);
        assert_eq!(chip8.pc(), 0x204);
        assert_eq!(chip8.stack(), &[0x202]);

        step(&mut chip8);
        assert_eq!(chip8.pc(), 0x202);
        assert!(chip8.stack().is_empty());
    }

    #[test]
    fn seventeenth_call_overflows_the_stack() {
        let mut chip8 = TestChip8::default();
        // CALL 0x200 over and over
        load_words(&mut chip8, &[0x2200]);

        for _ in 0..16 {
            step(&mut chip8);
        }
        assert!(matches!(
            chip8.step(),
            Err(Chip8Error::StackOverflow { address: 0x200 })
        ));
    }

    #[test]
    fn return_on_empty_stack_underflows() {
        let mut chip8 = TestChip8::default();
        load_words(&mut chip8, &[0x00EE]);

        assert!(matches!(
            chip8.step(),
            Err(Chip8Error::StackUnderflow { address: 0x200 })
        ));
    }

    #[test]
    fn invalid_opcode_reports_code_and_address() {
        let mut chip8 = TestChip8::default();
        load_words(&mut chip8, &[0x1202, 0xFFFF]);

        step(&mut chip8);
        assert!(matches!(
            chip8.step(),
            Err(Chip8Error::InvalidOpcode {
                opcode: 0xFFFF,
                address: 0x202
            })
        ));
    }

    #[test]
    fn skips_on_immediate_and_register_comparison() {
        let mut chip8 = TestChip8::default();
        // V0 = 7; skip if V0 == 7 (taken); the skipped slot holds garbage
        load_words(&mut chip8, &[0x6007, 0x3007, 0xFFFF, 0x6107, 0x5010, 0xFFFF, 0x1200]);

        step(&mut chip8);
        step(&mut chip8);
        assert_eq!(chip8.pc(), PROG_START + 6);

        step(&mut chip8); // V1 = 7
        step(&mut chip8); // skip if V0 == V1 (taken)
        assert_eq!(chip8.pc(), PROG_START + 12);
    }

    #[test]
    fn skips_on_keypad_state() {
        let mut chip8 = TestChip8::default();
        // V0 = 4; skip if key 4 pressed; skip if key 4 not pressed
        load_words(&mut chip8, &[0x6004, 0xE09E, 0xE0A1, 0x0000]);

        chip8.keypad.set_key(u4::new(4), true);
        step(&mut chip8);
        step(&mut chip8); // skip taken, lands on 0xE0A1
        assert_eq!(chip8.pc(), PROG_START + 6);

        let mut chip8 = TestChip8::default();
        load_words(&mut chip8, &[0x6004, 0xE09E, 0xE0A1, 0x0000]);
        step(&mut chip8);
        step(&mut chip8); // key not pressed, no skip
        assert_eq!(chip8.pc(), PROG_START + 4);
    }

    #[test]
    fn wait_key_parks_until_a_key_is_pressed() {
        let mut chip8 = TestChip8::default();
        load_words(&mut chip8, &[0xF10A]);

        // No key: the program counter stays put across steps
        for _ in 0..3 {
            step(&mut chip8);
            assert_eq!(chip8.pc(), PROG_START);
        }

        // Keys 5 and 3 pressed: the lowest-numbered one wins
        chip8.keypad.set_key(u4::new(5), true);
        chip8.keypad.set_key(u4::new(3), true);
        step(&mut chip8);
        assert_eq!(chip8.pc(), PROG_START + 2);
        assert_eq!(chip8.regs()[1], 3);
    }

    #[test]
    fn jump_with_offset_adds_v0() {
        let mut chip8 = TestChip8::default();
        load_words(&mut chip8, &[0x6004, 0xB300]);
        step(&mut chip8);
        step(&mut chip8);
        assert_eq!(chip8.pc(), 0x304);
    }

    #[test]
    fn random_is_masked_by_the_immediate() {
        let mut chip8 = TestChip8::default();
        // V1 = rand & 0x00; V2 = rand & 0x0F
        load_words(&mut chip8, &[0xC100, 0xC20F]);
        step(&mut chip8);
        step(&mut chip8);
        assert_eq!(chip8.regs()[1], 0);
        assert!(chip8.regs()[2] <= 0x0F);
    }

    #[test]
    fn font_sprite_points_at_the_glyph_of_the_low_nibble() {
        let mut chip8 = TestChip8::default();
        // V0 = 0xAB: only the low nibble selects the glyph
        load_words(&mut chip8, &[0x60AB, 0xF029]);
        step(&mut chip8);
        step(&mut chip8);
        assert_eq!(chip8.index(), (0x50 + 0xB * 5) as u16);
    }

    #[test]
    fn index_ops_load_and_accumulate() {
        let mut chip8 = TestChip8::default();
        load_words(&mut chip8, &[0xA123, 0x6005, 0xF01E]);
        for _ in 0..3 {
            step(&mut chip8);
        }
        assert_eq!(chip8.index(), 0x128);
        // No overflow flag for AddIndex
        assert_eq!(chip8.regs()[0xF], 0);
    }

    #[test]
    fn store_and_load_regs_leave_index_unchanged() {
        let mut chip8 = TestChip8::default();
        // V0..V2 = 0xAA, 0xBB, 0xCC; I = 0x300; store V0..=V2
        load_words(&mut chip8, &[0x60AA, 0x61BB, 0x62CC, 0xA300, 0xF255]);
        for _ in 0..5 {
            step(&mut chip8);
        }
        assert_eq!(chip8.memory()[0x300..0x303], [0xAA, 0xBB, 0xCC]);
        assert_eq!(chip8.index(), 0x300);

        // Clobber the registers and load them back
        let mut chip8_b = TestChip8::default();
        load_words(&mut chip8_b, &[0xA300, 0xF265]);
        chip8_b.memory[0x300..0x303].copy_from_slice(&[1, 2, 3]);
        step(&mut chip8_b);
        step(&mut chip8_b);
        assert_eq!(&chip8_b.regs()[..3], &[1, 2, 3]);
        assert_eq!(chip8_b.index(), 0x300);
    }

    #[test]
    fn delay_timer_round_trips_through_registers() {
        let mut chip8 = TestChip8::default();
        // V0 = 0x20; delay = V0; V1 = delay; sound = V0
        load_words(&mut chip8, &[0x6020, 0xF015, 0xF107, 0xF018]);
        for _ in 0..4 {
            step(&mut chip8);
        }
        assert_eq!(chip8.delay_timer(), 0x20);
        assert_eq!(chip8.regs()[1], 0x20);
        assert_eq!(chip8.sound_timer(), 0x20);
        assert!(chip8.should_beep());
    }
}
