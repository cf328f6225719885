use super::{Audio, Chip8, Chip8Error, Keypad, Screen, StepResult};
use std::collections::HashSet;

const CPU_HZ: f32 = 700.0;
const TIMER_HZ: f32 = 60.0;

const CPU_TIME_STEP: f32 = 1.0 / CPU_HZ;
const TIMER_TIME_STEP: f32 = 1.0 / TIMER_HZ;

/// Drives a [`Chip8`] from wall-clock delta times: instructions at 700Hz,
/// timer ticks at a logical 60Hz, independent of the frame rate.
pub struct Runner<S, K, A> {
    chip8: Chip8<S, K, A>,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
}

pub enum RunnerResult {
    Ok,
    HitBreakpoint,
}

impl<S: Screen, K: Keypad, A: Audio> Runner<S, K, A> {
    pub fn new(chip8: Chip8<S, K, A>) -> Self {
        Self {
            chip8,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        }
    }

    /// Advances the machine by the elapsed time `dt`, running as many
    /// instruction steps and timer ticks as that much time is worth.
    pub fn update(&mut self, dt: f32) -> Result<RunnerResult, Chip8Error> {
        self.update_with_breakpoints(dt, None)
    }

    /// Like [`Runner::update`], but stops after any step that lands the
    /// program counter on a breakpoint.
    pub fn update_with_breakpoints(
        &mut self,
        dt: f32,
        breakpoints: Option<&HashSet<u16>>,
    ) -> Result<RunnerResult, Chip8Error> {
        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        while self.timer_dt_accumulator >= TIMER_TIME_STEP {
            self.timer_dt_accumulator -= TIMER_TIME_STEP;
            self.chip8.tick_timers();
        }

        while self.cpu_dt_accumulator >= CPU_TIME_STEP {
            self.cpu_dt_accumulator -= CPU_TIME_STEP;

            let step_result = self.chip8.step()?;

            if let Some(breakpoints) = breakpoints
                && breakpoints.contains(&self.chip8.pc())
            {
                self.cpu_dt_accumulator = 0.0;
                return Ok(RunnerResult::HitBreakpoint);
            }

            if let StepResult::YieldFrame = step_result {
                // Stop executing until the next frame. The accumulator is
                // cleared so we don't catch up in a burst afterwards.
                self.cpu_dt_accumulator = 0.0;
                break;
            }
        }

        Ok(RunnerResult::Ok)
    }

    pub fn chip8_ref(&self) -> &Chip8<S, K, A> {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8<S, K, A> {
        &mut self.chip8
    }
}

#[cfg(test)]
mod tests {
    use super::super::{FrameBuffer, KeypadState, NullAudio};
    use super::*;

    fn runner_with(words: &[u16]) -> Runner<FrameBuffer, KeypadState, NullAudio> {
        let mut chip8 = Chip8::default();
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        chip8.load(&bytes).unwrap();
        Runner::new(chip8)
    }

    #[test]
    fn converts_elapsed_time_into_cycles() {
        // A busy loop of register loads
        let mut runner = runner_with(&[0x6001, 0x1200]);

        // 10ms at 700Hz is 7 instructions
        runner.update(0.01).unwrap();
        assert_eq!(runner.chip8_ref().regs()[0], 1);

        // Not enough time for even one instruction
        let pc = runner.chip8_ref().pc();
        runner.update(0.0001).unwrap();
        assert_eq!(runner.chip8_ref().pc(), pc);
    }

    #[test]
    fn stops_at_breakpoints() {
        let mut runner = runner_with(&[0x6001, 0x6102, 0x6203, 0x1200]);

        let breakpoints = HashSet::from([0x204u16]);
        let result = runner
            .update_with_breakpoints(1.0, Some(&breakpoints))
            .unwrap();

        assert!(matches!(result, RunnerResult::HitBreakpoint));
        assert_eq!(runner.chip8_ref().pc(), 0x204);
        // Only the first instruction ran
        assert_eq!(runner.chip8_ref().regs()[1], 0);
    }

    #[test]
    fn ticks_timers_at_sixty_hertz() {
        // Set the delay timer, then loop forever
        let mut runner = runner_with(&[0x60FF, 0xF015, 0x1204]);

        // Run a tenth of a second in small slices: ~6 timer ticks
        for _ in 0..10 {
            runner.update(0.01).unwrap();
        }
        let delay = runner.chip8_ref().delay_timer();
        assert!((0xFF - 7..=0xFF - 5).contains(&delay));
    }
}
