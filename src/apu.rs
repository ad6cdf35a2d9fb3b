//! APU collaborator interface
//!
//! Channel synthesis lives outside this crate. The bus forwards $4000-$4017
//! register traffic here and the frame scheduler feeds the frame sequencer
//! with the CPU cycles each instruction consumed.

/// Audio unit hooks used by the bus and the scheduler
pub trait AudioUnit {
    /// Register read ($4015 channel status)
    fn read_reg(&mut self, address: u16) -> u8;

    /// Register write ($4000-$4013, $4015, $4017)
    fn write_reg(&mut self, address: u16, value: u8);

    /// Advance the frame sequencer by `cycles` CPU cycles
    fn clock_frame_counter(&mut self, cycles: u32);

    fn reset(&mut self) {}
}
