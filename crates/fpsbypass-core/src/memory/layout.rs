//! Instruction encodings and timing constants used against the target.

/// x86-64 encodings followed by the resolver
pub mod x86 {
    /// `call rel32`
    pub const CALL_REL32: u8 = 0xE8;
    /// `jmp rel32`
    pub const JMP_REL32: u8 = 0xE9;
    /// Opcode byte plus 32-bit displacement
    pub const REL32_INSTRUCTION_LEN: i64 = 5;
    /// Upper bound on chained trampolines before giving up
    pub const MAX_TRAMPOLINE_HOPS: usize = 64;

    pub fn is_trampoline(opcode: u8) -> bool {
        opcode == CALL_REL32 || opcode == JMP_REL32
    }
}

/// Timing constants for polling the target
pub mod timing {
    use std::time::Duration;

    /// Interval between module enumerations and null-pointer reads during discovery
    pub const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(200);

    /// Interval between reads while the frame rate still holds the sentinel
    pub const INIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Interval between enforcement ticks
    pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

    /// Interval between checks for the game process appearing or exiting
    pub const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(100);
}

#[cfg(test)]
mod tests {
    use super::x86::*;

    #[test]
    fn test_is_trampoline() {
        assert!(is_trampoline(0xE8));
        assert!(is_trampoline(0xE9));
        assert!(!is_trampoline(0xEB));
        assert!(!is_trampoline(0xFF));
    }
}
