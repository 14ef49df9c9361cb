/// Fixed resource limits of a [`Vm`](crate::runtime::vm::Vm).
///
/// None of these grow at run time: exceeding one ends the run with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Operand stack slots, locals of every active call included.
    pub stack_size: usize,
    /// Global variable slots.
    pub globals_size: usize,
    /// Maximum simultaneously active call frames, the main frame included.
    pub max_frames: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_size: 2048,
            globals_size: 65536,
            max_frames: 1024,
        }
    }
}
