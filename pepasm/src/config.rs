/// Options for one assembly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsmConfig {
    /// Require an operating system's `.BURN` argument to be `0xFFFF`.
    ///
    /// default = false
    pub force_burn_at_ffff: bool,
    /// Bytes per line of object code text.
    ///
    /// default = 16
    pub bytes_per_line: usize,
}

impl Default for AsmConfig {
    fn default() -> Self {
        Self {
            force_burn_at_ffff: false,
            bytes_per_line: 16,
        }
    }
}
