//! First Fit algorithm.

use crate::host::Host;
use crate::placement::HostPicker;
use crate::vm::Vm;

/// Uses the first suitable host in the order of host names.
#[derive(Default)]
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Default::default()
    }
}

impl HostPicker for FirstFit {
    fn pick<'a>(&self, _vm: &Vm, candidates: &[&'a Host]) -> Option<&'a Host> {
        candidates.first().copied()
    }
}
