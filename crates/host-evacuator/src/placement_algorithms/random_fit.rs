//! Random Fit algorithm.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::config::parse_options;
use crate::error::ConfigError;
use crate::host::Host;
use crate::placement::HostPicker;
use crate::vm::Vm;

/// Uses a random suitable host.
///
/// The generator is seeded from the configured seed and the VM id, so the same VM is always sent to the same host
/// for the same set of candidates. Different VMs are spread over the candidates.
pub struct RandomFit {
    seed: u64,
}

impl RandomFit {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let options = parse_options(s);
        let seed = match options.get("seed") {
            Some(value) => value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                name: "seed",
                value: value.clone(),
            })?,
            None => 123,
        };
        Ok(Self::new(seed))
    }

    fn vm_seed(&self, vm: &Vm) -> u64 {
        // FNV-1a, stable across runs and platforms
        let hash = vm
            .id
            .bytes()
            .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
        self.seed ^ hash
    }
}

impl HostPicker for RandomFit {
    fn pick<'a>(&self, vm: &Vm, candidates: &[&'a Host]) -> Option<&'a Host> {
        let mut rng = Pcg64::seed_from_u64(self.vm_seed(vm));
        candidates.choose(&mut rng).copied()
    }
}
