use crate::error::CommandError;

/// Write access to the cluster control plane.
///
/// A successful call only means that the request was accepted. The relocation itself is performed asynchronously
/// and its completion is observed through the VM status in the inventory.
pub trait EvacuationCommandService {
    fn evacuate(&self, vm_id: &str, target_host: &str, on_shared_storage: bool) -> Result<(), CommandError>;
}
