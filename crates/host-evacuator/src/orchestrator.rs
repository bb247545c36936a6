//! Evacuation of all VMs from a failed host.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::clock::Clock;
use crate::command::EvacuationCommandService;
use crate::config::EvacuationConfig;
use crate::error::{ConfigError, InventoryError, NoTarget, SnapshotError};
use crate::host::Host;
use crate::inventory::{InventoryService, SnapshotProvider, VmFilter};
use crate::log::LogContext;
use crate::placement::{GroupAwarePlacement, TargetSelector};
use crate::report::{EvacuationOutcome, EvacuationReport};
use crate::retry::RetryPolicy;
use crate::vm::{Vm, VmStatus};
use crate::{log_debug, log_error, log_info, log_warn};

/// Relocates VMs of a failed host one at a time and collects the outcome of each of them.
///
/// For every VM the inventory is read again before selecting the target host, because the placement of server group
/// members changes as they are evacuated. After the evacuate command is accepted, the VM status is polled according
/// to the retry policy until the VM becomes active on another host or the wait timeout passes.
///
/// Once the command for a VM is accepted, the target host stays claimed by that VM for the rest of the run, even if the
/// VM never becomes active there. Placement of the VM's group members takes the claimed host into account.
///
/// The evacuator assumes it is the only actor moving VMs of the failed host and of their server groups.
pub struct Evacuator<'a> {
    inventory: &'a dyn InventoryService,
    commands: &'a dyn EvacuationCommandService,
    selector: Box<dyn TargetSelector + 'a>,
    retry: RetryPolicy,
    on_shared_storage: bool,
    clock: Rc<dyn Clock>,
    claims: RefCell<HashMap<String, String>>,
    ctx: LogContext,
}

impl<'a> Evacuator<'a> {
    /// Creates evacuator with group-aware placement configured from the config.
    pub fn new(
        inventory: &'a dyn InventoryService,
        commands: &'a dyn EvacuationCommandService,
        config: &EvacuationConfig,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let selector = GroupAwarePlacement::from_config(config)?;
        Ok(Self {
            inventory,
            commands,
            selector: Box::new(selector),
            retry: config.retry_policy()?,
            on_shared_storage: config.on_shared_storage,
            ctx: LogContext::new("evacuator", clock.clone()),
            clock,
            claims: RefCell::new(HashMap::new()),
        })
    }

    /// Replaces the target selector.
    pub fn with_selector(mut self, selector: Box<dyn TargetSelector + 'a>) -> Self {
        self.selector = selector;
        self
    }

    /// Evacuates all VMs currently running on the failed host.
    ///
    /// Fails only if the inventory can't be read at the start, in which case no VM is touched.
    /// Failures of individual VMs are recorded in the report and do not stop the processing of other VMs.
    pub fn evacuate(&self, failed_host: &str) -> Result<EvacuationReport, SnapshotError> {
        let snapshot = self.inventory.snapshot().map_err(|err| {
            log_error!(self.ctx, "can't read inventory, aborting evacuation of {}: {}", failed_host, err);
            err
        })?;
        self.claims.borrow_mut().clear();
        let vms: Vec<Vm> = snapshot.vms_on_host(failed_host).cloned().collect();
        log_info!(self.ctx, "evacuating {} vms from host {}", vms.len(), failed_host);

        let mut report = EvacuationReport::new(failed_host);
        for vm in &vms {
            report.record(self.evacuate_vm(vm));
        }
        log_info!(self.ctx, report.summary());
        Ok(report)
    }

    /// Evacuates a single VM from the host it is running on.
    pub fn evacuate_vm(&self, vm: &Vm) -> EvacuationOutcome {
        let start = self.clock.now();
        let target = match self.select_target(vm) {
            Ok(target) => target,
            Err(reason) => {
                log_warn!(self.ctx, "no target host for vm {}: {}", vm.name, reason);
                return EvacuationOutcome::no_target(vm, &reason, self.clock.now() - start);
            }
        };

        log_info!(self.ctx, "evacuating vm {} to host {}", vm.name, target.name);
        if let Err(err) = self.commands.evacuate(&vm.id, &target.name, self.on_shared_storage) {
            log_error!(self.ctx, "failed to evacuate vm {}: {}", vm.name, err);
            return EvacuationOutcome::error(vm, &target.name, &err, self.clock.now() - start);
        }
        self.claims.borrow_mut().insert(vm.id.clone(), target.name.clone());

        let mut last_status = None;
        let arrived_at = self.retry.wait_for(self.clock.as_ref(), || match self.poll(vm) {
            Ok(current) => {
                log_debug!(self.ctx, "vm {} is {} on host {}", vm.name, current.status, current.host);
                let active_elsewhere = current.status == VmStatus::Active && current.host != vm.host;
                last_status = Some(current.status);
                active_elsewhere.then_some(current.host)
            }
            Err(err) => {
                log_warn!(self.ctx, "can't get status of vm {}: {}", vm.name, err);
                None
            }
        });

        let duration = self.clock.now() - start;
        match arrived_at {
            Some(host) => {
                log_info!(self.ctx, "vm {} is active on host {}", vm.name, host);
                EvacuationOutcome::success(vm, &host, duration)
            }
            None => {
                let outcome = EvacuationOutcome::timeout(vm, &target.name, last_status.as_ref(), duration);
                log_error!(self.ctx, "vm {}: {}", vm.name, outcome.detail());
                outcome
            }
        }
    }

    fn select_target(&self, vm: &Vm) -> Result<Host, NoTarget> {
        let snapshot = self.inventory.snapshot()?.with_claims(self.claims.borrow().iter());
        log_debug!(
            self.ctx,
            "refreshed inventory: {} hosts, {} vms",
            snapshot.hosts().count(),
            snapshot.vms().len()
        );
        let current = snapshot.vm(&vm.id).ok_or_else(|| NoTarget::UnknownVm(vm.id.clone()))?;
        self.selector.select_target(current, &snapshot)
    }

    fn poll(&self, vm: &Vm) -> Result<Vm, InventoryError> {
        self.inventory
            .list_vms(&VmFilter::Name(vm.name.clone()))?
            .into_iter()
            .find(|candidate| candidate.id == vm.id)
            .ok_or_else(|| InventoryError(format!("vm {} is not listed", vm.id)))
    }
}
