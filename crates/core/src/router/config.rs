//! Privileged configuration: backends, adapters, limits, and the shortfall.
//!
//! Every mutation re-validates the configured set before committing it: targets
//! of backends that count toward allocation sum to exactly 100%, each adapter
//! reports its backend's receipt identity, and the set stays within the
//! configured size limit.

use std::collections::BTreeSet;

use alloy_primitives::{Address, U256};
use multivault_allocation::AllocationCalculator;
use tracing::info;

use super::{BackendConfig, BackendStatus, Result, Router};
use crate::access::Role;
use crate::adapter::AdapterHandle;
use crate::error::RouterError;
use crate::events::Event;
use crate::ledger::CollateralLedger;
use crate::settings::MAX_SLIPPAGE_BPS;
use crate::state::ChainState;

fn validate_configs(configs: &[BackendConfig], max_backend_count: usize) -> Result<()> {
    if configs.len() > max_backend_count {
        return Err(RouterError::TooManyBackends {
            max: max_backend_count,
        });
    }

    let mut seen = BTreeSet::new();
    for config in configs {
        if config.backend_id.is_zero() {
            return Err(RouterError::ZeroAddress);
        }
        if !seen.insert(config.backend_id) {
            return Err(RouterError::BackendAlreadyExists {
                backend: config.backend_id,
            });
        }
        let reported = config.adapter.strategy_share();
        if reported != config.backend_id {
            return Err(RouterError::AdapterReceiptMismatch {
                backend: config.backend_id,
                reported,
            });
        }
    }

    let targets: Vec<u32> = configs
        .iter()
        .filter(|config| config.status.counts_toward_targets())
        .map(|config| config.target_bps)
        .collect();
    AllocationCalculator::validate_targets(&targets)?;
    Ok(())
}

impl Router {
    /// Register `adapter` for the receipt it reports and add that receipt to
    /// the ledger's custody scope.
    pub fn register_adapter(
        &mut self,
        state: &mut ChainState,
        ledger: &mut CollateralLedger,
        caller: Address,
        adapter: AdapterHandle,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        self.ensure_ledger(ledger)?;
        let receipt = adapter.strategy_share();
        if receipt.is_zero() || adapter.address().is_zero() {
            return Err(RouterError::ZeroAddress);
        }
        self.ensure_unregistered(receipt, &adapter)?;
        if self.adapters.contains_key(&receipt) {
            return Err(RouterError::AdapterAlreadyRegistered {
                receipt,
                existing: adapter.address(),
            });
        }

        self.attach_adapter(state, ledger, adapter)
    }

    /// Remove an adapter no backend references.
    pub fn remove_adapter(
        &mut self,
        state: &mut ChainState,
        ledger: &mut CollateralLedger,
        caller: Address,
        receipt: Address,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        self.ensure_ledger(ledger)?;
        if !self.adapters.contains_key(&receipt) {
            return Err(RouterError::AdapterNotRegistered { receipt });
        }
        if self.backend(receipt).is_some() {
            return Err(RouterError::AdapterInUse { receipt });
        }

        self.detach_adapter(state, ledger, receipt)
    }

    /// Append a backend, registering its adapter if it is not yet known.
    pub fn add_backend(
        &mut self,
        state: &mut ChainState,
        ledger: &mut CollateralLedger,
        caller: Address,
        config: BackendConfig,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        self.ensure_ledger(ledger)?;
        if self.backend(config.backend_id).is_some() {
            return Err(RouterError::BackendAlreadyExists {
                backend: config.backend_id,
            });
        }
        if self.backends.len() >= self.settings.max_backend_count {
            return Err(RouterError::TooManyBackends {
                max: self.settings.max_backend_count,
            });
        }
        self.ensure_unregistered(config.backend_id, &config.adapter)?;

        let mut candidate = self.backends.clone();
        candidate.push(config.clone());
        validate_configs(&candidate, self.settings.max_backend_count)?;

        if !self.adapters.contains_key(&config.backend_id) {
            self.attach_adapter(state, ledger, config.adapter.clone())?;
        }
        self.backends = candidate;

        info!(backend = %config.backend_id, target_bps = config.target_bps, "backend added");
        state.emit(Event::BackendAdded {
            backend: config.backend_id,
            adapter: config.adapter.address(),
            target_bps: config.target_bps,
            status: config.status,
        });
        Ok(())
    }

    /// Change a backend's target and status.
    ///
    /// Suspension requires the backend to hold no receipts in custody.
    pub fn update_backend(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        backend: Address,
        target_bps: u32,
        status: BackendStatus,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        let index = self.index_of(backend)?;
        if status == BackendStatus::Suspended {
            self.ensure_empty(state, index)?;
        }

        let mut candidate = self.backends.clone();
        candidate[index].target_bps = target_bps;
        candidate[index].status = status;
        validate_configs(&candidate, self.settings.max_backend_count)?;
        self.backends = candidate;

        if status != BackendStatus::Active && self.default_backend == Some(backend) {
            self.clear_default(state);
        }

        info!(%backend, target_bps, ?status, "backend updated");
        state.emit(Event::BackendUpdated {
            backend,
            target_bps,
            status,
        });
        Ok(())
    }

    /// Remove a drained backend and its adapter, de-registering the receipt
    /// from the ledger. Any dust left behind is recoverable through the
    /// ledger's rescue path.
    pub fn remove_backend(
        &mut self,
        state: &mut ChainState,
        ledger: &mut CollateralLedger,
        caller: Address,
        backend: Address,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        self.ensure_ledger(ledger)?;
        let index = self.index_of(backend)?;
        self.ensure_drained(state, index)?;

        let mut candidate = self.backends.clone();
        candidate.remove(index);
        validate_configs(&candidate, self.settings.max_backend_count)?;

        if self.adapters.contains_key(&backend) {
            self.detach_adapter(state, ledger, backend)?;
        }
        self.backends = candidate;
        if self.default_backend == Some(backend) {
            self.clear_default(state);
        }

        info!(%backend, "backend removed");
        state.emit(Event::BackendRemoved { backend });
        Ok(())
    }

    /// Replace the whole backend set atomically.
    ///
    /// Backends missing from `configs` are removed once their value is within
    /// dust. Suspension requires an empty custody balance.
    pub fn set_backend_configs(
        &mut self,
        state: &mut ChainState,
        ledger: &mut CollateralLedger,
        caller: Address,
        configs: Vec<BackendConfig>,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        self.ensure_ledger(ledger)?;
        validate_configs(&configs, self.settings.max_backend_count)?;

        let mut dropped = Vec::new();
        for (index, existing) in self.backends.iter().enumerate() {
            match configs
                .iter()
                .find(|config| config.backend_id == existing.backend_id)
            {
                None => {
                    self.ensure_drained(state, index)?;
                    dropped.push(existing.backend_id);
                }
                Some(config)
                    if config.status == BackendStatus::Suspended
                        && existing.status != BackendStatus::Suspended =>
                {
                    self.ensure_empty(state, index)?;
                }
                Some(_) => {}
            }
        }
        for config in &configs {
            self.ensure_unregistered(config.backend_id, &config.adapter)?;
        }

        for backend in &dropped {
            if self.adapters.contains_key(backend) {
                self.detach_adapter(state, ledger, *backend)?;
            }
            state.emit(Event::BackendRemoved { backend: *backend });
        }
        for config in &configs {
            if !self.adapters.contains_key(&config.backend_id) {
                self.attach_adapter(state, ledger, config.adapter.clone())?;
            }
            state.emit(Event::BackendUpdated {
                backend: config.backend_id,
                target_bps: config.target_bps,
                status: config.status,
            });
        }
        self.backends = configs;

        let default_usable = self
            .default_backend
            .is_some_and(|backend| self.deposit_index(backend).is_ok());
        if self.default_backend.is_some() && !default_usable {
            self.clear_default(state);
        }

        info!(backends = self.backends.len(), "backend set replaced");
        Ok(())
    }

    /// Backend that receives swept and recycled surplus.
    pub fn set_default_backend(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        backend: Address,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        if backend.is_zero() {
            return Err(RouterError::ZeroAddress);
        }
        self.deposit_index(backend)?;

        self.default_backend = Some(backend);
        info!(%backend, "default backend set");
        state.emit(Event::DefaultBackendSet {
            backend: Some(backend),
        });
        Ok(())
    }

    pub fn set_dust_tolerance(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        dust_tolerance: U256,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        self.settings.dust_tolerance = dust_tolerance;
        info!(%dust_tolerance, "dust tolerance set");
        state.emit(Event::DustToleranceSet { dust_tolerance });
        Ok(())
    }

    pub fn set_max_slippage_bps(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        bps: u32,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        if bps > MAX_SLIPPAGE_BPS {
            return Err(RouterError::SlippageTooHigh {
                bps,
                max: MAX_SLIPPAGE_BPS,
            });
        }
        self.settings.max_slippage_bps = bps;
        info!(bps, "max slippage set");
        state.emit(Event::MaxSlippageSet { bps });
        Ok(())
    }

    pub fn set_max_backend_count(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        count: usize,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        if count < self.backends.len() {
            return Err(RouterError::TooManyBackends { max: count });
        }
        self.settings.max_backend_count = count;
        info!(count, "max backend count set");
        state.emit(Event::MaxBackendCountSet { count });
        Ok(())
    }

    /// Add `delta` to the shortfall liability.
    ///
    /// The total is not capped by managed value; net assets floor at zero.
    pub fn record_shortfall(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        delta: U256,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        self.ensure_ledger(ledger)?;
        if delta.is_zero() {
            return Err(RouterError::ZeroAmount);
        }

        let total = self
            .shortfall
            .checked_add(delta)
            .ok_or(RouterError::AmountOverflow)?;

        self.shortfall = total;
        info!(%delta, %total, "shortfall recorded");
        state.emit(Event::ShortfallRecorded { delta, total });
        Ok(())
    }

    /// Reduce the shortfall after recovery capital has been supplied.
    pub fn clear_shortfall(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        amount: U256,
    ) -> Result<()> {
        self.access.ensure(Role::ConfigManager, caller)?;
        if amount > self.shortfall {
            return Err(RouterError::ShortfallClearExceeds {
                amount,
                outstanding: self.shortfall,
            });
        }

        self.shortfall -= amount;
        info!(%amount, total = %self.shortfall, "shortfall cleared");
        state.emit(Event::ShortfallCleared {
            amount,
            total: self.shortfall,
        });
        Ok(())
    }

    /// Carry the outgoing router's shortfall onto this one during replacement.
    pub(crate) fn set_shortfall_on_migration(&mut self, state: &mut ChainState, amount: U256) {
        self.shortfall = amount;
        info!(router = %self.address, total = %amount, "shortfall migrated");
        state.emit(Event::ShortfallMigrated {
            router: self.address,
            total: amount,
        });
    }

    fn ensure_drained(&self, state: &ChainState, index: usize) -> Result<()> {
        let value = self.value_at(state, index)?;
        if value > self.settings.dust_tolerance {
            return Err(RouterError::BackendHasBalance {
                backend: self.backends[index].backend_id,
                value,
            });
        }
        Ok(())
    }

    /// Suspended backends are never withdrawn from, so nothing may be left in
    /// custody that valuation would still count.
    fn ensure_empty(&self, state: &ChainState, index: usize) -> Result<()> {
        let backend = self.backends[index].backend_id;
        let receipts = state.tokens.balance_of(backend, self.ledger);
        if !receipts.is_zero() {
            return Err(RouterError::BackendNotEmpty { backend, receipts });
        }
        Ok(())
    }

    /// Fail if a different adapter already holds the mapping for `receipt`.
    fn ensure_unregistered(&self, receipt: Address, adapter: &AdapterHandle) -> Result<()> {
        match self.adapters.get(&receipt) {
            Some(existing) if existing.address() != adapter.address() => {
                Err(RouterError::AdapterAlreadyRegistered {
                    receipt,
                    existing: existing.address(),
                })
            }
            _ => Ok(()),
        }
    }

    fn attach_adapter(
        &mut self,
        state: &mut ChainState,
        ledger: &mut CollateralLedger,
        adapter: AdapterHandle,
    ) -> Result<()> {
        let receipt = adapter.strategy_share();
        ledger.add_supported_receipt(state, self.address, receipt)?;

        info!(%receipt, adapter = %adapter.address(), "adapter registered");
        state.emit(Event::AdapterRegistered {
            receipt,
            adapter: adapter.address(),
        });
        self.adapters.insert(receipt, adapter);
        Ok(())
    }

    fn detach_adapter(
        &mut self,
        state: &mut ChainState,
        ledger: &mut CollateralLedger,
        receipt: Address,
    ) -> Result<()> {
        ledger.remove_supported_receipt(state, self.address, receipt)?;
        if let Some(adapter) = self.adapters.remove(&receipt) {
            info!(%receipt, adapter = %adapter.address(), "adapter removed");
            state.emit(Event::AdapterRemoved {
                receipt,
                adapter: adapter.address(),
            });
        }
        Ok(())
    }

    fn clear_default(&mut self, state: &mut ChainState) {
        self.default_backend = None;
        state.emit(Event::DefaultBackendSet { backend: None });
    }
}
