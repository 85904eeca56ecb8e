//! Scenario files: a system configuration plus the steps to replay against it.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, bail, Context, Result};
use multivault_core::testing::{user, Deployment, DeploymentBuilder, Misbehavior, ADMIN};
use multivault_core::{BackendStatus, RouterSettings, SolverLeg, VaultSettings};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub router: RouterSettings,
    #[serde(default)]
    pub vault: VaultSettings,
    pub backends: Vec<BackendSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendSpec {
    pub name: String,
    /// Target share in millionths
    pub target_bps: u32,
    #[serde(default = "active")]
    pub status: BackendStatus,
}

fn active() -> BackendStatus {
    BackendStatus::Active
}

/// One solver leg, addressed by backend index.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LegSpec {
    pub backend: usize,
    pub amount: u64,
}

/// Failure mode to install on a backend's adapter.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorSpec {
    Honest,
    ShortDelivery { keep_bps: u32 },
    InflatedReport { keep_bps: u32 },
    ShortWithdrawal { keep_bps: u32 },
    FailTransient,
    FailFatal,
    UnreachableValuation,
}

impl From<BehaviorSpec> for Misbehavior {
    fn from(behavior: BehaviorSpec) -> Self {
        match behavior {
            BehaviorSpec::Honest => Misbehavior::Honest,
            BehaviorSpec::ShortDelivery { keep_bps } => Misbehavior::ShortDelivery { keep_bps },
            BehaviorSpec::InflatedReport { keep_bps } => Misbehavior::InflatedReport { keep_bps },
            BehaviorSpec::ShortWithdrawal { keep_bps } => {
                Misbehavior::ShortWithdrawal { keep_bps }
            }
            BehaviorSpec::FailTransient => Misbehavior::FailTransient,
            BehaviorSpec::FailFatal => Misbehavior::FailFatal,
            BehaviorSpec::UnreachableValuation => Misbehavior::UnreachableValuation,
        }
    }
}

/// A single replayed operation. Users are numbered, backends are indexed
/// in scenario order, and privileged steps run as the deployment admin.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Fund {
        user: u8,
        amount: u64,
    },
    Deposit {
        user: u8,
        amount: u64,
    },
    Mint {
        user: u8,
        shares: u64,
    },
    Withdraw {
        user: u8,
        amount: u64,
    },
    Redeem {
        user: u8,
        shares: u64,
    },
    SolverDeposit {
        user: u8,
        legs: Vec<LegSpec>,
        #[serde(default)]
        min_shares: u64,
    },
    SolverWithdraw {
        user: u8,
        legs: Vec<LegSpec>,
        #[serde(default)]
        max_shares: Option<u64>,
    },
    Exchange {
        from: usize,
        to: usize,
        receipt_amount: u64,
        #[serde(default)]
        min_to: u64,
    },
    Rebalance {
        from: usize,
        to: usize,
        pool_value: u64,
        #[serde(default)]
        min_to: u64,
    },
    Sweep {
        #[serde(default)]
        max_amount: Option<u64>,
    },
    AccrueYield {
        backend: usize,
        amount: u64,
    },
    RealizeLoss {
        backend: usize,
        amount: u64,
    },
    Pause {
        backend: usize,
    },
    Unpause {
        backend: usize,
    },
    SetLiquidityCap {
        backend: usize,
        #[serde(default)]
        cap: Option<u64>,
    },
    SetBehavior {
        backend: usize,
        behavior: BehaviorSpec,
    },
    RecordShortfall {
        amount: u64,
    },
    ClearShortfall {
        amount: u64,
    },
    ReinvestFees {
        user: u8,
    },
    SetWithdrawalFee {
        bps: u32,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Fund { user, amount } => write!(f, "fund user {user} with {amount}"),
            Step::Deposit { user, amount } => write!(f, "user {user} deposits {amount}"),
            Step::Mint { user, shares } => write!(f, "user {user} mints {shares} shares"),
            Step::Withdraw { user, amount } => write!(f, "user {user} withdraws {amount}"),
            Step::Redeem { user, shares } => write!(f, "user {user} redeems {shares} shares"),
            Step::SolverDeposit { user, legs, .. } => {
                write!(f, "user {user} deposits over {} legs", legs.len())
            }
            Step::SolverWithdraw { user, legs, .. } => {
                write!(f, "user {user} withdraws over {} legs", legs.len())
            }
            Step::Exchange {
                from,
                to,
                receipt_amount,
                ..
            } => write!(f, "exchange {receipt_amount} receipts from #{from} to #{to}"),
            Step::Rebalance {
                from,
                to,
                pool_value,
                ..
            } => write!(f, "rebalance {pool_value} from #{from} to #{to}"),
            Step::Sweep { .. } => write!(f, "sweep idle surplus"),
            Step::AccrueYield { backend, amount } => {
                write!(f, "backend #{backend} earns {amount}")
            }
            Step::RealizeLoss { backend, amount } => {
                write!(f, "backend #{backend} loses {amount}")
            }
            Step::Pause { backend } => write!(f, "pause backend #{backend}"),
            Step::Unpause { backend } => write!(f, "unpause backend #{backend}"),
            Step::SetLiquidityCap { backend, cap } => match cap {
                Some(cap) => write!(f, "cap backend #{backend} liquidity at {cap}"),
                None => write!(f, "lift backend #{backend} liquidity cap"),
            },
            Step::SetBehavior { backend, behavior } => {
                write!(f, "backend #{backend} behaves {behavior:?}")
            }
            Step::RecordShortfall { amount } => write!(f, "record shortfall {amount}"),
            Step::ClearShortfall { amount } => write!(f, "clear shortfall {amount}"),
            Step::ReinvestFees { user } => write!(f, "user {user} reinvests fees"),
            Step::SetWithdrawalFee { bps } => write!(f, "set withdrawal fee to {bps}"),
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            bail!("scenario must configure at least one backend");
        }
        let mut names = HashSet::new();
        for backend in &self.backends {
            if !names.insert(backend.name.as_str()) {
                bail!("duplicate backend name {:?}", backend.name);
            }
        }
        Ok(())
    }

    pub fn backend_name(&self, index: usize) -> &str {
        self.backends
            .get(index)
            .map_or("unknown", |backend| backend.name.as_str())
    }

    /// Wire a deployment with the scenario's settings, targets, and statuses.
    pub fn deploy(&self) -> Result<Deployment> {
        let targets = self.backends.iter().map(|backend| backend.target_bps).collect();
        let mut deployment = DeploymentBuilder::new()
            .with_targets(targets)
            .with_router_settings(self.router.clone())
            .with_vault_settings(self.vault.clone())
            .build()
            .map_err(|error| anyhow!(error))
            .context("Failed to build deployment")?;

        if self
            .backends
            .iter()
            .any(|backend| backend.status != BackendStatus::Active)
        {
            self.apply_statuses(&mut deployment)?;
        }
        Ok(deployment)
    }

    fn apply_statuses(&self, deployment: &mut Deployment) -> Result<()> {
        let (router, ledger) = deployment.vault.core_mut();
        let configs = router
            .backends()
            .iter()
            .zip(&self.backends)
            .map(|(config, spec)| config.clone().with_status(spec.status))
            .collect();
        router
            .set_backend_configs(&mut deployment.state, ledger, ADMIN, configs)
            .context("Failed to apply backend statuses")?;

        if router.default_backend().is_none() {
            let fallback = router
                .backends()
                .iter()
                .find(|config| config.status.accepts_deposits())
                .map(|config| config.backend_id);
            if let Some(backend) = fallback {
                router.set_default_backend(&mut deployment.state, ADMIN, backend)?;
            }
        }
        deployment.state.take_events();
        Ok(())
    }
}

fn backend(deployment: &Deployment, index: usize) -> Result<Address> {
    if index >= deployment.adapters.len() {
        bail!(
            "backend #{index} is not configured ({} backends)",
            deployment.adapters.len()
        );
    }
    Ok(deployment.backend(index))
}

fn solver_legs(deployment: &Deployment, legs: &[LegSpec]) -> Result<Vec<SolverLeg>> {
    legs.iter()
        .map(|leg| -> Result<SolverLeg> {
            Ok(SolverLeg::new(
                backend(deployment, leg.backend)?,
                U256::from(leg.amount),
            ))
        })
        .collect()
}

/// Apply one step, returning a short description of what it did.
pub fn apply(deployment: &mut Deployment, step: &Step) -> Result<String> {
    match step {
        Step::Fund { user: index, amount } => {
            deployment
                .fund(user(*index), U256::from(*amount))
                .map_err(|error| anyhow!(error))?;
            Ok(format!("balance {}", deployment.pool_balance(user(*index))))
        }
        Step::Deposit { user: index, amount } => {
            let shares = deployment.deposit(user(*index), U256::from(*amount))?;
            Ok(format!("minted {shares} shares"))
        }
        Step::Mint { user: index, shares } => {
            let who = user(*index);
            let assets =
                deployment
                    .vault
                    .mint(&mut deployment.state, who, U256::from(*shares), who)?;
            Ok(format!("charged {assets}"))
        }
        Step::Withdraw { user: index, amount } => {
            let shares = deployment.withdraw(user(*index), U256::from(*amount))?;
            Ok(format!("burned {shares} shares"))
        }
        Step::Redeem { user: index, shares } => {
            let paid = deployment.redeem(user(*index), U256::from(*shares))?;
            Ok(format!("paid {paid}"))
        }
        Step::SolverDeposit {
            user: index,
            legs,
            min_shares,
        } => {
            let who = user(*index);
            let legs = solver_legs(deployment, legs)?;
            let shares = deployment.vault.solver_deposit_assets(
                &mut deployment.state,
                who,
                &legs,
                U256::from(*min_shares),
                who,
            )?;
            Ok(format!("minted {shares} shares"))
        }
        Step::SolverWithdraw {
            user: index,
            legs,
            max_shares,
        } => {
            let who = user(*index);
            let legs = solver_legs(deployment, legs)?;
            let max_shares = max_shares.map_or(U256::MAX, U256::from);
            let shares = deployment.vault.solver_withdraw_assets(
                &mut deployment.state,
                who,
                &legs,
                max_shares,
                who,
                who,
            )?;
            Ok(format!("burned {shares} shares"))
        }
        Step::Exchange {
            from,
            to,
            receipt_amount,
            min_to,
        } => {
            let (from, to) = (backend(deployment, *from)?, backend(deployment, *to)?);
            let (router, ledger) = deployment.vault.core_mut();
            let outcome = router.exchange_between_backends(
                &mut deployment.state,
                ledger,
                ADMIN,
                from,
                to,
                U256::from(*receipt_amount),
                U256::from(*min_to),
            )?;
            Ok(format!(
                "moved {} worth, received {} receipts",
                outcome.pool_value, outcome.to_receipt_amount
            ))
        }
        Step::Rebalance {
            from,
            to,
            pool_value,
            min_to,
        } => {
            let (from, to) = (backend(deployment, *from)?, backend(deployment, *to)?);
            let (router, ledger) = deployment.vault.core_mut();
            let outcome = router.rebalance_by_value(
                &mut deployment.state,
                ledger,
                ADMIN,
                from,
                to,
                U256::from(*pool_value),
                U256::from(*min_to),
            )?;
            Ok(format!(
                "spent {} receipts, received {}",
                outcome.from_receipt_amount, outcome.to_receipt_amount
            ))
        }
        Step::Sweep { max_amount } => {
            let max_amount = max_amount.map_or(U256::MAX, U256::from);
            let swept = deployment
                .vault
                .router_mut()
                .sweep_surplus(&mut deployment.state, ADMIN, max_amount)?;
            Ok(format!("swept {swept}"))
        }
        Step::AccrueYield {
            backend: index,
            amount,
        } => {
            let vault = backend(deployment, *index)?;
            deployment.state.accrue_yield(vault, U256::from(*amount))?;
            Ok("yield credited".to_string())
        }
        Step::RealizeLoss {
            backend: index,
            amount,
        } => {
            let vault = backend(deployment, *index)?;
            deployment.state.realize_loss(vault, U256::from(*amount))?;
            Ok("loss realized".to_string())
        }
        Step::Pause { backend: index } => {
            let vault = backend(deployment, *index)?;
            deployment.state.set_paused(vault, true)?;
            Ok("paused".to_string())
        }
        Step::Unpause { backend: index } => {
            let vault = backend(deployment, *index)?;
            deployment.state.set_paused(vault, false)?;
            Ok("unpaused".to_string())
        }
        Step::SetLiquidityCap {
            backend: index,
            cap,
        } => {
            let vault = backend(deployment, *index)?;
            deployment
                .state
                .set_liquidity_cap(vault, cap.map(U256::from))?;
            Ok("liquidity cap updated".to_string())
        }
        Step::SetBehavior {
            backend: index,
            behavior,
        } => {
            backend(deployment, *index)?;
            deployment.adapter(*index).set_behavior((*behavior).into());
            Ok(format!("{behavior:?}"))
        }
        Step::RecordShortfall { amount } => {
            let (router, ledger) = deployment.vault.core_mut();
            router.record_shortfall(&mut deployment.state, ledger, ADMIN, U256::from(*amount))?;
            Ok(format!("shortfall {}", router.shortfall()))
        }
        Step::ClearShortfall { amount } => {
            let router = deployment.vault.router_mut();
            router.clear_shortfall(&mut deployment.state, ADMIN, U256::from(*amount))?;
            Ok(format!("shortfall {}", router.shortfall()))
        }
        Step::ReinvestFees { user: index } => {
            let reinvested = deployment
                .vault
                .reinvest_fees(&mut deployment.state, user(*index))?;
            Ok(format!("reinvested {reinvested}"))
        }
        Step::SetWithdrawalFee { bps } => {
            deployment
                .vault
                .set_withdrawal_fee(&mut deployment.state, ADMIN, *bps)?;
            Ok(format!("fee {bps}"))
        }
    }
}
