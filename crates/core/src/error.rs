//! Error types for the routing core.
//!
//! Each layer has its own enum; lower layers convert into higher ones so a
//! failure deep inside an adapter call surfaces with the backend it came from.

use alloy_primitives::{Address, U256};
use multivault_allocation::AllocationError;
use thiserror::Error;

use crate::access::Role;
use crate::router::BackendStatus;

/// Balance and allowance failures from the token book.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Holder does not have enough of the token
    #[error("Insufficient balance of {token} for {holder}: have {have}, need {need}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        have: U256,
        need: U256,
    },

    /// Spender's allowance is too small
    #[error("Insufficient allowance of {token} from {owner} to {spender}: have {have}, need {need}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        have: U256,
        need: U256,
    },

    /// Transfer to or from the zero address
    #[error("Zero address")]
    ZeroAddress,
}

/// Failures of an external tokenized vault backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No vault deployed at this address
    #[error("Unknown vault {vault}")]
    UnknownVault { vault: Address },

    /// A vault is already deployed at this address
    #[error("Vault {vault} already deployed")]
    VaultAlreadyDeployed { vault: Address },

    /// Vault is paused
    #[error("Vault {vault} is paused")]
    Paused { vault: Address },

    /// Not enough idle liquidity to pay out
    #[error("Insufficient liquidity in vault {vault}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        vault: Address,
        requested: U256,
        available: U256,
    },

    /// Deposit would mint zero shares
    #[error("Deposit into vault {vault} would mint zero shares")]
    ZeroShares { vault: Address },

    /// Redemption would pay zero assets
    #[error("Redemption from vault {vault} would pay zero assets")]
    ZeroAssets { vault: Address },

    /// Vault cannot currently price its shares
    #[error("Valuation unavailable for vault {vault}")]
    ValuationUnavailable { vault: Address },

    /// Underlying token movement failed
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Failures reported by a strategy adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Called with a zero amount
    #[error("Zero amount")]
    ZeroAmount,

    /// Amount converts to zero on the other side
    #[error("Amount converts to zero in backend {backend}")]
    ZeroConversion { backend: Address },

    /// Backend is paused
    #[error("Backend {backend} is paused")]
    Paused { backend: Address },

    /// Backend cannot pay out the requested amount
    #[error("Insufficient liquidity in backend {backend}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        backend: Address,
        requested: U256,
        available: U256,
    },

    /// Caller did not approve enough for the adapter to pull
    #[error("Insufficient allowance of {token}: have {have}, need {need}")]
    InsufficientAllowance {
        token: Address,
        have: U256,
        need: U256,
    },

    /// Valuation source unreachable or illiquid
    #[error("Valuation unavailable for backend {backend}")]
    ValuationUnavailable { backend: Address },

    /// Adapter was asked about a receipt it does not handle
    #[error("Receipt mismatch: adapter handles {expected}, asked about {actual}")]
    ReceiptMismatch { expected: Address, actual: Address },

    /// Token movement failed for a reason other than allowance
    #[error(transparent)]
    Token(TokenError),

    /// Any other backend failure
    #[error("Backend failure: {0}")]
    Backend(String),
}

impl AdapterError {
    /// Whether Auto mode may recover by trying another backend.
    ///
    /// Liquidity shortfalls, pauses, zero conversions, and allowance or
    /// rounding-to-zero edge cases are transient. Everything else is fatal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::ZeroConversion { .. }
                | AdapterError::Paused { .. }
                | AdapterError::InsufficientLiquidity { .. }
                | AdapterError::InsufficientAllowance { .. }
        )
    }
}

impl From<TokenError> for AdapterError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::InsufficientAllowance {
                token, have, need, ..
            } => AdapterError::InsufficientAllowance { token, have, need },
            other => AdapterError::Token(other),
        }
    }
}

impl From<BackendError> for AdapterError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Paused { vault } => AdapterError::Paused { backend: vault },
            BackendError::InsufficientLiquidity {
                vault,
                requested,
                available,
            } => AdapterError::InsufficientLiquidity {
                backend: vault,
                requested,
                available,
            },
            BackendError::ZeroShares { vault } | BackendError::ZeroAssets { vault } => {
                AdapterError::ZeroConversion { backend: vault }
            }
            BackendError::ValuationUnavailable { vault } => {
                AdapterError::ValuationUnavailable { backend: vault }
            }
            BackendError::Token(token) => token.into(),
            other => AdapterError::Backend(other.to_string()),
        }
    }
}

/// Missing capability for a privileged call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Caller lacks the role
    #[error("{caller} is missing role {role}")]
    Unauthorized { role: Role, caller: Address },

    /// Role granted to the zero address
    #[error("Cannot grant a role to the zero address")]
    ZeroAddress,
}

/// Failures of the collateral ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// Caller is not the configured router
    #[error("{caller} is not the ledger's router")]
    NotRouter { caller: Address },

    /// Null identity supplied
    #[error("Zero address")]
    ZeroAddress,

    /// Receipt identity is not (or no longer) registered
    #[error("Receipt {receipt} is not supported by the ledger")]
    ReceiptNotSupported { receipt: Address },

    /// Rescue attempted on a supported receipt or the pooled unit
    #[error("Token {token} cannot be rescued")]
    CannotRescueRestricted { token: Address },

    /// An adapter failed to value a receipt balance
    #[error("Valuation failed for receipt {receipt}: {source}")]
    Valuation {
        receipt: Address,
        #[source]
        source: AdapterError,
    },
}

/// Failures of the router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// An adapter call failed
    #[error("Adapter for backend {backend} failed: {source}")]
    Adapter {
        backend: Address,
        #[source]
        source: AdapterError,
    },

    /// Value-moving entry point re-entered
    #[error("Reentrant call")]
    Reentrancy,

    /// Zero amount supplied
    #[error("Zero amount")]
    ZeroAmount,

    /// Null identity supplied
    #[error("Zero address")]
    ZeroAddress,

    /// Router called with a ledger it is not wired to
    #[error("Ledger mismatch: router uses {expected}, got {actual}")]
    LedgerMismatch { expected: Address, actual: Address },

    /// Backend id unknown
    #[error("Backend {backend} not found")]
    BackendNotFound { backend: Address },

    /// Backend id already configured
    #[error("Backend {backend} already exists")]
    BackendAlreadyExists { backend: Address },

    /// Backend status forbids the operation
    #[error("Backend {backend} is {status:?}")]
    BackendNotActive {
        backend: Address,
        status: BackendStatus,
    },

    /// Backend still holds more than dust
    #[error("Backend {backend} still holds {value} pooled units")]
    BackendHasBalance { backend: Address, value: U256 },

    /// Backend still holds receipts in custody
    #[error("Backend {backend} still holds {receipts} receipts in custody")]
    BackendNotEmpty { backend: Address, receipts: U256 },

    /// Backend count limit reached
    #[error("Backend limit of {max} reached")]
    TooManyBackends { max: usize },

    /// No backend is eligible for deposits
    #[error("No active backends")]
    NoActiveBackends,

    /// Every eligible backend failed transiently
    #[error("No backend accepted the operation after {attempted} attempts")]
    NoEligibleBackend { attempted: usize },

    /// Another adapter is already registered for this receipt
    #[error("Adapter {existing} already registered for receipt {receipt}")]
    AdapterAlreadyRegistered { receipt: Address, existing: Address },

    /// No adapter registered for this receipt
    #[error("No adapter registered for receipt {receipt}")]
    AdapterNotRegistered { receipt: Address },

    /// Adapter still referenced by a backend
    #[error("Adapter for receipt {receipt} is still used by a backend")]
    AdapterInUse { receipt: Address },

    /// Adapter reports a receipt other than the backend id
    #[error("Adapter for backend {backend} reports receipt {reported}")]
    AdapterReceiptMismatch { backend: Address, reported: Address },

    /// Ledger custody too small for the requested withdrawal
    #[error("Insufficient custody in backend {backend}: need {needed}, have {available}")]
    InsufficientCustody {
        backend: Address,
        needed: U256,
        available: U256,
    },

    /// Adapter delivered less than its own preview allows
    #[error("Slippage check failed for backend {backend}: minimum {minimum}, received {actual}")]
    SlippageExceeded {
        backend: Address,
        minimum: U256,
        actual: U256,
    },

    /// Adapter delivered fewer pooled units than requested
    #[error("Short delivery from backend {backend}: requested {requested}, delivered {delivered}")]
    ShortDelivery {
        backend: Address,
        requested: U256,
        delivered: U256,
    },

    /// Exchange legs differ in value by more than dust tolerance
    #[error("Exchange value mismatch: out {value_out}, in {value_in}, tolerance {tolerance}")]
    ExchangeValueMismatch {
        value_out: U256,
        value_in: U256,
        tolerance: U256,
    },

    /// Caller-supplied minimum not met
    #[error("Minimum output not met: minimum {minimum}, received {actual}")]
    MinimumOutputNotMet { minimum: U256, actual: U256 },

    /// Exchange source and destination are the same
    #[error("Cannot exchange backend {backend} with itself")]
    SameBackend { backend: Address },

    /// Solver call with no legs
    #[error("Empty leg list")]
    EmptyLegs,

    /// Solver call with ragged parallel inputs
    #[error("Leg length mismatch: {backends} backends, {amounts} amounts")]
    LegLengthMismatch { backends: usize, amounts: usize },

    /// Default backend required but unset
    #[error("Default backend not set")]
    DefaultBackendNotSet,

    /// Slippage setting above the allowed maximum
    #[error("Slippage {bps} exceeds maximum {max}")]
    SlippageTooHigh { bps: u32, max: u32 },

    /// Summed amounts do not fit in 256 bits
    #[error("Amount overflow")]
    AmountOverflow,

    /// Recovery larger than the outstanding shortfall
    #[error("Cannot clear {amount}, outstanding shortfall is {outstanding}")]
    ShortfallClearExceeds { amount: U256, outstanding: U256 },
}

impl RouterError {
    /// Whether Auto mode may fall back to the next backend.
    pub fn is_transient(&self) -> bool {
        match self {
            RouterError::Adapter { source, .. } => source.is_transient(),
            RouterError::InsufficientCustody { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn adapter(backend: Address) -> impl FnOnce(AdapterError) -> RouterError {
        move |source| RouterError::Adapter { backend, source }
    }
}

/// Failures of the pooled share unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// Value-moving entry point re-entered
    #[error("Reentrant call")]
    Reentrancy,

    /// Zero amount supplied
    #[error("Zero amount")]
    ZeroAmount,

    /// Operation would mint or burn zero shares while moving value
    #[error("Operation would move value for zero shares")]
    ZeroShares,

    /// Operation would burn shares for zero assets
    #[error("Operation would burn shares for zero assets")]
    ZeroAssets,

    /// More shares would be burned than the caller allows
    #[error("Would burn {shares} shares, maximum {max}")]
    SharesAboveMaximum { shares: U256, max: U256 },

    /// Fewer shares would be minted than the caller requires
    #[error("Would mint {shares} shares, minimum {min}")]
    SharesBelowMinimum { shares: U256, min: U256 },

    /// Withdrawal fee above the allowed maximum
    #[error("Withdrawal fee {bps} exceeds maximum {max}")]
    FeeTooHigh { bps: u32, max: u32 },

    /// Reinvest incentive above the allowed maximum
    #[error("Reinvest incentive {bps} exceeds maximum {max}")]
    IncentiveTooHigh { bps: u32, max: u32 },

    /// Fees cannot move while a shortfall is outstanding
    #[error("Shortfall of {shortfall} outstanding")]
    ShortfallOutstanding { shortfall: U256 },

    /// New ledger does not recognize the incoming router
    #[error("Ledger does not recognize router {router} (ledger router: {ledger_router:?})")]
    RouterNotRecognized {
        router: Address,
        ledger_router: Option<Address>,
    },

    /// Router and ledger are not wired to each other
    #[error("Router expects ledger {expected}, got {actual}")]
    LedgerMismatch { expected: Address, actual: Address },

    /// Router routes a different pooled unit
    #[error("Router asset {actual} does not match vault asset {expected}")]
    AssetMismatch { expected: Address, actual: Address },

    /// Router has not granted this vault its entry points
    #[error("Router {router} does not accept calls from this vault")]
    VaultNotAuthorized { router: Address },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let backend = Address::repeat_byte(1);
        assert!(AdapterError::Paused { backend }.is_transient());
        assert!(AdapterError::ZeroConversion { backend }.is_transient());
        assert!(AdapterError::InsufficientLiquidity {
            backend,
            requested: U256::from(2u64),
            available: U256::from(1u64),
        }
        .is_transient());
        assert!(!AdapterError::ZeroAmount.is_transient());
        assert!(!AdapterError::ValuationUnavailable { backend }.is_transient());
        assert!(!AdapterError::Backend("boom".to_string()).is_transient());
    }

    #[test]
    fn test_backend_error_mapping() {
        let vault = Address::repeat_byte(2);
        assert_eq!(
            AdapterError::from(BackendError::ZeroShares { vault }),
            AdapterError::ZeroConversion { backend: vault }
        );
        assert_eq!(
            AdapterError::from(BackendError::UnknownVault { vault }),
            AdapterError::Backend(format!("Unknown vault {vault}"))
        );
    }

    #[test]
    fn test_router_error_transient() {
        let backend = Address::repeat_byte(3);
        let transient = RouterError::Adapter {
            backend,
            source: AdapterError::Paused { backend },
        };
        assert!(transient.is_transient());

        let fatal = RouterError::SlippageExceeded {
            backend,
            minimum: U256::from(10u64),
            actual: U256::from(9u64),
        };
        assert!(!fatal.is_transient());
    }

    #[test]
    fn test_error_display_short_delivery() {
        let error = RouterError::ShortDelivery {
            backend: Address::ZERO,
            requested: U256::from(100u64),
            delivered: U256::from(99u64),
        };
        assert_eq!(
            error.to_string(),
            format!(
                "Short delivery from backend {}: requested 100, delivered 99",
                Address::ZERO
            )
        );
    }
}
