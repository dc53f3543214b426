//! Error taxonomy for the preparation and confirmation engine.
//!
//! The `Display` text of every variant is the message shown to the user. Errors never
//! escape the dispatcher: they are converted into a failed [`crate::dispatcher::Reply`].

use alloy::primitives::Address;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),
    /// Registry lookup matched zero or several contracts.
    #[error("{}", ambiguous_message(.0))]
    AmbiguousTarget(Vec<String>),
    #[error("{0}")]
    NotFound(String),
    #[error("Function '{function}' expects {expected} arguments, received {received}.")]
    Arity {
        function: String,
        expected: usize,
        received: usize,
    },
    #[error("Function '{0}' is not payable; omit valueEth.")]
    Payability(String),
    #[error("{0}")]
    ArgumentFormat(String),
    #[error("Contract call would revert: {0}")]
    SimulatedRevert(String),
    #[error("Static call failed: {0}")]
    SimulationFailed(String),
    /// Confirm or deny with an empty slot. Carries the verb shown to the user.
    #[error("No pending transaction to {0}.")]
    NoPendingOperation(&'static str),
    #[error("Transaction rejected in wallet.")]
    UserRejected,
    #[error("Insufficient funds for value plus gas.")]
    InsufficientFunds,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Execution reverted: {0}")]
    ExecutionReverted(String),
    #[error("Transaction failed: {0}")]
    Signing(String),
    #[error(
        "Wallet is connected to chain {actual}, but the operation targets chain {expected}. Switch network and retry."
    )]
    ChainMismatch { expected: u64, actual: u64 },
    #[error("Unsupported chainId {0}, please specify a supported network")]
    UnsupportedChain(u64),
    #[error("Compilation failed.\n{0}")]
    Compilation(String),
    #[error("Contract registry error: {0}")]
    Registry(String),
    #[error("RPC provider error: {0}")]
    Provider(String),
    #[error("No wallet connected.")]
    WalletUnavailable,
}

fn ambiguous_message(candidates: &[String]) -> String {
    if candidates.is_empty() {
        return "No contract matching the provided filters.".to_string();
    }
    let mut message =
        "More than one contract matches. Please specify a unique contractAddress.".to_string();
    for candidate in candidates {
        message.push_str("\n• ");
        message.push_str(candidate);
    }
    message
}

impl EngineError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::AmbiguousTarget(_) => "ambiguous_target",
            EngineError::NotFound(_) => "not_found",
            EngineError::Arity { .. } => "arity",
            EngineError::Payability(_) => "payability",
            EngineError::ArgumentFormat(_) => "argument_format",
            EngineError::SimulatedRevert(_) => "simulated_revert",
            EngineError::SimulationFailed(_) => "simulation_failed",
            EngineError::NoPendingOperation(_) => "no_pending_operation",
            EngineError::UserRejected => "user_rejected",
            EngineError::InsufficientFunds => "insufficient_funds",
            EngineError::Network(_) => "network",
            EngineError::ExecutionReverted(_) => "execution_reverted",
            EngineError::Signing(_) => "signing",
            EngineError::ChainMismatch { .. } => "chain_mismatch",
            EngineError::UnsupportedChain(_) => "unsupported_chain",
            EngineError::Compilation(_) => "compilation",
            EngineError::Registry(_) => "registry",
            EngineError::Provider(_) => "provider",
            EngineError::WalletUnavailable => "wallet_unavailable",
        }
    }

    /// Whether the failure was caused by the caller's input rather than infrastructure.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            EngineError::Network(_)
                | EngineError::Provider(_)
                | EngineError::Registry(_)
                | EngineError::WalletUnavailable
        )
    }

    pub(crate) fn invalid_address(field: &str, value: &str) -> Self {
        EngineError::Validation(format!("Invalid {field} address: {value}"))
    }
}

/// Formats a registry candidate the way ambiguity lists show it.
pub fn candidate_label(name: Option<&str>, address: Option<Address>, network: Option<&str>) -> String {
    format!(
        "{} @ {} [{}]",
        name.unwrap_or("(Unnamed)"),
        address.map(|a| a.to_checksum(None)).unwrap_or_else(|| "N/A".into()),
        network.unwrap_or("?")
    )
}
