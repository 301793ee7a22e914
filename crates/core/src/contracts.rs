//! Contract matching: an additional auto-approve source evaluated ahead of
//! or alongside rule evaluation, never inside it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::reference::{ContractId, ContractStatus, VendorContract};

/// Fractional variance tolerated when the contract does not specify one.
pub const DEFAULT_CONTRACT_VARIANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMatch {
    pub matched: bool,
    pub reason: String,
    pub contract_id: Option<ContractId>,
}

impl ContractMatch {
    pub fn no_match(reason: impl Into<String>) -> Self {
        Self { matched: false, reason: reason.into(), contract_id: None }
    }
}

/// Match a request amount against one contract by amount variance.
pub fn match_contract(amount: Decimal, contract: &VendorContract) -> ContractMatch {
    match_contract_with_default(amount, contract, DEFAULT_CONTRACT_VARIANCE)
}

/// Same check with a caller-supplied fallback tolerance for contracts that
/// do not carry one.
pub fn match_contract_with_default(
    amount: Decimal,
    contract: &VendorContract,
    default_variance: Decimal,
) -> ContractMatch {
    if contract.status != ContractStatus::Active {
        return ContractMatch::no_match(format!(
            "contract `{}` is not active",
            contract.id.0
        ));
    }
    if contract.contract_amount.is_zero() {
        return ContractMatch::no_match(format!(
            "contract `{}` has a zero amount",
            contract.id.0
        ));
    }

    let tolerance = contract.allowed_variance_pct.unwrap_or(default_variance);
    let variance = ((amount - contract.contract_amount) / contract.contract_amount).abs();

    if variance <= tolerance {
        ContractMatch {
            matched: true,
            reason: format!(
                "amount {amount} within {tolerance} variance of contract amount {}",
                contract.contract_amount
            ),
            contract_id: Some(contract.id.clone()),
        }
    } else {
        ContractMatch::no_match(format!(
            "amount {amount} deviates {variance} from contract amount {}, over tolerance {tolerance}",
            contract.contract_amount
        ))
    }
}
