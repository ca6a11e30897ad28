use alloy::primitives::{Bytes, U256};
use alloy::sol;
use relayer_settlement_client_interface::VerifyCall;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface BalanceVerifier {
        function verify(
            bytes calldata proof,
            uint256 slot,
            uint256 balanceSum,
            uint64 numberOfNonActivatedValidators,
            uint64 numberOfActiveValidators,
            uint64 numberOfExitedValidators,
            uint64 numberOfSlashedValidators
        ) external;
    }
}

impl From<VerifyCall> for BalanceVerifier::verifyCall {
    fn from(call: VerifyCall) -> Self {
        Self {
            proof: Bytes::from(call.proof),
            slot: U256::from(call.slot),
            balanceSum: U256::from(call.balance_sum),
            numberOfNonActivatedValidators: call.non_activated_validators,
            numberOfActiveValidators: call.active_validators,
            numberOfExitedValidators: call.exited_validators,
            numberOfSlashedValidators: call.slashed_validators,
        }
    }
}
