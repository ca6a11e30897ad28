use crate::error::FeeEstimationError;

/// EIP-1559 fee caps for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip1559Fees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Builds the fee caps from the latest base fee and the per-block priority fee samples of the
/// requested percentile. The base fee is doubled so the transaction survives several full blocks.
pub fn fees_from_history(base_fees: &[u128], rewards: Option<&[Vec<u128>]>) -> Result<Eip1559Fees, FeeEstimationError> {
    let base_fee = *base_fees.last().ok_or(FeeEstimationError::MissingBaseFee)?;
    let samples: Vec<u128> =
        rewards.ok_or(FeeEstimationError::MissingRewards)?.iter().filter_map(|block| block.first().copied()).collect();
    if samples.is_empty() {
        return Err(FeeEstimationError::MissingRewards);
    }
    let priority_fee = samples.iter().sum::<u128>() / samples.len() as u128;
    Ok(Eip1559Fees {
        max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority_fee),
        max_priority_fee_per_gas: priority_fee,
    })
}

/// Scales a gas estimate by `margin` (e.g. 1.2 adds 20%).
pub fn apply_gas_margin(estimate: u64, margin: f64) -> u64 {
    (estimate as f64 * margin).ceil() as u64
}

/// The compression service answers with the proof either as raw bytes or as `0x`-prefixed hex
/// text. Hex text is decoded, anything else is passed through untouched.
pub fn decode_proof_bytes(body: &[u8]) -> Vec<u8> {
    if let Ok(text) = std::str::from_utf8(body) {
        let text = text.trim();
        if let Some(stripped) = text.strip_prefix("0x") {
            if let Ok(decoded) = hex::decode(stripped) {
                return decoded;
            }
        }
    }
    body.to_vec()
}
