use detector::ports::{AmmInvocation, DecodedSwap, SwapDecoder};
use sandwich_core::constants::PUMP_AMM_PROGRAM;
use solana_sdk::pubkey::Pubkey;

use super::swap_from_transfers;

const BUY_DISCRIMINANT: [u8; 8] = [0x66, 0x06, 0x3d, 0x12, 0x01, 0xda, 0xeb, 0xea];
const SELL_DISCRIMINANT: [u8; 8] = [0x33, 0xe6, 0x85, 0xa4, 0x01, 0x7f, 0x83, 0xad];
const SWAP_DATA_LEN: usize = 24;
const AMM_ACCOUNT_INDEX: usize = 0;

/// Pump AMM buys and sells. The pool is the first account; on a buy the
/// user-receive transfer precedes the user-send one.
pub struct PumpAmmDecoder;

impl SwapDecoder for PumpAmmDecoder {
    fn program_id(&self) -> Pubkey {
        PUMP_AMM_PROGRAM
    }

    fn decode(&self, invocation: &AmmInvocation) -> Option<DecodedSwap> {
        if invocation.program != PUMP_AMM_PROGRAM || invocation.data.len() != SWAP_DATA_LEN {
            return None;
        }
        let discriminant: [u8; 8] = invocation.data[0..8].try_into().ok()?;
        match discriminant {
            BUY_DISCRIMINANT => swap_from_transfers(invocation, AMM_ACCOUNT_INDEX, false),
            SELL_DISCRIMINANT => swap_from_transfers(invocation, AMM_ACCOUNT_INDEX, true),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_helpers::{invocation, transfer};

    fn data_with(discriminant: [u8; 8]) -> Vec<u8> {
        let mut data = discriminant.to_vec();
        data.extend_from_slice(&50u64.to_le_bytes());
        data.extend_from_slice(&48u64.to_le_bytes());
        data
    }

    #[test]
    fn test_buy_swaps_transfer_order() {
        let pool = Pubkey::new_unique();
        let token = Pubkey::new_unique();
        let sol = Pubkey::new_unique();
        // Buy: receive (token) appears before send (sol)
        let inv = invocation(
            PUMP_AMM_PROGRAM,
            vec![pool],
            data_with(BUY_DISCRIMINANT),
            vec![transfer(token, 1_000), transfer(sol, 50)],
        );
        let swap = PumpAmmDecoder.decode(&inv).expect("swap expected");
        assert_eq!(swap.pool, pool);
        assert_eq!(swap.input_mint, sol);
        assert_eq!(swap.input_amount, 50);
        assert_eq!(swap.output_mint, token);
        assert_eq!(swap.output_amount, 1_000);
    }

    #[test]
    fn test_sell_keeps_transfer_order() {
        let pool = Pubkey::new_unique();
        let token = Pubkey::new_unique();
        let sol = Pubkey::new_unique();
        let inv = invocation(
            PUMP_AMM_PROGRAM,
            vec![pool],
            data_with(SELL_DISCRIMINANT),
            vec![transfer(token, 1_000), transfer(sol, 48)],
        );
        let swap = PumpAmmDecoder.decode(&inv).expect("swap expected");
        assert_eq!(swap.input_mint, token);
        assert_eq!(swap.output_mint, sol);
    }

    #[test]
    fn test_rejects_unknown_discriminant() {
        let inv = invocation(
            PUMP_AMM_PROGRAM,
            vec![Pubkey::new_unique()],
            data_with([0u8; 8]),
            vec![transfer(Pubkey::new_unique(), 1), transfer(Pubkey::new_unique(), 1)],
        );
        assert!(PumpAmmDecoder.decode(&inv).is_none());
    }
}
