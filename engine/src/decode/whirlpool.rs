use detector::ports::{AmmInvocation, DecodedSwap, SwapDecoder};
use sandwich_core::constants::ORCA_WHIRLPOOL_PROGRAM;
use solana_sdk::pubkey::Pubkey;

use super::swap_from_transfers;

const SWAP_DISCRIMINANT: [u8; 8] = [0xf8, 0xc6, 0x9e, 0x91, 0xe1, 0x75, 0x87, 0xc8];
const SWAP_DATA_LEN: usize = 42;
const AMM_ACCOUNT_INDEX: usize = 2;

/// Orca Whirlpool `swap`: anchor discriminant, whirlpool as the third
/// account, user send then user receive.
pub struct WhirlpoolDecoder;

impl SwapDecoder for WhirlpoolDecoder {
    fn program_id(&self) -> Pubkey {
        ORCA_WHIRLPOOL_PROGRAM
    }

    fn decode(&self, invocation: &AmmInvocation) -> Option<DecodedSwap> {
        if invocation.program != ORCA_WHIRLPOOL_PROGRAM || invocation.data.len() != SWAP_DATA_LEN {
            return None;
        }
        if invocation.data[0..8] != SWAP_DISCRIMINANT {
            return None;
        }
        swap_from_transfers(invocation, AMM_ACCOUNT_INDEX, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_helpers::{invocation, transfer};

    fn swap_data() -> Vec<u8> {
        let mut data = SWAP_DISCRIMINANT.to_vec();
        data.resize(SWAP_DATA_LEN, 0);
        data
    }

    #[test]
    fn test_decodes_whirlpool_swap() {
        let pool = Pubkey::new_unique();
        let mint_in = Pubkey::new_unique();
        let mint_out = Pubkey::new_unique();
        let inv = invocation(
            ORCA_WHIRLPOOL_PROGRAM,
            vec![Pubkey::new_unique(), Pubkey::new_unique(), pool],
            swap_data(),
            vec![transfer(mint_in, 500), transfer(mint_out, 480)],
        );
        let swap = WhirlpoolDecoder.decode(&inv).expect("swap expected");
        assert_eq!(swap.pool, pool);
        assert_eq!(swap.input_amount, 500);
        assert_eq!(swap.output_amount, 480);
    }

    #[test]
    fn test_rejects_short_account_list() {
        let inv = invocation(
            ORCA_WHIRLPOOL_PROGRAM,
            vec![Pubkey::new_unique()],
            swap_data(),
            vec![transfer(Pubkey::new_unique(), 1), transfer(Pubkey::new_unique(), 1)],
        );
        assert!(WhirlpoolDecoder.decode(&inv).is_none());
    }

    #[test]
    fn test_rejects_wrong_discriminant() {
        let mut data = swap_data();
        data[7] ^= 0xff;
        let inv = invocation(
            ORCA_WHIRLPOOL_PROGRAM,
            vec![Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()],
            data,
            vec![transfer(Pubkey::new_unique(), 1), transfer(Pubkey::new_unique(), 1)],
        );
        assert!(WhirlpoolDecoder.decode(&inv).is_none());
    }
}
