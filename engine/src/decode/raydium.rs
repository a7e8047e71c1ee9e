use detector::ports::{AmmInvocation, DecodedSwap, SwapDecoder};
use sandwich_core::constants::RAYDIUM_V4_PROGRAM;
use solana_sdk::pubkey::Pubkey;

use super::swap_from_transfers;

// swapBaseIn: 09 / amountIn u64 / minOut u64
const SWAP_DISCRIMINANT: u8 = 0x09;
const SWAP_DATA_LEN: usize = 17;
const AMM_ACCOUNT_INDEX: usize = 1;

/// Raydium V4 swaps: single-byte discriminant, AMM id as the second account,
/// user send then user receive among the inner transfers.
pub struct RaydiumV4Decoder;

impl SwapDecoder for RaydiumV4Decoder {
    fn program_id(&self) -> Pubkey {
        RAYDIUM_V4_PROGRAM
    }

    fn decode(&self, invocation: &AmmInvocation) -> Option<DecodedSwap> {
        if invocation.program != RAYDIUM_V4_PROGRAM {
            return None;
        }
        if invocation.data.len() != SWAP_DATA_LEN || invocation.data[0] != SWAP_DISCRIMINANT {
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
        let mut data = vec![SWAP_DISCRIMINANT];
        data.extend_from_slice(&100u64.to_le_bytes());
        data.extend_from_slice(&95u64.to_le_bytes());
        data
    }

    #[test]
    fn test_decodes_swap_base_in() {
        let pool = Pubkey::new_unique();
        let mint_in = Pubkey::new_unique();
        let mint_out = Pubkey::new_unique();
        let inv = invocation(
            RAYDIUM_V4_PROGRAM,
            vec![Pubkey::new_unique(), pool, Pubkey::new_unique()],
            swap_data(),
            vec![transfer(mint_in, 100), transfer(mint_out, 97)],
        );
        let swap = RaydiumV4Decoder.decode(&inv).expect("swap expected");
        assert_eq!(swap.pool, pool);
        assert_eq!(swap.input_mint, mint_in);
        assert_eq!(swap.output_mint, mint_out);
        assert_eq!(swap.input_amount, 100);
        assert_eq!(swap.output_amount, 97);
    }

    #[test]
    fn test_rejects_wrong_discriminant() {
        let mut data = swap_data();
        data[0] = 0x0b;
        let inv = invocation(
            RAYDIUM_V4_PROGRAM,
            vec![Pubkey::new_unique(), Pubkey::new_unique()],
            data,
            vec![transfer(Pubkey::new_unique(), 1), transfer(Pubkey::new_unique(), 1)],
        );
        assert!(RaydiumV4Decoder.decode(&inv).is_none());
    }

    #[test]
    fn test_rejects_wrong_data_length() {
        let inv = invocation(
            RAYDIUM_V4_PROGRAM,
            vec![Pubkey::new_unique(), Pubkey::new_unique()],
            vec![SWAP_DISCRIMINANT; 9],
            vec![transfer(Pubkey::new_unique(), 1), transfer(Pubkey::new_unique(), 1)],
        );
        assert!(RaydiumV4Decoder.decode(&inv).is_none());
    }

    #[test]
    fn test_rejects_missing_transfers() {
        let inv = invocation(
            RAYDIUM_V4_PROGRAM,
            vec![Pubkey::new_unique(), Pubkey::new_unique()],
            swap_data(),
            vec![transfer(Pubkey::new_unique(), 1)],
        );
        assert!(RaydiumV4Decoder.decode(&inv).is_none());
    }

    #[test]
    fn test_rejects_foreign_program() {
        let inv = invocation(
            Pubkey::new_unique(),
            vec![Pubkey::new_unique(), Pubkey::new_unique()],
            swap_data(),
            vec![transfer(Pubkey::new_unique(), 1), transfer(Pubkey::new_unique(), 1)],
        );
        assert!(RaydiumV4Decoder.decode(&inv).is_none());
    }
}
