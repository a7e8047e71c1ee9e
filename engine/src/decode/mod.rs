// One decoder per AMM program family. The selection happens here, on the
// ingestion side; the analytical core never branches on AMM identity.

pub mod raydium;
pub mod pump_amm;
pub mod whirlpool;

use std::sync::Arc;

use detector::ports::{AmmInvocation, DecodedSwap, SwapDecoder, TokenTransfer};

pub use pump_amm::PumpAmmDecoder;
pub use raydium::RaydiumV4Decoder;
pub use whirlpool::WhirlpoolDecoder;

/// The AMM families this build understands.
pub fn default_decoders() -> Vec<Arc<dyn SwapDecoder>> {
    vec![
        Arc::new(RaydiumV4Decoder),
        Arc::new(PumpAmmDecoder),
        Arc::new(WhirlpoolDecoder),
    ]
}

/// Shared swap extraction: an invocation with a matching discriminant whose
/// token movements identify the two legs of the trade.
/// `in_first` tells whether the user-to-pool transfer precedes the
/// pool-to-user one for this instruction variant.
pub(crate) fn swap_from_transfers(
    invocation: &AmmInvocation,
    pool_account_index: usize,
    in_first: bool,
) -> Option<DecodedSwap> {
    let pool = *invocation.accounts.get(pool_account_index)?;
    if invocation.transfers.len() < 2 {
        return None;
    }
    let (input, output): (&TokenTransfer, &TokenTransfer) = if in_first {
        (&invocation.transfers[0], &invocation.transfers[1])
    } else {
        (&invocation.transfers[1], &invocation.transfers[0])
    };
    Some(DecodedSwap {
        pool,
        input_mint: input.mint,
        output_mint: output.mint,
        input_amount: input.amount,
        output_amount: output.amount,
    })
}
