pub mod aave_v3;
pub mod htlc_bridge;
pub mod jupiter;
pub mod uniswap_v3;
