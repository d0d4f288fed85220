//! Protocol adapters: the flat `ProtocolAdapter` trait plus optional capability
//! traits, a registry keyed on `(protocol_id, chain family)`, and the concrete
//! adapters (`aave-v3`, `uniswap-v3`, `jupiter`) that exercise the interface.

pub mod adapters;
pub mod registry;
pub mod token_ops;
pub mod traits;

pub use registry::{AdapterNotFound, AdapterRegistry};
pub use traits::{
    AdapterCapabilities, AdapterCategory, AdapterError, CanHarvest, CanQuote, CanSwap, ProtocolAdapter, StepArgs,
};
