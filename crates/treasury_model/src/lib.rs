//! Deterministic treasury policy engine
//! Pure functions only: no I/O, no clocks, no global state

pub mod math;
pub mod error;
pub mod policy;
pub mod snapshot;
pub mod normalize;
pub mod plan;
pub mod stress;
pub mod risk;
pub mod recommend;
pub mod proposal;
pub mod template;


// Re-export commonly used types
pub use math::Micros;
pub use error::*;
pub use policy::*;
pub use snapshot::*;
pub use normalize::bounded_normalize;
pub use plan::*;
pub use stress::*;
pub use risk::*;
pub use recommend::*;
pub use proposal::*;
pub use template::*;
