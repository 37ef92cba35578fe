//! Projection between full-mesh fields and the reduced centerline
//! representation.

pub mod expand;
pub mod interp;
pub mod weights;

pub use expand::ReducedField;
pub use interp::{pchip, pchip_columns};
pub use weights::{project_on_normal, reduce_segment, weighted_norm, PartitionWeights};
