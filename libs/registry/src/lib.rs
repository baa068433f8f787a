pub mod coordinates;
pub mod error;
pub mod normalize;
pub mod registry;

pub use coordinates::{BackfillReport, CoordinateTable};
pub use error::RegistryError;
pub use registry::{Partition, Registry, UpsertOutcome};
