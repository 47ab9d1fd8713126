pub mod construction;
pub mod model;

pub use construction::{IncidenceBuilder, edge_features};
pub use model::{Edge, GraphFeatures, Incidence, PairShape, RawIncidence};
