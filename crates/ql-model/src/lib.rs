//! Runtime value model shared by the FHIRPath and CQL evaluators.

pub mod code;
pub mod error;
pub mod interval;
pub mod quantity;
pub mod resource;
pub mod temporal;
pub mod tuple;
pub mod types;
pub mod value;

pub use code::{Code, Concept};
pub use error::{ModelError, Result};
pub use interval::{AllenRelation, Interval};
pub use quantity::{Quantity, Ratio};
pub use resource::FhirNode;
pub use temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime, TemporalPrecision};
pub use tuple::Tuple;
pub use types::TypeInfo;
pub use value::{Collection, Value};
