//! @ai:module:intent Dataset examples and loading
//! @ai:module:layer domain
//! @ai:module:public_api InputRecord, LabeledExample, DatasetLoader

pub mod loader;
pub mod record;

pub use loader::{DatasetLoader, DatasetLoaderTrait};
pub use record::{InputRecord, LabeledExample};
