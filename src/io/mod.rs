//! Text I/O collaborators (§6): dataset, model, predictions, and
//! grid-specification file formats. Kept structurally separate from the
//! numerical core so the core stays swappable against other front-ends.

pub mod dataset;
pub mod grid_spec;
pub mod model;
pub mod predictions;

pub use dataset::{read_dataset, write_dataset};
pub use grid_spec::{parse_grid_spec, GridFile};
pub use model::{read_model_file, write_model_file, ModelFile};
pub use predictions::write_predictions;
