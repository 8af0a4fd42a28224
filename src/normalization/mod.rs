pub mod card;
pub mod filters;

pub use card::{normalize_catalog, NormalizedCard, NormalizedCatalog, NormalizedVariant, RecordWarning};
pub use filters::{Bucket, CardFilters};
