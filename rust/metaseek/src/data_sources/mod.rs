pub mod feature_table;
pub mod metabolite_library;
pub mod property_table;

pub use feature_table::{
    FeatureTable,
    FeatureTableFormat,
};
pub use metabolite_library::{
    LibraryFormat,
    MetaboliteLibrary,
};
pub use property_table::{
    PropertyEntry,
    PropertyTable,
};
