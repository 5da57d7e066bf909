mod candidate;
mod feature;
mod metabolite;

pub use candidate::Candidate;
pub use feature::{
    Feature,
    Polarity,
};
pub use metabolite::{
    ChemicalProperties,
    MetaboliteRecord,
    ShapeDescriptors,
};
