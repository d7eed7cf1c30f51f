//! The behavioral DNA profile and the mutation operation that evolves it
//! (spec §3, §5).

pub mod mutator;
pub mod types;

pub use mutator::{GeneMutation, MutationSeverity, Mutator};
pub use types::{
    CapabilitiesGene, Dna, DnaVersion, Gene, IdentityGene, InteractionGene, NetworkGene, Range,
    TemporalGene, TimingGene,
};
