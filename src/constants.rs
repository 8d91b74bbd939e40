/// Field and group names shared across pipeline stages.
/// Built-in source tables and the canonical record shape both rely on these.

// Interactor groups produced by the grouper and consumed by the canonicalizer
pub const INTERACTOR_A: &str = "interactor_a";
pub const INTERACTOR_B: &str = "interactor_b";

// Per-observation orientation written into every evidence entry
pub const DIRECTION: &str = "direction";
pub const DIRECTION_A_TO_B: &str = "A->B";
pub const DIRECTION_B_TO_A: &str = "B->A";

// Built-in source ids
pub const BIOGRID_SOURCE: &str = "biogrid";
pub const HINT_SOURCE: &str = "hint";
pub const CTD_CHEM_GENE_SOURCE: &str = "ctd_chem_gene";
pub const DISGENET_SOURCE: &str = "disgenet";
pub const NDEX_SOURCE: &str = "ndex";

// Default node namespace for graph-exchange sources
pub const NDEX_NAMESPACE: &str = "ndex";

/// Get all built-in source ids
pub fn get_builtin_sources() -> Vec<&'static str> {
    vec![
        BIOGRID_SOURCE,
        HINT_SOURCE,
        CTD_CHEM_GENE_SOURCE,
        DISGENET_SOURCE,
        NDEX_SOURCE,
    ]
}
