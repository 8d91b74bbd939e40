// Pipeline processing: reading, normalization, grouping, canonicalization and aggregation

pub mod canonical;
pub mod conflation;
pub mod group;
pub mod normalize;
pub mod reader;
pub mod record;
