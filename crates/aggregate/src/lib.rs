pub mod engine;
pub mod entity;
pub mod snapshot;
pub mod table;

pub use engine::{AggregationEngine, FULL_CONFIDENCE_DOCUMENTS, TOP_N, confidence};
pub use entity::{AggregatedEntity, ConditionEvidence};
pub use snapshot::{
    Association, ConditionCount, ConditionSnapshot, EntityMentions, EntitySnapshot,
    ExportMetadata, ExportSnapshot, Summary,
};
pub use table::{ASSOCIATION_HEADER, AssociationRow};
