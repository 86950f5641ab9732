//! Shared domain vocabulary, record models and response bodies.

pub mod enums;
pub mod models;
pub mod responses;

pub use enums::{Permission, Priority, Role, Status, UnknownVariant};
pub use models::{AuditLog, AuditableModel, BaseModel, Timestamps, UuidBaseModel};
pub use responses::{
    BatchError, BatchResponse, BatchSummary, Facet, FacetValue, ListMeta, ListResponse,
    SearchResponse,
};
