//! Schema extraction from source documents
//!
//! This crate handles:
//! - Mapping Java field types to schema value-kinds
//! - Scanning Java classes for instance fields and their parent class
//! - Walking the ancestor chain with a caller-supplied locator
//! - Reading `<id>`/`<result>` bindings from MyBatis mapper XML

pub mod inheritance;
pub mod java;
pub mod mybatis;
pub mod type_mapper;

pub use inheritance::{
    resolve_with_ancestors, resolve_with_options, AncestorLocator, AncestorWalk, ExtractionWarning, Resolution,
    ResolveOptions, UnresolvedReason, WalkState, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DEPTH,
};
pub use java::{declares_class, extract_fields, ClassExtraction};
pub use mybatis::{extract_mapping_fields, DEFAULT_JDBC_TYPE};
pub use type_mapper::map_type;
