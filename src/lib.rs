pub mod builder;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod connections;
pub mod engine;
pub mod layout;
pub mod layout_dump;
pub mod model;
pub mod service;

pub use builder::{BuildError, BuildGuard, GraphBuilder};
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{LayoutConfig, load_config};
pub use connections::{Connection, ConnectionKind, derive_connections};
pub use engine::{TreeEngine, TreeState};
pub use layout::{Position, TreeLayout, compute_tree_layout};
pub use model::{FamilyGraph, ParentLink, Person, PersonId, Sex};
pub use service::{
    FamilyDataSource, HttpFamilyService, InMemoryFamily, PersonDraft, ServiceError,
};
