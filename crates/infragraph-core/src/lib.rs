//! In-memory graph model of an infrastructure application.
//!
//! A [`Store`] owns a tree of typed nodes (app, stages, stacks, resources,
//! outputs, parameters) and a set of directed edges between them. Nodes and
//! edges live in an arena and refer to each other through [`NodeId`] /
//! [`EdgeId`] handles.
//!
//! A computed store is read-only. Rewriting a graph for presentation goes
//! through [`MutableStore`], obtained from [`Store::clone_mutable`]:
//!
//! ```rust
//! use infragraph_core::{NodeSpec, NodeVariant, Store, Uuid};
//!
//! let mut store = Store::new(false);
//! let app = store.add_node(store.root(), NodeSpec::new(Uuid::new("App"), "App", "", NodeVariant::App))?;
//! let mut copy = store.clone_mutable()?;
//! let copied_app = copy.get_node("App")?;
//! copy.destroy_node(copied_app, true)?;
//! assert!(store.contains_node(app));
//! assert_eq!(copy.counts().nodes, 0);
//! # Ok::<(), infragraph_core::Error>(())
//! ```
pub mod counter;
pub mod edge;
pub mod entity;
pub mod mutate;
pub mod node;
pub mod query;
pub mod serialize;
pub mod store;
pub mod types;

pub use counter::Counter;
pub use edge::{Edge, EdgeSpec};
pub use entity::{Entity, GraphEntity};
pub use infragraph_error::{Error, ErrorKind, ErrorStatus, Result};
pub use mutate::MutableStore;
pub use node::{CfnBinding, Node, NodeKind, NodeSpec, NodeVariant, StackMembers};
pub use serialize::{SerializedBinding, SerializedEdge, SerializedGraph, SerializedNode};
pub use store::{STORE_VERSION, Store, StoreCounts};
pub use types::{
    APP_UUID, Attributes, BindingInfo, EdgeDirection, EdgeId, EdgeType, Flag, MetadataEntry,
    NodeId, NodeType, ROOT_UUID, Tags, TraversalOrder, Uuid, attr, construct_id,
};
