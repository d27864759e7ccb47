//! Check-in rules: the JsonLogic-flavoured expressions that decide whether a
//! ticket may be admitted.
//!
//! The crate holds the rule model and its wire codec, a command-driven
//! editor that keeps the serialized text in sync with the tree, a DNF
//! normalizer, and a flow-graph layout that can be rendered to SVG. A small
//! HTTP API exposes the analysis functions to other services.

mod catalog;
mod describe;
mod dnf;
mod editor;
mod error;
mod expr;
mod graph;
mod loader;
mod lookup;
mod render;
mod service;
mod view;
mod viewport;
pub mod wire;

pub use catalog::{Catalog, OperatorSpec, VarType, Variable, CATALOG_VERSION};
pub use describe::{describe, describe_time};
pub use dnf::{dnf_term_count, to_dnf, to_dnf_bounded};
pub use editor::{EditCommand, NodePath, RuleEditor};
pub use error::RuleError;
pub use expr::{
    CompareOp, Comparison, Expr, Lookup, LookupId, OpArgs, OpNode, Operand, TimeKind, TimeSpec,
};
pub use graph::{FlowGraph, FlowNode, NodeId};
pub use loader::{load_catalog, load_rule};
pub use lookup::{LookupClient, LookupError, LookupPage, LookupResult, LookupSession, Pagination};
pub use render::{LayoutMetrics, SvgRenderer};
pub use service::{
    EditRequest, EditResponse, GraphResponse, PathCommand, RuleApiBuilder, RuleRequest,
    RuleResponse, RuleServiceConfig,
};
pub use view::{Control, LeafControls, NodeView, OperandWidget, OperatorOption};
pub use viewport::{Viewport, MAX_SCALE, MIN_SCALE};
