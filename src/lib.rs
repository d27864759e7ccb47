//! Check-in rule builder.
//!
//! Umbrella crate re-exporting the workspace members: `core` carries the
//! shared error, configuration and logging primitives, `rules` the rule
//! model, editor, normalizer and visualizer.

pub use checkin_core as core;
pub use checkin_rules as rules;

pub use checkin_core::{CheckinError, CoreConfig};
pub use checkin_rules::{
    to_dnf, to_dnf_bounded, Catalog, EditCommand, Expr, FlowGraph, NodePath, RuleEditor,
    RuleError, SvgRenderer,
};
