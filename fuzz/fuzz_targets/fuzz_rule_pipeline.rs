// Fuzz target running arbitrary JSON through decode, DNF and layout.
#![no_main]

use checkin_rules::{to_dnf, to_dnf_bounded, wire, Catalog, FlowGraph, SvgRenderer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    let rule = wire::decode(&value);
    assert_eq!(wire::decode(&wire::encode(&rule)), rule);

    let Ok(normalized) = to_dnf_bounded(&rule, 256) else {
        return;
    };
    assert_eq!(to_dnf(&normalized), normalized);

    let graph = FlowGraph::build(&normalized);
    for (parent, child) in graph.edges() {
        assert!(graph.nodes[child].column > graph.nodes[parent].column);
    }
    let _ = SvgRenderer::new(&Catalog::builtin()).render(&graph);
});
