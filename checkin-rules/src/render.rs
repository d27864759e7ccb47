//! SVG rendering of a laid out rule graph.

use std::fmt::Write;

use crate::catalog::Catalog;
use crate::describe::describe;
use crate::graph::{FlowGraph, FlowNode};
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub box_width: f64,
    pub box_height: f64,
    pub margin_x: f64,
    pub margin_y: f64,
    pub padding_x: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            box_width: 300.0,
            box_height: 62.0,
            margin_x: 50.0,
            margin_y: 20.0,
            padding_x: 50.0,
        }
    }
}

impl LayoutMetrics {
    /// Top left corner of the box in `column`/`row`.
    pub fn node_origin(&self, column: usize, row: usize) -> (f64, f64) {
        (
            column as f64 * (self.box_width + self.margin_x) + self.padding_x,
            row as f64 * (self.box_height + self.margin_y),
        )
    }

    /// Size of the whole drawing, terminal checkmarks included.
    pub fn content_size(&self, graph: &FlowGraph) -> (f64, f64) {
        let width = graph.columns as f64 * (self.box_width + self.margin_x) + 2.0 * self.padding_x;
        let height = if graph.height == 0 {
            self.box_height
        } else {
            graph.height as f64 * (self.box_height + self.margin_y) - self.margin_y
        };
        (width, height)
    }
}

const CHECK_GLYPH: &str = "M -8 0 L -3 6 L 8 -6";
const CROSS_GLYPH: &str = "M -6 -6 L 6 6 M 6 -6 L -6 6";

pub struct SvgRenderer<'a> {
    catalog: &'a Catalog,
    metrics: LayoutMetrics,
}

impl<'a> SvgRenderer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            metrics: LayoutMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: LayoutMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    pub fn render(&self, graph: &FlowGraph) -> String {
        self.render_with_viewport(graph, &Viewport::default())
    }

    pub fn render_with_viewport(&self, graph: &FlowGraph, viewport: &Viewport) -> String {
        let (width, height) = self.metrics.content_size(graph);
        let rollup = graph.results_incl_parents();
        let mut svg = String::new();

        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="checkin-rules-visualization" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}">"#,
            w = width,
            h = height
        );
        let _ = writeln!(svg, r#"<g transform="{}">"#, viewport.transform());

        if graph.is_empty() {
            let _ = writeln!(
                svg,
                r#"<g class="terminal terminal-passed" transform="translate({:.1} {:.1})"><path d="{}"/></g>"#,
                self.metrics.padding_x,
                self.metrics.box_height / 2.0,
                CHECK_GLYPH
            );
        }

        for root in &graph.roots {
            if let Some(node) = graph.node(*root) {
                let (x, y) = self.metrics.node_origin(node.column, node.row);
                let mid = y + self.metrics.box_height / 2.0;
                self.write_edge(
                    &mut svg,
                    "edge edge-start",
                    (0.0, self.metrics.box_height / 2.0),
                    (x, mid),
                );
            }
        }

        for (parent, child) in graph.edges() {
            let (Some(parent), Some(child)) = (graph.node(parent), graph.node(child)) else {
                continue;
            };
            let (px, py) = self.metrics.node_origin(parent.column, parent.row);
            let (cx, cy) = self.metrics.node_origin(child.column, child.row);
            let half = self.metrics.box_height / 2.0;
            self.write_edge(
                &mut svg,
                "edge",
                (px + self.metrics.box_width, py + half),
                (cx, cy + half),
            );
        }

        for node in &graph.nodes {
            self.write_node(&mut svg, node, rollup.get(node.id).copied().flatten());
        }

        svg.push_str("</g>\n</svg>\n");
        svg
    }

    /// S-curve from the right edge of one box to the left edge of the next.
    fn write_edge(&self, svg: &mut String, class: &str, from: (f64, f64), to: (f64, f64)) {
        let bend = (to.0 - from.0) / 2.0;
        let _ = writeln!(
            svg,
            r#"<path class="{}" d="M {:.1} {:.1} C {:.1} {:.1}, {:.1} {:.1}, {:.1} {:.1}"/>"#,
            class,
            from.0,
            from.1,
            from.0 + bend,
            from.1,
            to.0 - bend,
            to.1,
            to.0,
            to.1
        );
    }

    fn write_node(&self, svg: &mut String, node: &FlowNode, path_result: Option<bool>) {
        let (x, y) = self.metrics.node_origin(node.column, node.row);
        let state = match node.result {
            Some(true) => "node-passed",
            Some(false) => "node-failed",
            None => "node-neutral",
        };
        let _ = writeln!(
            svg,
            r#"<g class="node {}" transform="translate({:.1} {:.1})">"#,
            state, x, y
        );
        let _ = writeln!(
            svg,
            r#"<rect rx="5" width="{:.1}" height="{:.1}"/>"#,
            self.metrics.box_width, self.metrics.box_height
        );
        let _ = writeln!(
            svg,
            r#"<text x="10" y="{:.1}">{}</text>"#,
            self.metrics.box_height / 2.0 + 5.0,
            escape_xml(&describe(&node.rule, self.catalog))
        );

        if let Some(result) = node.result {
            let (class, glyph) = if result {
                ("badge badge-passed", CHECK_GLYPH)
            } else {
                ("badge badge-failed", CROSS_GLYPH)
            };
            let _ = writeln!(
                svg,
                r#"<g class="{}" transform="translate({:.1} 0)"><circle r="12"/><path d="{}"/></g>"#,
                class, self.metrics.box_width, glyph
            );
        }

        if node.children.is_empty() {
            let class = match path_result {
                Some(true) => "terminal terminal-passed",
                Some(false) => "terminal terminal-failed",
                None => "terminal",
            };
            let _ = writeln!(
                svg,
                r#"<g class="{}" transform="translate({:.1} {:.1})"><path d="{}"/></g>"#,
                class,
                self.metrics.box_width + self.metrics.margin_x / 2.0,
                self.metrics.box_height / 2.0,
                CHECK_GLYPH
            );
        }

        svg.push_str("</g>\n");
    }
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
