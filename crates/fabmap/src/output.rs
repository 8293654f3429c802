//! Output formatting: tables, JSON, YAML.
//!
//! Table output renders the report as one `tabled` section per result
//! kind; structured formats serialize the whole report via serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use fabmap_core::{
    DeviceFailure, DeviceId, DiscoveryReport, EdgeConfidence, InterSwitchLink, LinkConfidence,
    TopologyEdge, TopologyGraph, UnmatchedInterface, UnresolvedMac,
};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn heading(title: &str, count: usize, color: bool) -> String {
    let text = format!("{title} ({count})");
    if color {
        text.bold().to_string()
    } else {
        text
    }
}

fn flag(text: String, warn: bool, color: bool) -> String {
    if color && warn {
        text.yellow().to_string()
    } else {
        text
    }
}

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "Switch")]
    switch: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "Switch A")]
    a: String,
    #[tabled(rename = "Port A")]
    a_port: String,
    #[tabled(rename = "Switch B")]
    b: String,
    #[tabled(rename = "Port B")]
    b_port: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

#[derive(Tabled)]
struct UnresolvedRow {
    #[tabled(rename = "Switch")]
    switch: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "VLAN")]
    vlan: String,
}

#[derive(Tabled)]
struct UnmatchedRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "MAC")]
    mac: String,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Hostname when known, otherwise the device id.
fn name(graph: &TopologyGraph, id: &DeviceId) -> String {
    graph
        .device(id)
        .map_or_else(|| id.to_string(), |d| d.display_name().to_owned())
}

fn edge_row(graph: &TopologyGraph, e: &TopologyEdge, color: bool) -> EdgeRow {
    EdgeRow {
        switch: name(graph, &e.switch_id),
        port: e.switch_port.clone(),
        node: name(graph, &e.node_id),
        interface: e.node_interface.clone(),
        mac: e.mac.to_string(),
        confidence: flag(
            e.confidence.to_string(),
            e.confidence == EdgeConfidence::Ambiguous,
            color,
        ),
    }
}

fn link_row(graph: &TopologyGraph, l: &InterSwitchLink, color: bool) -> LinkRow {
    let port = |p: &Option<String>| p.clone().unwrap_or_else(|| "-".into());
    LinkRow {
        a: name(graph, &l.a.switch_id),
        a_port: port(&l.a.port),
        b: name(graph, &l.b.switch_id),
        b_port: port(&l.b.port),
        confidence: flag(
            l.confidence.to_string(),
            l.confidence != LinkConfidence::Corroborated,
            color,
        ),
    }
}

fn unresolved_row(graph: &TopologyGraph, u: &UnresolvedMac) -> UnresolvedRow {
    UnresolvedRow {
        switch: name(graph, &u.switch_id),
        port: u.port.clone(),
        mac: u.mac.to_string(),
        vlan: u.vlan.map(|v| v.to_string()).unwrap_or_default(),
    }
}

fn unmatched_row(graph: &TopologyGraph, u: &UnmatchedInterface) -> UnmatchedRow {
    UnmatchedRow {
        node: name(graph, &u.node_id),
        interface: u.interface.clone(),
        mac: u.mac.to_string(),
    }
}

impl From<&DeviceFailure> for FailureRow {
    fn from(f: &DeviceFailure) -> Self {
        Self {
            device: f.device_id.to_string(),
            role: f.role.to_string(),
            stage: f.stage.to_string(),
            kind: f.kind.to_string(),
            detail: f.detail.clone(),
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a discovery report in the chosen format.
pub fn render_report(
    format: &OutputFormat,
    report: &DiscoveryReport,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(report_tables(report, color)),
        OutputFormat::Json => render_json(report, false),
        OutputFormat::JsonCompact => render_json(report, true),
        OutputFormat::Yaml => render_yaml(report),
    }
}

/// Render a single serde-serializable item, using `text_fn` for the
/// table format.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    text_fn: impl Fn(&T) -> Result<String, CliError>,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => text_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn report_tables(report: &DiscoveryReport, color: bool) -> String {
    let graph = &report.graph;
    let mut sections = Vec::new();

    let edges: Vec<EdgeRow> = graph.edges().map(|e| edge_row(graph, e, color)).collect();
    sections.push(section("Edges", &edges, color));

    let links: Vec<LinkRow> = graph
        .inter_switch_links()
        .map(|l| link_row(graph, l, color))
        .collect();
    if !links.is_empty() {
        sections.push(section("Inter-switch links", &links, color));
    }

    let unresolved: Vec<UnresolvedRow> =
        graph.unresolved().map(|u| unresolved_row(graph, u)).collect();
    if !unresolved.is_empty() {
        sections.push(section("Unresolved MACs", &unresolved, color));
    }

    let unmatched: Vec<UnmatchedRow> =
        graph.unmatched().map(|u| unmatched_row(graph, u)).collect();
    if !unmatched.is_empty() {
        sections.push(section("Unmatched interfaces", &unmatched, color));
    }

    let failures: Vec<FailureRow> = report.failures.iter().map(FailureRow::from).collect();
    if !failures.is_empty() {
        let title = heading("Failures", failures.len(), false);
        let title = if color {
            title.red().bold().to_string()
        } else {
            title
        };
        sections.push(format!("{title}\n{}", render_table(&failures)));
    }

    let summary = graph.summary();
    let elapsed = (report.finished_at - report.started_at)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    sections.push(format!(
        "{} switches, {} nodes, {} edges ({} ambiguous), {} inter-switch links, \
         {} failures in {:.1}s",
        summary.switches,
        summary.nodes,
        summary.edges,
        summary.ambiguous_edges,
        summary.inter_switch_links,
        report.failures.len(),
        elapsed,
    ));

    sections.join("\n\n")
}

fn section<R: Tabled>(title: &str, rows: &[R], color: bool) -> String {
    format!("{}\n{}", heading(title, rows.len(), color), render_table(rows))
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let text = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(text)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}
