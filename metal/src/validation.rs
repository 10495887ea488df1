//! Design consistency checks.

use std::collections::HashMap;
use std::fmt::Display;

use arcstr::ArcStr;
use diagnostics::{Diagnostic, IssueSet, Severity};
use serde::{Deserialize, Serialize};
use tracing::{span, Level};

use crate::component::Status;
use crate::design::Design;
use crate::id::{ComponentId, NetId};
use crate::qgeometry::ElementKind;

/// A problem found by [`Design::validate`].
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct DesignIssue {
    cause: Cause,
    severity: Severity,
}

/// What is wrong.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Cause {
    /// A net does not have exactly two rows.
    NetCardinality { net: NetId, rows: usize },
    /// A pin's net disagrees with the net table.
    PinNetMismatch {
        component: ArcStr,
        pin: ArcStr,
        pin_net: NetId,
        table_net: NetId,
    },
    /// A net row names a component or pin that does not exist.
    DanglingNetRow {
        net: NetId,
        component: ComponentId,
        pin: ArcStr,
    },
    /// A layer number is used by more than one chip.
    LayerSharedAcrossChips { layer: i64, chips: Vec<ArcStr> },
    /// A datatype appears more than once within a layer.
    DuplicateDatatype { layer: i64, datatype: i64 },
    /// A geometry row is on a chip the design does not define.
    UnknownChip {
        component: ArcStr,
        kind: ElementKind,
        element: ArcStr,
        chip: ArcStr,
    },
    /// A geometry row is on a layer missing from the layer stack.
    LayerNotInStack {
        component: ArcStr,
        kind: ElementKind,
        element: ArcStr,
        layer: i64,
    },
    /// The layer stack names chips the design does not define.
    LayerStackChipsNotInDesign { chips: Vec<ArcStr> },
    /// A component's last build failed.
    FailedComponent { component: ArcStr },
}

impl Diagnostic for DesignIssue {
    fn help(&self) -> Option<Box<dyn Display>> {
        let help = match &self.cause {
            Cause::LayerSharedAcrossChips { .. } => "give each chip its own layer numbers",
            Cause::UnknownChip { .. } => "add the chip to the design or change the component's `chip` option",
            Cause::LayerStackChipsNotInDesign { .. } => {
                "renders fall back to component bounds until the chip names match"
            }
            Cause::FailedComponent { .. } => "see the build log for the error",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}

impl DesignIssue {
    /// Creates an issue.
    pub fn new(cause: Cause, severity: Severity) -> Self {
        Self { cause, severity }
    }

    pub(crate) fn new_and_log(cause: Cause, severity: Severity) -> Self {
        let result = Self::new(cause, severity);
        match severity {
            Severity::Info => tracing::event!(Level::INFO, issue = ?result.cause, "{}", result),
            Severity::Warning => tracing::event!(Level::WARN, issue = ?result.cause, "{}", result),
            Severity::Error => tracing::event!(Level::ERROR, issue = ?result.cause, "{}", result),
        }
        result
    }

    /// The cause.
    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl Display for DesignIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetCardinality { net, rows } => {
                write!(f, "net {net} has {rows} pins; every net connects exactly two")
            }
            Self::PinNetMismatch {
                component,
                pin,
                pin_net,
                table_net,
            } => write!(
                f,
                "pin `{component}.{pin}` is on net {pin_net} but the net table says {table_net}"
            ),
            Self::DanglingNetRow {
                net,
                component,
                pin,
            } => write!(
                f,
                "net {net} references pin `{pin}` of component {component}, which does not exist"
            ),
            Self::LayerSharedAcrossChips { layer, chips } => write!(
                f,
                "layer {layer} is used by chips {}",
                chips.join(", ")
            ),
            Self::DuplicateDatatype { layer, datatype } => {
                write!(f, "datatype {datatype} appears more than once in layer {layer}")
            }
            Self::UnknownChip {
                component,
                kind,
                element,
                chip,
            } => write!(
                f,
                "{kind} element `{component}.{element}` is on chip `{chip}`, which the design does not define"
            ),
            Self::LayerNotInStack {
                component,
                kind,
                element,
                layer,
            } => write!(
                f,
                "{kind} element `{component}.{element}` is on layer {layer}, which the layer stack does not define"
            ),
            Self::LayerStackChipsNotInDesign { chips } => write!(
                f,
                "the layer stack names chips the design does not define: {}",
                chips.join(", ")
            ),
            Self::FailedComponent { component } => {
                write!(f, "component `{component}` failed to build")
            }
        }
    }
}

pub(crate) fn validate_design(design: &Design) -> IssueSet<DesignIssue> {
    let _guard = span!(Level::INFO, "validating design", design = %design.name).entered();
    let mut issues = IssueSet::new();
    validate_nets(design, &mut issues);
    validate_layer_stack(design, &mut issues);
    validate_geometry(design, &mut issues);
    for comp in design.components() {
        if comp.status() == Status::Failed {
            issues.add(DesignIssue::new_and_log(
                Cause::FailedComponent {
                    component: comp.name().clone(),
                },
                Severity::Warning,
            ));
        }
    }
    issues
}

fn validate_nets(design: &Design, issues: &mut IssueSet<DesignIssue>) {
    let _guard = span!(Level::INFO, "validating nets").entered();
    let mut counts: HashMap<NetId, usize> = HashMap::new();
    for row in design.net_info.net_info() {
        *counts.entry(row.net_id).or_default() += 1;
        let exists = design
            .component_by_id(row.component_id)
            .is_some_and(|c| c.pin(&row.pin_name).is_some());
        if !exists {
            issues.add(DesignIssue::new_and_log(
                Cause::DanglingNetRow {
                    net: row.net_id,
                    component: row.component_id,
                    pin: row.pin_name.clone(),
                },
                Severity::Error,
            ));
        }
    }
    for net in design.net_info.net_ids() {
        let rows = counts.get(&net).copied().unwrap_or_default();
        if rows != 2 {
            issues.add(DesignIssue::new_and_log(
                Cause::NetCardinality { net, rows },
                Severity::Error,
            ));
        }
    }

    for comp in design.components() {
        for pin in comp.pins().values() {
            let table_net = design
                .net_info
                .net_for_pin(comp.id(), &pin.name)
                .unwrap_or(NetId::UNCONNECTED);
            if table_net != pin.net_id {
                issues.add(DesignIssue::new_and_log(
                    Cause::PinNetMismatch {
                        component: comp.name().clone(),
                        pin: pin.name.clone(),
                        pin_net: pin.net_id,
                        table_net,
                    },
                    Severity::Error,
                ));
            }
        }
    }
}

fn validate_layer_stack(design: &Design, issues: &mut IssueSet<DesignIssue>) {
    let _guard = span!(Level::INFO, "validating layer stack").entered();
    let stack = &design.layer_stack;
    for (layer, chips) in stack.layers_shared_across_chips() {
        issues.add(DesignIssue::new_and_log(
            Cause::LayerSharedAcrossChips { layer, chips },
            Severity::Error,
        ));
    }
    for (layer, datatype) in stack.duplicate_layer_datatypes() {
        issues.add(DesignIssue::new_and_log(
            Cause::DuplicateDatatype { layer, datatype },
            Severity::Error,
        ));
    }
    let missing: Vec<ArcStr> = stack
        .get_unique_chip_names()
        .into_iter()
        .filter(|chip| !design.chips.contains_key(chip))
        .collect();
    if !missing.is_empty() {
        issues.add(DesignIssue::new_and_log(
            Cause::LayerStackChipsNotInDesign { chips: missing },
            Severity::Warning,
        ));
    }
}

fn validate_geometry(design: &Design, issues: &mut IssueSet<DesignIssue>) {
    let _guard = span!(Level::INFO, "validating geometry tables").entered();
    let layers = design.layer_stack.get_unique_layer_ints();
    for (kind, row) in design.qgeometry.iter() {
        let component = design
            .component_by_id(row.component)
            .map(|c| c.name().clone())
            .unwrap_or_else(|| arcstr::format!("{}", row.component));
        if !design.chips.contains_key(&row.chip) {
            issues.add(DesignIssue::new_and_log(
                Cause::UnknownChip {
                    component: component.clone(),
                    kind,
                    element: row.name.clone(),
                    chip: row.chip.clone(),
                },
                Severity::Error,
            ));
        }
        if !layers.contains(&row.layer) {
            issues.add(DesignIssue::new_and_log(
                Cause::LayerNotInStack {
                    component,
                    kind,
                    element: row.name.clone(),
                    layer: row.layer,
                },
                Severity::Warning,
            ));
        }
    }
}
