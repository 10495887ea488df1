//! Tables of renderable geometry produced by components.
//!
//! There is one table per [`ElementKind`]. Each row ties a shape to the
//! component that made it, a chip and a layer. Renderers add their own
//! columns, named `{renderer}_{column}`.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::ComponentId;
use crate::parse::{Options, RawValue};

/// The kind of geometry stored in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Filled polygons.
    Poly,
    /// Polylines swept by a width.
    Path,
    /// Josephson junction lines.
    Junction,
}

impl ElementKind {
    /// Every element kind, in rendering order.
    pub const ALL: [ElementKind; 3] = [Self::Path, Self::Poly, Self::Junction];

    const fn index(&self) -> usize {
        match self {
            Self::Poly => 0,
            Self::Path => 1,
            Self::Junction => 2,
        }
    }

    /// The table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Poly => "poly",
            Self::Path => "path",
            Self::Junction => "junction",
        }
    }

    /// Returns `true` if `shape` may be stored in this table.
    pub fn accepts(&self, shape: &Shape) -> bool {
        match self {
            Self::Poly => matches!(shape, Shape::Rect(_) | Shape::Polygon(_)),
            Self::Path | Self::Junction => matches!(shape, Shape::Path(_)),
        }
    }
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ElementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "poly" => Ok(Self::Poly),
            "path" => Ok(Self::Path),
            "junction" => Ok(Self::Junction),
            _ => Err(Error::UnknownElementType(s.to_string())),
        }
    }
}

/// A row of a geometry table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QGeometryRow {
    /// The component that made this element.
    pub component: ComponentId,
    /// The element name, unique within the component and table.
    pub name: ArcStr,
    /// The shape, in database units.
    pub geometry: Shape,
    /// The layer number.
    pub layer: i64,
    /// The chip name.
    pub chip: ArcStr,
    /// Cut this shape out of the ground plane instead of adding metal.
    pub subtract: bool,
    /// A construction helper that renderers ignore.
    pub helper: bool,
    /// Corner rounding radius, if any.
    pub fillet: Option<i64>,
    /// Renderer columns, keyed `{renderer}_{column}`.
    pub extra: Options,
}

impl QGeometryRow {
    /// The swept width of a path or junction row.
    pub fn width(&self) -> Option<i64> {
        self.geometry.path().map(Path::width)
    }

    /// A renderer column value.
    pub fn column(&self, name: &str) -> Option<&RawValue> {
        self.extra.get(name)
    }
}

/// Settings shared by the rows of one [`GeometryTables::add_qgeometry`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementOptions {
    /// Cut from the ground plane.
    pub subtract: bool,
    /// Exclude from rendering.
    pub helper: bool,
    /// The layer number.
    pub layer: i64,
    /// The chip name.
    pub chip: ArcStr,
    /// Corner rounding radius.
    pub fillet: Option<i64>,
    /// Renderer column values. Each key must be a registered column.
    pub extra: Options,
}

impl Default for ElementOptions {
    fn default() -> Self {
        Self {
            subtract: false,
            helper: false,
            layer: 1,
            chip: arcstr::literal!("main"),
            fillet: None,
            extra: Options::new(),
        }
    }
}

/// The `poly`, `path` and `junction` tables of a design.
#[derive(Debug, Clone, Default)]
pub struct GeometryTables {
    tables: [Vec<QGeometryRow>; 3],
    columns: [Options; 3],
}

impl GeometryTables {
    /// Creates empty tables with no renderer columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// The element kinds, in rendering order.
    pub fn get_element_types(&self) -> [ElementKind; 3] {
        ElementKind::ALL
    }

    /// Parses a table name.
    pub fn check_element_type(&self, kind: &str) -> Result<ElementKind> {
        kind.parse()
    }

    /// Registers the renderer column `{renderer}_{column}` on a table.
    ///
    /// Existing rows without the column take the default value.
    pub fn add_renderer_columns(
        &mut self,
        renderer: &str,
        kind: ElementKind,
        column: &str,
        default: RawValue,
    ) {
        let name = arcstr::format!("{}_{}", renderer, column);
        for row in &mut self.tables[kind.index()] {
            row.extra
                .entry(name.clone())
                .or_insert_with(|| default.clone());
        }
        tracing::debug!(table = %kind, column = %name, "registered renderer column");
        self.columns[kind.index()].insert(name, default);
    }

    /// The renderer columns of a table with their defaults.
    pub fn renderer_columns(&self, kind: ElementKind) -> &Options {
        &self.columns[kind.index()]
    }

    /// Adds rows for a component.
    ///
    /// An element with several shapes becomes rows `name_0`, `name_1`, and so on.
    /// Nothing is added if any shape does not fit the table or any extra
    /// column is unknown. Returns the number of rows added.
    pub fn add_qgeometry(
        &mut self,
        kind: ElementKind,
        component: ComponentId,
        geometry: impl IntoIterator<Item = (ArcStr, Vec<Shape>)>,
        opts: &ElementOptions,
    ) -> Result<usize> {
        let columns = self.renderer_columns(kind);
        if let Some(column) = opts.extra.keys().find(|c| !columns.contains_key(*c)) {
            return Err(Error::UnknownColumn {
                kind,
                column: column.clone(),
            });
        }
        let mut extra = columns.clone();
        for (k, v) in &opts.extra {
            extra.insert(k.clone(), v.clone());
        }

        let mut new_rows = Vec::new();
        for (name, shapes) in geometry {
            if shapes.iter().any(|s| !kind.accepts(s)) {
                return Err(Error::WrongGeometryKind { kind, name });
            }
            let multi = shapes.len() > 1;
            for (i, shape) in shapes.into_iter().enumerate() {
                new_rows.push(QGeometryRow {
                    component,
                    name: if multi {
                        arcstr::format!("{}_{}", name, i)
                    } else {
                        name.clone()
                    },
                    geometry: shape,
                    layer: opts.layer,
                    chip: opts.chip.clone(),
                    subtract: opts.subtract,
                    helper: opts.helper,
                    fillet: opts.fillet,
                    extra: extra.clone(),
                });
            }
        }
        let n = new_rows.len();
        self.tables[kind.index()].extend(new_rows);
        Ok(n)
    }

    /// Removes every row.
    pub fn clear_all_tables(&mut self) {
        for rows in &mut self.tables {
            rows.clear();
        }
    }

    /// Removes the rows of a component, returning how many were removed.
    pub fn delete_component_id(&mut self, component: ComponentId) -> usize {
        let mut removed = 0;
        for rows in &mut self.tables {
            let before = rows.len();
            rows.retain(|row| row.component != component);
            removed += before - rows.len();
        }
        removed
    }

    /// Rows keep component IDs, so a rename only needs logging.
    pub fn rename_component(&self, component: ComponentId, old: &str, new: &str) {
        tracing::debug!(component.id = %component, old, new, "component renamed in geometry tables");
    }

    /// The rows of a table.
    pub fn rows(&self, kind: ElementKind) -> &[QGeometryRow] {
        &self.tables[kind.index()]
    }

    /// Every row with its table, in rendering order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementKind, &QGeometryRow)> {
        ElementKind::ALL
            .into_iter()
            .flat_map(move |kind| self.rows(kind).iter().map(move |row| (kind, row)))
    }

    /// The rows of a component across all tables.
    pub fn get_component(&self, component: ComponentId) -> Vec<(ElementKind, &QGeometryRow)> {
        self.iter()
            .filter(|(_, row)| row.component == component)
            .collect()
    }

    /// The bounding box of a component's rows. Paths contribute their centerlines.
    pub fn get_component_bounds(&self, component: ComponentId) -> Option<Rect> {
        self.get_component(component)
            .iter()
            .map(|(_, row)| &row.geometry)
            .collect::<Vec<_>>()
            .bbox()
    }

    /// The shapes of a component, optionally restricted to one table.
    pub fn get_component_geometry_list(
        &self,
        component: ComponentId,
        kind: Option<ElementKind>,
    ) -> Vec<&Shape> {
        self.get_component(component)
            .into_iter()
            .filter(|(k, _)| kind.map_or(true, |kind| kind == *k))
            .map(|(_, row)| &row.geometry)
            .collect()
    }

    /// The shapes of a component keyed by element name, optionally restricted to one table.
    pub fn get_component_geometry_dict(
        &self,
        component: ComponentId,
        kind: Option<ElementKind>,
    ) -> IndexMap<ArcStr, &Shape> {
        self.get_component(component)
            .into_iter()
            .filter(|(k, _)| kind.map_or(true, |kind| kind == *k))
            .map(|(_, row)| (row.name.clone(), &row.geometry))
            .collect()
    }

    /// Layers used on the given chip, or on any chip.
    pub fn get_all_unique_layers(&self, chip: Option<&str>) -> BTreeSet<i64> {
        self.iter()
            .filter(|(_, row)| chip.map_or(true, |chip| row.chip == chip))
            .map(|(_, row)| row.layer)
            .collect()
    }

    /// Returns `true` if no table has rows.
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(Vec::is_empty)
    }
}
