//! The xy extent of a render.
//!
//! Renderers either fit the simulation box tightly around the selected
//! geometry plus a buffer, or use the full chip footprint. Both depend on the
//! chips named by the layer stack being defined in the design.

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexSet;

use crate::design::{ChipLookup, Design, SelectionCase};
use crate::id::ComponentId;
use crate::qgeometry::{ElementKind, QGeometryRow};

/// The result of [`Design::get_bounds_of_path_and_poly_tables`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableBounds<'a> {
    /// The render box, or [`None`] if there is nothing to bound.
    pub bounds: Option<Rect>,
    /// Path and poly rows of the selection.
    pub path_and_poly: Vec<(ElementKind, &'a QGeometryRow)>,
    /// Path, poly and junction rows of the selection.
    pub path_poly_and_junction: Vec<(ElementKind, &'a QGeometryRow)>,
    /// Whether every layer-stack chip is a design chip.
    pub chip_names_matched: bool,
    /// The layer-stack chip names, when they all match.
    pub valid_chip_names: IndexSet<ArcStr>,
}

impl Design {
    /// Checks the layer-stack chip names against the design's chips.
    ///
    /// Returns the layer-stack names when all of them are design chips.
    pub fn are_all_chipnames_in_design(&self) -> (bool, IndexSet<ArcStr>) {
        let from_stack = self.layer_stack.get_unique_chip_names();
        let missing: Vec<_> = from_stack
            .iter()
            .filter(|name| !self.chips.contains_key(*name))
            .collect();
        if missing.is_empty() {
            (true, from_stack)
        } else {
            tracing::warn!(
                layer_stack = ?from_stack,
                design = ?self.chips.keys().collect::<Vec<_>>(),
                ?missing,
                "layer stack names chips the design does not define"
            );
            (false, IndexSet::new())
        }
    }

    /// The union of the footprints of the layer-stack chips.
    ///
    /// Chips with unusable size data are skipped. Returns [`None`] when the
    /// layer-stack names do not match the design.
    pub fn get_box_for_xy_bounds(&self) -> (Option<Rect>, bool, IndexSet<ArcStr>) {
        let (matched, names) = self.are_all_chipnames_in_design();
        let mut chip_box: Option<Rect> = None;
        if matched {
            for chip in &names {
                match self.get_x_y_for_chip(chip) {
                    (Some(rect), ChipLookup::Ok) => {
                        chip_box = chip_box.bounding_union(&rect);
                    }
                    (_, code) => {
                        tracing::warn!(chip = %chip, code = code.code(), "chip excluded from the render box");
                    }
                }
            }
        }
        (chip_box, matched, names)
    }

    /// Computes the render box and collects the selected rows.
    ///
    /// With `box_plus_buffer`, the box is the bounding box of the selected
    /// path and poly rows grown by the buffers (in database units), then
    /// clamped to the chip box when there is one. Otherwise it is the chip
    /// box. A selection naming a missing component yields no box and no rows.
    pub fn get_bounds_of_path_and_poly_tables(
        &self,
        box_plus_buffer: bool,
        ids: &[ComponentId],
        case: SelectionCase,
        x_buff: i64,
        y_buff: i64,
    ) -> TableBounds<'_> {
        let (chip_box, chip_names_matched, valid_chip_names) = self.get_box_for_xy_bounds();

        if case == SelectionCase::Missing {
            tracing::warn!("one or more selected components were not found");
            return TableBounds {
                bounds: None,
                path_and_poly: Vec::new(),
                path_poly_and_junction: Vec::new(),
                chip_names_matched,
                valid_chip_names,
            };
        }

        let selected = (case == SelectionCase::Subset).then_some(ids);
        let rows_of = |kind: ElementKind| {
            self.qgeometry
                .rows(kind)
                .iter()
                .filter(move |row| selected.map_or(true, |ids| ids.contains(&row.component)))
                .map(move |row| (kind, row))
        };
        let path_and_poly: Vec<_> = rows_of(ElementKind::Path)
            .chain(rows_of(ElementKind::Poly))
            .collect();
        let path_poly_and_junction: Vec<_> = path_and_poly
            .iter()
            .copied()
            .chain(rows_of(ElementKind::Junction))
            .collect();

        let bounds = if box_plus_buffer {
            let geometry_box = path_and_poly
                .iter()
                .map(|(_, row)| &row.geometry)
                .collect::<Vec<_>>()
                .bbox()
                .map(|r| r.expand_xy(x_buff, y_buff));
            match (geometry_box, chip_box) {
                (Some(b), Some(chip)) => {
                    let clamped = b.clamp_to(chip);
                    if clamped.is_none() {
                        tracing::warn!(?b, ?chip, "selected geometry lies outside the chips");
                    }
                    clamped
                }
                (b, _) => b,
            }
        } else {
            chip_box
        };

        TableBounds {
            bounds,
            path_and_poly,
            path_poly_and_junction,
            chip_names_matched,
            valid_chip_names,
        }
    }
}
