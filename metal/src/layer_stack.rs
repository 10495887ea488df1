//! Per-chip layer definitions used to extrude 2-D geometry into 3-D.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use arcstr::ArcStr;
use indexmap::{IndexMap, IndexSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::parse::{is_false, is_true, parse_raw, Options, RawValue, Value};

/// The columns of a layer stack, in file order.
pub const COLUMNS: [&str; 7] = [
    "chip_name",
    "layer",
    "datatype",
    "material",
    "thickness",
    "z_coord",
    "fill",
];

/// An error loading a layer stack.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerStackError {
    /// The file could not be read.
    #[error("could not read layer stack `{path}`: {message}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying error.
        message: String,
    },
    /// A CSV line is malformed.
    #[error("layer stack line {line}: {message}")]
    Csv {
        /// The 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
    /// A required column is missing from the CSV header.
    #[error("layer stack is missing column `{0}`")]
    MissingColumn(&'static str),
    /// The TOML document is malformed.
    #[error("invalid layer stack TOML: {0}")]
    Toml(String),
}

/// One `(chip_name, layer, datatype)` entry of a layer stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRow {
    /// The chip the layer belongs to.
    pub chip_name: ArcStr,
    /// The layer number.
    pub layer: i64,
    /// The datatype within the layer.
    #[serde(default)]
    pub datatype: i64,
    /// The material name.
    pub material: ArcStr,
    /// The thickness, e.g. `"2um"`. Negative values extend downward.
    pub thickness: RawValue,
    /// The z coordinate of the layer's base.
    pub z_coord: RawValue,
    /// Whether the layer is filled. Text is interpreted with [`is_true`].
    pub fill: RawValue,
}

impl LayerRow {
    /// Creates a row from the textual form used in CSV files.
    pub fn new(
        chip_name: impl Into<ArcStr>,
        layer: i64,
        datatype: i64,
        material: impl Into<ArcStr>,
        thickness: &str,
        z_coord: &str,
        fill: bool,
    ) -> Self {
        Self {
            chip_name: chip_name.into(),
            layer,
            datatype,
            material: material.into(),
            thickness: thickness.into(),
            z_coord: z_coord.into(),
            fill: fill.into(),
        }
    }

    /// The thickness in millimeters, if it parses as a number.
    pub fn thickness_mm(&self) -> Option<Decimal> {
        parse_raw(&self.thickness, &Options::new()).ok()?.as_number()
    }

    /// The z coordinate in millimeters, if it parses as a number.
    pub fn z_coord_mm(&self) -> Option<Decimal> {
        parse_raw(&self.z_coord, &Options::new()).ok()?.as_number()
    }

    /// The fill flag. Unrecognized values are logged and treated as `false`.
    pub fn fill(&self) -> bool {
        match &self.fill {
            RawValue::Bool(b) => *b,
            RawValue::Int(1) => true,
            RawValue::Int(0) => false,
            RawValue::Text(t) if is_true(t) => true,
            RawValue::Text(t) if is_false(t) => false,
            other => {
                tracing::warn!(
                    chip = %self.chip_name,
                    layer = self.layer,
                    datatype = self.datatype,
                    fill = %other,
                    "unrecognized fill value; treating as false"
                );
                false
            }
        }
    }

    fn property(&self, name: &str) -> Option<Value> {
        Some(match name {
            "chip_name" => Value::Text(self.chip_name.clone()),
            "layer" => Value::Number(Decimal::from(self.layer)),
            "datatype" => Value::Number(Decimal::from(self.datatype)),
            "material" => Value::Text(self.material.clone()),
            "thickness" => parse_raw(&self.thickness, &Options::new()).ok()?,
            "z_coord" => parse_raw(&self.z_coord, &Options::new()).ok()?,
            "fill" => Value::Bool(self.fill()),
            _ => return None,
        })
    }
}

/// Properties of a filled layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillProperties {
    /// The chip the layer belongs to.
    pub chip_name: ArcStr,
    /// The material name.
    pub material: ArcStr,
    /// Thickness in millimeters.
    pub thickness: Decimal,
    /// Base z coordinate in millimeters.
    pub z_coord: Decimal,
}

/// The layer stack of a design.
///
/// A layer number belongs to a single chip. Within a layer, each datatype
/// appears at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStack {
    #[serde(rename = "layer")]
    rows: Vec<LayerRow>,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self {
            rows: vec![
                LayerRow::new("main", 1, 0, "pec", "2um", "0um", true),
                LayerRow::new("main", 3, 0, "silicon", "-750um", "0um", true),
            ],
        }
    }
}

impl LayerStack {
    /// Creates a layer stack from rows.
    pub fn from_rows(rows: Vec<LayerRow>) -> Self {
        Self { rows }
    }

    /// The default stack of a two-chip flip-chip design.
    pub fn flip_chip() -> Self {
        Self {
            rows: vec![
                LayerRow::new("C_chip", 1, 0, "pec", "2um", "0um", true),
                LayerRow::new("Q_chip", 3, 0, "pec", "-2um", "20um", true),
            ],
        }
    }

    /// Parses a CSV layer stack.
    ///
    /// The header names the columns in any order. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn from_csv_str(s: &str) -> Result<Self, LayerStackError> {
        let mut lines = s
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let Some((_, header)) = lines.next() else {
            return Ok(Self { rows: Vec::new() });
        };
        let header: Vec<&str> = header.split(',').map(str::trim).collect();
        let mut index = BTreeMap::new();
        for col in COLUMNS {
            let pos = header
                .iter()
                .position(|h| *h == col)
                .ok_or(LayerStackError::MissingColumn(col))?;
            index.insert(col, pos);
        }

        let mut rows = Vec::new();
        for (line, text) in lines {
            let fields: Vec<&str> = text.split(',').map(str::trim).collect();
            if fields.len() != header.len() {
                return Err(LayerStackError::Csv {
                    line,
                    message: format!("expected {} fields, found {}", header.len(), fields.len()),
                });
            }
            let field = |col: &str| fields[index[col]];
            let int = |col: &str| {
                field(col).parse::<i64>().map_err(|_| LayerStackError::Csv {
                    line,
                    message: format!("`{}` is not an integer {col}", field(col)),
                })
            };
            rows.push(LayerRow {
                chip_name: field("chip_name").into(),
                layer: int("layer")?,
                datatype: int("datatype")?,
                material: field("material").into(),
                thickness: field("thickness").into(),
                z_coord: field("z_coord").into(),
                fill: field("fill").into(),
            });
        }
        Ok(Self { rows })
    }

    /// Parses a TOML layer stack made of `[[layer]]` tables.
    pub fn from_toml_str(s: &str) -> Result<Self, LayerStackError> {
        toml::from_str(s).map_err(|e| LayerStackError::Toml(e.to_string()))
    }

    /// Reads a layer stack file. Files ending in `.toml` are TOML; anything else is CSV.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LayerStackError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| LayerStackError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&contents)
        } else {
            Self::from_csv_str(&contents)
        }
    }

    /// Reads a layer stack file, falling back to the default stack on failure.
    ///
    /// Failures are logged as errors.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path.map(Self::from_path) {
            None => Self::default(),
            Some(Ok(stack)) => stack,
            Some(Err(e)) => {
                tracing::error!(error = %e, "failed to load layer stack; using the default stack");
                Self::default()
            }
        }
    }

    /// Serializes the stack as CSV.
    pub fn to_csv_string(&self) -> String {
        let mut out = COLUMNS.join(",");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                row.chip_name,
                row.layer,
                row.datatype,
                row.material,
                row.thickness,
                row.z_coord,
                row.fill
            ));
        }
        out
    }

    /// All rows.
    pub fn rows(&self) -> &[LayerRow] {
        &self.rows
    }

    /// Returns `(layer, datatype) -> properties` for every filled row.
    ///
    /// Rows whose thickness or z coordinate do not parse are skipped with a warning.
    pub fn get_layer_datatype_when_fill_is_true(&self) -> IndexMap<(i64, i64), FillProperties> {
        let mut out = IndexMap::new();
        for row in self.rows.iter().filter(|row| row.fill()) {
            match (row.thickness_mm(), row.z_coord_mm()) {
                (Some(thickness), Some(z_coord)) => {
                    out.insert(
                        (row.layer, row.datatype),
                        FillProperties {
                            chip_name: row.chip_name.clone(),
                            material: row.material.clone(),
                            thickness,
                            z_coord,
                        },
                    );
                }
                _ => tracing::warn!(
                    layer = row.layer,
                    datatype = row.datatype,
                    "layer thickness or z_coord is not a length"
                ),
            }
        }
        out
    }

    /// Looks up the named columns of the row matching `layer` and `datatype`.
    ///
    /// Returns [`None`] if any name is not a column or no row matches.
    pub fn get_properties_for_layer_datatype(
        &self,
        properties: &[&str],
        layer: i64,
        datatype: i64,
    ) -> Option<Vec<Value>> {
        if let Some(bad) = properties.iter().find(|p| !COLUMNS.contains(*p)) {
            tracing::warn!(property = *bad, "not a layer stack column");
            return None;
        }
        let row = self
            .rows
            .iter()
            .find(|row| row.layer == layer && row.datatype == datatype)?;
        properties.iter().map(|p| row.property(p)).collect()
    }

    /// Thickness and z coordinate in millimeters of the given layer and datatype.
    pub fn get_thickness_zcoord_for_layer_datatype(
        &self,
        layer: i64,
        datatype: i64,
    ) -> Option<(Decimal, Decimal)> {
        let row = self
            .rows
            .iter()
            .find(|row| row.layer == layer && row.datatype == datatype)?;
        Some((row.thickness_mm()?, row.z_coord_mm()?))
    }

    /// The lowest and highest z coordinate covered by any datatype of `layer`.
    pub fn layer_z_range(&self, layer: i64) -> Option<(Decimal, Decimal)> {
        let mut range: Option<(Decimal, Decimal)> = None;
        for row in self.rows.iter().filter(|row| row.layer == layer) {
            let (Some(t), Some(z)) = (row.thickness_mm(), row.z_coord_mm()) else {
                continue;
            };
            let (lo, hi) = (z.min(z + t), z.max(z + t));
            range = Some(match range {
                Some((a, b)) => (a.min(lo), b.max(hi)),
                None => (lo, hi),
            });
        }
        range
    }

    /// Returns `true` if no datatype repeats within a layer.
    pub fn is_layer_data_unique(&self) -> bool {
        self.duplicate_layer_datatypes().is_empty()
    }

    /// `(layer, datatype)` pairs that appear more than once.
    pub fn duplicate_layer_datatypes(&self) -> Vec<(i64, i64)> {
        let mut seen = BTreeSet::new();
        let mut dups = BTreeSet::new();
        for row in &self.rows {
            if !seen.insert((row.layer, row.datatype)) {
                dups.insert((row.layer, row.datatype));
            }
        }
        dups.into_iter().collect()
    }

    /// Returns `true` if every layer number belongs to a single chip.
    pub fn is_layer_unique_across_chips(&self) -> bool {
        self.layers_shared_across_chips().is_empty()
    }

    /// Layers that appear on more than one chip, with the chips they appear on.
    pub fn layers_shared_across_chips(&self) -> Vec<(i64, Vec<ArcStr>)> {
        let mut chips: BTreeMap<i64, IndexSet<ArcStr>> = BTreeMap::new();
        for row in &self.rows {
            chips.entry(row.layer).or_default().insert(row.chip_name.clone());
        }
        chips
            .into_iter()
            .filter(|(_, chips)| chips.len() > 1)
            .map(|(layer, chips)| (layer, chips.into_iter().collect()))
            .collect()
    }

    /// Chip names in order of first appearance.
    pub fn get_unique_chip_names(&self) -> IndexSet<ArcStr> {
        self.rows.iter().map(|row| row.chip_name.clone()).collect()
    }

    /// All layer numbers.
    pub fn get_unique_layer_ints(&self) -> BTreeSet<i64> {
        self.rows.iter().map(|row| row.layer).collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const CSV: &str = "\
chip_name,layer,datatype,material,thickness,z_coord,fill
main,1,0,pec,2um,0um,True
main,1,1,pec,200nm,2um,yes
main,3,0,silicon,-750um,0um,true
# comments are skipped
second,4,0,sapphire,500um,1mm,nope
";

    #[test]
    fn default_rows() {
        let stack = LayerStack::default();
        assert_eq!(stack.rows().len(), 2);
        assert_eq!(
            stack.get_thickness_zcoord_for_layer_datatype(3, 0),
            Some((dec!(-0.75), dec!(0)))
        );
        assert!(stack.is_layer_unique_across_chips());
        assert!(stack.is_layer_data_unique());
    }

    #[test]
    fn csv_parses_with_fill_strings() {
        let stack = LayerStack::from_csv_str(CSV).unwrap();
        assert_eq!(stack.rows().len(), 4);
        let filled = stack.get_layer_datatype_when_fill_is_true();
        assert_eq!(filled.len(), 3);
        assert_eq!(filled[&(1, 1)].thickness, dec!(0.0002));
        assert!(!filled.contains_key(&(4, 0)));
        assert_eq!(
            stack.get_unique_chip_names().into_iter().collect::<Vec<_>>(),
            vec![ArcStr::from("main"), ArcStr::from("second")]
        );
        assert_eq!(stack.get_unique_layer_ints(), BTreeSet::from([1, 3, 4]));
    }

    #[test]
    fn csv_round_trips_through_text() {
        let stack = LayerStack::from_csv_str(CSV).unwrap();
        let again = LayerStack::from_csv_str(&stack.to_csv_string()).unwrap();
        assert_eq!(stack, again);
    }

    #[test]
    fn csv_errors() {
        assert_eq!(
            LayerStack::from_csv_str("chip_name,layer\nmain,1\n"),
            Err(LayerStackError::MissingColumn("datatype"))
        );
        let bad = "chip_name,layer,datatype,material,thickness,z_coord,fill\nmain,x,0,pec,1um,0um,true\n";
        assert!(matches!(
            LayerStack::from_csv_str(bad),
            Err(LayerStackError::Csv { line: 2, .. })
        ));
    }

    #[test]
    fn toml_layers() {
        let stack = LayerStack::from_toml_str(
            r#"
            [[layer]]
            chip_name = "main"
            layer = 1
            material = "pec"
            thickness = "2um"
            z_coord = "0um"
            fill = true
            "#,
        )
        .unwrap();
        assert_eq!(stack.rows()[0].datatype, 0);
        assert!(stack.rows()[0].fill());
    }

    #[test_log::test]
    fn property_lookup() {
        let stack = LayerStack::from_csv_str(CSV).unwrap();
        let props = stack
            .get_properties_for_layer_datatype(&["material", "thickness", "fill"], 1, 1)
            .unwrap();
        assert_eq!(props[0], Value::Text("pec".into()));
        assert_eq!(props[1], Value::Number(dec!(0.0002)));
        assert_eq!(props[2], Value::Bool(true));
        assert!(stack
            .get_properties_for_layer_datatype(&["color"], 1, 0)
            .is_none());
        assert!(stack
            .get_properties_for_layer_datatype(&["material"], 9, 0)
            .is_none());
    }

    #[test_log::test]
    fn uniqueness_checks() {
        let stack = LayerStack::from_rows(vec![
            LayerRow::new("a", 1, 0, "pec", "1um", "0um", true),
            LayerRow::new("b", 1, 0, "pec", "1um", "0um", true),
        ]);
        assert!(!stack.is_layer_unique_across_chips());
        assert!(!stack.is_layer_data_unique());
        assert_eq!(
            stack.layers_shared_across_chips(),
            vec![(1, vec![ArcStr::from("a"), ArcStr::from("b")])]
        );
        assert_eq!(stack.duplicate_layer_datatypes(), vec![(1, 0)]);
    }

    #[test]
    fn z_range_spans_datatypes() {
        let stack = LayerStack::from_csv_str(CSV).unwrap();
        assert_eq!(stack.layer_z_range(1), Some((dec!(0), dec!(0.0022))));
        assert_eq!(stack.layer_z_range(3), Some((dec!(-0.75), dec!(0))));
        assert_eq!(stack.layer_z_range(7), None);
    }

    #[test_log::test]
    fn missing_file_falls_back_to_default() {
        let stack = LayerStack::load_or_default(Some(Path::new("/nonexistent/stack.csv")));
        assert_eq!(stack, LayerStack::default());
    }
}
