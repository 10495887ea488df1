//! Parsing of option strings with units into numbers, text, lists and maps.
//!
//! Lengths are converted to millimeters and kept as exact decimals. Geometry
//! code converts them to integer database units (1 nm) with [`to_db_units`].

use std::fmt::Display;
use std::str::FromStr;

use arcstr::ArcStr;
use indexmap::IndexMap;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Database units per millimeter.
pub const DB_UNITS_PER_MM: i64 = 1_000_000;

/// The deepest chain of variable references that is followed.
pub const MAX_VARIABLE_DEPTH: usize = 32;

/// Strings accepted as `true`.
pub const TRUE_STR: [&str; 10] = ["true", "True", "TRUE", "1", "t", "y", "Y", "YES", "yes", "yeah"];

/// Strings accepted as `false`.
pub const FALSE_STR: [&str; 10] = [
    "false", "False", "FALSE", "0", "f", "n", "N", "NO", "no", "nope",
];

/// A map of raw, unparsed option values.
pub type Options = IndexMap<ArcStr, RawValue>;

/// A map of parsed option values.
pub type ParsedOptions = IndexMap<ArcStr, Value>;

/// An error parsing an option value.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A variable refers back to itself, directly or through other variables.
    #[error("variable `{name}` is part of a reference cycle")]
    VariableCycle {
        /// The variable at which the depth limit was reached.
        name: ArcStr,
    },
    /// Brackets or braces do not balance.
    #[error("unbalanced brackets in `{input}`")]
    Unbalanced {
        /// The offending input.
        input: String,
    },
    /// A map literal entry has no `key: value` separator.
    #[error("expected `key: value` in `{input}`")]
    MissingColon {
        /// The offending entry.
        input: String,
    },
    /// A floating point option value cannot be represented as a decimal.
    #[error("`{value}` is not a finite number")]
    NotANumber {
        /// The offending value.
        value: f64,
    },
}

/// A raw option value, as written in a design file or passed by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string such as `"10um"` or `"cpw_width"`.
    Text(ArcStr),
    /// A list of values.
    List(Vec<RawValue>),
    /// A nested table of options.
    Table(Options),
}

impl RawValue {
    /// Returns the nested table if this is one.
    pub fn as_table(&self) -> Option<&Options> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the string if this is one.
    pub fn as_text(&self) -> Option<&ArcStr> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<ArcStr> for RawValue {
    fn from(value: ArcStr) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Options> for RawValue {
    fn from(value: Options) -> Self {
        Self::Table(value)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(t) => write!(f, "{t}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Table(table) => {
                write!(f, "{{")?;
                for (i, (k, v)) in table.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Builds an [`Options`] map from key/value pairs.
///
/// # Examples
///
/// ```
/// use metal::parse::{options, RawValue};
///
/// let opts = options([("width", "10um"), ("chip", "main")]);
/// assert_eq!(opts["width"], RawValue::from("10um"));
/// ```
pub fn options<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Options
where
    K: Into<ArcStr>,
    V: Into<RawValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Deep-merges `overrides` into `base`. Nested tables are merged key by key.
pub fn merge_options(base: &mut Options, overrides: &Options) {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(RawValue::Table(b)), RawValue::Table(o)) => merge_options(b, o),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// A parsed option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A number. Lengths are in millimeters; unitless numbers are unchanged.
    Number(Decimal),
    /// A boolean.
    Bool(bool),
    /// Text that is not a number, such as a material name or a non-length quantity.
    Text(ArcStr),
    /// A list of values.
    List(Vec<Value>),
    /// A map of values.
    Map(IndexMap<ArcStr, Value>),
}

impl Value {
    /// The number, if this is one.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as a float, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().and_then(|n| n.to_f64())
    }

    /// The number of millimeters converted to database units, if this is a number.
    pub fn as_db(&self) -> Option<i64> {
        self.as_number().map(to_db_units)
    }

    /// The text, if this is text.
    pub fn as_text(&self) -> Option<&ArcStr> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Interprets the value as a boolean.
    ///
    /// Text is accepted if it is one of [`TRUE_STR`] or [`FALSE_STR`].
    /// The numbers 1 and 0 are also accepted.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(t) if is_true(t) => Some(true),
            Self::Text(t) if is_false(t) => Some(false),
            Self::Number(n) if n.is_zero() => Some(false),
            Self::Number(n) if *n == Decimal::ONE => Some(true),
            _ => None,
        }
    }

    /// The list, if this is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// The map, if this is one.
    pub fn as_map(&self) -> Option<&IndexMap<ArcStr, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n.normalize()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(t) => write!(f, "{t}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Returns `true` if `s` is one of [`TRUE_STR`].
pub fn is_true(s: &str) -> bool {
    TRUE_STR.contains(&s)
}

/// Returns `true` if `s` is one of [`FALSE_STR`].
pub fn is_false(s: &str) -> bool {
    FALSE_STR.contains(&s)
}

/// Converts millimeters to database units, rounding to the nearest unit.
///
/// Values outside the `i64` range saturate.
///
/// # Examples
///
/// ```
/// use metal::parse::to_db_units;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(to_db_units(dec!(0.01)), 10_000);
/// assert_eq!(to_db_units(dec!(-0.75)), -750_000);
/// ```
pub fn to_db_units(mm: Decimal) -> i64 {
    mm.checked_mul(Decimal::from(DB_UNITS_PER_MM))
        .and_then(|v| v.round().to_i64())
        .unwrap_or(if mm.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
}

/// Converts database units to millimeters.
pub fn from_db_units(db: i64) -> Decimal {
    Decimal::from(db) / Decimal::from(DB_UNITS_PER_MM)
}

/// Converts database units to floating point millimeters.
pub fn db_to_mm_f64(db: i64) -> f64 {
    db as f64 / DB_UNITS_PER_MM as f64
}

/// Parses a raw option string.
///
/// * Identifiers that name a variable are replaced by the variable's parsed value.
/// * Other identifiers are returned as text.
/// * `[..]` and `{..}` literals become lists and maps.
/// * Strings that start with a digit, `+`, `-` or `.` are evaluated as
///   arithmetic over lengths and converted to millimeters. If that fails,
///   for example because of a non-length unit like `nH`, the text is returned unchanged.
///
/// # Examples
///
/// ```
/// use metal::parse::{options, parse_value, Value};
/// use rust_decimal_macros::dec;
///
/// let vars = options([("cpw_width", "10um")]);
/// assert_eq!(parse_value("2*cpw_width", &vars).ok(), Some(Value::Text("2*cpw_width".into())));
/// assert_eq!(parse_value("cpw_width", &vars).ok(), Some(Value::Number(dec!(0.01))));
/// assert_eq!(parse_value("-2 * 1e5 nm", &vars).ok(), Some(Value::Number(dec!(-0.2))));
/// assert_eq!(parse_value("10nH", &vars).ok(), Some(Value::Text("10nH".into())));
/// ```
pub fn parse_value(raw: &str, variables: &Options) -> Result<Value, ParseError> {
    parse_str(raw, variables, 0, None)
}

/// Parses a raw option value, recursing into lists and tables.
pub fn parse_raw(raw: &RawValue, variables: &Options) -> Result<Value, ParseError> {
    parse_raw_depth(raw, variables, 0, None)
}

/// Parses every value in an option map.
pub fn parse_options(options: &Options, variables: &Options) -> Result<ParsedOptions, ParseError> {
    options
        .iter()
        .map(|(k, v)| Ok((k.clone(), parse_raw(v, variables)?)))
        .collect()
}

fn parse_raw_depth(
    raw: &RawValue,
    variables: &Options,
    depth: usize,
    via: Option<&ArcStr>,
) -> Result<Value, ParseError> {
    Ok(match raw {
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Int(i) => Value::Number(Decimal::from(*i)),
        RawValue::Float(x) => Value::Number(
            Decimal::from_f64(*x)
                .map(|d| d.normalize())
                .ok_or(ParseError::NotANumber { value: *x })?,
        ),
        RawValue::Text(s) => parse_str(s, variables, depth, via)?,
        RawValue::List(items) => Value::List(
            items
                .iter()
                .map(|v| parse_raw_depth(v, variables, depth, via))
                .collect::<Result<_, _>>()?,
        ),
        RawValue::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| Ok((k.clone(), parse_raw_depth(v, variables, depth, via)?)))
                .collect::<Result<_, ParseError>>()?,
        ),
    })
}

fn parse_str(
    raw: &str,
    variables: &Options,
    depth: usize,
    via: Option<&ArcStr>,
) -> Result<Value, ParseError> {
    let s = raw.trim();

    if s.starts_with('[') || s.starts_with('{') {
        let (open, close) = if s.starts_with('[') { ('[', ']') } else { ('{', '}') };
        if !s.ends_with(close) {
            return Err(ParseError::Unbalanced { input: s.to_string() });
        }
        let inner = &s[open.len_utf8()..s.len() - close.len_utf8()];
        let items = split_top_level(inner).ok_or_else(|| ParseError::Unbalanced {
            input: s.to_string(),
        })?;
        return if open == '[' {
            Ok(Value::List(
                items
                    .into_iter()
                    .map(|item| parse_str(item, variables, depth, via))
                    .collect::<Result<_, _>>()?,
            ))
        } else {
            let mut map = IndexMap::new();
            for item in items {
                let (k, v) = item.split_once(':').ok_or_else(|| ParseError::MissingColon {
                    input: item.trim().to_string(),
                })?;
                let key = k.trim().trim_matches(|c| c == '\'' || c == '"');
                map.insert(ArcStr::from(key), parse_str(v, variables, depth, via)?);
            }
            Ok(Value::Map(map))
        };
    }

    if is_identifier(s) {
        return match variables.get_key_value(s) {
            Some((name, value)) => {
                if depth >= MAX_VARIABLE_DEPTH {
                    return Err(ParseError::VariableCycle {
                        name: via.cloned().unwrap_or_else(|| name.clone()),
                    });
                }
                parse_raw_depth(value, variables, depth + 1, Some(name))
            }
            None => Ok(Value::Text(s.into())),
        };
    }

    if s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | '(')) {
        if let Some(n) = eval_length(s) {
            return Ok(Value::Number(n));
        }
    }

    Ok(Value::Text(s.into()))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Splits on commas that are not nested inside brackets, braces or parentheses.
///
/// Returns [`None`] if the nesting does not balance.
fn split_top_level(s: &str) -> Option<Vec<&str>> {
    if s.trim().is_empty() {
        return Some(Vec::new());
    }
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                items.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    items.push(&s[start..]);
    Some(items)
}

/// The factor converting a length unit to millimeters.
fn length_unit_to_mm(unit: &str) -> Option<Decimal> {
    Some(match unit {
        "m" => dec!(1000),
        "cm" => dec!(10),
        "mm" => dec!(1),
        "um" | "µm" | "μm" => dec!(0.001),
        "nm" => dec!(0.000001),
        "pm" => dec!(0.000000001),
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Decimal),
    Unit(String),
    Op(char),
}

fn tokenize(s: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = s.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // An exponent needs a digit after the optional sign, so `1em` stays a unit.
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let num = if text.contains(['e', 'E']) {
                Decimal::from_scientific(&text).ok()?
            } else {
                Decimal::from_str(&text).ok()?
            };
            tokens.push(Token::Num(num));
        } else if c.is_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Unit(chars[start..i].iter().collect()));
        } else if "+-*/()".contains(c) {
            tokens.push(Token::Op(c));
            i += 1;
        } else {
            return None;
        }
    }
    Some(tokens)
}

/// A value with a length dimension exponent.
#[derive(Debug, Clone, Copy)]
struct Quantity {
    value: Decimal,
    dim: i32,
}

struct Evaluator {
    tokens: Vec<Token>,
    pos: usize,
}

impl Evaluator {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expr(&mut self) -> Option<Quantity> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            if lhs.dim != rhs.dim {
                return None;
            }
            lhs.value = if op == '+' {
                lhs.value.checked_add(rhs.value)?
            } else {
                lhs.value.checked_sub(rhs.value)?
            };
        }
        Some(lhs)
    }

    fn term(&mut self) -> Option<Quantity> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = if op == '*' {
                Quantity {
                    value: lhs.value.checked_mul(rhs.value)?,
                    dim: lhs.dim + rhs.dim,
                }
            } else {
                Quantity {
                    value: lhs.value.checked_div(rhs.value)?,
                    dim: lhs.dim - rhs.dim,
                }
            };
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<Quantity> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                let q = self.unary()?;
                Some(Quantity {
                    value: -q.value,
                    dim: q.dim,
                })
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Option<Quantity> {
        let q = match self.next()? {
            Token::Num(value) => Quantity { value, dim: 0 },
            Token::Op('(') => {
                let q = self.expr()?;
                if self.next()? != Token::Op(')') {
                    return None;
                }
                q
            }
            _ => return None,
        };
        if let Some(Token::Unit(unit)) = self.peek().cloned() {
            self.pos += 1;
            let factor = length_unit_to_mm(&unit)?;
            return Some(Quantity {
                value: q.value.checked_mul(factor)?,
                dim: q.dim + 1,
            });
        }
        Some(q)
    }
}

/// Evaluates an arithmetic expression over lengths, returning millimeters.
///
/// Returns [`None`] if the expression is malformed, uses a unit that is not
/// a length, or does not reduce to a plain length or a unitless number.
fn eval_length(s: &str) -> Option<Decimal> {
    let mut eval = Evaluator {
        tokens: tokenize(s)?,
        pos: 0,
    };
    let q = eval.expr()?;
    if eval.pos != eval.tokens.len() || !(q.dim == 0 || q.dim == 1) {
        return None;
    }
    Some(q.value.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Value {
        parse_value(s, &Options::new()).unwrap()
    }

    #[test]
    fn lengths_convert_to_mm() {
        assert_eq!(parse("10um"), Value::Number(dec!(0.01)));
        assert_eq!(parse(" 2mm "), Value::Number(dec!(2)));
        assert_eq!(parse("1.5cm"), Value::Number(dec!(15)));
        assert_eq!(parse("-750um"), Value::Number(dec!(-0.75)));
        assert_eq!(parse("200nm"), Value::Number(dec!(0.0002)));
        assert_eq!(parse("0.001m"), Value::Number(dec!(1)));
    }

    #[test]
    fn arithmetic_is_evaluated() {
        assert_eq!(parse("2*130um"), Value::Number(dec!(0.26)));
        assert_eq!(parse("-2 * 1e5 nm"), Value::Number(dec!(-0.2)));
        assert_eq!(parse("(1mm + 500um) / 2"), Value::Number(dec!(0.75)));
        assert_eq!(parse("1e-3"), Value::Number(dec!(0.001)));
    }

    #[test]
    fn leading_parentheses_are_evaluated() {
        assert_eq!(parse("(20um)"), Value::Number(dec!(0.02)));
        assert_eq!(parse("(2 + 3) * 1mm"), Value::Number(dec!(5)));
        assert_eq!(parse("(pec)"), Value::Text("(pec)".into()));
    }

    #[test]
    fn unitless_numbers_are_unchanged() {
        assert_eq!(parse("42"), Value::Number(dec!(42)));
        assert_eq!(parse("-0.25"), Value::Number(dec!(-0.25)));
    }

    #[test]
    fn non_length_quantities_stay_text() {
        assert_eq!(parse("10nH"), Value::Text("10nH".into()));
        assert_eq!(parse("50 ohm"), Value::Text("50 ohm".into()));
        assert_eq!(parse("5GHz"), Value::Text("5GHz".into()));
        // Areas are not lengths.
        assert_eq!(parse("1mm*1mm"), Value::Text("1mm*1mm".into()));
        assert_eq!(parse("1mm + 2"), Value::Text("1mm + 2".into()));
        assert_eq!(parse("1mm / 0"), Value::Text("1mm / 0".into()));
    }

    #[test]
    fn identifiers_and_variables() {
        let vars = options([
            ("cpw_width", RawValue::from("10um")),
            ("alias", RawValue::from("cpw_width")),
            ("gap", RawValue::Int(3)),
        ]);
        assert_eq!(parse_value("pec", &vars), Ok(Value::Text("pec".into())));
        assert_eq!(parse_value("cpw_width", &vars), Ok(Value::Number(dec!(0.01))));
        assert_eq!(parse_value("alias", &vars), Ok(Value::Number(dec!(0.01))));
        assert_eq!(parse_value("gap", &vars), Ok(Value::Number(dec!(3))));
    }

    #[test]
    fn variable_cycles_are_errors() {
        let vars = options([("a", "b"), ("b", "a")]);
        assert!(matches!(
            parse_value("a", &vars),
            Err(ParseError::VariableCycle { .. })
        ));
    }

    #[test]
    fn lists_and_maps() {
        let vars = options([("w", "5um")]);
        assert_eq!(
            parse_value("[1mm, w, pec]", &vars),
            Ok(Value::List(vec![
                Value::Number(dec!(1)),
                Value::Number(dec!(0.005)),
                Value::Text("pec".into()),
            ]))
        );
        let map = parse_value("{a: 1mm, 'b': [2um, 3um]}", &vars).unwrap();
        let map = map.as_map().unwrap();
        assert_eq!(map["a"], Value::Number(dec!(1)));
        assert_eq!(map["b"].as_list().map(|l| l.len()), Some(2));
        assert_eq!(parse_value("[]", &vars), Ok(Value::List(Vec::new())));
        assert!(matches!(
            parse_value("[1mm, [2mm]", &vars),
            Err(ParseError::Unbalanced { .. })
        ));
        assert!(matches!(
            parse_value("{a 1mm}", &vars),
            Err(ParseError::MissingColon { .. })
        ));
    }

    #[test]
    fn raw_tables_parse_recursively() {
        let raw = RawValue::Table(options([
            ("width", RawValue::from("10um")),
            ("flag", RawValue::Bool(true)),
            ("pts", RawValue::from(vec!["1mm", "2mm"])),
        ]));
        let value = parse_raw(&raw, &Options::new()).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map["width"].as_db(), Some(10_000));
        assert_eq!(map["flag"].as_bool(), Some(true));
        assert_eq!(map["pts"].as_list().unwrap()[1].as_db(), Some(2_000_000));
    }

    #[test]
    fn truthiness() {
        for s in TRUE_STR {
            assert!(is_true(s));
            assert_eq!(Value::Text(s.into()).as_bool(), Some(true));
        }
        for s in FALSE_STR {
            assert!(is_false(s));
        }
        assert_eq!(Value::Text("maybe".into()).as_bool(), None);
    }

    #[test]
    fn db_unit_conversion() {
        assert_eq!(to_db_units(dec!(9)), 9_000_000);
        assert_eq!(to_db_units(dec!(0.0000004)), 0);
        assert_eq!(to_db_units(dec!(0.0000006)), 1);
        assert_eq!(from_db_units(-280_000), dec!(-0.28));
    }

    #[test]
    fn merging_is_deep() {
        let mut base = options([
            ("width", RawValue::from("10um")),
            ("pin_inputs", RawValue::Table(options([("start_pin", RawValue::from("a"))]))),
        ]);
        let overrides = options([(
            "pin_inputs",
            RawValue::Table(options([("end_pin", RawValue::from("b"))])),
        )]);
        merge_options(&mut base, &overrides);
        let pins = base["pin_inputs"].as_table().unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(base["width"], RawValue::from("10um"));
    }
}
