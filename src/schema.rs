use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_with::{serde_as, DeserializeFromStr, DisplayFromStr};

use std::{
    fmt::{self, Display},
    path::Path,
    str::FromStr,
};

/// Name of the group holding where and how an order ships.
pub const SHIPMENT_ATTRIBUTES: &str = "shipment attributes";

/// Name of the group holding what was ordered and what it earned.
pub const ORDER_ATTRIBUTES: &str = "order attributes";

/// The type every cell in a column is cast to when loading.
#[derive(Clone, Copy, Debug, Default, DeserializeFromStr, Eq, PartialEq)]
pub enum ColumnType {
    Int,
    Float,
    #[default]
    Str,
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "int" | "integer" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "string" | "str" => Ok(Self::Str),
            other => bail!("unknown column type {other:?} (want int, float or string)"),
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
        })
    }
}

/// Assigns every header matching `pattern` to `group`, with type `kind`.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct Rule {
    pub group: String,
    #[serde_as(as = "DisplayFromStr")]
    pub pattern: Regex,
    #[serde(rename = "type")]
    pub kind: ColumnType,
}

/// Decides which column group, and which type, each CSV header belongs to.
///
/// Headers are matched by name, never by position, so a source file whose
/// columns arrive in a different order still loads into the right groups.
/// Rules are tried in the order they were added and the first match wins.
///
/// To get the layout of the Superstore shipment export, use
/// [`Schema::superstore`]. To build one from scratch, use [`Schema::new`] and
/// [`Schema::add_rule`], or load one with [`Schema::read_csv`].
#[derive(Debug, Default)]
pub struct Schema {
    rules: Vec<Rule>,
}

impl Schema {
    /// Creates a schema with no rules. Every header will fail to classify
    /// until rules are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema for the Superstore shipment export.
    ///
    /// `Ship Mode`, `Segment`, `Country`, `City`, `State`, `Postal Code` and
    /// `Region` are shipment attributes; everything else is an order
    /// attribute. `Postal Code` and `Quantity` are integers; `Sales`,
    /// `Discount` and `Profit` are floats.
    ///
    /// # Errors
    ///
    /// Returns any errors from compiling the built-in patterns with
    /// [`Regex::new`].
    pub fn superstore() -> Result<Self> {
        let mut schema = Self::new();
        for (group, pattern, kind) in [
            (SHIPMENT_ATTRIBUTES, "^Postal Code$", ColumnType::Int),
            (
                SHIPMENT_ATTRIBUTES,
                "^(Ship Mode|Segment|Country|City|State|Region)$",
                ColumnType::Str,
            ),
            (ORDER_ATTRIBUTES, "^Quantity$", ColumnType::Int),
            (ORDER_ATTRIBUTES, "^(Sales|Discount|Profit)$", ColumnType::Float),
            (ORDER_ATTRIBUTES, ".*", ColumnType::Str),
        ] {
            schema.add_rule(group, pattern, kind)?;
        }
        Ok(schema)
    }

    /// Reads schema rules from the CSV file at `path`.
    ///
    /// The file has a header line and one rule per record:
    ///
    /// ```txt
    /// group,pattern,type
    /// shipment attributes,^Postal Code$,int
    /// order attributes,.*,string
    /// ```
    ///
    /// `pattern` can be any regular expression supported by [`regex::Regex`];
    /// `type` is one of `int`, `float` or `string`.
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// * The file cannot be opened
    /// * A record does not have exactly three fields
    /// * `pattern` is an invalid regular expression
    /// * `type` is not a known column type
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("opening schema {}", path.display()))?;
        let mut schema = Self::new();
        for result in rdr.deserialize() {
            let rule: Rule = result.with_context(|| format!("reading schema {}", path.display()))?;
            schema.rules.push(rule);
        }
        Ok(schema)
    }

    /// Adds a rule putting headers that match `pattern` into `group`.
    ///
    /// # Errors
    ///
    /// Returns any errors from compiling `pattern` with [`Regex::new`].
    pub fn add_rule(&mut self, group: &str, pattern: &str, kind: ColumnType) -> Result<()> {
        self.rules.push(Rule {
            group: group.to_string(),
            pattern: Regex::new(pattern)?,
            kind,
        });
        Ok(())
    }

    /// Returns the group and type for `header`.
    ///
    /// # Errors
    ///
    /// Returns an error if no rule matches `header`.
    pub fn classify(&self, header: &str) -> Result<(&str, ColumnType)> {
        match self.rules.iter().find(|r| r.pattern.is_match(header)) {
            Some(rule) => Ok((rule.group.as_str(), rule.kind)),
            None => bail!("column {header:?} matches no schema rule"),
        }
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
