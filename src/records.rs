use anyhow::{bail, Context, Result};
use tracing::debug;

use std::{
    fmt::{self, Display},
    fs::File,
    path::Path,
};

use crate::schema::{ColumnType, Schema};

/// A single typed cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Casts the (already trimmed) text `raw` to `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is numeric and `raw` does not parse as that
    /// type.
    pub fn parse(raw: &str, kind: ColumnType) -> Result<Self> {
        Ok(match kind {
            ColumnType::Int => Self::Int(
                raw.parse()
                    .with_context(|| format!("invalid integer {raw:?}"))?,
            ),
            ColumnType::Float => Self::Float(
                raw.parse()
                    .with_context(|| format!("invalid number {raw:?}"))?,
            ),
            ColumnType::Str => Self::Str(raw.to_string()),
        })
    }

    #[must_use]
    pub fn kind(&self) -> ColumnType {
        match self {
            Self::Str(_) => ColumnType::Str,
            Self::Int(_) => ColumnType::Int,
            Self::Float(_) => ColumnType::Float,
        }
    }

    /// Returns the value as a float, if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(x) => Some(*x),
            Self::Str(_) => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// A named sequence of values, one per row.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnType,
    values: Vec<Value>,
}

impl Column {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ColumnType {
        self.kind
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// A named set of columns, in the order their headers appeared.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnGroup {
    name: String,
    columns: Vec<Column>,
}

impl ColumnGroup {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Holds a loaded table of shipment records, column by column.
///
/// Every column holds exactly [`RecordSet::len`] values, and the values at
/// the same index across all columns came from the same input line. Columns
/// are partitioned into disjoint [`ColumnGroup`]s according to a [`Schema`].
///
/// To load a `RecordSet` from a file, use [`RecordSet::read_csv`]. To build
/// one directly from values, use [`RecordSet::from_columns`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordSet {
    groups: Vec<ColumnGroup>,
    len: usize,
    dropped: usize,
}

impl RecordSet {
    /// Reads shipment records from the CSV file at `path`.
    ///
    /// The first line gives the column names, and its field count is the
    /// expected width of every following line. Each header is placed into a
    /// group, and given a type, by `schema`. Fields are trimmed of surrounding
    /// whitespace before being cast.
    ///
    /// Lines with the wrong number of fields are skipped, and counted in
    /// [`RecordSet::dropped`]. Blank lines are ignored altogether.
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// * The file cannot be opened
    /// * The file is not valid CSV or not valid UTF-8
    /// * A header matches no rule in `schema`, or appears twice
    /// * A field in an integer or float column cannot be parsed as one
    pub fn read_csv(path: impl AsRef<Path>, schema: &Schema) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let headers = rdr
            .headers()
            .with_context(|| format!("reading headers from {}", path.display()))?
            .clone();
        let mut set = Self::default();
        let mut slots = Vec::with_capacity(headers.len());
        for header in &headers {
            let (group, kind) = schema
                .classify(header)
                .with_context(|| format!("{}", path.display()))?;
            slots.push(set.add_column(group, header, kind, Vec::new())?);
        }
        for result in rdr.records() {
            let record = result.with_context(|| format!("{}", path.display()))?;
            if record.len() != headers.len() {
                set.dropped += 1;
                continue;
            }
            let line = record.position().map_or(0, csv::Position::line);
            for (raw, &(g, c)) in record.iter().zip(&slots) {
                let column = &mut set.groups[g].columns[c];
                let value = Value::parse(raw, column.kind).with_context(|| {
                    format!(
                        "{}: line {line}, column {:?}",
                        path.display(),
                        column.name
                    )
                })?;
                column.values.push(value);
            }
            set.len += 1;
        }
        debug!(
            path = %path.display(),
            rows = set.len,
            dropped = set.dropped,
            "loaded records"
        );
        Ok(set)
    }

    /// Builds a `RecordSet` directly from `(group, column, values)` triples.
    ///
    /// Each column's type is taken from its values.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shipstats::{RecordSet, Value};
    /// let records = RecordSet::from_columns([
    ///     ("where", "City", vec![Value::from("Dallas"), Value::from("Miami")]),
    ///     ("what", "Sales", vec![Value::from(200.0), Value::from(10.0)]),
    /// ])
    /// .unwrap();
    /// assert_eq!(records.len(), 2);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// * Columns have different numbers of values
    /// * A column name appears twice
    /// * A column mixes values of different types
    pub fn from_columns<'a>(
        columns: impl IntoIterator<Item = (&'a str, &'a str, Vec<Value>)>,
    ) -> Result<Self> {
        let mut set = Self::default();
        let mut width = None;
        for (group, name, values) in columns {
            let len = *width.get_or_insert(values.len());
            if values.len() != len {
                bail!(
                    "column {name:?} has {} values, want {len}",
                    values.len()
                );
            }
            let kind = values.first().map_or(ColumnType::Str, Value::kind);
            if values.iter().any(|v| v.kind() != kind) {
                bail!("column {name:?} mixes {kind} with other types");
            }
            set.add_column(group, name, kind, values)?;
            set.len = len;
        }
        Ok(set)
    }

    fn add_column(
        &mut self,
        group: &str,
        name: &str,
        kind: ColumnType,
        values: Vec<Value>,
    ) -> Result<(usize, usize)> {
        if self.column(name).is_some() {
            bail!("duplicate column {name:?}");
        }
        let g = match self.groups.iter().position(|g| g.name == group) {
            Some(g) => g,
            None => {
                self.groups.push(ColumnGroup {
                    name: group.to_string(),
                    columns: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        let columns = &mut self.groups[g].columns;
        columns.push(Column {
            name: name.to_string(),
            kind,
            values,
        });
        Ok((g, columns.len() - 1))
    }

    /// Returns the number of rows loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of input lines skipped for having the wrong number
    /// of fields.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[must_use]
    pub fn groups(&self) -> &[ColumnGroup] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&ColumnGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Returns the column called `name`, whichever group it is in.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.groups.iter().find_map(|g| g.column(name))
    }

    /// Returns the names of every column, group by group.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.columns.iter().map(Column::name))
    }
}
