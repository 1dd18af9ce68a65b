use anyhow::{bail, Context, Result};
use tracing::debug;

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

use crate::{
    records::{Column, RecordSet, Value},
    schema::ColumnType,
};

/// Restricts an aggregate to rows whose `column` equals `value`.
///
/// Both sides are trimmed and compared case-insensitively, so a filter for
/// `First Class` matches ` first class ` and `FIRST CLASS`. Numeric values
/// are compared as numbers when `value` parses as one, so `0.20` matches a
/// discount of `0.2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    #[must_use]
    pub fn new(column: &str, value: &str) -> Self {
        Self {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    /// Reports whether `value` passes this filter.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn matches(&self, value: &Value) -> bool {
        if let (Some(x), Ok(wanted)) = (value.as_f64(), self.value.trim().parse::<f64>()) {
            return x == wanted;
        }
        fold(&value.to_string()) == fold(&self.value)
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.column, self.value)
    }
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// What the values in a [`Ranking`] measure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Metric {
    /// A fraction between 0 and 1.
    Ratio,
    /// A sum of amounts of money.
    Total,
}

/// Group keys paired with a metric, highest first.
///
/// Keys with equal values stay in the order their first contributing row
/// appeared in the input.
#[derive(Clone, Debug, PartialEq)]
pub struct Ranking {
    title: String,
    metric: Metric,
    entries: Vec<(String, f64)>,
}

impl Ranking {
    fn ranked(title: String, metric: Metric, mut entries: Vec<(String, f64)>) -> Self {
        // stable sort: ties stay in first-seen order
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self {
            title,
            metric,
            entries,
        }
    }

    /// Describes what was ranked, for use as a report heading.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-key accumulators, kept in the order keys were first seen.
struct Tally<T> {
    index: HashMap<String, usize>,
    entries: Vec<(String, T)>,
}

impl<T: Default> Tally<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: &str) -> &mut T {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), T::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[i].1
    }

    fn into_entries(self) -> Vec<(String, T)> {
        self.entries
    }
}

#[derive(Debug, Default)]
struct Counts {
    total: usize,
    matching: usize,
}

impl Counts {
    #[allow(clippy::cast_precision_loss)]
    fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matching as f64 / self.total as f64
        }
    }
}

fn heading(base: String, filter: Option<&Filter>) -> String {
    match filter {
        Some(filter) => format!("{base} for {filter}"),
        None => base,
    }
}

impl RecordSet {
    fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .with_context(|| format!("no column named {name:?}"))
    }

    /// Returns the indices of the rows that pass `filter`, or of every row if
    /// there is no filter.
    fn selected_rows<'a>(
        &'a self,
        filter: Option<&'a Filter>,
    ) -> Result<impl Iterator<Item = usize> + 'a> {
        let check = match filter {
            Some(f) => Some((f, self.require(&f.column)?.values())),
            None => None,
        };
        Ok((0..self.len())
            .filter(move |&i| check.map_or(true, |(f, values)| f.matches(&values[i]))))
    }

    /// Ranks each value of `group_key` by the fraction of its rows whose
    /// `value_key` equals `target`.
    ///
    /// Only rows passing `filter` count towards either side of the fraction.
    /// Group keys are trimmed; `value_key` is compared with `target` after
    /// trimming and case-folding both.
    ///
    /// If no rows pass the filter, the ranking is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `group_key`, `value_key`, or the filter column is
    /// not a column in this record set.
    pub fn ratio_by(
        &self,
        group_key: &str,
        value_key: &str,
        target: &str,
        filter: Option<&Filter>,
    ) -> Result<Ranking> {
        let groups = self.require(group_key)?.values();
        let values = self.require(value_key)?.values();
        let wanted = fold(target);
        let mut tally: Tally<Counts> = Tally::new();
        for i in self.selected_rows(filter)? {
            let counts = tally.entry(groups[i].to_string().trim());
            counts.total += 1;
            if fold(&values[i].to_string()) == wanted {
                counts.matching += 1;
            }
        }
        let entries = tally
            .into_entries()
            .into_iter()
            .map(|(key, counts)| (key, counts.ratio()))
            .collect();
        let title = heading(
            format!("Proportion of {value_key} {target:?} by {group_key}"),
            filter,
        );
        let ranking = Ranking::ranked(title, Metric::Ratio, entries);
        debug!(group_key, keys = ranking.len(), "ranked ratios");
        Ok(ranking)
    }

    /// Ranks each value of `group_key` by the sum of its `value_key` column.
    ///
    /// Only rows passing `filter` are summed. Group keys are trimmed.
    ///
    /// If no rows pass the filter, the ranking is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `group_key`, `value_key`, or the filter column is
    /// not a column in this record set, or if `value_key` is not numeric.
    pub fn sum_by(
        &self,
        group_key: &str,
        value_key: &str,
        filter: Option<&Filter>,
    ) -> Result<Ranking> {
        let groups = self.require(group_key)?.values();
        let column = self.require(value_key)?;
        if column.kind() == ColumnType::Str {
            bail!("cannot sum non-numeric column {value_key:?}");
        }
        let values = column.values();
        let mut tally: Tally<f64> = Tally::new();
        for i in self.selected_rows(filter)? {
            let amount = values[i]
                .as_f64()
                .with_context(|| format!("non-numeric {value_key} {}", values[i]))?;
            *tally.entry(groups[i].to_string().trim()) += amount;
        }
        let title = heading(format!("Total {value_key} by {group_key}"), filter);
        let ranking = Ranking::ranked(title, Metric::Total, tally.into_entries());
        debug!(group_key, keys = ranking.len(), "ranked totals");
        Ok(ranking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, ORDER_ATTRIBUTES, SHIPMENT_ATTRIBUTES};

    fn strings(values: &[&str]) -> Vec<Value> {
        values.iter().copied().map(Value::from).collect()
    }

    fn numbers(values: &[f64]) -> Vec<Value> {
        values.iter().copied().map(Value::from).collect()
    }

    fn shipments(states: &[&str], modes: &[&str], categories: &[&str]) -> RecordSet {
        RecordSet::from_columns([
            (SHIPMENT_ATTRIBUTES, "State", strings(states)),
            (SHIPMENT_ATTRIBUTES, "Ship Mode", strings(modes)),
            (ORDER_ATTRIBUTES, "Category", strings(categories)),
        ])
        .unwrap()
    }

    fn sales(cities: &[&str], modes: &[&str], amounts: &[f64]) -> RecordSet {
        RecordSet::from_columns([
            (SHIPMENT_ATTRIBUTES, "City", strings(cities)),
            (SHIPMENT_ATTRIBUTES, "Ship Mode", strings(modes)),
            (ORDER_ATTRIBUTES, "Sales", numbers(amounts)),
        ])
        .unwrap()
    }

    fn first_class() -> Filter {
        Filter::new("Ship Mode", "First Class")
    }

    fn tech_share(records: &RecordSet) -> Ranking {
        records
            .ratio_by("State", "Category", "Technology", Some(&first_class()))
            .unwrap()
    }

    fn city_sales(records: &RecordSet) -> Ranking {
        records
            .sum_by("City", "Sales", Some(&first_class()))
            .unwrap()
    }

    #[test]
    fn filter_matches_ignoring_case_and_whitespace() {
        let filter = first_class();
        assert!(filter.matches(&Value::from(" first class ")));
        assert!(filter.matches(&Value::from("FIRST CLASS")));
        assert!(!filter.matches(&Value::from("First")));
        assert!(Filter::new("Quantity", " 3").matches(&Value::Int(3)));
    }

    #[test]
    fn filter_compares_numeric_values_as_numbers() {
        let discount = Filter::new("Discount", "0.20");
        assert!(discount.matches(&Value::Float(0.2)));
        assert!(!discount.matches(&Value::Float(0.25)));
        assert!(Filter::new("Quantity", "3.0").matches(&Value::Int(3)));
        assert!(!Filter::new("Quantity", "three").matches(&Value::Int(3)));
    }

    #[test]
    fn sum_by_fn_filters_on_float_column() {
        let records = RecordSet::from_columns([
            ("a", "City", strings(&["Miami", "Dallas", "Miami"])),
            ("b", "Discount", numbers(&[0.2, 0.0, 0.2])),
            ("b", "Sales", numbers(&[10.0, 99.0, 5.5])),
        ])
        .unwrap();
        let ranking = records
            .sum_by("City", "Sales", Some(&Filter::new("Discount", "0.20")))
            .unwrap();
        assert_eq!(ranking.iter().collect::<Vec<_>>(), vec![("Miami", 15.5)]);
    }

    #[test]
    fn ratio_by_fn_computes_share_within_filter() {
        let records = shipments(
            &["CA", "CA", "TX", "FL", "CA", "TX"],
            &[
                "First Class",
                "First Class",
                "First Class",
                "First Class",
                "Standard Class",
                "Second Class",
            ],
            &[
                "Technology",
                "Furniture",
                "Technology",
                "Office Supplies",
                "Technology",
                "Technology",
            ],
        );
        let ranking = tech_share(&records);
        assert_eq!(
            ranking.iter().collect::<Vec<_>>(),
            vec![("TX", 1.0), ("CA", 0.5), ("FL", 0.0)]
        );
        assert_eq!(ranking.metric(), Metric::Ratio);
    }

    #[test]
    fn ratio_by_fn_sorts_keys_by_ratio_descending() {
        let records = shipments(
            &["FL", "CA", "CA", "TX", "TX"],
            &["First Class"; 5],
            &["Furniture", "Technology", "Furniture", "Technology", "Technology"],
        );
        let ranking = tech_share(&records);
        assert_eq!(ranking.keys().collect::<Vec<_>>(), vec!["TX", "CA", "FL"]);
        let values: Vec<_> = ranking.iter().map(|(_, v)| v).collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn ratio_by_fn_keeps_first_seen_order_for_ties() {
        let records = shipments(
            &["NY", "OR", "OR", "NY"],
            &["First Class"; 4],
            &["Technology", "Technology", "Furniture", "Furniture"],
        );
        let ranking = tech_share(&records);
        assert_eq!(ranking.keys().collect::<Vec<_>>(), vec!["NY", "OR"]);
    }

    #[test]
    fn ratio_by_fn_returns_empty_ranking_when_nothing_matches_filter() {
        let records = shipments(
            &["CA", "TX", "FL"],
            &["Standard Class", "Second Class", "Same Day"],
            &["Technology", "Technology", "Office Supplies"],
        );
        assert!(tech_share(&records).is_empty());
    }

    #[test]
    fn ratio_by_fn_tolerates_case_and_whitespace() {
        let records = shipments(
            &["CA", " CA ", "TX"],
            &[" first class ", "FIRST CLASS", "First Class"],
            &[" technology ", "Furniture", "TECHNOLOGY"],
        );
        let ranking = tech_share(&records);
        assert_eq!(
            ranking.iter().collect::<Vec<_>>(),
            vec![("TX", 1.0), ("CA", 0.5)]
        );
    }

    #[test]
    fn ratio_by_fn_counts_every_row_without_filter() {
        let records = shipments(
            &["CA", "CA", "TX"],
            &["First Class", "Standard Class", "Same Day"],
            &["Technology", "Furniture", "Furniture"],
        );
        let ranking = records
            .ratio_by("State", "Category", "Technology", None)
            .unwrap();
        assert_eq!(ranking.get("CA"), Some(0.5));
        assert_eq!(ranking.get("TX"), Some(0.0));
        assert!(!ranking.title().contains("Ship Mode"));
    }

    #[test]
    fn ratio_by_fn_returns_empty_ranking_for_empty_record_set() {
        let records = shipments(&[], &[], &[]);
        let ranking = records
            .ratio_by("State", "Category", "Technology", None)
            .unwrap();
        assert!(ranking.is_empty());
    }

    #[test]
    fn ratio_by_fn_returns_error_for_unknown_column() {
        let records = shipments(&["CA"], &["First Class"], &["Technology"]);
        assert!(records
            .ratio_by("Region", "Category", "Technology", None)
            .is_err());
        assert!(records
            .ratio_by("State", "Category", "Technology", Some(&Filter::new("Mode", "x")))
            .is_err());
    }

    #[test]
    fn counts_with_no_rows_give_zero_ratio() {
        assert_eq!(Counts::default().ratio(), 0.0);
    }

    #[test]
    fn sum_by_fn_totals_filtered_sales_by_city() {
        let records = sales(
            &["Los Angeles", "Los Angeles", "Dallas", "Miami", "Los Angeles"],
            &[
                "First Class",
                "Standard Class",
                "First Class",
                "First Class",
                "First Class",
            ],
            &[100.0, 50.0, 200.0, 10.0, 25.5],
        );
        let ranking = city_sales(&records);
        assert_eq!(
            ranking.iter().collect::<Vec<_>>(),
            vec![("Dallas", 200.0), ("Los Angeles", 125.5), ("Miami", 10.0)]
        );
        assert_eq!(ranking.metric(), Metric::Total);
    }

    #[test]
    fn sum_by_fn_sorts_keys_by_total_descending() {
        let records = sales(
            &["Dallas", "Los Angeles", "Miami", "Los Angeles"],
            &["First Class"; 4],
            &[1.0, 100.0, 50.0, 75.0],
        );
        assert_eq!(
            city_sales(&records).keys().collect::<Vec<_>>(),
            vec!["Los Angeles", "Miami", "Dallas"]
        );
    }

    #[test]
    fn sum_by_fn_keeps_first_seen_order_for_ties() {
        let records = sales(
            &["San Jose", "New York", "San Jose", "New York"],
            &["First Class"; 4],
            &[100.0, 200.0, 100.0, 0.0],
        );
        assert_eq!(
            city_sales(&records).iter().collect::<Vec<_>>(),
            vec![("San Jose", 200.0), ("New York", 200.0)]
        );
    }

    #[test]
    fn sum_by_fn_returns_empty_ranking_when_nothing_matches_filter() {
        let records = sales(
            &["Los Angeles", "Dallas", "Miami"],
            &["Standard Class", "Second Class", "Same Day"],
            &[100.0, 200.0, 50.0],
        );
        assert!(city_sales(&records).is_empty());
    }

    #[test]
    fn sum_by_fn_sums_integer_columns() {
        let records = RecordSet::from_columns([
            ("a", "City", strings(&["Miami", "Dallas", "Miami"])),
            ("b", "Quantity", vec![Value::Int(2), Value::Int(5), Value::Int(4)]),
        ])
        .unwrap();
        let ranking = records.sum_by("City", "Quantity", None).unwrap();
        assert_eq!(
            ranking.iter().collect::<Vec<_>>(),
            vec![("Miami", 6.0), ("Dallas", 5.0)]
        );
    }

    #[test]
    fn sum_by_fn_returns_error_for_string_column() {
        let records = sales(&["Miami"], &["First Class"], &[1.0]);
        assert!(records.sum_by("City", "Ship Mode", None).is_err());
    }

    #[test]
    fn aggregates_over_loaded_file_respect_filter() {
        let records =
            RecordSet::read_csv("testdata/superstore.csv", &Schema::superstore().unwrap()).unwrap();
        assert_eq!(
            tech_share(&records).iter().collect::<Vec<_>>(),
            vec![("Texas", 1.0), ("California", 0.5), ("Florida", 0.0)]
        );
        assert_eq!(
            city_sales(&records).iter().collect::<Vec<_>>(),
            vec![("Dallas", 200.0), ("Los Angeles", 125.5), ("Miami", 10.0)]
        );
    }
}
