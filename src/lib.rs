#![doc = include_str!("../README.md")]
mod analysis;
mod records;
mod report;
mod schema;
mod usd;

pub use analysis::{Filter, Metric, Ranking};
pub use records::{Column, ColumnGroup, RecordSet, Value};
pub use report::Report;
pub use schema::{ColumnType, Rule, Schema, ORDER_ATTRIBUTES, SHIPMENT_ATTRIBUTES};
pub use usd::{Percent, Usd};
