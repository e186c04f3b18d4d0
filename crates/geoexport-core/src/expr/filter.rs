use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::{BBox, Geometry};

/// Anything a [`Filter`] can be evaluated against: boundary features and
/// catalog images.
pub trait Filterable {
    fn property(&self, name: &str) -> Option<&Value>;
    /// Spatial footprint, if the item has one.
    fn footprint(&self) -> Option<BBox>;
    /// Acquisition date, if the item has one.
    fn date(&self) -> Option<NaiveDate>;
}

/// A metadata, spatial, or temporal predicate over collection elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// `property == value`
    Eq { property: String, value: Value },
    /// `property ∈ values`
    InList { property: String, values: Vec<Value> },
    /// Numeric `property < value` (strict).
    Lt { property: String, value: f64 },
    /// Footprint intersects `geometry`.
    Bounds { geometry: Geometry },
    /// Acquisition date in `[start, end)`.
    Date { start: NaiveDate, end: NaiveDate },
}

impl Filter {
    pub fn eq(property: &str, value: impl Into<Value>) -> Self {
        Filter::Eq { property: property.into(), value: value.into() }
    }

    pub fn in_list<V: Into<Value>>(property: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::InList {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lt(property: &str, value: f64) -> Self {
        Filter::Lt { property: property.into(), value }
    }

    /// Missing properties, dates, or footprints never match.
    pub fn matches(&self, item: &impl Filterable) -> bool {
        match self {
            Filter::Eq { property, value } => item.property(property) == Some(value),
            Filter::InList { property, values } => {
                item.property(property).is_some_and(|v| values.contains(v))
            }
            Filter::Lt { property, value } => item
                .property(property)
                .and_then(Value::as_f64)
                .is_some_and(|v| v < *value),
            Filter::Bounds { geometry } => item
                .footprint()
                .is_some_and(|fp| geometry.intersects_bbox(&fp)),
            Filter::Date { start, end } => item.date().is_some_and(|d| d >= *start && d < *end),
        }
    }
}
