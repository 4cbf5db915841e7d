use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LogicTreeError, Result};
use crate::logic::rebuild::FilteredBranch;
use crate::model::Branch;

/// Predicate over a branch in its branch set context, deserializable from JSON
/// such as `{"all": [{"eq": ["$.b", 0.95]}, {"in": ["$.branch_set", ["PUY", "HIK"]]}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpr {
    /// Logical AND - all conditions must be true
    All { all: Vec<FilterExpr> },
    /// Logical OR - any condition must be true
    Any { any: Vec<FilterExpr> },
    /// Logical NOT - condition must be false
    Not { not: Box<FilterExpr> },
    Eq { eq: (BranchPath, Value) },
    Ne { ne: (BranchPath, Value) },
    Gt { gt: (BranchPath, Value) },
    Gte { gte: (BranchPath, Value) },
    Lt { lt: (BranchPath, Value) },
    Lte { lte: (BranchPath, Value) },
    In { r#in: (BranchPath, Vec<Value>) },
    /// Substring match on strings, element match on tuples
    Contains { contains: (BranchPath, Value) },
    Exists { exists: BranchPath },
}

/// Path selecting a field of a branch: `$.branch_id`, `$.branch_set`,
/// `$.weight`, `$.gsim_name`, `$.trt` or `$.<attribute name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchPath(pub String);

impl BranchPath {
    /// Values selected by the path. `$.trt` selects one value per tectonic region type.
    pub fn extract(&self, branch_set: &str, branch: &Branch) -> Result<Vec<Value>> {
        let Some(field) = self.0.strip_prefix("$.") else {
            return Err(LogicTreeError::format(
                format!("'{}'", self.0),
                "branch paths must start with '$.'",
            ));
        };

        let values = match field {
            "branch_id" => vec![Value::String(branch.branch_id().to_string())],
            "branch_set" => vec![Value::String(branch_set.to_string())],
            "weight" => vec![Value::from(branch.weight())],
            "gsim_name" => branch
                .as_gmcm()
                .map(|g| vec![Value::String(g.gsim_name().to_string())])
                .unwrap_or_default(),
            "trt" => branch
                .tectonic_region_types()
                .into_iter()
                .map(Value::String)
                .collect(),
            "" => {
                return Err(LogicTreeError::format(
                    format!("'{}'", self.0),
                    "empty field name",
                ))
            }
            name => branch.attribute(name).map(|v| vec![v.to_json()]).unwrap_or_default(),
        };
        Ok(values)
    }
}

pub struct BranchFilterEvaluator;

impl BranchFilterEvaluator {
    pub fn evaluate(branch_set: &str, branch: &Branch, filter: &FilterExpr) -> Result<bool> {
        match filter {
            FilterExpr::All { all } => {
                for expr in all {
                    if !Self::evaluate(branch_set, branch, expr)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FilterExpr::Any { any } => {
                for expr in any {
                    if Self::evaluate(branch_set, branch, expr)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            FilterExpr::Not { not } => Ok(!Self::evaluate(branch_set, branch, not)?),
            FilterExpr::Eq { eq: (path, value) } => {
                let extracted = path.extract(branch_set, branch)?;
                Ok(extracted.iter().any(|v| Self::values_equal(v, value)))
            }
            FilterExpr::Ne { ne: (path, value) } => {
                let extracted = path.extract(branch_set, branch)?;
                Ok(!extracted.iter().any(|v| Self::values_equal(v, value)))
            }
            FilterExpr::Gt { gt: (path, value) } => {
                Self::compare(path.extract(branch_set, branch)?, value, |a, b| a > b)
            }
            FilterExpr::Gte { gte: (path, value) } => {
                Self::compare(path.extract(branch_set, branch)?, value, |a, b| a >= b)
            }
            FilterExpr::Lt { lt: (path, value) } => {
                Self::compare(path.extract(branch_set, branch)?, value, |a, b| a < b)
            }
            FilterExpr::Lte { lte: (path, value) } => {
                Self::compare(path.extract(branch_set, branch)?, value, |a, b| a <= b)
            }
            FilterExpr::In { r#in: (path, options) } => {
                let extracted = path.extract(branch_set, branch)?;
                Ok(extracted
                    .iter()
                    .any(|v| options.iter().any(|o| Self::values_equal(v, o))))
            }
            FilterExpr::Contains { contains: (path, needle) } => {
                let extracted = path.extract(branch_set, branch)?;
                Ok(extracted.iter().any(|v| match (v, needle) {
                    (Value::String(s), Value::String(n)) => s.contains(n.as_str()),
                    (Value::Array(items), n) => items.iter().any(|i| Self::values_equal(i, n)),
                    _ => false,
                }))
            }
            FilterExpr::Exists { exists: path } => {
                Ok(!path.extract(branch_set, branch)?.is_empty())
            }
        }
    }

    // 1 and 1.0 are the same value for filtering purposes
    fn values_equal(left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
            (Value::Array(l), Value::Array(r)) => {
                l.len() == r.len() && l.iter().zip(r).all(|(a, b)| Self::values_equal(a, b))
            }
            _ => left == right,
        }
    }

    fn compare<F>(extracted: Vec<Value>, right: &Value, cmp: F) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        let Some(rf) = Self::as_number(right) else {
            return Ok(false);
        };
        Ok(extracted
            .iter()
            .filter_map(Self::as_number)
            .any(|lf| cmp(lf, rf)))
    }

    fn as_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }
}

/// Keep the filtered branches matching `filter`.
pub fn filter_branches<I>(branches: I, filter: &FilterExpr) -> Result<Vec<FilteredBranch>>
where
    I: IntoIterator<Item = FilteredBranch>,
{
    let mut kept = Vec::new();
    for branch in branches {
        if BranchFilterEvaluator::evaluate(&branch.branch_set.short_name, &branch.branch, filter)? {
            kept.push(branch);
        }
    }
    Ok(kept)
}

pub fn parse_filter_expr(value: Value) -> Result<FilterExpr> {
    serde_json::from_value(value)
        .map_err(|e| LogicTreeError::format(e, "not a branch filter expression"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::{AttributeValue, BranchAttributeValue};
    use crate::model::branch::{GmcmBranch, SourceBranch};
    use crate::model::source::{BranchSource, DistributedSource};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn crustal_branch() -> Branch {
        SourceBranch::new(
            "dmgeodetic, b0.959",
            0.25,
            vec![
                BranchAttributeValue::new("dm", "deformation model", "geodetic"),
                BranchAttributeValue::new("b", "b-value", 0.959),
                BranchAttributeValue::new(
                    "bN",
                    "bN pair",
                    AttributeValue::Tuple(vec![0.959.into(), 2.7.into()]),
                ),
            ],
            vec![BranchSource::Distributed(DistributedSource {
                nrml_id: "bg-1".to_string(),
                tectonic_region_types: vec!["Active Shallow Crust".to_string()],
            })],
        )
        .unwrap()
        .into()
    }

    fn eval(filter: serde_json::Value, branch: &Branch) -> bool {
        let filter = parse_filter_expr(filter).unwrap();
        BranchFilterEvaluator::evaluate("CRU", branch, &filter).unwrap()
    }

    #[test]
    fn test_attribute_filters() {
        let branch = crustal_branch();
        assert!(eval(json!({"eq": ["$.dm", "geodetic"]}), &branch));
        assert!(!eval(json!({"eq": ["$.dm", "geologic"]}), &branch));
        assert!(eval(json!({"gt": ["$.b", 0.9]}), &branch));
        assert!(eval(json!({"lte": ["$.weight", "0.25"]}), &branch));
        assert!(eval(json!({"eq": ["$.bN", [0.959, 2.7]]}), &branch));
        assert!(eval(json!({"contains": ["$.bN", 2.7]}), &branch));
        assert!(eval(json!({"exists": "$.dm"}), &branch));
        assert!(!eval(json!({"exists": "$.gsim_name"}), &branch));
    }

    #[test]
    fn test_context_filters() {
        let branch = crustal_branch();
        assert!(eval(json!({"in": ["$.branch_set", ["CRU", "HIK"]]}), &branch));
        assert!(eval(json!({"eq": ["$.trt", "Active Shallow Crust"]}), &branch));
        assert!(eval(
            json!({"all": [
                {"contains": ["$.branch_id", "geodetic"]},
                {"not": {"eq": ["$.branch_set", "PUY"]}},
                {"any": [{"lt": ["$.b", 0.5]}, {"ne": ["$.dm", "geologic"]}]}
            ]}),
            &branch
        ));
    }

    #[test]
    fn test_gmcm_filters() {
        let mut args = BTreeMap::new();
        args.insert("mu_branch".to_string(), AttributeValue::from("Upper"));
        let branch: Branch = GmcmBranch::new(
            "Atkinson2022_upper",
            0.2,
            "Atkinson2022SInter",
            args,
            "Subduction Interface",
        )
        .unwrap()
        .into();
        assert!(eval(json!({"eq": ["$.gsim_name", "Atkinson2022SInter"]}), &branch));
        assert!(eval(json!({"eq": ["$.mu_branch", "Upper"]}), &branch));
    }

    #[test]
    fn test_bad_paths() {
        let branch = crustal_branch();
        let filter = parse_filter_expr(json!({"eq": ["dm", "geodetic"]})).unwrap();
        assert!(matches!(
            BranchFilterEvaluator::evaluate("CRU", &branch, &filter),
            Err(LogicTreeError::Format { .. })
        ));
        assert!(parse_filter_expr(json!({"bogus": 1})).is_err());
    }
}
