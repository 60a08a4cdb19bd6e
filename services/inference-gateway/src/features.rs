//! Request schema validation and feature-vector assembly.

use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::{error::Category, Value};
use std::collections::BTreeMap;
use crate::error::PredictError;

/// The seven request fields, in request-schema order. The model's own order may differ.
pub const REQUIRED_FIELDS: [&str; 7] = ["N", "P", "K", "temperature", "humidity", "rainfall", "ph"];

/// One offending location in a rejected request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldError {
    fn new(loc: &[&str], kind: &'static str, msg: &str) -> Self {
        Self { loc: loc.iter().map(|s| s.to_string()).collect(), msg: msg.to_string(), kind }
    }

    fn field(name: &str, kind: &'static str, msg: &str) -> Self { Self::new(&["body", name], kind, msg) }
}

/// The seven fields after type coercion, indexed like [`REQUIRED_FIELDS`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFeatures([f64; 7]);

impl ValidatedFeatures {
    pub fn get(&self, name: &str) -> Option<f64> {
        REQUIRED_FIELDS.iter().position(|f| *f == name).map(|i| self.0[i])
    }
}

/// Model input in the registry's canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    /// Looks up every name of `order` in `features`, in that order.
    pub fn assemble(features: &ValidatedFeatures, order: &[String]) -> Result<Self, PredictError> {
        order.iter()
            .map(|name| features.get(name).ok_or_else(|| PredictError::UnknownFeature(name.clone())))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn as_slice(&self) -> &[f64] { &self.0 }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(v: Vec<f64>) -> Self { Self(v) }
}

/// Validates a raw request body against the fixed numeric schema.
///
/// Every offending field is reported, not only the first one.
pub fn validate(body: &[u8]) -> Result<ValidatedFeatures, Vec<FieldError>> {
    // values stay raw so a number out of f64 range is blamed on its own field
    let map: BTreeMap<String, &RawValue> = serde_json::from_slice(body).map_err(|e| match e.classify() {
        Category::Data => vec![FieldError::new(&["body"], "model_attributes_type",
            "Input should be a valid dictionary or object to extract fields from")],
        _ => vec![FieldError::new(&["body"], "json_invalid", &format!("JSON decode error: {e}"))],
    })?;
    let mut out = [0.0; 7];
    let mut errors = Vec::new();
    for (i, name) in REQUIRED_FIELDS.iter().enumerate() {
        match map.get(*name) {
            None => errors.push(FieldError::field(name, "missing", "Field required")),
            Some(raw) => match coerce_raw(raw) {
                Ok(x) => out[i] = x,
                Err((kind, msg)) => errors.push(FieldError::field(name, kind, msg)),
            },
        }
    }
    for key in map.keys().filter(|k| !REQUIRED_FIELDS.contains(&k.as_str())) {
        errors.push(FieldError::field(key, "extra_forbidden", "Extra inputs are not permitted"));
    }
    if errors.is_empty() { Ok(ValidatedFeatures(out)) } else { Err(errors) }
}

const NOT_FINITE: (&str, &str) = ("finite_number", "Input should be a finite number");

fn coerce_raw(raw: &RawValue) -> Result<f64, (&'static str, &'static str)> {
    // syntax was checked with the whole body; only out-of-range numbers fail here
    let v: Value = serde_json::from_str(raw.get()).map_err(|_| NOT_FINITE)?;
    coerce(&v)
}

fn coerce(v: &Value) -> Result<f64, (&'static str, &'static str)> {
    match v {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()).ok_or(NOT_FINITE),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(x),
            Ok(_) => Err(NOT_FINITE),
            Err(_) => Err(("float_parsing", "Input should be a valid number, unable to parse string as a number")),
        },
        _ => Err(("float_type", "Input should be a valid number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: serde_json::Value) -> Vec<u8> { serde_json::to_vec(&v).unwrap() }

    fn sample() -> serde_json::Value {
        json!({"N": 90, "P": 42, "K": 43, "temperature": 20.8, "humidity": 82.0, "rainfall": 202.9, "ph": 6.5})
    }

    #[test]
    fn accepts_complete_payload() {
        let f = validate(&body(sample())).unwrap();
        assert_eq!(f.get("N"), Some(90.0));
        assert_eq!(f.get("rainfall"), Some(202.9));
        assert_eq!(f.get("ph"), Some(6.5));
        assert_eq!(f.get("soil"), None);
    }

    #[test]
    fn negative_and_out_of_range_values_pass_through() {
        let mut v = sample();
        v["ph"] = json!(-3.0);
        v["humidity"] = json!(1000);
        let f = validate(&body(v)).unwrap();
        assert_eq!(f.get("ph"), Some(-3.0));
        assert_eq!(f.get("humidity"), Some(1000.0));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let mut v = sample();
        v["K"] = json!(" 43.5 ");
        assert_eq!(validate(&body(v)).unwrap().get("K"), Some(43.5));
    }

    #[test]
    fn reports_every_offending_field() {
        let mut v = sample();
        v.as_object_mut().unwrap().remove("P");
        v["humidity"] = json!("wet");
        v["ph"] = json!(true);
        v["soil"] = json!("loam");
        v["rainfall"] = json!("NaN");
        let errs = validate(&body(v)).unwrap_err();
        let got: Vec<(&str, &str)> = errs.iter().map(|e| (e.loc[1].as_str(), e.kind)).collect();
        assert_eq!(got, vec![
            ("P", "missing"),
            ("humidity", "float_parsing"),
            ("rainfall", "finite_number"),
            ("ph", "float_type"),
            ("soil", "extra_forbidden"),
        ]);
        assert!(errs.iter().all(|e| e.loc[0] == "body"));
    }

    #[test]
    fn null_is_not_a_number() {
        let mut v = sample();
        v["N"] = serde_json::Value::Null;
        assert_eq!(validate(&body(v)).unwrap_err()[0].kind, "float_type");
    }

    #[test]
    fn numbers_beyond_f64_are_blamed_on_their_field() {
        let raw = br#"{"N": 1e400, "P": 42, "K": 43, "temperature": 20.8, "humidity": 82.0, "rainfall": 202.9, "ph": 6.5}"#;
        let errs = validate(raw).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].loc, ["body", "N"]);
        assert_eq!(errs[0].kind, "finite_number");
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert_eq!(validate(b"{not json").unwrap_err()[0].kind, "json_invalid");
        assert_eq!(validate(b"[1,2,3]").unwrap_err()[0].kind, "model_attributes_type");
        assert_eq!(validate(b"\"N=90\"").unwrap_err()[0].kind, "model_attributes_type");
        assert_eq!(validate(br#"{"N": 1} trailing"#).unwrap_err()[0].kind, "json_invalid");
        assert_eq!(validate(b"").unwrap_err()[0].loc, vec!["body".to_string()]);
    }

    #[test]
    fn assembles_in_the_given_order() {
        let f = validate(&body(sample())).unwrap();
        let order: Vec<String> = ["ph", "rainfall", "N", "P", "K", "temperature", "humidity"].map(String::from).to_vec();
        let v = FeatureVector::assemble(&f, &order).unwrap();
        assert_eq!(v.as_slice(), &[6.5, 202.9, 90.0, 42.0, 43.0, 20.8, 82.0]);
    }

    #[test]
    fn assembly_refuses_unknown_names() {
        let f = validate(&body(sample())).unwrap();
        let err = FeatureVector::assemble(&f, &["N".to_string(), "soil".to_string()]).unwrap_err();
        assert!(matches!(err, PredictError::UnknownFeature(n) if n == "soil"));
    }
}
