//! Descriptores declarativos de filtrado y orden.
//!
//! Los llamadores nunca pasan código arbitrario al motor: construyen un
//! `Predicate` (campo + comparación + valor) y una lista de `SortDescriptor`,
//! que el motor valida contra los campos declarados por el modelo
//! (`Model::FIELDS`) y luego evalúa sobre el payload JSON de cada fila.

use std::cmp::Ordering;

use serde_json::Value;
use uuid::Uuid;

use crate::errors::StoreError;

/// Valor tipado con el que se compara un campo.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
}

impl FieldValue {
    /// Representación JSON equivalente a la que produce `serde` al
    /// serializar el campo del modelo.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}
impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}
impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v as i64)
    }
}
impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}
impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}
impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}
impl From<Uuid> for FieldValue {
    fn from(v: Uuid) -> Self {
        FieldValue::Uuid(v)
    }
}
impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Filtro declarativo sobre los campos de un modelo.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { field: String, op: CompareOp, value: FieldValue },
    /// Subcadena sensible a mayúsculas sobre un campo de texto.
    Contains { field: String, needle: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<FieldValue>) -> Self {
        Predicate::Compare { field: field.into(), op, value: value.into() }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }
    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }
    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }
    pub fn le(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }
    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }
    pub fn ge(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }
    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::Contains { field: field.into(), needle: needle.into() }
    }

    /// Conjunción; aplana conjunciones anidadas.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut all) => {
                all.push(other);
                Predicate::And(all)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Disyunción; aplana disyunciones anidadas.
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut any) => {
                any.push(other);
                Predicate::Or(any)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { field, .. } | Predicate::Contains { field, .. } => out.push(field),
            Predicate::And(ps) | Predicate::Or(ps) => ps.iter().for_each(|p| p.collect_fields(out)),
            Predicate::Not(p) => p.collect_fields(out),
        }
    }

    /// Campos referenciados por el predicado (en orden de aparición).
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    /// Evalúa el predicado sobre el payload JSON de una fila.
    pub fn evaluate(&self, payload: &Value) -> bool {
        match self {
            Predicate::Compare { field, op, value } => {
                let actual = payload.get(field.as_str()).unwrap_or(&Value::Null);
                let expected = value.to_json();
                match op {
                    CompareOp::Eq => json_eq(actual, &expected),
                    CompareOp::Ne => !json_eq(actual, &expected),
                    CompareOp::Lt => compare_json(actual, &expected) == Some(Ordering::Less),
                    CompareOp::Le => matches!(compare_json(actual, &expected), Some(Ordering::Less | Ordering::Equal)),
                    CompareOp::Gt => compare_json(actual, &expected) == Some(Ordering::Greater),
                    CompareOp::Ge => matches!(compare_json(actual, &expected), Some(Ordering::Greater | Ordering::Equal)),
                }
            }
            Predicate::Contains { field, needle } => payload.get(field.as_str())
                                                            .and_then(Value::as_str)
                                                            .map(|s| s.contains(needle.as_str()))
                                                            .unwrap_or(false),
            Predicate::And(ps) => ps.iter().all(|p| p.evaluate(payload)),
            Predicate::Or(ps) => ps.iter().any(|p| p.evaluate(payload)),
            Predicate::Not(p) => !p.evaluate(payload),
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Forward,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDescriptor {
    pub field: String,
    pub order: SortOrder,
}

impl SortDescriptor {
    pub fn forward(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Forward }
    }

    pub fn reverse(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Reverse }
    }
}

/// Filtro + orden + límite de una consulta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchDescriptor {
    pub predicate: Option<Predicate>,
    pub sort_by: Vec<SortDescriptor>,
    pub fetch_limit: Option<usize>,
}

impl FetchDescriptor {
    /// Todas las filas, en orden de inserción.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(predicate: Predicate) -> Self {
        Self { predicate: Some(predicate), ..Self::default() }
    }

    pub fn sorted_by(mut self, sort: SortDescriptor) -> Self {
        self.sort_by.push(sort);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.fetch_limit = Some(n);
        self
    }

    /// Rechaza campos que el modelo no declara.
    pub fn validate(&self, entity: &str, known: &[&str]) -> Result<(), StoreError> {
        let referenced = self.predicate
                             .iter()
                             .flat_map(|p| p.fields())
                             .chain(self.sort_by.iter().map(|s| s.field.as_str()));
        for field in referenced {
            if !known.contains(&field) {
                return Err(StoreError::UnknownField { entity: entity.to_string(), field: field.to_string() });
            }
        }
        Ok(())
    }

    pub fn matches(&self, payload: &Value) -> bool {
        self.predicate.as_ref().map(|p| p.evaluate(payload)).unwrap_or(true)
    }

    /// Orden total entre dos payloads según las claves de orden (estable:
    /// los empates conservan el orden de entrada).
    pub fn ordering(&self, a: &Value, b: &Value) -> Ordering {
        for sort in &self.sort_by {
            let va = a.get(sort.field.as_str()).unwrap_or(&Value::Null);
            let vb = b.get(sort.field.as_str()).unwrap_or(&Value::Null);
            let ord = sort_json(va, vb);
            let ord = match sort.order {
                SortOrder::Forward => ord,
                SortOrder::Reverse => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match compare_json(a, b) {
        Some(ord) => ord == Ordering::Equal,
        None => a == b,
    }
}

/// Comparación entre valores del mismo tipo JSON; `None` si no son
/// comparables.
fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => Some(i.cmp(&j)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn sort_json(a: &Value, b: &Value) -> Ordering {
    compare_json(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_matches_uuid_serialized_as_string() {
        let id = Uuid::new_v4();
        let row = json!({ "state_id": id, "name": "Rocky" });
        assert!(Predicate::eq("state_id", id).evaluate(&row));
        assert!(!Predicate::eq("state_id", Uuid::nil()).evaluate(&row));
    }

    #[test]
    fn numeric_comparisons_and_combinators() {
        let row = json!({ "sequence_no": 3, "name": "Apollo Creed" });
        assert!(Predicate::ge("sequence_no", 3).evaluate(&row));
        assert!(!Predicate::gt("sequence_no", 3).evaluate(&row));
        assert!(Predicate::lt("sequence_no", 3.5).evaluate(&row));
        let p = Predicate::contains("name", "Creed").and(Predicate::le("sequence_no", 10));
        assert!(p.evaluate(&row));
        assert!(!(!p.clone()).evaluate(&row));
        assert!(Predicate::eq("name", "x").or(Predicate::eq("sequence_no", 3)).evaluate(&row));
    }

    #[test]
    fn missing_field_behaves_as_null() {
        let row = json!({ "name": "Biff" });
        assert!(Predicate::eq("nickname", FieldValue::Null).evaluate(&row));
        assert!(!Predicate::contains("nickname", "B").evaluate(&row));
    }

    #[test]
    fn validate_rejects_unknown_fields() {
        let d = FetchDescriptor::filtered(Predicate::eq("nmae", "x")).sorted_by(SortDescriptor::forward("sequence_no"));
        let err = d.validate("contact", &["state_id", "name", "sequence_no"]).unwrap_err();
        assert_eq!(err, StoreError::UnknownField { entity: "contact".into(), field: "nmae".into() });
        let sort_only = FetchDescriptor::all().sorted_by(SortDescriptor::reverse("age"));
        assert!(sort_only.validate("contact", &["name"]).is_err());
    }

    #[test]
    fn ordering_uses_keys_in_sequence() {
        let d = FetchDescriptor::all().sorted_by(SortDescriptor::forward("group"))
                                      .sorted_by(SortDescriptor::reverse("sequence_no"));
        let a = json!({ "group": "a", "sequence_no": 1 });
        let b = json!({ "group": "a", "sequence_no": 2 });
        let c = json!({ "group": "b", "sequence_no": 0 });
        assert_eq!(d.ordering(&a, &b), Ordering::Greater);
        assert_eq!(d.ordering(&b, &c), Ordering::Less);
        assert_eq!(FetchDescriptor::all().ordering(&a, &c), Ordering::Equal);
    }
}
