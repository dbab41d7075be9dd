//! Contrato de mapeo entre valores en memoria y registros persistidos.

use std::fmt::Debug;

use crate::model::{Identifiable, Model};
use crate::relationship::ToMany;

/// Registro persistido que sabe convertirse desde/hacia su valor en memoria.
///
/// - `extract` es una proyección pura del estado actual del registro (para
///   padres incluye los hijos cargados).
/// - `update_from` sobrescribe los campos en sitio. En un padre que posee
///   hijos es un uso indebido y debe abortar: la única vía válida es
///   `update_with_child`.
/// - `create_from` construye un registro nuevo, todavía sin fila.
pub trait Extractable: Model {
    type Value: Identifiable + Clone + PartialEq + Debug + Send + Sync + 'static;

    fn extract(&self) -> Self::Value;
    fn update_from(&mut self, value: &Self::Value);
    fn create_from(value: &Self::Value) -> Self;
}

/// Padre que posee una colección ordenada de hijos.
pub trait ParentExtractable: Extractable {
    type Child: Extractable;

    fn child_values(value: &Self::Value) -> &[<Self::Child as Extractable>::Value];
    fn children(&self) -> &ToMany<Self::Child>;
    fn replace_children(&mut self, children: ToMany<Self::Child>);
    /// Actualiza sólo los campos escalares del padre.
    fn update_fields_from(&mut self, value: &Self::Value);
}
