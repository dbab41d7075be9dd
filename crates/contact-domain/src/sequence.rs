// sequence.rs
//! Orden de presentación elegido por el llamador.

/// Siguiente `sequence_no`: uno más que el mayor existente, o 0 si no hay
/// ninguno.
pub fn next_sequence_no<I>(existing: I) -> i64
    where I: IntoIterator<Item = i64>
{
    existing.into_iter().map(|s| s + 1).max().unwrap_or(0).max(0)
}
