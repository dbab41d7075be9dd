//! Esquema Diesel (escrito a mano). Reemplazable con `diesel print-schema`.

diesel::table! {
    persistent_records (entity, row_id) {
        entity -> Text,
        row_id -> BigInt,
        state_id -> Uuid,
        payload -> Jsonb,
        updated_at -> Timestamptz,
    }
}
