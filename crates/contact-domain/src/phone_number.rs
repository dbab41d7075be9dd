// phone_number.rs
use std::fmt;
use std::str::FromStr;

use contact_core::{Extractable, Identifiable, Model};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// Tipo de número de teléfono.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneType {
    Home,
    Office,
    Mobile,
}

impl PhoneType {
    pub const ALL: [PhoneType; 3] = [PhoneType::Home, PhoneType::Office, PhoneType::Mobile];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhoneType::Home => "home",
            PhoneType::Office => "office",
            PhoneType::Mobile => "mobile",
        }
    }
}

impl fmt::Display for PhoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhoneType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhoneType::ALL.into_iter()
                      .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
                      .ok_or_else(|| DomainError::UnknownPhoneType(s.to_string()))
    }
}

/// Número de teléfono en memoria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    pub id: Uuid,
    pub phone_type: PhoneType,
    pub number: String,
    pub sequence_no: i64,
}

impl PhoneNumber {
    pub fn new(phone_type: PhoneType, number: impl Into<String>, sequence_no: i64) -> Self {
        Self { id: Uuid::new_v4(), phone_type, number: number.into(), sequence_no }
    }
}

impl Identifiable for PhoneNumber {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Registro persistido de un número de teléfono (hijo de un contacto).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentPhoneNumber {
    pub state_id: Uuid,
    pub phone_type: PhoneType,
    pub number: String,
    pub sequence_no: i64,
}

impl Model for PersistentPhoneNumber {
    const ENTITY: &'static str = "phone_number";
    const FIELDS: &'static [&'static str] = &["state_id", "phone_type", "number", "sequence_no"];

    fn state_id(&self) -> Uuid {
        self.state_id
    }
}

impl Extractable for PersistentPhoneNumber {
    type Value = PhoneNumber;

    fn extract(&self) -> PhoneNumber {
        PhoneNumber { id: self.state_id,
                      phone_type: self.phone_type,
                      number: self.number.clone(),
                      sequence_no: self.sequence_no }
    }

    fn update_from(&mut self, value: &PhoneNumber) {
        self.phone_type = value.phone_type;
        self.number = value.number.clone();
        self.sequence_no = value.sequence_no;
    }

    fn create_from(value: &PhoneNumber) -> Self {
        Self { state_id: value.id,
               phone_type: value.phone_type,
               number: value.number.clone(),
               sequence_no: value.sequence_no }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_type_parses_case_insensitive() {
        assert_eq!("Mobile".parse::<PhoneType>().unwrap(), PhoneType::Mobile);
        assert_eq!(" office ".parse::<PhoneType>().unwrap(), PhoneType::Office);
        assert_eq!("fax".parse::<PhoneType>().unwrap_err(), DomainError::UnknownPhoneType("fax".into()));
    }

    #[test]
    fn phone_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PhoneType::Home).unwrap(), "\"home\"");
    }

    #[test]
    fn update_keeps_identity() {
        let v = PhoneNumber::new(PhoneType::Home, "555-0100", 0);
        let mut rec = PersistentPhoneNumber::create_from(&v);
        let changed = PhoneNumber { id: Uuid::new_v4(), number: "555-0199".into(), ..v.clone() };
        rec.update_from(&changed);
        assert_eq!(rec.state_id, v.id);
        assert_eq!(rec.number, "555-0199");
    }
}
