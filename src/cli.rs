//! CLI mínima:
//!
//! ```text
//! contactflow list
//! contactflow add <nombre> [<tipo>:<número>...]
//! contactflow rename <uuid> <nombre>
//! contactflow phones <uuid> [<tipo>:<número>...]
//! contactflow delete <uuid>
//! ```

use contact_domain::{Contact, DomainError, PhoneNumber, PhoneType};
use uuid::Uuid;

use crate::client::DataClient;
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneEntry {
    pub phone_type: PhoneType,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Add { name: String, phones: Vec<PhoneEntry> },
    Rename { id: Uuid, name: String },
    Phones { id: Uuid, phones: Vec<PhoneEntry> },
    Delete { id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Lines(Vec<String>),
    NotFound(Uuid),
}

pub const USAGE: &str = "uso: contactflow list | add <nombre> [tipo:número...] | rename <uuid> <nombre> | phones <uuid> \
                         [tipo:número...] | delete <uuid>";

/// `tipo:número`, p. ej. `mobile:555-0101`.
pub fn parse_phone_entry(raw: &str) -> Result<PhoneEntry, AppError> {
    let (kind, number) = raw.split_once(':')
                            .ok_or_else(|| AppError::Usage(format!("teléfono sin tipo: {raw}")))?;
    let number = number.trim();
    if number.is_empty() {
        return Err(DomainError::ValidationError(format!("número vacío en '{raw}'")).into());
    }
    Ok(PhoneEntry { phone_type: kind.parse()?, number: number.to_string() })
}

fn parse_id(raw: Option<&String>) -> Result<Uuid, AppError> {
    let raw = raw.ok_or_else(|| AppError::Usage("falta <uuid>".into()))?;
    Uuid::parse_str(raw).map_err(|e| AppError::Usage(format!("uuid inválido '{raw}': {e}")))
}

/// Interpreta los argumentos (sin el nombre del binario).
pub fn parse_args(args: &[String]) -> Result<Command, AppError> {
    let Some((cmd, rest)) = args.split_first() else {
        return Err(AppError::Usage(USAGE.into()));
    };
    match cmd.as_str() {
        "list" => Ok(Command::List),
        "add" => {
            let (name, phones) = rest.split_first().ok_or_else(|| AppError::Usage("falta <nombre>".into()))?;
            Ok(Command::Add { name: name.clone(),
                              phones: phones.iter().map(|p| parse_phone_entry(p)).collect::<Result<_, _>>()? })
        }
        "rename" => {
            let id = parse_id(rest.first())?;
            let name = rest.get(1).ok_or_else(|| AppError::Usage("falta <nombre>".into()))?;
            Ok(Command::Rename { id, name: name.clone() })
        }
        "phones" => {
            let id = parse_id(rest.first())?;
            let phones = rest.iter().skip(1).map(|p| parse_phone_entry(p)).collect::<Result<_, _>>()?;
            Ok(Command::Phones { id, phones })
        }
        "delete" => Ok(Command::Delete { id: parse_id(rest.first())? }),
        other => Err(AppError::Usage(format!("comando desconocido '{other}'. {USAGE}"))),
    }
}

fn describe(contact: &Contact) -> String {
    let phones: Vec<String> = contact.phone_numbers
                                     .iter()
                                     .map(|p| format!("{}:{}", p.phone_type, p.number))
                                     .collect();
    format!("{} {:>3} {} [{}]", contact.id, contact.sequence_no, contact.name, phones.join(", "))
}

/// Nueva lista de teléfonos: conserva el id del teléfono existente con el
/// mismo número, crea uno nuevo para el resto.
fn merge_phones(existing: &[PhoneNumber], entries: Vec<PhoneEntry>) -> Vec<PhoneNumber> {
    entries.into_iter()
           .enumerate()
           .map(|(i, e)| {
               let seq = i as i64;
               match existing.iter().find(|p| p.number == e.number) {
                   Some(p) => PhoneNumber { phone_type: e.phone_type, sequence_no: seq, ..p.clone() },
                   None => PhoneNumber::new(e.phone_type, e.number, seq),
               }
           })
           .collect()
}

pub async fn run(client: &DataClient, command: Command) -> Result<Outcome, AppError> {
    match command {
        Command::List => {
            let contacts = client.load_contacts().await?;
            Ok(Outcome::Lines(contacts.iter().map(describe).collect()))
        }
        Command::Add { name, phones } => {
            let seq = client.next_sequence_no().await?;
            let numbers = phones.into_iter()
                                .enumerate()
                                .map(|(i, e)| PhoneNumber::new(e.phone_type, e.number, i as i64))
                                .collect();
            let contact = Contact::new(name, seq).with_phone_numbers(numbers);
            client.add_contact(contact.clone()).await?;
            Ok(Outcome::Lines(vec![describe(&contact)]))
        }
        Command::Rename { id, name } => {
            let Some(mut contact) = client.find_contact(id).await? else {
                return Ok(Outcome::NotFound(id));
            };
            contact.name = name;
            if !client.edit_contact(contact.clone()).await? {
                return Ok(Outcome::NotFound(id));
            }
            Ok(Outcome::Lines(vec![describe(&contact)]))
        }
        Command::Phones { id, phones } => {
            let Some(mut contact) = client.find_contact(id).await? else {
                return Ok(Outcome::NotFound(id));
            };
            contact.phone_numbers = merge_phones(&contact.phone_numbers, phones);
            if !client.edit_contact(contact.clone()).await? {
                return Ok(Outcome::NotFound(id));
            }
            Ok(Outcome::Lines(vec![describe(&contact)]))
        }
        Command::Delete { id } => match client.delete_contact(id).await? {
            true => Ok(Outcome::Lines(vec![format!("eliminado {id}")])),
            false => Ok(Outcome::NotFound(id)),
        },
    }
}
