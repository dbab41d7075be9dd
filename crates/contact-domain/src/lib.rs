// contact-domain library entry point
pub mod contact;
pub mod errors;
pub mod phone_number;
pub mod sequence;

pub use contact::{Contact, PersistentContact};
pub use errors::DomainError;
pub use phone_number::{PersistentPhoneNumber, PhoneNumber, PhoneType};
pub use sequence::next_sequence_no;
