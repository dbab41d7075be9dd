use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contact_core::{ChangeSet, FetchDescriptor, ModelContainer, Predicate, Snapshot, SortDescriptor, StorageBackend,
                   StoreError, TableActor};
use contact_domain::{Contact, PersistentContact, PersistentPhoneNumber, PhoneNumber, PhoneType};
use uuid::Uuid;

/// Backend que rechaza todo `persist` mientras `failing` está activo.
#[derive(Default)]
struct SwitchBackend {
    failing: AtomicBool,
}

impl StorageBackend for SwitchBackend {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot::default())
    }

    fn persist(&self, _changes: &ChangeSet) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("backend caído".into()));
        }
        Ok(())
    }
}

fn actors() -> (TableActor<PersistentContact>, TableActor<PersistentPhoneNumber>) {
    let container = ModelContainer::in_memory();
    (TableActor::new(container.clone()), TableActor::new(container))
}

fn by_id(id: Uuid) -> FetchDescriptor {
    FetchDescriptor::filtered(Predicate::eq("state_id", id))
}

fn marty() -> Contact {
    Contact::new("Marty McFly", 0).with_phone_numbers(vec![PhoneNumber::new(PhoneType::Home, "555-0100", 0),
                                                             PhoneNumber::new(PhoneType::Mobile, "555-0101", 1),])
}

#[tokio::test]
async fn test_insert_contact_cascades_phone_numbers() {
    let (contacts, phones) = actors();
    let v = marty();
    contacts.insert(v.clone(), true).await.unwrap();
    assert_eq!(phones.fetch_count(FetchDescriptor::all()).await.unwrap(), 2);
    assert_eq!(contacts.fetch(by_id(v.id)).await.unwrap(), vec![v]);
}

#[tokio::test]
async fn test_reconciliation_matches_children_by_identifier() {
    let (contacts, phones) = actors();
    let v = marty();
    let handle = contacts.insert(v.clone(), true).await.unwrap();
    let a = v.phone_numbers[0].clone();
    let b = v.phone_numbers[1].clone();
    let a_handle = phones.fetch_identifier(by_id(a.id)).await.unwrap().expect("handle A");

    let a_changed = PhoneNumber { number: "555-0199".into(), ..a.clone() };
    let b_new = PhoneNumber::new(PhoneType::Office, "555-1985", 2);
    let edited = Contact { phone_numbers: vec![a_changed.clone(), b_new.clone()], ..v.clone() };
    contacts.update_with_child(handle, edited.clone(), true).await.unwrap();

    assert_eq!(contacts.fetch(by_id(v.id)).await.unwrap(), vec![edited]);
    // A se actualizó en sitio: mismo handle, mismo id.
    assert_eq!(phones.fetch_identifier(by_id(a.id)).await.unwrap(), Some(a_handle));
    assert_eq!(phones.fetch(by_id(a.id)).await.unwrap(), vec![a_changed]);
    assert_eq!(phones.fetch(by_id(b_new.id)).await.unwrap(), vec![b_new]);
    // B ya no está en la lista: se elimina en lugar de quedar huérfano.
    assert_eq!(phones.fetch_count(by_id(b.id)).await.unwrap(), 0);
    assert_eq!(phones.fetch_count(FetchDescriptor::all()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_reconciliation_keeps_caller_order() {
    let (contacts, _) = actors();
    let v = marty();
    let handle = contacts.insert(v.clone(), true).await.unwrap();
    let mut reordered = v.clone();
    reordered.phone_numbers.reverse();
    contacts.update_with_child(handle, reordered.clone(), true).await.unwrap();
    assert_eq!(contacts.fetch(by_id(v.id)).await.unwrap(), vec![reordered]);
}

#[tokio::test]
async fn test_update_with_child_can_add_to_contact_without_phones() {
    let (contacts, phones) = actors();
    let v = Contact::new("Doc Brown", 1);
    let handle = contacts.insert(v.clone(), true).await.unwrap();
    let edited = v.clone().with_phone_numbers(vec![PhoneNumber::new(PhoneType::Office, "555-1955", 0)]);
    contacts.update_with_child(handle, edited.clone(), true).await.unwrap();
    assert_eq!(contacts.fetch(by_id(v.id)).await.unwrap(), vec![edited]);
    assert_eq!(phones.fetch_count(FetchDescriptor::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_contact_cascades_phone_numbers() {
    let (contacts, phones) = actors();
    let keep = Contact::new("Biff Tannen", 2).with_phone_numbers(vec![PhoneNumber::new(PhoneType::Home, "1", 0)]);
    contacts.insert(keep.clone(), true).await.unwrap();
    let handle = contacts.insert(marty(), true).await.unwrap();
    contacts.delete(handle, true).await.unwrap();
    assert_eq!(contacts.fetch(FetchDescriptor::all()).await.unwrap(), vec![keep]);
    assert_eq!(phones.fetch_count(FetchDescriptor::all()).await.unwrap(), 1);
}

#[tokio::test]
#[should_panic(expected = "update_with_child")]
async fn test_plain_update_of_contact_with_phones_is_fatal() {
    let (contacts, _) = actors();
    let v = marty();
    let handle = contacts.insert(v.clone(), true).await.unwrap();
    let _ = contacts.update(handle, v, true).await;
}

#[tokio::test]
async fn test_update_with_child_on_stale_handle_is_noop() {
    let (contacts, phones) = actors();
    let v = marty();
    let handle = contacts.insert(v.clone(), true).await.unwrap();
    contacts.delete(handle.clone(), true).await.unwrap();
    contacts.update_with_child(handle, v, true).await.unwrap();
    assert_eq!(contacts.fetch_count(FetchDescriptor::all()).await.unwrap(), 0);
    assert_eq!(phones.fetch_count(FetchDescriptor::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_with_child_without_force_save_stays_pending() {
    let (contacts, _) = actors();
    let v = marty();
    let handle = contacts.insert(v.clone(), true).await.unwrap();
    let edited = Contact { name: "Calvin Klein".into(), ..v.clone() };
    contacts.update_with_child(handle, edited.clone(), false).await.unwrap();
    assert_eq!(contacts.background().fetch(by_id(v.id)).await.unwrap(), vec![v.clone()]);
    contacts.save().await.unwrap();
    assert_eq!(contacts.background().fetch(by_id(v.id)).await.unwrap(), vec![edited]);
}

#[tokio::test]
async fn test_background_update_with_child() {
    let (contacts, phones) = actors();
    let v = marty();
    let handle = contacts.insert(v.clone(), true).await.unwrap();
    let edited = Contact { phone_numbers: vec![v.phone_numbers[1].clone()], ..v.clone() };
    contacts.background().update_with_child(handle, edited.clone(), true).await.unwrap();
    assert_eq!(contacts.fetch(by_id(v.id)).await.unwrap(), vec![edited]);
    assert_eq!(phones.fetch_count(FetchDescriptor::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_insert_leaves_no_orphan_phone_numbers() {
    let (contacts, phones) = actors();
    let dup = PhoneNumber::new(PhoneType::Mobile, "555-0101", 1);
    let broken = Contact::new("Marty McFly", 0).with_phone_numbers(vec![PhoneNumber::new(PhoneType::Home, "555-0100", 0),
                                                                         dup.clone(),
                                                                         dup,]);
    let err = contacts.insert(broken, true).await.unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { .. }));

    let doc = Contact::new("Doc Brown", 1).with_phone_numbers(vec![PhoneNumber::new(PhoneType::Office, "555-1955", 0)]);
    contacts.insert(doc.clone(), true).await.unwrap();
    assert_eq!(contacts.background().fetch(FetchDescriptor::all()).await.unwrap(), vec![doc]);
    assert_eq!(phones.background().fetch_count(FetchDescriptor::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_update_with_child_changes_nothing() {
    let (contacts, phones) = actors();
    let v = marty();
    let handle = contacts.insert(v.clone(), true).await.unwrap();
    let a = v.phone_numbers[0].clone();
    let a_changed = PhoneNumber { number: "CHANGED".into(), ..a.clone() };
    let edited = Contact { phone_numbers: vec![a_changed.clone(), a_changed], ..v.clone() };
    let err = contacts.update_with_child(handle, edited, true).await.unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { .. }));

    // Un guardado posterior no arrastra nada de la reconciliación fallida.
    contacts.insert(Contact::new("Biff Tannen", 1), true).await.unwrap();
    assert_eq!(phones.fetch(by_id(a.id)).await.unwrap(), vec![a]);
    assert_eq!(phones.fetch_count(FetchDescriptor::all()).await.unwrap(), 2);
    assert_eq!(contacts.fetch(by_id(v.id)).await.unwrap(), vec![v]);
}

#[tokio::test]
async fn test_backend_failure_during_update_with_child_applies_nothing() {
    let backend = Arc::new(SwitchBackend::default());
    let container = ModelContainer::with_backend(backend.clone()).unwrap();
    let (contacts, phones): (TableActor<PersistentContact>, TableActor<PersistentPhoneNumber>) =
        (TableActor::new(container.clone()), TableActor::new(container));
    let v = marty();
    let handle = contacts.insert(v.clone(), true).await.unwrap();

    let a = v.phone_numbers[0].clone();
    let edited = Contact { name: "Calvin Klein".into(),
                           phone_numbers: vec![PhoneNumber { number: "555-0199".into(), ..a.clone() },
                                               PhoneNumber::new(PhoneType::Office, "555-1985", 1),],
                           ..v.clone() };
    backend.failing.store(true, Ordering::SeqCst);
    let err = contacts.update_with_child(handle.clone(), edited.clone(), true).await.unwrap_err();
    assert_eq!(err, StoreError::Backend("backend caído".into()));

    for (contacts, phones) in [(contacts.background(), phones.background()), (contacts.clone(), phones.clone())] {
        assert_eq!(contacts.fetch(by_id(v.id)).await.unwrap(), vec![v.clone()]);
        assert_eq!(phones.fetch(by_id(a.id)).await.unwrap(), vec![a.clone()]);
        assert_eq!(phones.fetch_count(FetchDescriptor::all()).await.unwrap(), 2);
    }

    backend.failing.store(false, Ordering::SeqCst);
    contacts.update_with_child(handle, edited.clone(), true).await.unwrap();
    assert_eq!(contacts.background().fetch(by_id(v.id)).await.unwrap(), vec![edited]);
}

#[tokio::test]
async fn test_rocky_scenario() {
    let (contacts, _) = actors();
    let id = Uuid::new_v4();
    let rocky = Contact { id, name: "Rocky".into(), sequence_no: 0, phone_numbers: Vec::new() };
    contacts.insert(rocky, true).await.unwrap();
    let handle = contacts.fetch_identifier(by_id(id)).await.unwrap().expect("handle");
    let balboa = Contact { id, name: "Rocky Balboa".into(), sequence_no: 0, phone_numbers: Vec::new() };
    contacts.update(handle, balboa.clone(), true).await.unwrap();
    assert_eq!(contacts.fetch(by_id(id)).await.unwrap(), vec![balboa]);
}

#[tokio::test]
async fn test_contacts_load_sorted_by_sequence() {
    let (contacts, _) = actors();
    for (name, seq) in [("Biff Tannen", 2), ("Marty McFly", 0), ("Emmett Brown", 1)] {
        contacts.insert(Contact::new(name, seq), true).await.unwrap();
    }
    let loaded = contacts.fetch(FetchDescriptor::all().sorted_by(SortDescriptor::forward("sequence_no")))
                         .await
                         .unwrap();
    let names: Vec<&str> = loaded.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Marty McFly", "Emmett Brown", "Biff Tannen"]);
    assert_eq!(contact_domain::next_sequence_no(loaded.iter().map(|c| c.sequence_no)), 3);
}
