//! Account CRUD over the shared store. All scans are linear over the
//! fixed slot array; an account's id is independent of its slot index and
//! slots are reused only after a soft delete.

use chrono::Utc;
use tracing::debug;

use crate::core::{write_fixed, StoreData, MAX_ACCOUNTS};
use crate::errors::StoreError;

pub use crate::core::Account;

/// Creates an account and returns its id. A failed attempt consumes
/// neither an id nor a slot.
pub fn create_account(
    data: &mut StoreData,
    name: &str,
    email: &str,
    password: &str,
    age: i32,
) -> Result<i32, StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidArgument("name"));
    }
    if email.is_empty() {
        return Err(StoreError::InvalidArgument("email"));
    }
    if password.is_empty() {
        return Err(StoreError::InvalidArgument("password"));
    }
    if data.control.account_count as usize >= MAX_ACCOUNTS {
        return Err(StoreError::CapacityExceeded);
    }
    if find_account_by_email(data, email).is_some() {
        return Err(StoreError::DuplicateEmail);
    }

    // lowest inactive slot wins, not the most recently freed one
    let slot = data
        .accounts
        .iter()
        .position(|a| !a.active())
        .ok_or(StoreError::CapacityExceeded)?;

    let id = data.control.next_account_id;
    data.control.next_account_id += 1;

    let account = &mut data.accounts[slot];
    account.id = id;
    write_fixed(&mut account.name, name);
    write_fixed(&mut account.email, email);
    write_fixed(&mut account.password, password);
    account.age = age;
    account.is_active = 1;
    account.created_at = Utc::now().timestamp();

    data.control.account_count += 1;
    debug!(id, slot, "account created");
    Ok(id)
}

pub fn read_account(data: &StoreData, id: i32) -> Option<&Account> {
    if id <= 0 {
        return None;
    }
    data.accounts.iter().find(|a| a.active() && a.id == id)
}

/// Exact, case-sensitive match against active accounts only.
pub fn find_account_by_email<'a>(data: &'a StoreData, email: &str) -> Option<&'a Account> {
    data.accounts.iter().find(|a| a.active() && a.email() == email)
}

/// Login check: active account with this exact email and password.
pub fn verify_credentials<'a>(
    data: &'a StoreData,
    email: &str,
    password: &str,
) -> Option<&'a Account> {
    data.accounts
        .iter()
        .find(|a| a.active() && a.email() == email && a.password() == password)
}

/// Overwrites name, email and age unconditionally. `None` or an empty
/// password keeps the stored one. A duplicate-email failure aborts before
/// any field is written.
pub fn update_account(
    data: &mut StoreData,
    id: i32,
    name: &str,
    email: &str,
    password: Option<&str>,
    age: i32,
) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidArgument("name"));
    }
    if email.is_empty() {
        return Err(StoreError::InvalidArgument("email"));
    }

    let slot = data
        .accounts
        .iter()
        .position(|a| a.active() && a.id == id)
        .ok_or(StoreError::NotFound)?;

    if let Some(holder) = find_account_by_email(data, email) {
        if holder.id != id {
            return Err(StoreError::DuplicateEmail);
        }
    }

    let account = &mut data.accounts[slot];
    write_fixed(&mut account.name, name);
    write_fixed(&mut account.email, email);
    if let Some(pw) = password {
        if !pw.is_empty() {
            write_fixed(&mut account.password, pw);
        }
    }
    account.age = age;
    debug!(id, "account updated");
    Ok(())
}

/// Soft delete: clears the active flag and decrements the account
/// counter. The slot's contents stay put until a later create reuses it.
pub fn delete_account(data: &mut StoreData, id: i32) -> Result<(), StoreError> {
    if id <= 0 {
        return Err(StoreError::InvalidArgument("id"));
    }
    let slot = data
        .accounts
        .iter()
        .position(|a| a.active() && a.id == id)
        .ok_or(StoreError::NotFound)?;

    data.accounts[slot].is_active = 0;
    data.control.account_count -= 1;
    debug!(id, slot, "account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Box<StoreData> {
        let mut data = StoreData::boxed_zeroed();
        data.reset();
        data
    }

    #[test]
    fn create_then_read_back() {
        let mut data = fresh();
        let id = create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();
        assert_eq!(id, 1);

        let ann = read_account(&data, id).unwrap();
        assert_eq!(ann.name(), "Ann");
        assert_eq!(ann.email(), "ann@x.com");
        assert_eq!(ann.password(), "pw12");
        assert_eq!(ann.age, 30);
        assert!(ann.active());
        assert!(ann.created_at > 0);
    }

    #[test]
    fn over_wide_fields_are_truncated() {
        let mut data = fresh();
        let long = "x".repeat(80);
        let id = create_account(&mut data, &long, "a@x.com", "pw12", 1).unwrap();
        let stored = read_account(&data, id).unwrap();
        assert_eq!(stored.name().len(), crate::core::NAME_LEN - 1);
        assert!(long.starts_with(stored.name()));
    }

    #[test]
    fn duplicate_email_consumes_nothing() {
        let mut data = fresh();
        create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();
        let err = create_account(&mut data, "Imposter", "ann@x.com", "pw34", 40).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(data.control.next_account_id, 2);
        assert_eq!(data.control.account_count, 1);

        // a different email still gets the next id
        let id = create_account(&mut data, "Bob", "bob@x.com", "pw34", 25).unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn empty_required_fields_are_rejected() {
        let mut data = fresh();
        assert!(matches!(
            create_account(&mut data, "", "a@x.com", "pw", 1),
            Err(StoreError::InvalidArgument("name"))
        ));
        assert!(matches!(
            create_account(&mut data, "A", "", "pw", 1),
            Err(StoreError::InvalidArgument("email"))
        ));
        assert!(matches!(
            create_account(&mut data, "A", "a@x.com", "", 1),
            Err(StoreError::InvalidArgument("password"))
        ));
    }

    #[test]
    fn soft_delete_hides_but_keeps_slot_data() {
        let mut data = fresh();
        let id = create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();
        delete_account(&mut data, id).unwrap();

        assert!(read_account(&data, id).is_none());
        assert!(find_account_by_email(&data, "ann@x.com").is_none());
        assert_eq!(data.control.account_count, 0);
        // physically still there
        assert_eq!(data.accounts[0].email(), "ann@x.com");

        // the freed slot is reused by the next create, id never reused
        let id2 = create_account(&mut data, "Bob", "bob@x.com", "pw34", 25).unwrap();
        assert_eq!(id2, 2);
        assert_eq!(data.accounts[0].id, 2);
        assert_eq!(data.accounts[0].email(), "bob@x.com");
    }

    #[test]
    fn delete_errors() {
        let mut data = fresh();
        assert!(matches!(
            delete_account(&mut data, 0),
            Err(StoreError::InvalidArgument("id"))
        ));
        assert!(matches!(delete_account(&mut data, 9), Err(StoreError::NotFound)));
    }

    #[test]
    fn update_overwrites_but_keeps_empty_password() {
        let mut data = fresh();
        let id = create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();

        update_account(&mut data, id, "Anne", "anne@x.com", None, 31).unwrap();
        let a = read_account(&data, id).unwrap();
        assert_eq!(a.name(), "Anne");
        assert_eq!(a.email(), "anne@x.com");
        assert_eq!(a.password(), "pw12");
        assert_eq!(a.age, 31);

        update_account(&mut data, id, "Anne", "anne@x.com", Some(""), 31).unwrap();
        assert_eq!(read_account(&data, id).unwrap().password(), "pw12");

        update_account(&mut data, id, "Anne", "anne@x.com", Some("secret"), 31).unwrap();
        assert_eq!(read_account(&data, id).unwrap().password(), "secret");
    }

    #[test]
    fn update_duplicate_email_writes_nothing() {
        let mut data = fresh();
        let ann = create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();
        create_account(&mut data, "Bob", "bob@x.com", "pw34", 25).unwrap();

        let err = update_account(&mut data, ann, "Annabel", "bob@x.com", None, 33).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        let a = read_account(&data, ann).unwrap();
        assert_eq!(a.name(), "Ann");
        assert_eq!(a.email(), "ann@x.com");
        assert_eq!(a.age, 30);

        // keeping one's own email is not a duplicate
        update_account(&mut data, ann, "Annabel", "ann@x.com", None, 33).unwrap();
        assert_eq!(read_account(&data, ann).unwrap().name(), "Annabel");
    }

    #[test]
    fn credentials_must_match_exactly_and_be_active() {
        let mut data = fresh();
        let id = create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();

        assert_eq!(verify_credentials(&data, "ann@x.com", "pw12").map(|a| a.id), Some(id));
        assert!(verify_credentials(&data, "ann@x.com", "PW12").is_none());
        assert!(verify_credentials(&data, "Ann@x.com", "pw12").is_none());

        delete_account(&mut data, id).unwrap();
        assert!(verify_credentials(&data, "ann@x.com", "pw12").is_none());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut data = fresh();
        for i in 0..MAX_ACCOUNTS {
            create_account(&mut data, "U", &format!("u{}@x.com", i), "pw", 20).unwrap();
        }
        assert!(matches!(
            create_account(&mut data, "One", "more@x.com", "pw", 20),
            Err(StoreError::CapacityExceeded)
        ));
    }
}
