//! Read-only well-formedness pass over the live records. Reports, never
//! repairs. Sender/receiver ids are not re-resolved against the account
//! array; the referenced account may legitimately have been deleted since.

use tracing::warn;

use crate::core::StoreData;

pub fn validate(data: &StoreData) -> bool {
    let mut valid = true;

    for (slot, account) in data.accounts[..data.control.account_span()].iter().enumerate() {
        if account.active()
            && (account.id <= 0 || account.name().is_empty() || account.email().is_empty())
        {
            warn!(slot, id = account.id, "malformed account record");
            valid = false;
        }
    }

    for (slot, message) in data.messages[..data.control.message_span()].iter().enumerate() {
        if !message.deleted()
            && (message.id <= 0 || message.sender_id <= 0 || message.receiver_id <= 0)
        {
            warn!(slot, id = message.id, "malformed message record");
            valid = false;
        }
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{create_account, delete_account};
    use crate::core::write_fixed;
    use crate::messages::create_message;

    #[test]
    fn well_formed_store_passes() {
        let mut data = StoreData::boxed_zeroed();
        data.reset();
        assert!(validate(&data));

        create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();
        create_account(&mut data, "Bob", "bob@x.com", "pw34", 25).unwrap();
        create_message(&mut data, 1, 2, "Hi", "Hello").unwrap();
        assert!(validate(&data));
    }

    #[test]
    fn blank_name_on_an_active_account_fails() {
        let mut data = StoreData::boxed_zeroed();
        data.reset();
        create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();
        write_fixed(&mut data.accounts[0].name, "");
        assert!(!validate(&data));
    }

    #[test]
    fn nonpositive_party_id_fails() {
        let mut data = StoreData::boxed_zeroed();
        data.reset();
        create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();
        create_account(&mut data, "Bob", "bob@x.com", "pw34", 25).unwrap();
        create_message(&mut data, 1, 2, "Hi", "Hello").unwrap();

        data.messages[0].sender_id = 0;
        assert!(!validate(&data));
    }

    #[test]
    fn dangling_party_reference_is_tolerated() {
        let mut data = StoreData::boxed_zeroed();
        data.reset();
        create_account(&mut data, "Ann", "ann@x.com", "pw12", 30).unwrap();
        create_account(&mut data, "Bob", "bob@x.com", "pw34", 25).unwrap();
        create_message(&mut data, 1, 2, "Hi", "Hello").unwrap();

        // deleting the sender leaves a dangling but still positive id
        delete_account(&mut data, 1).unwrap();
        assert!(validate(&data));
    }
}
