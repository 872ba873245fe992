//! Read-only listing and search views over the store, returned as plain
//! rows with referenced emails already resolved. Rendering belongs to the
//! caller.

use crate::accounts::read_account;
use crate::core::{Account, Message, StoreData};
use crate::errors::StoreError;
use crate::messages;

#[derive(Clone, Debug, PartialEq)]
pub struct AccountRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub created_at: i64,
}

/// One inbox/outbox entry; `counterpart` is the other party's email, or
/// `"Unknown"` when that account no longer resolves.
#[derive(Clone, Debug, PartialEq)]
pub struct MailboxRow {
    pub id: i32,
    pub counterpart: String,
    pub subject: String,
    pub sent_at: i64,
    pub is_read: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageRow {
    pub id: i32,
    pub sender: String,
    pub receiver: String,
    pub subject: String,
    pub sent_at: i64,
    pub is_read: bool,
}

fn resolve_email(data: &StoreData, account_id: i32) -> String {
    read_account(data, account_id)
        .map(|a| a.email().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn account_row(account: &Account) -> AccountRow {
    AccountRow {
        id: account.id,
        name: account.name().to_string(),
        email: account.email().to_string(),
        age: account.age,
        created_at: account.created_at,
    }
}

fn message_row(data: &StoreData, message: &Message) -> MessageRow {
    MessageRow {
        id: message.id,
        sender: resolve_email(data, message.sender_id),
        receiver: resolve_email(data, message.receiver_id),
        subject: message.subject().to_string(),
        sent_at: message.sent_at,
        is_read: message.read(),
    }
}

pub fn all_accounts(data: &StoreData) -> Vec<AccountRow> {
    data.accounts
        .iter()
        .filter(|a| a.active())
        .map(account_row)
        .collect()
}

/// Substring match against name or email, active accounts only.
pub fn search_accounts(data: &StoreData, keyword: &str) -> Vec<AccountRow> {
    data.accounts
        .iter()
        .filter(|a| a.active() && (a.name().contains(keyword) || a.email().contains(keyword)))
        .map(account_row)
        .collect()
}

pub fn inbox(data: &StoreData, account_id: i32) -> Result<Vec<MailboxRow>, StoreError> {
    if read_account(data, account_id).is_none() {
        return Err(StoreError::NotFound);
    }
    Ok(messages::received_by(data, account_id)
        .into_iter()
        .map(|m| MailboxRow {
            id: m.id,
            counterpart: resolve_email(data, m.sender_id),
            subject: m.subject().to_string(),
            sent_at: m.sent_at,
            is_read: m.read(),
        })
        .collect())
}

pub fn outbox(data: &StoreData, account_id: i32) -> Result<Vec<MailboxRow>, StoreError> {
    if read_account(data, account_id).is_none() {
        return Err(StoreError::NotFound);
    }
    Ok(messages::sent_by(data, account_id)
        .into_iter()
        .map(|m| MailboxRow {
            id: m.id,
            counterpart: resolve_email(data, m.receiver_id),
            subject: m.subject().to_string(),
            sent_at: m.sent_at,
            is_read: m.read(),
        })
        .collect())
}

pub fn all_messages(data: &StoreData) -> Vec<MessageRow> {
    let span = data.control.message_span();
    data.messages[..span]
        .iter()
        .filter(|m| !m.deleted())
        .map(|m| message_row(data, m))
        .collect()
}

pub fn search_messages(data: &StoreData, keyword: &str) -> Vec<MessageRow> {
    messages::search(data, keyword)
        .into_iter()
        .map(|m| message_row(data, m))
        .collect()
}
