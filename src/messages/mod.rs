//! Message CRUD and derived queries. Every scan is bounded by the
//! message watermark (`Control::message_span`), which only advances when a
//! create lands beyond the highest slot ever used; soft deletes never move
//! it back.

use chrono::Utc;
use tracing::debug;

use crate::accounts;
use crate::core::{write_fixed, StoreData, MAX_MESSAGES};
use crate::errors::StoreError;

pub use crate::core::Message;

/// Creates a message and returns its id. Sender and receiver must both
/// resolve to active accounts at creation time.
pub fn create_message(
    data: &mut StoreData,
    sender_id: i32,
    receiver_id: i32,
    subject: &str,
    body: &str,
) -> Result<i32, StoreError> {
    if data.control.message_count as usize >= MAX_MESSAGES {
        return Err(StoreError::CapacityExceeded);
    }
    if accounts::read_account(data, sender_id).is_none() {
        return Err(StoreError::SenderNotFound);
    }
    if accounts::read_account(data, receiver_id).is_none() {
        return Err(StoreError::ReceiverNotFound);
    }

    // deleted slots recycle ahead of never-used ones, lowest index first
    let slot = data
        .messages
        .iter()
        .position(|m| m.id == 0 || m.deleted())
        .ok_or(StoreError::CapacityExceeded)?;

    let id = data.control.next_message_id;
    data.control.next_message_id += 1;

    let message = &mut data.messages[slot];
    message.id = id;
    message.sender_id = sender_id;
    message.receiver_id = receiver_id;
    write_fixed(&mut message.subject, subject);
    write_fixed(&mut message.body, body);
    message.sent_at = Utc::now().timestamp();
    message.is_read = 0;
    message.is_deleted = 0;

    // recycled low slots leave the watermark where it was
    if slot >= data.control.message_count as usize {
        data.control.message_count = slot as i32 + 1;
    }
    debug!(id, slot, sender_id, receiver_id, "message created");
    Ok(id)
}

pub fn read_message(data: &StoreData, id: i32) -> Option<&Message> {
    if id <= 0 {
        return None;
    }
    let span = data.control.message_span();
    data.messages[..span].iter().find(|m| m.id == id && !m.deleted())
}

/// Unconditional overwrite of the read flag.
pub fn update_message_status(data: &mut StoreData, id: i32, is_read: bool) -> Result<(), StoreError> {
    if id <= 0 {
        return Err(StoreError::InvalidArgument("id"));
    }
    let span = data.control.message_span();
    let slot = data.messages[..span]
        .iter()
        .position(|m| m.id == id && !m.deleted())
        .ok_or(StoreError::NotFound)?;
    data.messages[slot].is_read = is_read as i32;
    Ok(())
}

/// Soft delete: sets the deleted flag only. Watermark and id counters are
/// untouched.
pub fn delete_message(data: &mut StoreData, id: i32) -> Result<(), StoreError> {
    if id <= 0 {
        return Err(StoreError::InvalidArgument("id"));
    }
    let span = data.control.message_span();
    let slot = data.messages[..span]
        .iter()
        .position(|m| m.id == id && !m.deleted())
        .ok_or(StoreError::NotFound)?;
    data.messages[slot].is_deleted = 1;
    debug!(id, slot, "message deleted");
    Ok(())
}

pub fn unread_count(data: &StoreData, receiver_id: i32) -> usize {
    if receiver_id <= 0 {
        return 0;
    }
    let span = data.control.message_span();
    data.messages[..span]
        .iter()
        .filter(|m| !m.deleted() && m.receiver_id == receiver_id && !m.read())
        .count()
}

/// Flips every unread received message to read; returns how many flipped.
pub fn mark_all_read(data: &mut StoreData, receiver_id: i32) -> Result<usize, StoreError> {
    if receiver_id <= 0 {
        return Err(StoreError::InvalidArgument("receiver_id"));
    }
    let span = data.control.message_span();
    let mut flipped = 0;
    for message in data.messages[..span].iter_mut() {
        if !message.deleted() && message.receiver_id == receiver_id && !message.read() {
            message.is_read = 1;
            flipped += 1;
        }
    }
    debug!(receiver_id, flipped, "marked all read");
    Ok(flipped)
}

/// Soft-deletes every already-read message the account sent or received;
/// returns how many were removed.
pub fn delete_read(data: &mut StoreData, account_id: i32) -> Result<usize, StoreError> {
    if account_id <= 0 {
        return Err(StoreError::InvalidArgument("account_id"));
    }
    let span = data.control.message_span();
    let mut removed = 0;
    for message in data.messages[..span].iter_mut() {
        if !message.deleted()
            && (message.sender_id == account_id || message.receiver_id == account_id)
            && message.read()
        {
            message.is_deleted = 1;
            removed += 1;
        }
    }
    debug!(account_id, removed, "deleted read messages");
    Ok(removed)
}

pub fn sent_by(data: &StoreData, sender_id: i32) -> Vec<&Message> {
    let span = data.control.message_span();
    data.messages[..span]
        .iter()
        .filter(|m| !m.deleted() && m.sender_id == sender_id)
        .collect()
}

pub fn received_by(data: &StoreData, receiver_id: i32) -> Vec<&Message> {
    let span = data.control.message_span();
    data.messages[..span]
        .iter()
        .filter(|m| !m.deleted() && m.receiver_id == receiver_id)
        .collect()
}

/// Case-sensitive substring containment against subject or body, no
/// tokenization.
pub fn search<'a>(data: &'a StoreData, keyword: &str) -> Vec<&'a Message> {
    let span = data.control.message_span();
    data.messages[..span]
        .iter()
        .filter(|m| !m.deleted() && (m.subject().contains(keyword) || m.body().contains(keyword)))
        .collect()
}
