//! Line-oriented text persistence: a commented header block carrying the
//! saved counters, then one pipe-delimited line per live record. Message
//! subject/body are escaped so every record stays on one physical line;
//! the two substitution rules are fixed and must not change, existing
//! data files depend on them.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, info};

use crate::core::{
    write_fixed, StoreConfig, StoreData, MAX_ACCOUNTS, MAX_MESSAGES,
};
use crate::errors::StoreError;

pub static ACCOUNT_COUNT_LABEL: &'static str = "# ACCOUNT_COUNT:";
pub static NEXT_ACCOUNT_ID_LABEL: &'static str = "# NEXT_ACCOUNT_ID:";
pub static MESSAGE_COUNT_LABEL: &'static str = "# MESSAGE_COUNT:";
pub static NEXT_MESSAGE_ID_LABEL: &'static str = "# NEXT_MESSAGE_ID:";

/// `|` and newline would break the one-line-per-record framing; each gets
/// a fixed textual substitute.
pub fn escape_field(raw: &str) -> String {
    raw.replace('|', "&#124;").replace('\n', "\\n")
}

/// Reverses both substitutions, longest match first, left to right.
pub fn unescape_field(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while !rest.is_empty() {
        if rest.starts_with("&#124;") {
            out.push('|');
            rest = &rest[6..];
        } else if rest.starts_with("\\n") {
            out.push('\n');
            rest = &rest[2..];
        } else {
            let ch = rest.chars().next().unwrap();
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    out
}

// atoi-style leniency: anything unparsable reads as zero
fn parse_int(token: &str) -> i32 {
    token.trim().parse().unwrap_or(0)
}

fn parse_long(token: &str) -> i64 {
    token.trim().parse().unwrap_or(0)
}

/// Whole-file rewrite of every active account, scan bounded by the
/// account counter.
pub fn save_accounts(data: &StoreData, cfg: &StoreConfig) -> Result<(), StoreError> {
    let path = cfg.accounts_file();
    let mut w = BufWriter::new(File::create(&path)?);

    writeln!(w, "# Accounts Database - Text Format")?;
    writeln!(w, "{} {}", ACCOUNT_COUNT_LABEL, data.control.account_count)?;
    writeln!(w, "{} {}", NEXT_ACCOUNT_ID_LABEL, data.control.next_account_id)?;
    writeln!(w, "# Format: ID|Name|Email|Password|Age|IsActive|CreatedAt")?;
    writeln!(w, "# ==========================================")?;

    let mut written = 0;
    for account in data.accounts[..data.control.account_span()].iter() {
        if account.active() {
            writeln!(
                w,
                "{}|{}|{}|{}|{}|{}|{}",
                account.id,
                account.name(),
                account.email(),
                account.password(),
                account.age,
                account.is_active,
                account.created_at
            )?;
            written += 1;
        }
    }
    w.flush()?;
    info!(written, path = %path.display(), "accounts saved");
    Ok(())
}

/// Loads `accounts.txt`. A missing file is not an error: the store stays
/// empty and the next id stays at 1. The header's NEXT id seeds the
/// counter; the element count restarts at zero and advances once per
/// parsed active row.
pub fn load_accounts(data: &mut StoreData, cfg: &StoreConfig) -> Result<(), StoreError> {
    let path = cfg.accounts_file();
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no accounts file, starting empty");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut next_id = 1;
    let mut declared = 0;
    data.control.account_count = 0;

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.starts_with('#') {
            if let Some(rest) = line.strip_prefix(ACCOUNT_COUNT_LABEL) {
                declared = parse_int(rest);
            } else if let Some(rest) = line.strip_prefix(NEXT_ACCOUNT_ID_LABEL) {
                next_id = parse_int(rest);
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        let idx = data.control.account_count as usize;
        if idx >= MAX_ACCOUNTS {
            break;
        }

        // positional fields; a short row keeps the slot's zeroed defaults
        let account = &mut data.accounts[idx];
        let mut fields = line.split('|');
        if let Some(t) = fields.next() {
            account.id = parse_int(t);
        }
        if let Some(t) = fields.next() {
            write_fixed(&mut account.name, t);
        }
        if let Some(t) = fields.next() {
            write_fixed(&mut account.email, t);
        }
        if let Some(t) = fields.next() {
            write_fixed(&mut account.password, t);
        }
        if let Some(t) = fields.next() {
            account.age = parse_int(t);
        }
        if let Some(t) = fields.next() {
            account.is_active = parse_int(t);
        }
        if let Some(t) = fields.next() {
            account.created_at = parse_long(t);
        }

        if account.active() {
            data.control.account_count += 1;
        }
    }

    data.control.next_account_id = next_id;
    info!(
        loaded = data.control.account_count,
        declared,
        path = %path.display(),
        "accounts loaded"
    );
    Ok(())
}

/// Whole-file rewrite of every non-deleted message, scan bounded by the
/// watermark. Subject and body go out escaped.
pub fn save_messages(data: &StoreData, cfg: &StoreConfig) -> Result<(), StoreError> {
    let path = cfg.messages_file();
    let mut w = BufWriter::new(File::create(&path)?);

    writeln!(w, "# Messages Database - Text Format")?;
    writeln!(w, "{} {}", MESSAGE_COUNT_LABEL, data.control.message_count)?;
    writeln!(w, "{} {}", NEXT_MESSAGE_ID_LABEL, data.control.next_message_id)?;
    writeln!(w, "# Format: ID|SenderID|ReceiverID|Subject|Body|SentAt|IsRead|IsDeleted")?;
    writeln!(w, "# ======================================================================")?;

    let mut written = 0;
    for message in data.messages[..data.control.message_span()].iter() {
        if !message.deleted() {
            writeln!(
                w,
                "{}|{}|{}|{}|{}|{}|{}|{}",
                message.id,
                message.sender_id,
                message.receiver_id,
                escape_field(message.subject()),
                escape_field(message.body()),
                message.sent_at,
                message.is_read,
                message.is_deleted
            )?;
            written += 1;
        }
    }
    w.flush()?;
    info!(written, path = %path.display(), "messages saved");
    Ok(())
}

pub fn load_messages(data: &mut StoreData, cfg: &StoreConfig) -> Result<(), StoreError> {
    let path = cfg.messages_file();
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no messages file, starting empty");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut next_id = 1;
    let mut declared = 0;
    data.control.message_count = 0;

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.starts_with('#') {
            if let Some(rest) = line.strip_prefix(MESSAGE_COUNT_LABEL) {
                declared = parse_int(rest);
            } else if let Some(rest) = line.strip_prefix(NEXT_MESSAGE_ID_LABEL) {
                next_id = parse_int(rest);
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        let idx = data.control.message_count as usize;
        if idx >= MAX_MESSAGES {
            break;
        }

        let message = &mut data.messages[idx];
        let mut fields = line.split('|');
        if let Some(t) = fields.next() {
            message.id = parse_int(t);
        }
        if let Some(t) = fields.next() {
            message.sender_id = parse_int(t);
        }
        if let Some(t) = fields.next() {
            message.receiver_id = parse_int(t);
        }
        if let Some(t) = fields.next() {
            write_fixed(&mut message.subject, &unescape_field(t));
        }
        if let Some(t) = fields.next() {
            write_fixed(&mut message.body, &unescape_field(t));
        }
        if let Some(t) = fields.next() {
            message.sent_at = parse_long(t);
        }
        if let Some(t) = fields.next() {
            message.is_read = parse_int(t);
        }
        if let Some(t) = fields.next() {
            message.is_deleted = parse_int(t);
        }

        if !message.deleted() {
            data.control.message_count += 1;
        }
    }

    data.control.next_message_id = next_id;
    info!(
        loaded = data.control.message_count,
        declared,
        path = %path.display(),
        "messages loaded"
    );
    Ok(())
}

/// Timestamped snapshot pair. The account side drops the password column
/// and the message side writes subject/body raw, so these files are for
/// reading, not for feeding back through the loader.
pub fn export_backup(data: &StoreData, cfg: &StoreConfig) -> Result<(PathBuf, PathBuf), StoreError> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let accounts_path =
        cfg.accounts_file().with_file_name(format!("accounts_backup_{}.txt", stamp));
    let messages_path =
        cfg.messages_file().with_file_name(format!("messages_backup_{}.txt", stamp));

    let mut w = BufWriter::new(File::create(&accounts_path)?);
    writeln!(w, "# Accounts Backup - Text Format")?;
    writeln!(w, "{} {}", ACCOUNT_COUNT_LABEL, data.control.account_count)?;
    writeln!(w, "{} {}", NEXT_ACCOUNT_ID_LABEL, data.control.next_account_id)?;
    writeln!(w, "# Format: ID|Name|Email|Age|IsActive|CreatedAt")?;
    writeln!(w, "# ==========================================")?;
    for account in data.accounts[..data.control.account_span()].iter() {
        if account.active() {
            writeln!(
                w,
                "{}|{}|{}|{}|{}|{}",
                account.id,
                account.name(),
                account.email(),
                account.age,
                account.is_active,
                account.created_at
            )?;
        }
    }
    w.flush()?;
    info!(path = %accounts_path.display(), "account backup written");

    let mut w = BufWriter::new(File::create(&messages_path)?);
    writeln!(w, "# Messages Backup - Text Format")?;
    writeln!(w, "{} {}", MESSAGE_COUNT_LABEL, data.control.message_count)?;
    writeln!(w, "{} {}", NEXT_MESSAGE_ID_LABEL, data.control.next_message_id)?;
    writeln!(w, "# Format: ID|SenderID|ReceiverID|Subject|Body|SentAt|IsRead|IsDeleted")?;
    writeln!(w, "# ======================================================================")?;
    for message in data.messages[..data.control.message_span()].iter() {
        if !message.deleted() {
            writeln!(
                w,
                "{}|{}|{}|{}|{}|{}|{}|{}",
                message.id,
                message.sender_id,
                message.receiver_id,
                message.subject(),
                message.body(),
                message.sent_at,
                message.is_read,
                message.is_deleted
            )?;
        }
    }
    w.flush()?;
    info!(path = %messages_path.display(), "message backup written");

    Ok((accounts_path, messages_path))
}
