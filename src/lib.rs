//! Multi-process mail record store: accounts and messages live in a
//! single fixed-size shared memory segment so independent processes see
//! and mutate the same dataset, with a pipe-delimited text file layer for
//! persistence across segment teardown.

pub mod accounts;
pub mod codec;
pub mod core;
pub mod errors;
pub mod integrity;
pub mod messages;
pub mod reports;
pub mod shutdown;

pub use crate::core::{
    Account, Control, Message, Segment, SegmentInfo, StoreConfig, StoreData, BODY_LEN, EMAIL_LEN,
    MAX_ACCOUNTS, MAX_MESSAGES, NAME_LEN, PASSWORD_LEN, SUBJECT_LEN,
};
pub use crate::errors::StoreError;
