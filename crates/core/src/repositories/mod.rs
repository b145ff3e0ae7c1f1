//! Repository functions.
//!
//! Plain functions over a borrowed [`rusqlite::Connection`] that map rows to and from the
//! record types. Relationships are explicit queries (`WHERE patient_id = ?`), never implicit
//! collections. Because [`rusqlite::Transaction`] derefs to `Connection`, the same functions
//! compose inside a service transaction.

pub mod appointments;
pub mod patients;
pub mod questionnaires;
pub(crate) mod shared;
