//! Business services behind the handlers: directory access, mail, and the
//! reset token store.

pub mod directory;
pub mod reset_tokens;
