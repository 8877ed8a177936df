use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USER_ID_FORBIDDEN: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Maps an email to the user id shared by the database and the messaging
/// directory: every character outside `[A-Za-z0-9_-]` becomes `_`.
///
/// Not injective: `a.b@x.io` and `a_b@x.io` collide.
pub fn derive_user_id(email: &str) -> String {
    USER_ID_FORBIDDEN.replace_all(email, "_").into_owned()
}
