//! LDAP search filter construction.
//!
//! Pure functions, independent of any connection. Filters follow RFC 4515:
//! `(&<base>(|(<attr>=<user1>)(<attr>=<user2>)...))`.

/// Person accounts only.
pub const PERSON_FILTER: &str = "(objectCategory=person)(objectClass=user)";

/// `LDAP_MATCHING_RULE_BIT_AND`.
pub const MATCHING_RULE_BIT_AND: &str = "1.2.840.113556.1.4.803";

/// Account-control attribute carrying the lock bit.
pub const ACCOUNT_CONTROL_ATTRIBUTE: &str = "userAccountControl";

/// `ACCOUNTDISABLE` flag of the account-control attribute.
pub const LOCK_BIT: u32 = 0x2;

/// Person accounts with the lock bit set.
pub fn locked_filter() -> String {
    format!(
        "{}({}:{}:={})",
        PERSON_FILTER, ACCOUNT_CONTROL_ATTRIBUTE, MATCHING_RULE_BIT_AND, LOCK_BIT
    )
}

/// Combine `base` with one equality clause per username.
///
/// An empty username list yields a presence clause `(<attr>=*)` instead of an
/// empty disjunction, which some servers reject and others treat as false.
pub fn build_filter(base: &str, attribute: &str, usernames: &[String]) -> String {
    let mut filter = String::with_capacity(base.len() + 8 + usernames.len() * 32);
    filter.push_str("(&");
    filter.push_str(base);
    filter.push_str("(|");
    if usernames.is_empty() {
        filter.push('(');
        filter.push_str(attribute);
        filter.push_str("=*)");
    } else {
        for username in usernames {
            filter.push('(');
            filter.push_str(attribute);
            filter.push('=');
            filter.push_str(&escape_filter_value(username));
            filter.push(')');
        }
    }
    filter.push_str("))");
    filter
}

/// Escape special characters in LDAP filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\5c"),
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
