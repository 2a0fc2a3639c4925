//! Generated names, passwords and identifier checks.
//!
//! Every identifier that ends up interpolated into a MySQL statement passes through
//! [`validate_identifier`] first, so statement builders can assume safe input.

use rand::prelude::RngExt;
use rand::rng;

use crate::errors::Error;

/// Longest schema name MySQL accepts
pub const MAX_IDENTIFIER_LEN: usize = 64;
/// Longest account name MySQL 5.7+ accepts
pub const MAX_USERNAME_LEN: usize = 32;

const LOWER_ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brave", "calm", "clever", "crisp", "daring", "eager", "fancy", "gentle", "glad", "golden", "happy", "jolly",
    "keen", "lively", "lucky", "mellow", "nimble", "noble", "proud", "quick", "quiet", "rapid", "shy", "silent", "steady", "sunny",
    "sure", "swift", "tidy", "vivid", "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "beaver", "bison", "condor", "coyote", "crane", "dingo", "falcon", "ferret", "gecko", "heron", "ibis", "jackal",
    "koala", "lemur", "lynx", "marmot", "moose", "newt", "ocelot", "otter", "panda", "puffin", "quokka", "raven", "salmon",
    "sloth", "tapir", "toucan", "vervet", "walrus", "wombat", "yak", "zebra",
];

fn random_from(charset: &[u8], len: usize) -> String {
    let mut rng = rng();
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

/// Random lowercase alphanumeric suffix used for generated database and user names
pub fn random_suffix(len: usize) -> String {
    random_from(LOWER_ALPHANUMERIC, len)
}

/// `<prefix>_<suffix>` with a fresh random suffix
pub fn prefixed_name(prefix: &str, suffix_len: usize) -> String {
    format!("{}_{}", prefix, random_suffix(suffix_len))
}

/// Random mixed-case alphanumeric password
pub fn generate_password(len: usize) -> String {
    random_from(ALPHANUMERIC, len)
}

/// Human-readable adjective-noun pair, e.g. `sure-vervet`
pub fn server_name() -> String {
    let mut rng = rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    format!("{adjective}-{noun}")
}

/// Check that `value` is a bare MySQL identifier: 1 to `max_len` characters of `[A-Za-z0-9_]`.
pub fn validate_identifier(kind: &str, value: &str, max_len: usize) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{kind} must not be empty"),
        });
    }
    if value.len() > max_len {
        return Err(Error::BadRequest {
            message: format!("{kind} '{value}' is longer than {max_len} characters"),
        });
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::BadRequest {
            message: format!("{kind} '{value}' may only contain letters, digits and underscores"),
        });
    }
    Ok(())
}

/// Check that `value` is usable as a DNS-1123 label (cluster object names)
pub fn validate_dns_label(kind: &str, value: &str) -> Result<(), Error> {
    let valid = !value.is_empty()
        && value.len() <= 63
        && value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: format!("{kind} '{value}' is not a valid DNS label"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_name_shape() {
        let name = prefixed_name("provision", 4);
        let (prefix, suffix) = name.split_once('_').unwrap();
        assert_eq!(prefix, "provision");
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(validate_identifier("database name", &name, MAX_IDENTIFIER_LEN).is_ok());
    }

    #[test]
    fn test_generate_password_length_and_charset() {
        let password = generate_password(20);
        assert_eq!(password.len(), 20);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_server_name_is_dns_label() {
        for _ in 0..50 {
            let name = server_name();
            assert!(name.contains('-'));
            validate_dns_label("server name", &name).unwrap();
        }
    }

    #[test]
    fn test_validate_identifier_rejects_injection() {
        assert!(validate_identifier("database name", "", 64).is_err());
        assert!(validate_identifier("database name", "db; DROP DATABASE x", 64).is_err());
        assert!(validate_identifier("username", "bob'@'%", 32).is_err());
        assert!(validate_identifier("username", &"a".repeat(33), 32).is_err());
        assert!(validate_identifier("username", "provision_ab12", 32).is_ok());
    }

    #[test]
    fn test_validate_dns_label() {
        assert!(validate_dns_label("namespace", "mysql").is_ok());
        assert!(validate_dns_label("namespace", "Mysql").is_err());
        assert!(validate_dns_label("namespace", "-mysql").is_err());
        assert!(validate_dns_label("namespace", "").is_err());
    }
}
