//! Small pure helpers: reference generation, notification parsing and the credential import format.
mod notification_parser;
mod references;

pub use notification_parser::{parse_amount, parse_payment_message, ParsedPayment};
pub use references::{new_order_ref, new_topup_ref};

use log::warn;

use crate::db_types::NewCredential;

/// Parses the pipe-delimited credential import format, one credential per line:
/// `login|password|pin|extra_info`, with `-` standing in for an absent pin or extra field.
/// Lines that do not carry at least a login and a password are skipped with a warning.
/// Returns the parsed credentials and the number of skipped lines.
pub fn parse_credential_lines(product_id: i64, input: &str) -> (Vec<NewCredential>, usize) {
    let mut skipped = 0;
    let credentials = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.split('|').map(str::trim);
            let login = parts.next().unwrap_or_default();
            let password = parts.next().unwrap_or_default();
            if login.is_empty() || password.is_empty() {
                warn!("Skipping malformed credential line: {line}");
                skipped += 1;
                return None;
            }
            let pin = parts.next().filter(|s| !s.is_empty() && *s != "-").map(String::from);
            let extra_info = parts.next().filter(|s| !s.is_empty() && *s != "-").map(String::from);
            Some(NewCredential { product_id, login: login.into(), password: password.into(), pin, extra_info })
        })
        .collect();
    (credentials, skipped)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn import_parses_pipe_lines() {
        let input = "alice@mail.com|pw1|1234|slot 1\nbob@mail.com|pw2|-|-\n\ncarol@mail.com|pw3\n";
        let (creds, skipped) = parse_credential_lines(42, input);
        assert_eq!(skipped, 0);
        assert_eq!(creds.len(), 3);
        assert_eq!(creds[0].pin.as_deref(), Some("1234"));
        assert_eq!(creds[0].extra_info.as_deref(), Some("slot 1"));
        assert!(creds[1].pin.is_none());
        assert!(creds[1].extra_info.is_none());
        assert_eq!(creds[2].login, "carol@mail.com");
        assert!(creds.iter().all(|c| c.product_id == 42));
    }

    #[test]
    fn import_skips_malformed_lines() {
        let input = "ok@mail.com|pw\nno-password\n|missing-login\n";
        let (creds, skipped) = parse_credential_lines(1, input);
        assert_eq!(creds.len(), 1);
        assert_eq!(skipped, 2);
    }
}
