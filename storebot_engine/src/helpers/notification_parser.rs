use regex::Regex;
use sbt_common::Rupiah;

/// The pieces extracted from a free-text payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayment {
    pub amount: Rupiah,
    pub payer: String,
}

/// Extracts the amount and payer name from a relayed payment notification of the form
/// `"Pembayaran Rp 50.127 dari BUDI SANTOSO berhasil"`. Thousands separators (both `.` and `,`) are
/// stripped from the amount. Returns `None` if the text does not match.
pub fn parse_payment_message(text: &str) -> Option<ParsedPayment> {
    let re = Regex::new(r"Pembayaran\s+Rp\s*([\d.,]+)\s+dari\s+(.+?)\s+berhasil").unwrap();
    let caps = re.captures(text)?;
    let amount = parse_amount(caps.get(1)?.as_str())?;
    let payer = caps.get(2)?.as_str().trim().to_string();
    Some(ParsedPayment { amount, payer })
}

/// Parses a formatted rupiah amount (`"50.127"`, `"1,250,000"`) into a [`Rupiah`] value.
pub fn parse_amount(raw: &str) -> Option<Rupiah> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(Rupiah::from)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_standard_notification() {
        let p = parse_payment_message("Pembayaran Rp 50.127 dari BUDI SANTOSO berhasil").unwrap();
        assert_eq!(p.amount, Rupiah::from(50_127));
        assert_eq!(p.payer, "BUDI SANTOSO");
    }

    #[test]
    fn parses_without_space_after_rp() {
        let p = parse_payment_message("Pembayaran Rp1.250.000 dari TOKO MAJU berhasil diterima").unwrap();
        assert_eq!(p.amount, Rupiah::from(1_250_000));
        assert_eq!(p.payer, "TOKO MAJU");
    }

    #[test]
    fn parses_comma_separators() {
        assert_eq!(parse_amount("1,250,000"), Some(Rupiah::from(1_250_000)));
        assert_eq!(parse_amount("999"), Some(Rupiah::from(999)));
        assert_eq!(parse_amount("garbage"), None);
    }

    #[test]
    fn rejects_unrelated_text() {
        assert!(parse_payment_message("Transfer Rp 50.000 ke BUDI gagal").is_none());
        assert!(parse_payment_message("").is_none());
    }
}
