//! Human-readable identifiers: account numbers, item codes and bill numbers.
//!
//! Formats:
//! - account number: `ACC-YYYYMMDD-XXXX`
//! - item code: `ITM-YYYYMMDD-XXXX`
//! - bill number: `BILL-NNNNNN`
//!
//! `XXXX` is four characters drawn from `[A-Z0-9]`. Uniqueness of the random
//! codes is established by the caller (redrawing against the store);
//! bill numbers come from a store-side sequence.

use chrono::NaiveDate;
use rand::Rng;

/// Prefix for customer account numbers.
pub const ACCOUNT_NUMBER_PREFIX: &str = "ACC";

/// Prefix for item codes.
pub const ITEM_CODE_PREFIX: &str = "ITM";

/// Prefix for bill numbers.
pub const BILL_NUMBER_PREFIX: &str = "BILL";

/// Length of the random suffix of dated codes.
pub const SUFFIX_LEN: usize = 4;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate `<PREFIX>-<YYYYMMDD>-<XXXX>` for the given date.
pub fn dated_code<R: Rng + ?Sized>(prefix: &str, date: NaiveDate, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}-{}-{suffix}", date.format("%Y%m%d"))
}

/// Generate a customer account number (`ACC-YYYYMMDD-XXXX`).
pub fn account_number<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> String {
    dated_code(ACCOUNT_NUMBER_PREFIX, date, rng)
}

/// Generate an item code (`ITM-YYYYMMDD-XXXX`).
pub fn item_code<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> String {
    dated_code(ITEM_CODE_PREFIX, date, rng)
}

/// Format a bill number from a sequence value (`BILL-000042`).
pub fn bill_number(sequence: u64) -> String {
    format!("{BILL_NUMBER_PREFIX}-{sequence:06}")
}

/// Whether `code` has the `<PREFIX>-<YYYYMMDD>-<XXXX>` shape.
pub fn is_dated_code(prefix: &str, code: &str) -> bool {
    let mut parts = code.split('-');
    let (Some(p), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    // chrono accepts one-digit months and days for `%m`/`%d`.
    p == prefix
        && date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    #[test]
    fn account_number_has_expected_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let code = account_number(date(), &mut rng);
        assert!(code.starts_with("ACC-20240307-"), "{code}");
        assert!(is_dated_code(ACCOUNT_NUMBER_PREFIX, &code));
    }

    #[test]
    fn item_code_has_expected_shape() {
        let mut rng = StdRng::seed_from_u64(2);
        let code = item_code(date(), &mut rng);
        assert!(is_dated_code(ITEM_CODE_PREFIX, &code), "{code}");
        assert!(!is_dated_code(ACCOUNT_NUMBER_PREFIX, &code));
    }

    #[test]
    fn bill_number_is_zero_padded() {
        assert_eq!(bill_number(1), "BILL-000001");
        assert_eq!(bill_number(123456), "BILL-123456");
    }

    #[test]
    fn same_seed_same_code_next_draw_differs() {
        let mut rng = StdRng::seed_from_u64(7);
        let first = account_number(date(), &mut rng);
        let second = account_number(date(), &mut rng);

        assert_eq!(first, account_number(date(), &mut StdRng::seed_from_u64(7)));
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_codes_are_recognized() {
        assert!(!is_dated_code("ACC", "ACC-2024037-ABCD"));
        assert!(!is_dated_code("ACC", "ACC-20240307-abcd"));
        assert!(!is_dated_code("ACC", "ACC-20240307-ABCDE"));
        assert!(!is_dated_code("ACC", "ACC-20240307-ABCD-X"));
        assert!(!is_dated_code("ITM", "ITM-202437-ABCD"));
        assert!(!is_dated_code("ACC", "ACC-2024-3-7-ABCD"));
        assert!(!is_dated_code("ACC", "ACC-20240230-ABCD"));
    }

    proptest! {
        #[test]
        fn generated_codes_always_have_the_dated_shape(
            seed in any::<u64>(),
            days in 0i64..60_000,
        ) {
            let day = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Duration::days(days);
            let mut rng = StdRng::seed_from_u64(seed);

            let account = account_number(day, &mut rng);
            let item = item_code(day, &mut rng);

            prop_assert_eq!(account.len(), "ACC-YYYYMMDD-XXXX".len());
            prop_assert!(is_dated_code(ACCOUNT_NUMBER_PREFIX, &account), "{}", account);
            prop_assert!(is_dated_code(ITEM_CODE_PREFIX, &item), "{}", item);
            let expected_date = day.format("%Y%m%d").to_string();
            prop_assert_eq!(account.split('-').nth(1), Some(expected_date.as_str()));
        }

        #[test]
        fn bill_numbers_keep_at_least_six_digits(sequence in 1u64..10_000_000) {
            let number = bill_number(sequence);
            let digits = number.strip_prefix("BILL-").unwrap();

            prop_assert!(digits.len() >= 6);
            prop_assert!(digits.bytes().all(|b| b.is_ascii_digit()));
            prop_assert_eq!(digits.parse::<u64>().unwrap(), sequence);
        }
    }
}
