//! Card validation
//!
//! Luhn checksum plus the CVV/expiry/format rules applied when a card is
//! stored and when an authorization presents card data.

use crate::core::traits::CardValidator;
use crate::types::{Card, PaymentError};
use chrono::{Datelike, NaiveDate};

/// Shortest accepted card number
pub const MIN_CARD_NUMBER_LEN: usize = 13;

/// Longest accepted card number
pub const MAX_CARD_NUMBER_LEN: usize = 19;

/// Standard card validator
#[derive(Debug, Clone, Copy, Default)]
pub struct LuhnCardValidator;

impl LuhnCardValidator {
    pub fn new() -> Self {
        LuhnCardValidator
    }
}

/// Length and Luhn checksum check
///
/// Walking from the rightmost digit, every second digit is doubled (minus 9
/// when the result exceeds 9); the number is valid iff the digit sum is a
/// multiple of 10. Any non-digit character fails the check.
pub fn luhn_valid(number: &str) -> bool {
    if !(MIN_CARD_NUMBER_LEN..=MAX_CARD_NUMBER_LEN).contains(&number.len()) {
        return false;
    }

    let mut sum = 0u32;
    for (position, ch) in number.chars().rev().enumerate() {
        let Some(mut digit) = ch.to_digit(10) else {
            return false;
        };
        if position % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    sum % 10 == 0
}

impl CardValidator for LuhnCardValidator {
    fn validate_luhn_number(&self, number: &str) -> bool {
        luhn_valid(number)
    }

    fn validate_existing(
        &self,
        card: &Card,
        cvv: &str,
        expiration_month: u32,
        expiration_year: i32,
    ) -> Result<(), PaymentError> {
        if card.cvv != cvv {
            return Err(PaymentError::NoMatchCvv);
        }

        if card.expiration_month != expiration_month || card.expiration_year != expiration_year {
            return Err(PaymentError::NoMatchExpiration);
        }

        Ok(())
    }

    fn validate_new_card(&self, card: &Card, today: NaiveDate) -> Result<(), PaymentError> {
        let month = card.expiration_month;
        let year = card.expiration_year;

        if !(1..=12).contains(&month) {
            return Err(PaymentError::InvalidMonth { month });
        }

        if year < today.year() || (year == today.year() && month < today.month()) {
            return Err(PaymentError::CardExpired { month, year });
        }

        if !(3..=4).contains(&card.cvv.len()) || !card.cvv.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::InvalidCvv);
        }

        if !luhn_valid(&card.number) {
            return Err(PaymentError::invalid_card_number(&card.number));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn card(number: &str, cvv: &str, month: u32, year: i32) -> Card {
        Card {
            number: number.to_string(),
            cvv: cvv.to_string(),
            currency: Currency::new("USD"),
            expiration_month: month,
            expiration_year: year,
        }
    }

    #[rstest]
    #[case::visa_test_card("4000000000000119")]
    #[case::visa_classic("4111111111111111")]
    #[case::mastercard("5555555555554444")]
    #[case::amex_15_digits("378282246310005")]
    #[case::nineteen_digits("4000000000000000006")]
    fn test_luhn_accepts_valid_numbers(#[case] number: &str) {
        assert!(luhn_valid(number));
    }

    #[rstest]
    #[case::bad_checksum("4000000000004422")]
    #[case::twelve_digits("400000000006")]
    #[case::twenty_digits("40000000000000000006")]
    #[case::empty("")]
    #[case::letters("40000000000001a9")]
    #[case::spaces("4000 0000 0000 0119")]
    fn test_luhn_rejects_invalid_numbers(#[case] number: &str) {
        assert!(!luhn_valid(number));
    }

    #[test]
    fn test_luhn_rejects_every_length_outside_bounds() {
        for len in (1..MIN_CARD_NUMBER_LEN).chain(MAX_CARD_NUMBER_LEN + 1..25) {
            // all zeros has checksum 0, so only the length check can reject it
            let number = "0".repeat(len);
            assert!(!luhn_valid(&number), "length {} should be rejected", len);
        }
    }

    #[test]
    fn test_luhn_detects_any_single_digit_change() {
        let valid = "4000000000000119";
        for position in 0..valid.len() {
            for replacement in b'0'..=b'9' {
                let mut mutated = valid.as_bytes().to_vec();
                if mutated[position] == replacement {
                    continue;
                }
                mutated[position] = replacement;
                let mutated = String::from_utf8(mutated).unwrap();
                assert!(!luhn_valid(&mutated), "{} should be invalid", mutated);
            }
        }
    }

    #[rstest]
    #[case::matches("123", 1, 2031, Ok(()))]
    #[case::wrong_cvv("124", 1, 2031, Err(PaymentError::NoMatchCvv))]
    #[case::wrong_month("123", 2, 2031, Err(PaymentError::NoMatchExpiration))]
    #[case::wrong_year("123", 1, 2032, Err(PaymentError::NoMatchExpiration))]
    #[case::cvv_checked_first("999", 2, 2032, Err(PaymentError::NoMatchCvv))]
    fn test_validate_existing(
        #[case] cvv: &str,
        #[case] month: u32,
        #[case] year: i32,
        #[case] expected: Result<(), PaymentError>,
    ) {
        let stored = card("4000000000000119", "123", 1, 2031);
        let validator = LuhnCardValidator::new();
        assert_eq!(validator.validate_existing(&stored, cvv, month, year), expected);
    }

    #[test]
    fn test_validate_existing_does_not_check_expiry_in_past() {
        let stored = card("4000000000000119", "123", 1, 2001);
        let validator = LuhnCardValidator::new();
        assert_eq!(validator.validate_existing(&stored, "123", 1, 2001), Ok(()));
    }

    #[rstest]
    #[case::valid(card("4000000000000119", "123", 6, 2026), Ok(()))]
    #[case::four_digit_cvv(card("378282246310005", "1234", 1, 2030), Ok(()))]
    #[case::month_zero(
        card("4000000000000119", "123", 0, 2030),
        Err(PaymentError::InvalidMonth { month: 0 })
    )]
    #[case::month_thirteen(
        card("4000000000000119", "123", 13, 2030),
        Err(PaymentError::InvalidMonth { month: 13 })
    )]
    #[case::past_year(
        card("4000000000000119", "123", 12, 2025),
        Err(PaymentError::CardExpired { month: 12, year: 2025 })
    )]
    #[case::past_month_this_year(
        card("4000000000000119", "123", 5, 2026),
        Err(PaymentError::CardExpired { month: 5, year: 2026 })
    )]
    #[case::short_cvv(card("4000000000000119", "12", 1, 2030), Err(PaymentError::InvalidCvv))]
    #[case::long_cvv(card("4000000000000119", "12345", 1, 2030), Err(PaymentError::InvalidCvv))]
    #[case::non_digit_cvv(card("4000000000000119", "12a", 1, 2030), Err(PaymentError::InvalidCvv))]
    #[case::bad_luhn(
        card("4000000000004422", "123", 1, 2030),
        Err(PaymentError::invalid_card_number("4000000000004422"))
    )]
    #[case::too_short(
        card("400000000006", "123", 1, 2030),
        Err(PaymentError::invalid_card_number("400000000006"))
    )]
    fn test_validate_new_card(#[case] card: Card, #[case] expected: Result<(), PaymentError>) {
        let validator = LuhnCardValidator::new();
        assert_eq!(validator.validate_new_card(&card, today()), expected);
    }
}
