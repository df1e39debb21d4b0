//! Amount in words, as printed on receipts.
//!
//! ```text
//! Rs. 1,250.50  →  "one thousand two hundred fifty rupees and fifty paise"
//! ```

use crate::money::Money;

const UNITS: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

fn two_digit(n: u64) -> String {
    if n < 20 {
        return UNITS[n as usize].to_string();
    }
    let tens = TENS[(n / 10) as usize];
    match n % 10 {
        0 => tens.to_string(),
        unit => format!("{}-{}", tens, UNITS[unit as usize]),
    }
}

fn three_digit(n: u64) -> String {
    if n < 100 {
        return two_digit(n);
    }
    let hundreds = format!("{} hundred", UNITS[(n / 100) as usize]);
    match n % 100 {
        0 => hundreds,
        rest => format!("{} {}", hundreds, two_digit(rest)),
    }
}

/// Spells a whole number using the short scale (thousand, million, billion).
pub fn integer_to_words(n: u64) -> String {
    if n == 0 {
        return UNITS[0].to_string();
    }

    let scales = [
        (n / 1_000_000_000, "billion"),
        ((n / 1_000_000) % 1_000, "million"),
        ((n / 1_000) % 1_000, "thousand"),
    ];

    let mut parts: Vec<String> = scales
        .iter()
        .filter(|(chunk, _)| *chunk > 0)
        .map(|(chunk, scale)| format!("{} {}", three_digit(*chunk), scale))
        .collect();

    let remainder = n % 1_000;
    if remainder > 0 {
        parts.push(three_digit(remainder));
    }

    parts.join(" ")
}

/// Spells an amount as `"{rupees} rupees"` plus `" and {paise} paise"` when
/// there are paise. Negative amounts are spelled by magnitude.
///
/// ## Example
/// ```rust
/// use kirana_core::money::Money;
/// use kirana_core::words::number_to_words;
///
/// assert_eq!(number_to_words(Money::from_paisa(0)), "zero rupees");
/// assert_eq!(
///     number_to_words(Money::from_paisa(125_050)),
///     "one thousand two hundred fifty rupees and fifty paise"
/// );
/// ```
pub fn number_to_words(amount: Money) -> String {
    let abs = amount.abs();
    let rupees = abs.rupees() as u64;
    let paise = abs.paisa_part() as u64;

    let mut words = format!("{} rupees", integer_to_words(rupees));
    if paise > 0 {
        words.push_str(&format!(" and {} paise", two_digit(paise)));
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_numbers() {
        assert_eq!(integer_to_words(7), "seven");
        assert_eq!(integer_to_words(19), "nineteen");
        assert_eq!(integer_to_words(20), "twenty");
        assert_eq!(integer_to_words(45), "forty-five");
    }

    #[test]
    fn test_hundreds_and_scales() {
        assert_eq!(integer_to_words(100), "one hundred");
        assert_eq!(integer_to_words(305), "three hundred five");
        assert_eq!(integer_to_words(1_000), "one thousand");
        assert_eq!(
            integer_to_words(2_001_010),
            "two million one thousand ten"
        );
        assert_eq!(
            integer_to_words(3_000_000_999),
            "three billion nine hundred ninety-nine"
        );
    }

    #[test]
    fn test_rupees_and_paise() {
        assert_eq!(number_to_words(Money::from_paisa(10_000)), "one hundred rupees");
        assert_eq!(
            number_to_words(Money::from_paisa(5)),
            "zero rupees and five paise"
        );
        assert_eq!(
            number_to_words(Money::from_paisa(2_199)),
            "twenty-one rupees and ninety-nine paise"
        );
    }
}
