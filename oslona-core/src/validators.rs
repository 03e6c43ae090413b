// File: oslona-core/src/validators.rs
//! Programmatic checksum validation for rigid identifier formats.
//!
//! This module provides validation logic beyond regular expression matching
//! for Polish national identifiers (PESEL, NIP, REGON, identity card),
//! IBANs, and payment cards. A format match whose checksum fails is
//! suppressed entirely rather than down-weighted: this is the primary
//! false-positive containment mechanism for invoice and reference numbers
//! that mimic identifier formats.
//!
//! License: MIT OR APACHE 2.0

/// Strips everything but ASCII digits.
fn digits_of(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Strips everything but ASCII alphanumerics, uppercased.
fn alnum_upper_of(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validates a PESEL (Polish national identification number).
///
/// Eleven digits; the last is a control digit computed from weights
/// [1, 3, 7, 9, 1, 3, 7, 9, 1, 3] modulo 10. Separators in the input
/// are ignored.
pub fn is_valid_pesel(pesel: &str) -> bool {
    let s = digits_of(pesel);
    if s.len() != 11 {
        return false;
    }
    const WEIGHTS: [u32; 10] = [1, 3, 7, 9, 1, 3, 7, 9, 1, 3];
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    let control: u32 = digits[..10]
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    (10 - (control % 10)) % 10 == digits[10]
}

/// Validates a NIP (Polish tax identification number).
///
/// Ten digits; control digit is the weighted sum modulo 11, with a
/// remainder of 10 deemed invalid outright.
pub fn is_valid_nip(nip: &str) -> bool {
    let s = digits_of(nip);
    if s.len() != 10 {
        return false;
    }
    const WEIGHTS: [u32; 9] = [6, 5, 7, 2, 3, 4, 5, 6, 7];
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    let control: u32 = digits[..9]
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum::<u32>()
        % 11;
    if control == 10 {
        return false;
    }
    control == digits[9]
}

/// Validates a REGON (Polish business registry number), 9 or 14 digits.
/// The 14-digit form must also carry a valid 9-digit base.
pub fn is_valid_regon(regon: &str) -> bool {
    let s = digits_of(regon);
    match s.len() {
        9 => regon9_valid(&s),
        14 => {
            if !regon9_valid(&s[..9]) {
                return false;
            }
            const WEIGHTS: [u32; 13] = [2, 3, 4, 5, 6, 7, 8, 9, 2, 3, 4, 5, 6];
            let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
            let mut control: u32 = digits[..13]
                .iter()
                .zip(WEIGHTS.iter())
                .map(|(d, w)| d * w)
                .sum::<u32>()
                % 11;
            if control == 10 {
                control = 0;
            }
            control == digits[13]
        }
        _ => false,
    }
}

fn regon9_valid(s: &str) -> bool {
    const WEIGHTS: [u32; 8] = [8, 9, 2, 3, 4, 5, 6, 7];
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 9 {
        return false;
    }
    let mut control: u32 = digits[..8]
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum::<u32>()
        % 11;
    if control == 10 {
        control = 0;
    }
    control == digits[8]
}

/// Validates a Polish identity card number.
///
/// Format: 3 letters + 6 digits, where the 4th character (first digit)
/// is a control digit over positions [0, 1, 2, 4, 5, 6, 7, 8] with
/// weights [7, 3, 1, 7, 3, 1, 7, 3]. Letters map A=10 .. Z=35.
pub fn is_valid_polish_id_card(doc: &str) -> bool {
    let s = alnum_upper_of(doc);
    if s.len() != 9 {
        return false;
    }
    let bytes = s.as_bytes();
    if !bytes[..3].iter().all(u8::is_ascii_uppercase) || !bytes[3..].iter().all(u8::is_ascii_digit) {
        return false;
    }
    fn char_val(c: u8) -> u32 {
        if c.is_ascii_digit() {
            (c - b'0') as u32
        } else {
            10 + (c - b'A') as u32
        }
    }
    const WEIGHTS: [u32; 8] = [7, 3, 1, 7, 3, 1, 7, 3];
    const POSITIONS: [usize; 8] = [0, 1, 2, 4, 5, 6, 7, 8];
    let total: u32 = POSITIONS
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(&pos, w)| char_val(bytes[pos]) * w)
        .sum();
    total % 10 == (bytes[3] - b'0') as u32
}

/// Validates an IBAN via the mod-97 checksum over the rearranged,
/// letter-expanded form. Polish IBANs must additionally be exactly 28
/// characters.
pub fn is_valid_iban(iban: &str) -> bool {
    let raw = alnum_upper_of(iban);
    if raw.len() < 15 || raw.len() > 34 {
        return false;
    }
    if raw.starts_with("PL") && raw.len() != 28 {
        return false;
    }
    if !raw.as_bytes()[..2].iter().all(u8::is_ascii_uppercase) {
        return false;
    }
    let rearranged = format!("{}{}", &raw[4..], &raw[..4]);
    // Streaming mod 97, expanding letters to two-digit values.
    let mut remainder: u64 = 0;
    for c in rearranged.bytes() {
        if c.is_ascii_digit() {
            remainder = (remainder * 10 + (c - b'0') as u64) % 97;
        } else {
            let v = 10 + (c - b'A') as u64;
            remainder = (remainder * 100 + v) % 97;
        }
    }
    remainder == 1
}

/// Validates a number using the Luhn algorithm.
///
/// The Luhn algorithm, also known as the Mod 10 algorithm, is a simple
/// checksum formula used to validate payment card numbers.
pub fn is_valid_luhn(num_str: &str) -> bool {
    let mut sum = 0u32;
    let mut alternate = false;

    for c in num_str.chars().rev() {
        let Some(mut digit) = c.to_digit(10) else { return false; };

        if alternate {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        alternate = !alternate;
    }

    sum % 10 == 0
}

/// Validates a payment card number: 13-19 digits passing Luhn. Strips
/// separators before checking.
pub fn is_valid_card(cc_number: &str) -> bool {
    let digits = digits_of(cc_number);
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    is_valid_luhn(&digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pesel_accepts_valid_and_rejects_invalid_checksum() {
        assert!(is_valid_pesel("44051401359"));
        assert!(is_valid_pesel("44 05 14 01 359"));
        assert!(!is_valid_pesel("44051401358"));
        assert!(!is_valid_pesel("4405140135"));
    }

    #[test]
    fn nip_checksum() {
        assert!(is_valid_nip("1234563218"));
        assert!(is_valid_nip("123-456-32-18"));
        assert!(!is_valid_nip("1234563217"));
    }

    #[test]
    fn regon_nine_digit_checksum() {
        assert!(is_valid_regon("123456785"));
        assert!(!is_valid_regon("123456786"));
        assert!(!is_valid_regon("12345678"));
    }

    #[test]
    fn id_card_checksum() {
        assert!(is_valid_polish_id_card("ABC412345"));
        assert!(is_valid_polish_id_card("abc 412345"));
        assert!(!is_valid_polish_id_card("ABC512345"));
        assert!(!is_valid_polish_id_card("AB3412345"));
    }

    #[test]
    fn iban_mod97() {
        assert!(is_valid_iban("PL61109010140000071219812874"));
        assert!(is_valid_iban("PL61 1090 1014 0000 0712 1981 2874"));
        assert!(!is_valid_iban("PL62109010140000071219812874"));
        // PL IBANs must be exactly 28 characters.
        assert!(!is_valid_iban("PL611090101400000712198128"));
    }

    #[test]
    fn card_luhn() {
        assert!(is_valid_card("4111 1111 1111 1111"));
        assert!(!is_valid_card("4111 1111 1111 1112"));
        assert!(!is_valid_card("411111111111"));
    }
}
