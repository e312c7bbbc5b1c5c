//! Italian fiscal code ("codice fiscale") validation.
//!
//! A fiscal code has the shape `LLLLLL DD L DD L DDD L` (surname, name, year, month, day
//! and sex, place of birth, check letter). The last character is a checksum over the
//! first fifteen: characters at 0-based even indices are mapped through [`ODD_VALUES`],
//! characters at odd indices through their plain ordinal value (digits 0-9, letters
//! 0-25), and the check letter is `'A' + sum % 26`.
//!
//! Omocodia substitutions (letters in place of digits) are not accepted.

const CODE_LEN: usize = 16;

/// Values for the 1st, 3rd, 5th, ... character (1-based "odd" positions), indexed by
/// digit value for `0-9` and by alphabet position for `A-Z`. Digits and the letter of
/// the same ordinal share a value.
const ODD_VALUES: [u32; 26] = [
    1, 0, 5, 7, 9, 13, 15, 17, 19, 21, 2, 4, 18, 20, 11, 3, 6, 8, 12, 14, 16, 10, 22, 25, 24, 23,
];

/// Strips all whitespace and uppercases.
pub fn normalize(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Returns true if `code` is a well-formed fiscal code with a correct check letter.
pub fn validate(code: &str) -> bool {
    let normalized = normalize(code);
    if normalized.len() != CODE_LEN || !matches_layout(normalized.as_bytes()) {
        return false;
    }

    let bytes = normalized.as_bytes();
    check_character(&normalized[..CODE_LEN - 1]) == Some(char::from(bytes[CODE_LEN - 1]))
}

/// Computes the check letter for the first fifteen characters of a fiscal code.
///
/// Returns `None` if `first15` is not exactly fifteen ASCII alphanumerics.
pub fn check_character(first15: &str) -> Option<char> {
    let bytes = first15.as_bytes();
    if bytes.len() != CODE_LEN - 1 {
        return None;
    }

    let mut sum = 0u32;
    for (index, &b) in bytes.iter().enumerate() {
        let b = b.to_ascii_uppercase();
        let ordinal = match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'A'..=b'Z' => u32::from(b - b'A'),
            _ => return None,
        };
        sum += if index % 2 == 0 {
            ODD_VALUES[ordinal as usize]
        } else {
            ordinal
        };
    }

    Some(char::from(b'A' + (sum % 26) as u8))
}

fn matches_layout(bytes: &[u8]) -> bool {
    bytes.iter().enumerate().all(|(i, b)| match i {
        0..=5 | 8 | 11 | 15 => b.is_ascii_uppercase(),
        6 | 7 | 9 | 10 | 12..=14 => b.is_ascii_digit(),
        _ => false,
    })
}
