//! A1-style cell references.

/// Converts zero-based (row, col) into an A1 reference, e.g. (0, 27) is `AB1`.
pub fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::<u8>::new();
    let mut col = col + 1;
    while col > 0 {
        col -= 1;
        letters.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    letters.reverse();
    let mut reference = String::from_utf8_lossy(&letters).into_owned();
    reference.push_str(&(row + 1).to_string());
    reference
}

/// Parses an A1 reference into zero-based (row, col). Column letters are
/// case-insensitive and `$` anchors are ignored.
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut col = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col.checked_mul(26)?.checked_add((c.to_ascii_uppercase() as u8 - b'A') as usize + 1)?;
    }
    let row = digits.parse::<usize>().ok()?.checked_sub(1)?;
    Some((row, col - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_reference() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(1, 25), "Z2");
        assert_eq!(index_to_reference(0, 26), "AA1");
        assert_eq!(index_to_reference(9, 27), "AB10");
        assert_eq!(index_to_reference(0, 701), "ZZ1");
        assert_eq!(index_to_reference(0, 702), "AAA1");
    }

    #[test]
    fn from_reference() {
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("v1"), Some((0, 21)));
        assert_eq!(reference_to_index("$AB$10"), Some((9, 27)));
        assert_eq!(reference_to_index("AAA1"), Some((0, 702)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("A"), None);
        assert_eq!(reference_to_index("A1B"), None);
    }
}
