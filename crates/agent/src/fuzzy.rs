//! Edit-distance matching over specialty names

/// Largest edit distance still treated as the same specialty
pub const MAX_EDIT_DISTANCE: usize = 3;

/// Levenshtein distance over characters
///
/// Full `(len(a)+1) x (len(b)+1)` table, unit cost for insertion, deletion
/// and substitution.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a.len()][b.len()]
}

/// Lowercased with surrounding whitespace and quote characters removed
pub fn normalize(s: &str) -> String {
    s.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c.is_whitespace())
        .to_lowercase()
}

/// Within [`MAX_EDIT_DISTANCE`], or either name contains the other
pub fn specialty_matches(candidate: &str, target: &str) -> bool {
    let candidate = normalize(candidate);
    let target = normalize(target);
    if candidate.is_empty() || target.is_empty() {
        return false;
    }

    levenshtein(&candidate, &target) <= MAX_EDIT_DISTANCE
        || candidate.contains(&target)
        || target.contains(&candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", "abcd"), 4);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("Cardiologist", "Cardiologist"), 0);
    }

    #[test]
    fn test_levenshtein_is_symmetric() {
        for (a, b) in [("flaw", "lawn"), ("ENT", "ent"), ("Dermatologist", "Neurologist")] {
            assert_eq!(levenshtein(a, b), levenshtein(b, a));
        }
    }

    #[test]
    fn test_close_spelling_matches() {
        assert!(levenshtein("Cardiologist", "Cardiologyst") <= MAX_EDIT_DISTANCE);
        assert!(specialty_matches("Cardiologist", "Cardiologyst"));
    }

    #[test]
    fn test_distinct_specialties_do_not_match() {
        assert!(levenshtein("Dermatologist", "Neurologist") > MAX_EDIT_DISTANCE);
        assert!(!specialty_matches("Dermatologist", "Neurologist"));
    }

    #[test]
    fn test_substring_and_quotes() {
        assert!(specialty_matches("Pediatric Cardiologist", "\"cardiologist\""));
        assert!(specialty_matches("'ENT'", "ent specialist"));
        assert!(!specialty_matches("", "Cardiologist"));
    }
}
