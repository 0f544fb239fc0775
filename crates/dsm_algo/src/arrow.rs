//! Arrow-notation ranking grammar: `C > A = D > B`.
//!
//! A rank vector is `Vec<i32>` indexed by candidate position (letter `A` is
//! index 0, `B` is index 1, ...); smaller is better; [`MOCK`] marks an
//! abstaining row. Grammar: `[A-Z]((>|=)[A-Z])*` after whitespace removal,
//! no candidate repeated, no leading/trailing `=`, no `=>`, no `>>`.

/// Sentinel rank marking an abstaining row. A partial row (some cells MOCK,
/// some not) is invalid — callers must check `is_fully_mock` before trusting
/// an individual non-MOCK cell.
pub const MOCK: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArrowError {
    #[error("empty ranking string")]
    Empty,
    #[error("malformed arrow-notation grammar at byte offset {0}")]
    Malformed(usize),
    #[error("candidate '{0}' appears more than once")]
    DuplicateCandidate(char),
    #[error("candidate letter '{0}' is out of the expected A..Z range")]
    LetterOutOfRange(char),
}

/// True iff every cell equals [`MOCK`].
pub fn is_fully_mock(row: &[i32]) -> bool {
    !row.is_empty() && row.iter().all(|&r| r == MOCK)
}

/// True iff some but not all cells equal [`MOCK`] — an invalid, partially
/// abstaining row.
pub fn is_partially_mock(row: &[i32]) -> bool {
    let mocked = row.iter().filter(|&&r| r == MOCK).count();
    mocked > 0 && mocked < row.len()
}

/// Map an arbitrary integer vector to consecutive 0-based ranks, preserving
/// order and ties: `[0, 2, 5, 5] -> [0, 1, 2, 2]`.
pub fn normalize(values: &[i32]) -> Vec<i32> {
    let mut sorted: Vec<i32> = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    values
        .iter()
        .map(|v| sorted.binary_search(v).expect("value present in sorted dedup set") as i32)
        .collect()
}

/// Parse an arrow-notation string into a rank vector indexed by candidate
/// letter (`A` = index 0). The returned vector's length equals
/// `1 + highest letter index seen`; callers validate that length against the
/// expected candidate count `K`.
pub fn parse_arrow(input: &str) -> Result<Vec<i32>, ArrowError> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(ArrowError::Empty);
    }

    let bytes: Vec<char> = cleaned.chars().collect();
    let mut pos = 0usize;
    let mut seen = [false; 26];
    let mut ranks: Vec<i32> = Vec::new();
    let mut current_rank: i32 = 0;

    let letter_index = |c: char, at: usize| -> Result<usize, ArrowError> {
        if !c.is_ascii_uppercase() {
            return Err(ArrowError::Malformed(at));
        }
        Ok((c as u8 - b'A') as usize)
    };

    // First token must be a letter.
    let first = bytes[pos];
    let idx = letter_index(first, pos)?;
    seen[idx] = true;
    ensure_len(&mut ranks, idx);
    ranks[idx] = current_rank;
    pos += 1;

    while pos < bytes.len() {
        let op = bytes[pos];
        if op != '>' && op != '=' {
            return Err(ArrowError::Malformed(pos));
        }
        pos += 1;
        if pos >= bytes.len() {
            // trailing operator: "no leading/trailing =" and no dangling '>'
            return Err(ArrowError::Malformed(pos));
        }
        let c = bytes[pos];
        let idx = letter_index(c, pos)?;
        if seen[idx] {
            return Err(ArrowError::DuplicateCandidate(c));
        }
        seen[idx] = true;
        if op == '>' {
            current_rank += 1;
        }
        ensure_len(&mut ranks, idx);
        ranks[idx] = current_rank;
        pos += 1;
    }

    Ok(ranks)
}

fn ensure_len(v: &mut Vec<i32>, idx: usize) {
    if v.len() <= idx {
        v.resize(idx + 1, 0);
    }
}

/// Render a rank vector back into arrow notation: candidates grouped by tied
/// rank (ascending), ties joined with `=`, groups joined with `>`.
pub fn render_arrow(ranks: &[i32]) -> Result<String, ArrowError> {
    if ranks.len() > 26 {
        return Err(ArrowError::LetterOutOfRange('?'));
    }
    let mut by_rank: Vec<(i32, char)> = ranks
        .iter()
        .enumerate()
        .map(|(i, &r)| (r, (b'A' + i as u8) as char))
        .collect();
    by_rank.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut groups: Vec<Vec<char>> = Vec::new();
    let mut last_rank: Option<i32> = None;
    for (r, c) in by_rank {
        if Some(r) == last_rank {
            groups.last_mut().unwrap().push(c);
        } else {
            groups.push(vec![c]);
            last_rank = Some(r);
        }
    }

    let rendered = groups
        .iter()
        .map(|g| {
            g.iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" = ")
        })
        .collect::<Vec<_>>()
        .join(" > ");
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_chain() {
        let v = parse_arrow("C > A = D > B").unwrap();
        // A=1, B=3, C=0, D=1
        assert_eq!(v, vec![1, 3, 0, 1]);
    }

    #[test]
    fn rejects_duplicate_candidate() {
        assert!(matches!(
            parse_arrow("A > B > A"),
            Err(ArrowError::DuplicateCandidate('A'))
        ));
    }

    #[test]
    fn rejects_trailing_operator() {
        assert!(parse_arrow("A >").is_err());
    }

    #[test]
    fn rejects_leading_operator() {
        assert!(parse_arrow("= A > B").is_err());
    }

    #[test]
    fn rejects_double_gt() {
        assert!(parse_arrow("A >> B").is_err());
    }

    #[test]
    fn round_trips_through_render() {
        let original = vec![1, 3, 0, 1];
        let rendered = render_arrow(&original).unwrap();
        let reparsed = parse_arrow(&rendered).unwrap();
        assert_eq!(normalize(&original), normalize(&reparsed));
    }

    #[test]
    fn normalize_matches_spec_example() {
        assert_eq!(normalize(&[0, 2, 5, 5]), vec![0, 1, 2, 2]);
    }

    #[test]
    fn fully_mock_row_detected() {
        assert!(is_fully_mock(&[MOCK, MOCK, MOCK]));
        assert!(!is_partially_mock(&[MOCK, MOCK, MOCK]));
        assert!(is_partially_mock(&[MOCK, 0, 1]));
    }
}
