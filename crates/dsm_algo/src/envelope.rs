//! The `<answer> reasoning <sep> payload </answer>` response envelope
//! shared by the Ranking Predictor and the Statement Generator.
//!
//! The strict form and the lenient form (opening `<answer>` tag missing)
//! are both parsed by the same hand-written scanner.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("response does not contain a <sep>...</answer> tail")]
    NoTail,
    #[error("response contains </answer> before <sep>")]
    SepAfterClose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub reasoning: String,
    pub payload: String,
}

/// Extract `(reasoning, payload)` from a raw model response.
///
/// Strict form: `<answer> reasoning <sep> payload </answer>`. Lenient
/// fallback: the opening `<answer>` tag is missing but a `<sep>...</answer>`
/// tail is still present; everything before `<sep>` (from the start of the
/// string, or from a stray `<answer>` if one is found) is the reasoning.
pub fn extract_answer(raw: &str) -> Result<Envelope, EnvelopeError> {
    let answer_start = raw.find("<answer>");
    let sep_pos = raw.find("<sep>");
    let close_pos = raw.find("</answer>");

    let (sep_pos, close_pos) = match (sep_pos, close_pos) {
        (Some(s), Some(c)) => (s, c),
        _ => return Err(EnvelopeError::NoTail),
    };
    if close_pos < sep_pos {
        return Err(EnvelopeError::SepAfterClose);
    }

    let reasoning_start = match answer_start {
        Some(a) if a < sep_pos => a + "<answer>".len(),
        _ => 0,
    };
    let reasoning = raw[reasoning_start..sep_pos].trim().to_string();
    let payload_start = sep_pos + "<sep>".len();
    let payload = raw[payload_start..close_pos].trim().to_string();

    Ok(Envelope { reasoning, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_form_parses() {
        let raw = "<answer> some reasoning <sep> C > A = D > B </answer>";
        let env = extract_answer(raw).unwrap();
        assert_eq!(env.reasoning, "some reasoning");
        assert_eq!(env.payload, "C > A = D > B");
    }

    #[test]
    fn missing_opening_tag_falls_back() {
        let raw = "some reasoning <sep> C > A </answer>";
        let env = extract_answer(raw).unwrap();
        assert_eq!(env.reasoning, "some reasoning");
        assert_eq!(env.payload, "C > A");
    }

    #[test]
    fn missing_tail_is_an_error() {
        let raw = "no envelope markers here";
        assert_eq!(extract_answer(raw), Err(EnvelopeError::NoTail));
    }

    #[test]
    fn close_before_sep_is_an_error() {
        let raw = "<answer> reasoning </answer> stray <sep> payload";
        assert_eq!(extract_answer(raw), Err(EnvelopeError::SepAfterClose));
    }
}
