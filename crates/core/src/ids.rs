//! Record id and flow token generation

use rand::distributions::Alphanumeric;
use rand::Rng;

const RECORD_SUFFIX_LEN: usize = 8;

/// Prefix of a generated record id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPrefix {
    Appointment,
    Ticket,
    CheckIn,
}

impl RecordPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appointment => "APT",
            Self::Ticket => "TIC",
            Self::CheckIn => "CHK",
        }
    }
}

/// `<PREFIX>-<8 alphanumeric chars>`, e.g. `APT-x7Kq2M9a`
pub fn generate_record_id(prefix: RecordPrefix) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RECORD_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix.as_str(), suffix)
}

/// Six digit numeric token correlating an interactive flow with its submission
pub fn generate_flow_token() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_format() {
        for (prefix, expected) in [
            (RecordPrefix::Appointment, "APT-"),
            (RecordPrefix::Ticket, "TIC-"),
            (RecordPrefix::CheckIn, "CHK-"),
        ] {
            let id = generate_record_id(prefix);
            assert!(id.starts_with(expected));
            assert_eq!(id.len(), 12);
            assert!(id[4..].chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_flow_token_format() {
        for _ in 0..100 {
            let token = generate_flow_token();
            assert_eq!(token.len(), 6);
            assert!(token.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
