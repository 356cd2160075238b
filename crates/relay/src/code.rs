//! Room code generation.

use rand::Rng;

/// Length of generated room codes.
pub const ROOM_CODE_LEN: usize = 6;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Source of fresh room codes. Collisions are handled by the caller.
pub trait RoomCodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random lowercase alphanumeric codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomRoomCodes;

impl RoomCodeGenerator for RandomRoomCodes {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..ROOM_CODE_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

/// Normalize user-typed room codes: surrounding whitespace and backticks
/// (users paste the code straight from the reply) are dropped and letters
/// lowercased.
pub fn normalize(code: &str) -> String {
    code.trim().trim_matches('`').trim().to_ascii_lowercase()
}
