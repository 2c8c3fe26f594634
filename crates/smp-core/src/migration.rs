//! One-time codes authorizing the transfer of a participant to another server

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// Symbols a migration code may contain
pub const MIGRATION_SYMBOLS: &str = "@#$%()[]{}*^-!~|+=";

/// Length of generated migration codes
pub const MIGRATION_CODE_LENGTH: usize = 24;

const MIN_PER_CLASS: usize = 2;

fn pick(rng: &mut OsRng, alphabet: &[u8], count: usize, out: &mut Vec<u8>) {
    for _ in 0..count {
        out.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }
}

/// Generate a migration code.
///
/// At least two characters of each class (upper, lower, digit, symbol), the
/// remainder drawn from all classes, shuffled. Uses the OS CSPRNG.
pub fn generate_migration_code() -> String {
    let mut rng = OsRng;
    let symbols = MIGRATION_SYMBOLS.as_bytes();
    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, symbols].concat();

    let mut code = Vec::with_capacity(MIGRATION_CODE_LENGTH);
    for class in [UPPERCASE, LOWERCASE, DIGITS, symbols] {
        pick(&mut rng, class, MIN_PER_CLASS, &mut code);
    }
    pick(&mut rng, &all, MIGRATION_CODE_LENGTH - code.len(), &mut code);
    code.shuffle(&mut rng);

    code.into_iter().map(char::from).collect()
}

/// Whether a supplied code is usable for a migration
pub fn is_plausible_migration_code(code: &str) -> bool {
    !code.is_empty() && !code.chars().any(char::is_whitespace)
}
