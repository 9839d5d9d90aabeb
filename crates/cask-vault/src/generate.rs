//! Random password generation

use rand::rngs::OsRng;
use rand::Rng;

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{}|;:,.<>?";

/// Generate a random password from the selected character pools.
/// Lowercase letters are always included.
pub fn generate_password(length: usize, upper: bool, digits: bool, symbols: bool) -> String {
    let mut pool = String::from(LOWER);
    if upper {
        pool.push_str(UPPER);
    }
    if digits {
        pool.push_str(DIGITS);
    }
    if symbols {
        pool.push_str(SYMBOLS);
    }

    let chars: Vec<char> = pool.chars().collect();
    let mut rng = OsRng;

    (0..length).map(|_| chars[rng.gen_range(0..chars.len())]).collect()
}
