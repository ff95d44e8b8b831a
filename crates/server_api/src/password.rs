pub use bcrypt::DEFAULT_COST;

// bcrypt keeps its cost bounds private; these mirror its values.
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// Salted bcrypt hash in modular crypt format (`$2b$<cost>$...`).
pub fn hash_password(password: &str, cost: u32) -> bcrypt::BcryptResult<String> {
    bcrypt::hash(password, cost)
}

/// A stored value that is not a bcrypt hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
