use rand::random;

/// Checks `plain` against a bcrypt hash. Malformed hashes never verify.
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    bcrypt::verify(plain, hashed.trim()).unwrap_or(false)
}

pub fn hash_password(plain: &str) -> Result<String, bcrypt::BcryptError> {
    hash_password_with_cost(plain, bcrypt::DEFAULT_COST)
}

pub fn hash_password_with_cost(plain: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, cost)
}

/// 32 random bytes, hex encoded, suitable for `JWT_SECRET_KEY`.
pub fn generate_jwt_secret() -> String {
    let bytes: [u8; 32] = random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password() {
        let hash = hash_password_with_cost("hunter2", 4).unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("hunter2", "not-a-hash"));
        assert!(!verify_password("hunter2", ""));
    }

    #[test]
    fn jwt_secrets_are_random_hex() {
        let a = generate_jwt_secret();
        let b = generate_jwt_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
