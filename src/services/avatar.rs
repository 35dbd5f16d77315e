//! Deterministic avatar URLs derived from a salted hash of the user id and role.

use sha2::{Digest, Sha256};

use crate::models::user_profile::Role;

pub const MIN_AVATAR_SIZE: u32 = 16;
pub const MAX_AVATAR_SIZE: u32 = 512;

pub fn clamp_size(size: u32) -> u32 {
    size.clamp(MIN_AVATAR_SIZE, MAX_AVATAR_SIZE)
}

/// Hex seed for a user's avatar: `sha256("{id}:{salt}:{role}")`
pub fn avatar_seed(user_id: i64, salt: &str, role: Role) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", user_id, salt, role.as_str()).as_bytes());
    hex::encode(hasher.finalize())
}

/// Static image URL for the avatar, with size and seed query parameters
pub fn avatar_url(user_id: i64, salt: &str, role: Role, size: u32) -> String {
    let image = match role {
        Role::Teacher => "avatar-teacher.svg",
        Role::Student => "avatar-default.svg",
    };
    format!(
        "/static/img/{}?size={}&seed={}",
        image,
        clamp_size(size),
        avatar_seed(user_id, salt, role)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_size() {
        assert_eq!(clamp_size(1), 16);
        assert_eq!(clamp_size(64), 64);
        assert_eq!(clamp_size(4096), 512);
    }

    #[test]
    fn test_seed_is_stable_and_role_dependent() {
        let a = avatar_seed(5, "salt", Role::Student);
        assert_eq!(a, avatar_seed(5, "salt", Role::Student));
        assert_ne!(a, avatar_seed(5, "salt", Role::Teacher));
        assert_ne!(a, avatar_seed(5, "pepper", Role::Student));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_avatar_url_picks_image_by_role() {
        let url = avatar_url(1, "s", Role::Teacher, 1000);
        assert!(url.starts_with("/static/img/avatar-teacher.svg?size=512&seed="));

        let url = avatar_url(1, "s", Role::Student, 32);
        assert!(url.starts_with("/static/img/avatar-default.svg?size=32&seed="));
    }
}
