//! Durable client identity.
//!
//! The id is minted once and then read back for as long as the local store
//! lives. Minting a new one orphans whatever the server associated with the
//! old id, so nothing here ever overwrites an existing value.

use chrono::Utc;
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::app_response::AppResponse;
use crate::local_store::LocalStore;

pub const CLIENT_ID_KEY: &str = "movieshows_user_id";
pub const LOCAL_CODE_PREFIX: &str = "LOCAL-";

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Returns the stored client id, minting and persisting one if absent.
pub fn resolve_client_id(store: &LocalStore) -> Result<String, AppResponse> {
    if let Some(existing) = store.get_raw(CLIENT_ID_KEY)? {
        if !existing.trim().is_empty() {
            return Ok(existing);
        }
    }
    let id = mint_client_id();
    store.put_raw(CLIENT_ID_KEY, &id)?;
    info!("Minted new client id {id}");
    Ok(id)
}

/// `user_` + 9 random base-36 chars + current epoch millis in base 36.
pub fn mint_client_id() -> String {
    let mut rng = rand::thread_rng();
    let random: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("user_{}{}", random, to_base36(Utc::now().timestamp_millis().max(0) as u64))
}

/// Share code for a playlist that only exists on this device.
pub fn mint_local_share_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("{LOCAL_CODE_PREFIX}{suffix}")
}

pub fn is_local_share_code(code: &str) -> bool {
    code.starts_with(LOCAL_CODE_PREFIX)
}

/// Share codes are ASCII alphanumerics and `-`; anything else could not be
/// placed in a request path as-is.
pub fn is_valid_share_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn minted_ids_have_expected_shape() {
        let id = mint_client_id();
        assert!(id.starts_with("user_"));
        assert!(id.len() > "user_".len() + 9);
        assert!(id[5..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, mint_client_id());
    }

    #[test]
    fn local_codes_are_tagged() {
        let code = mint_local_share_code();
        assert!(is_local_share_code(&code));
        assert_eq!(code.len(), LOCAL_CODE_PREFIX.len() + 6);
        assert!(!is_local_share_code("AB12CD"));
        assert!(is_valid_share_code(&code));
        assert!(!is_valid_share_code("LOCAL-AB/CD"));
    }
}
