//! Whole-tree encryption and decryption.
//!
//! Every non-empty string leaf goes through the encryptor with the same user
//! id. Empty strings are copied as-is in both directions.

use crate::encryptor::CredentialEncryptor;
use crate::error::{CryptoError, CryptoResult};
use crate::tree::{CredentialTree, LeafPath};

/// Encrypts every non-empty string leaf. Fails as a whole on the first leaf
/// that cannot be encrypted.
pub fn encrypt_tree(
    tree: &CredentialTree,
    user_id: &str,
    encryptor: &dyn CredentialEncryptor,
) -> CryptoResult<CredentialTree> {
    tree.try_map_text(|_, value| {
        if value.is_empty() {
            return Ok(String::new());
        }
        encryptor.encrypt(value, user_id)
    })
}

/// Decrypts every non-empty string leaf, failing on the first leaf that does
/// not decrypt.
pub fn decrypt_tree(
    tree: &CredentialTree,
    user_id: &str,
    encryptor: &dyn CredentialEncryptor,
) -> CryptoResult<CredentialTree> {
    decrypt_tree_with(tree, user_id, encryptor, |_, _, result| result)
}

/// Decrypts every non-empty string leaf and lets `resolve` decide what each
/// leaf becomes.
///
/// `resolve` receives the leaf path, the stored value and the decrypt
/// result. Returning an error aborts the walk.
pub fn decrypt_tree_with<E, F>(
    tree: &CredentialTree,
    user_id: &str,
    encryptor: &dyn CredentialEncryptor,
    mut resolve: F,
) -> Result<CredentialTree, E>
where
    F: FnMut(&LeafPath, &str, Result<String, CryptoError>) -> Result<String, E>,
{
    tree.try_map_text(|path, stored| {
        if stored.is_empty() {
            return Ok(String::new());
        }
        resolve(path, stored, encryptor.decrypt(stored, user_id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryptor::PassthroughEncryptor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEncryptor(AtomicUsize);

    impl CredentialEncryptor for CountingEncryptor {
        fn encrypt(&self, plaintext: &str, _user_id: &str) -> CryptoResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("enc({plaintext})"))
        }

        fn decrypt(&self, blob: &str, _user_id: &str) -> CryptoResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            blob.strip_prefix("enc(")
                .and_then(|s| s.strip_suffix(')'))
                .map(str::to_string)
                .ok_or_else(|| CryptoError::Decryption("not enc".to_string()))
        }
    }

    #[test]
    fn empty_leaves_skip_the_cipher() {
        let enc = CountingEncryptor(AtomicUsize::new(0));
        let tree = CredentialTree::new().with_text("a", "").with_text("b", "x");
        let out = encrypt_tree(&tree, "u", &enc).unwrap();
        assert_eq!(enc.0.load(Ordering::SeqCst), 1);
        assert_eq!(out.text_at(&["a"].into_iter().collect()), Some(""));
        assert_eq!(out.text_at(&["b"].into_iter().collect()), Some("enc(x)"));
    }

    #[test]
    fn resolver_sees_failures_per_leaf() {
        let enc = CountingEncryptor(AtomicUsize::new(0));
        let tree = CredentialTree::new()
            .with_text("good", "enc(secret)")
            .with_text("legacy", "plain");
        let mut failed = Vec::new();
        let out: Result<_, ()> = decrypt_tree_with(&tree, "u", &enc, |path, stored, result| {
            Ok(result.unwrap_or_else(|_| {
                failed.push(path.to_string());
                stored.to_string()
            }))
        });
        let out = out.unwrap();
        assert_eq!(failed, vec!["legacy".to_string()]);
        assert_eq!(out.text_at(&["good"].into_iter().collect()), Some("secret"));
        assert_eq!(out.text_at(&["legacy"].into_iter().collect()), Some("plain"));
    }

    #[test]
    fn strict_decrypt_fails_on_bad_leaf() {
        let enc = CountingEncryptor(AtomicUsize::new(0));
        let tree = CredentialTree::new().with_text("legacy", "plain");
        assert!(decrypt_tree(&tree, "u", &enc).is_err());
    }

    #[test]
    fn passthrough_is_identity() {
        let tree = CredentialTree::new()
            .with_text("a", "1")
            .with_nested("n", CredentialTree::new().with_text("b", "2"));
        let out = encrypt_tree(&tree, "u", &PassthroughEncryptor).unwrap();
        assert_eq!(out, tree);
        assert_eq!(decrypt_tree(&out, "u", &PassthroughEncryptor).unwrap(), tree);
    }
}
