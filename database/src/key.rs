use crate::registry::{DatabaseStorePrefixes, SEPARATOR};
use echomint_types::Height;
use std::fmt::{Debug, Display, Formatter};

/// Byte width of the big-endian height suffix carried by versioned entries
pub const HEIGHT_SUFFIX_LEN: usize = size_of::<Height>();

/// A physical store key. Versioned entries append a fixed-width big-endian
/// height so that, per logical key, entries sort by height and "the most
/// recent entry at or below H" is a single bounded reverse scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbKey {
    path: Vec<u8>,
    prefix_len: usize,
}

impl DbKey {
    pub fn new(prefix: &[u8], key: impl AsRef<[u8]>) -> Self {
        Self { path: prefix.iter().chain(key.as_ref().iter()).copied().collect(), prefix_len: prefix.len() }
    }

    pub fn prefix_only(prefix: &[u8]) -> Self {
        Self::new(prefix, [])
    }

    /// A versioned entry key: `prefix ++ key ++ big-endian height`
    pub fn heighted(prefix: &[u8], key: impl AsRef<[u8]>, height: Height) -> Self {
        let mut db_key = Self::new(prefix, key);
        db_key.path.extend_from_slice(&height.to_be_bytes());
        db_key
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.path
    }
}

impl AsRef<[u8]> for DbKey {
    fn as_ref(&self) -> &[u8] {
        &self.path
    }
}

impl Display for DbKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&faster_hex::hex_string(&self.path[..self.prefix_len]))?;
        f.write_str("/")?;
        f.write_str(&faster_hex::hex_string(&self.path[self.prefix_len..]))
    }
}

/// Bucket prefix of a named sub-store: `prefix byte ++ name ++ SEPARATOR`.
/// The caller is expected to have validated the name against [`SEPARATOR`].
pub fn bucket_path(prefix: DatabaseStorePrefixes, name: &str) -> Vec<u8> {
    let mut path = Vec::with_capacity(1 + name.len() + 1);
    path.push(prefix as u8);
    path.extend_from_slice(name.as_bytes());
    path.push(SEPARATOR);
    path
}

/// Splits a versioned entry key into its logical part and height suffix
pub fn split_height_suffix(full_key: &[u8]) -> Option<(&[u8], Height)> {
    if full_key.len() < HEIGHT_SUFFIX_LEN {
        return None;
    }
    let (logical, suffix) = full_key.split_at(full_key.len() - HEIGHT_SUFFIX_LEN);
    let height = Height::from_be_bytes(suffix.try_into().expect("suffix is exactly HEIGHT_SUFFIX_LEN bytes"));
    Some((logical, height))
}

/// The smallest byte string strictly greater than `path`, turning an
/// inclusive upper bound into the exclusive bound scans expect
pub fn successor(mut path: Vec<u8>) -> Vec<u8> {
    path.push(0);
    path
}

/// The smallest byte string greater than every string carrying `prefix`,
/// or `None` when the prefix is all-`0xFF` and thus unbounded above
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(&last) = out.last() {
        if last == u8::MAX {
            out.pop();
        } else {
            *out.last_mut().expect("checked non-empty above") = last + 1;
            return Some(out);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heighted_key_ordering() {
        let bucket = bucket_path(DatabaseStorePrefixes::SubStore, "bank");
        let low = DbKey::heighted(&bucket, b"balance", 5);
        let high = DbKey::heighted(&bucket, b"balance", 6);
        assert!(low.as_ref() < high.as_ref());

        let (logical, height) = split_height_suffix(high.as_ref()).unwrap();
        assert_eq!(logical, DbKey::new(&bucket, b"balance").as_ref());
        assert_eq!(height, 6);
    }

    #[test]
    fn test_prefix_successor() {
        let bucket = bucket_path(DatabaseStorePrefixes::SubStore, "bank");
        let upper = prefix_successor(&bucket).unwrap();
        assert!(bucket < upper);
        // every key in the bucket sorts below the bound
        let entry = DbKey::heighted(&bucket, vec![u8::MAX; 16], Height::MAX).into_vec();
        assert!(entry < upper);
        assert_eq!(prefix_successor(&[u8::MAX, u8::MAX]), None);
    }

    #[test]
    fn test_successor_is_tight() {
        let key = DbKey::heighted(&bucket_path(DatabaseStorePrefixes::SubStore, "bank"), b"k", 9).into_vec();
        let next = successor(key.clone());
        assert!(key < next);
        // nothing sorts between a key and its successor
        assert_eq!(next.len(), key.len() + 1);
        assert_eq!(next.last(), Some(&0));
    }
}
