/// We use `u8::MAX` as the bucket separator. The [`DatabaseStorePrefixes`]
/// enum makes sure it is never used as a prefix as well, and sub-store names
/// are rejected if they contain it.
pub const SEPARATOR: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DatabaseStorePrefixes {
    /// Height-suffixed entries of the named application sub-stores
    SubStore = 1,

    /// The committed chain-state record (flat, un-heighted)
    ChainState = 2,

    // ---- Separator ----
    /// Reserved as a separator
    Separator = SEPARATOR,
}

impl From<DatabaseStorePrefixes> for Vec<u8> {
    fn from(value: DatabaseStorePrefixes) -> Self {
        [value as u8].to_vec()
    }
}

impl From<DatabaseStorePrefixes> for u8 {
    fn from(value: DatabaseStorePrefixes) -> Self {
        value as u8
    }
}

impl AsRef<[u8]> for DatabaseStorePrefixes {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: enum has repr(u8)
        std::slice::from_ref(unsafe { &*(self as *const Self as *const u8) })
    }
}
