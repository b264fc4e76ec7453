use secrecy::zeroize::Zeroize;
use secrecy::{ExposeSecret, SecretBox};

pub struct Secret<T: Zeroize> {
    inner: SecretBox<T>,
}

impl<T: Zeroize> Secret<T> {
    pub fn new(data: T) -> Self {
        Self { inner: SecretBox::new(Box::new(data)) }
    }

    pub fn expose_secret(&self) -> &T {
        self.inner.expose_secret()
    }
}

impl<T: Zeroize> From<SecretBox<T>> for Secret<T> {
    fn from(secret: SecretBox<T>) -> Self {
        Self { inner: secret }
    }
}

/// Password material, kept behind a zeroising cell for the lifetime of a
/// request. Empty passwords are legal when keyfiles carry the entropy.
pub type Password = Secret<Vec<u8>>;

impl Password {
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }

    pub fn from_string(s: String) -> Self {
        Self::new(s.into_bytes())
    }

    pub fn expose(&self) -> &[u8] {
        self.expose_secret().as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.expose_secret().is_empty()
    }
}
