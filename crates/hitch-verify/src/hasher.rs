use md5::Digest;

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

/// Any RustCrypto digest as a [`Hasher`].
pub struct DigestHasher<D: Digest + Send>(D);

impl<D: Digest + Send> DigestHasher<D> {
    pub fn new() -> Self { Self(D::new()) }
}

impl<D: Digest + Send> Default for DigestHasher<D> {
    fn default() -> Self { Self::new() }
}

impl<D: Digest + Send> Hasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

pub type Md5Hasher = DigestHasher<md5::Md5>;

impl Md5Hasher {
    pub fn digest(data: &[u8]) -> Vec<u8> { md5::Md5::digest(data).to_vec() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_known_value() {
        assert_eq!(hex::encode(Md5Hasher::digest(b"")), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_streaming_matches_oneshot() {
        let mut hasher = Md5Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), Md5Hasher::digest(b"hello world"));
    }
}
