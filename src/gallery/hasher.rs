/// Content digest used as the dedup identity of a photo.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    length: usize,
}

impl ContentHasher {
    pub const DEFAULT_LENGTH: usize = 32;
    const MIN_LENGTH: usize = 8;
    const MAX_LENGTH: usize = 64;

    /// `length` is the number of hex characters kept, clamped to 8..=64.
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(Self::MIN_LENGTH, Self::MAX_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn hash(&self, data: &[u8]) -> String {
        let digest = blake3::hash(data).to_hex();
        digest.as_str()[..self.length].to_string()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}
