//! The current hero avatar.

use super::KeyValueStore;
use crate::avatar::HeroAvatar;
use crate::error::Result;

/// Store key holding the hero avatar.
pub const AVATAR_KEY: &str = "hero_avatar";

/// Holds at most one [`HeroAvatar`]. Cleared avatars are stored as `null`.
pub struct AvatarSlot<S> {
    store: S,
}

impl<S: KeyValueStore> AvatarSlot<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<Option<HeroAvatar>> {
        match self.store.load(AVATAR_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(None),
        }
    }

    /// Replace the stored avatar.
    pub fn save(&self, avatar: &HeroAvatar) -> Result<()> {
        self.store.save(AVATAR_KEY, &serde_json::to_string(avatar)?)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.save(AVATAR_KEY, "null")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn avatar() -> HeroAvatar {
        HeroAvatar {
            avatar_url: "mock://image/0".into(),
            description: "a cheerful cartoon character representing Maya".into(),
            original_photo: "data:image/png;base64,AA".into(),
            generated: true,
        }
    }

    #[test]
    fn test_save_load_clear() {
        let slot = AvatarSlot::new(MemoryStore::new());
        assert_eq!(slot.load().unwrap(), None);

        slot.save(&avatar()).unwrap();
        assert_eq!(slot.load().unwrap(), Some(avatar()));

        slot.clear().unwrap();
        assert_eq!(slot.load().unwrap(), None);
    }
}
