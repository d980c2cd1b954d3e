use std::collections::BTreeSet;

use parking_lot::RwLock;
use serde::Serialize;

// ==================== 数据模型 ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Venue {
    pub ext_id: u32,
    /// URL 中使用的标识，例如 `bark-and-brew-leeds`
    pub reference: String,
    pub name: String,
    pub town: String,
    pub venue_type: String,
}

// ==================== 仓储 ====================

pub trait VenueRepository: Send + Sync {
    fn find_by_reference(&self, reference: &str) -> Option<Venue>;

    fn find_by_ext_id(&self, ext_id: u32) -> Option<Venue>;

    fn all(&self) -> Vec<Venue>;
}

/// 内存中的场所列表
pub struct InMemoryVenueRepository {
    venues: Vec<Venue>,
}

impl InMemoryVenueRepository {
    pub fn new(venues: Vec<Venue>) -> Self {
        Self { venues }
    }

    pub fn seeded() -> Self {
        Self::new(vec![
            venue(1, "bark-and-brew-leeds", "Bark & Brew", "Leeds", "cafe"),
            venue(2, "the-muddy-paw-york", "The Muddy Paw", "York", "pub"),
            venue(3, "hound-house-bristol", "Hound House", "Bristol", "restaurant"),
        ])
    }
}

fn venue(ext_id: u32, reference: &str, name: &str, town: &str, venue_type: &str) -> Venue {
    Venue {
        ext_id,
        reference: reference.to_string(),
        name: name.to_string(),
        town: town.to_string(),
        venue_type: venue_type.to_string(),
    }
}

impl VenueRepository for InMemoryVenueRepository {
    fn find_by_reference(&self, reference: &str) -> Option<Venue> {
        self.venues.iter().find(|v| v.reference == reference).cloned()
    }

    fn find_by_ext_id(&self, ext_id: u32) -> Option<Venue> {
        self.venues.iter().find(|v| v.ext_id == ext_id).cloned()
    }

    fn all(&self) -> Vec<Venue> {
        self.venues.clone()
    }
}

// ==================== 收藏 ====================

/// 收藏的场所 ext_id
#[derive(Default)]
pub struct FavouriteStore {
    ext_ids: RwLock<BTreeSet<u32>>,
}

impl FavouriteStore {
    /// 返回是否为新增
    pub fn add(&self, ext_id: u32) -> bool {
        self.ext_ids.write().insert(ext_id)
    }

    pub fn remove(&self, ext_id: u32) -> bool {
        self.ext_ids.write().remove(&ext_id)
    }

    pub fn all(&self) -> Vec<u32> {
        self.ext_ids.read().iter().copied().collect()
    }
}
