// common/src/models/listing.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Furniture category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FurnitureKind {
    Bed,
    Table,
    Desk,
    Chair,
    Chest,
    Nightstand,
    Cabinet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FurnitureStyle {
    Victorian,
    English,
    Baroque,
    Federal,
    Rococo,
    Sheraton,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FurnitureCondition {
    Mint,
    Excellent,
    Good,
    Worn,
    Restored,
    #[serde(rename = "Original Finish")]
    OriginalFinish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FurnitureMaterial {
    #[serde(rename = "Tiger Maple")]
    TigerMaple,
    Cherry,
    Oak,
    Walnut,
    Mahogany,
    Maple,
    Chestnut,
    Pine,
    Rosewood,
    Birch,
}

impl fmt::Display for FurnitureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FurnitureKind::Bed => "Bed",
            FurnitureKind::Table => "Table",
            FurnitureKind::Desk => "Desk",
            FurnitureKind::Chair => "Chair",
            FurnitureKind::Chest => "Chest",
            FurnitureKind::Nightstand => "Nightstand",
            FurnitureKind::Cabinet => "Cabinet",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for FurnitureStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FurnitureStyle::Victorian => "Victorian",
            FurnitureStyle::English => "English",
            FurnitureStyle::Baroque => "Baroque",
            FurnitureStyle::Federal => "Federal",
            FurnitureStyle::Rococo => "Rococo",
            FurnitureStyle::Sheraton => "Sheraton",
            FurnitureStyle::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// A furniture piece offered for sale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FurnitureListing {
    pub listing_id: Uuid,
    pub title: String,
    pub description: String,
    /// Asking price in cents
    pub price_cents: i64,
    #[serde(rename = "type")]
    pub kind: FurnitureKind,
    pub style: FurnitureStyle,
    pub condition: FurnitureCondition,
    pub material: FurnitureMaterial,
    /// Base64-encoded photos
    pub images: Vec<String>,
    pub seller_id: Uuid,
    pub sold: bool,
    pub created_at: DateTime<Utc>,
}

/// Client-submitted listing form. Every field is optional so that missing
/// values surface as validation messages instead of a bare decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<FurnitureKind>,
    pub style: Option<FurnitureStyle>,
    pub condition: Option<FurnitureCondition>,
    pub material: Option<FurnitureMaterial>,
    pub images: Option<Vec<String>>,
}

impl ListingDraft {
    /// Validate the form and build the stored listing, assigning a fresh id.
    /// Returns the first field failure as a client-facing message.
    pub fn into_listing(self, seller_id: Uuid) -> Result<FurnitureListing, &'static str> {
        let title = match self.title {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err("Title not provided"),
        };
        let condition = self.condition.ok_or("Condition not provided")?;
        let price_cents = match self.price_cents {
            Some(c) if c > 0 => c,
            _ => return Err("Cost not provided"),
        };
        let description = match self.description {
            Some(d) if !d.trim().is_empty() => d,
            _ => return Err("Description not provided"),
        };
        let kind = self.kind.ok_or("Furniture type not provided")?;
        let material = self.material.ok_or("Material not provided")?;
        let style = self.style.ok_or("Style not provided")?;
        let images = match self.images {
            Some(imgs) if !imgs.is_empty() => imgs,
            _ => return Err("Images not provided"),
        };
        for img in &images {
            if base64::decode(img).is_err() {
                return Err("Images must be base64 encoded");
            }
        }

        Ok(FurnitureListing {
            listing_id: Uuid::new_v4(),
            title,
            description,
            price_cents,
            kind,
            style,
            condition,
            material,
            images,
            seller_id,
            sold: false,
            created_at: Utc::now(),
        })
    }
}
