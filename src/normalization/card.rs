//! Normalization of the Snap Zone catalog payload into typed records.
//!
//! The payload is loosely typed: numbers arrive as strings, fields go
//! missing, whole records are sometimes not objects at all. Only the
//! envelope must parse; individual records are nulled or skipped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A non-fatal problem found while normalizing or syncing a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordWarning {
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub message: String,
}

impl RecordWarning {
    pub fn card(cid: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            cid: cid.map(str::to_string),
            vid: None,
            url: None,
            message: message.into(),
        }
    }

    pub fn variant(cid: &str, vid: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            cid: Some(cid.to_string()),
            vid: vid.map(str::to_string),
            url: None,
            message: message.into(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCard {
    pub cid: String,
    pub name: Option<String>,
    pub card_type: Option<String>,
    pub cost: Option<i64>,
    pub power: Option<i64>,
    pub ability: Option<String>,
    pub flavor: Option<String>,
    /// Remote artwork URL, `None` when absent or blank.
    pub art: Option<String>,
    pub alternate_art: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub carddefid: Option<String>,
    pub variants: Vec<NormalizedVariant>,
}

/// A variant that passed validation: both `art` and `art_filename` are set.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVariant {
    pub vid: Option<String>,
    pub art: String,
    pub art_filename: String,
    pub rarity: Option<String>,
    pub rarity_slug: Option<String>,
    pub variant_order: Option<String>,
    pub status: Option<String>,
    pub full_description: Option<String>,
    pub inker: Option<String>,
    pub sketcher: Option<String>,
    pub colorist: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedCatalog {
    pub cards: Vec<NormalizedCard>,
    pub warnings: Vec<RecordWarning>,
    pub variants_dropped: usize,
}

// ---------- Snap Zone API shapes (minimal) ----------
// Scalars stay as raw `Value` so a string where a number was expected nulls
// one field instead of rejecting the record.

#[derive(Debug, Deserialize)]
struct Envelope {
    success: Option<SuccessBody>,
}

#[derive(Debug, Deserialize)]
struct SuccessBody {
    cards: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawCard {
    cid: Option<Value>,
    name: Option<Value>,
    #[serde(rename = "type")]
    card_type: Option<Value>,
    cost: Option<Value>,
    power: Option<Value>,
    ability: Option<Value>,
    flavor: Option<Value>,
    art: Option<Value>,
    alternate_art: Option<Value>,
    url: Option<Value>,
    status: Option<Value>,
    carddefid: Option<Value>,
    variants: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    vid: Option<Value>,
    art: Option<Value>,
    art_filename: Option<Value>,
    rarity: Option<Value>,
    rarity_slug: Option<Value>,
    variant_order: Option<Value>,
    status: Option<Value>,
    full_description: Option<Value>,
    inker: Option<Value>,
    sketcher: Option<Value>,
    colorist: Option<Value>,
    #[serde(rename = "ReleaseDate")]
    release_date: Option<Value>,
}

/// Normalize a decoded catalog body. Never fails: a body without
/// `success.cards` is an empty catalog.
pub fn normalize_catalog(body: &Value) -> NormalizedCatalog {
    let mut out = NormalizedCatalog::default();

    let records = match Envelope::deserialize(body) {
        Ok(Envelope {
            success: Some(SuccessBody { cards: Some(cards) }),
        }) => cards,
        Ok(_) => {
            warn!("catalog body has no success.cards; treating as empty");
            return out;
        }
        Err(e) => {
            warn!(error = %e, "catalog envelope has unexpected shape; treating as empty");
            return out;
        }
    };

    for (idx, record) in records.iter().enumerate() {
        match normalize_card(record, &mut out) {
            Some(card) => out.cards.push(card),
            None => debug!(index = idx, "skipped catalog record"),
        }
    }
    out
}

fn normalize_card(record: &Value, out: &mut NormalizedCatalog) -> Option<NormalizedCard> {
    let raw = match RawCard::deserialize(record) {
        Ok(raw) => raw,
        Err(e) => {
            out.warnings.push(RecordWarning::card(
                None,
                format!("card record is not an object: {e}"),
            ));
            return None;
        }
    };

    let Some(cid) = loose_string(raw.cid.as_ref()) else {
        let name = loose_string(raw.name.as_ref()).unwrap_or_default();
        out.warnings.push(RecordWarning::card(
            None,
            format!("card record without cid skipped (name '{name}')"),
        ));
        return None;
    };

    let variants = match raw.variants {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut seen_vids: HashSet<String> = HashSet::new();
            let mut variants = Vec::with_capacity(items.len());
            for item in items {
                let Some(variant) = normalize_variant(&cid, &item, out) else {
                    continue;
                };
                // (cid, vid) is the stored key; a repeat would overwrite the first row.
                if let Some(vid) = &variant.vid {
                    if !seen_vids.insert(vid.clone()) {
                        out.variants_dropped += 1;
                        warn!(cid = %cid, vid = %vid, "duplicate variant vid; keeping first");
                        out.warnings.push(
                            RecordWarning::variant(&cid, Some(vid.as_str()), "duplicate vid for card; dropped")
                                .with_url(&variant.art),
                        );
                        continue;
                    }
                }
                variants.push(variant);
            }
            variants
        }
        Some(_) => {
            out.warnings.push(RecordWarning::card(
                Some(&cid),
                "variants field is not a list; ignored",
            ));
            Vec::new()
        }
    };

    Some(NormalizedCard {
        name: loose_string(raw.name.as_ref()),
        card_type: loose_string(raw.card_type.as_ref()),
        cost: loose_i64(raw.cost.as_ref()),
        power: loose_i64(raw.power.as_ref()),
        ability: loose_string(raw.ability.as_ref()),
        flavor: loose_string(raw.flavor.as_ref()),
        art: loose_string(raw.art.as_ref()),
        alternate_art: loose_string(raw.alternate_art.as_ref()),
        url: loose_string(raw.url.as_ref()),
        status: loose_string(raw.status.as_ref()),
        carddefid: loose_string(raw.carddefid.as_ref()),
        variants,
        cid,
    })
}

fn normalize_variant(
    cid: &str,
    record: &Value,
    out: &mut NormalizedCatalog,
) -> Option<NormalizedVariant> {
    let raw = match RawVariant::deserialize(record) {
        Ok(raw) => raw,
        Err(e) => {
            out.variants_dropped += 1;
            out.warnings.push(RecordWarning::variant(
                cid,
                None,
                format!("variant record is not an object: {e}"),
            ));
            return None;
        }
    };
    let vid = loose_string(raw.vid.as_ref());

    let (art, art_filename) = match (
        loose_string(raw.art.as_ref()),
        loose_string(raw.art_filename.as_ref()),
    ) {
        (Some(art), Some(file)) => (art, file),
        (art, _) => {
            out.variants_dropped += 1;
            let mut warning = RecordWarning::variant(
                cid,
                vid.as_deref(),
                "missing art or art_filename for variant; dropped",
            );
            if let Some(art) = art {
                warning = warning.with_url(art);
            }
            out.warnings.push(warning);
            return None;
        }
    };

    Some(NormalizedVariant {
        vid,
        art,
        art_filename,
        rarity: loose_string(raw.rarity.as_ref()),
        rarity_slug: loose_string(raw.rarity_slug.as_ref()),
        variant_order: loose_string(raw.variant_order.as_ref()),
        status: loose_string(raw.status.as_ref()),
        full_description: loose_string(raw.full_description.as_ref()),
        inker: loose_string(raw.inker.as_ref()),
        sketcher: loose_string(raw.sketcher.as_ref()),
        colorist: loose_string(raw.colorist.as_ref()),
        release_date: loose_string(raw.release_date.as_ref()),
    })
}

/// Strings pass through trimmed, numbers and booleans are rendered; blank,
/// null and compound values become `None`.
pub fn loose_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integers, integral floats and numeric strings; anything else is `None`.
pub fn loose_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let t = s.trim();
            t.parse::<i64>().ok().or_else(|| {
                t.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(cards: Value) -> Value {
        json!({ "success": { "cards": cards } })
    }

    #[test]
    fn extracts_fixed_field_set() {
        let catalog = normalize_catalog(&body(json!([{
            "cid": 12,
            "name": "Iron Man",
            "type": "Character",
            "cost": 5,
            "power": "0",
            "ability": "<b>Ongoing:</b> Your power is doubled here.",
            "flavor": "",
            "art": "https://static.example.com/art/IronMan.webp?v=3",
            "alternate_art": "",
            "url": "/cards/iron-man",
            "status": "released",
            "carddefid": "IronMan",
            "extra": { "ignored": true }
        }])));

        assert!(catalog.warnings.is_empty());
        let card = &catalog.cards[0];
        assert_eq!(card.cid, "12");
        assert_eq!(card.card_type.as_deref(), Some("Character"));
        assert_eq!(card.cost, Some(5));
        assert_eq!(card.power, Some(0));
        assert_eq!(card.flavor, None);
        assert_eq!(card.alternate_art, None);
        assert_eq!(
            card.art.as_deref(),
            Some("https://static.example.com/art/IronMan.webp?v=3")
        );
        assert!(card.variants.is_empty());
    }

    #[test]
    fn malformed_records_are_skipped_individually() {
        let catalog = normalize_catalog(&body(json!([
            "not a card",
            { "name": "No Id" },
            { "cid": "ok-1", "cost": "three", "power": [1] },
        ])));

        assert_eq!(catalog.cards.len(), 1);
        assert_eq!(catalog.cards[0].cid, "ok-1");
        assert_eq!(catalog.cards[0].cost, None);
        assert_eq!(catalog.cards[0].power, None);
        assert_eq!(catalog.warnings.len(), 2);
    }

    #[test]
    fn variant_without_art_filename_is_dropped_with_warning() {
        let catalog = normalize_catalog(&body(json!([{
            "cid": "hulk",
            "variants": [
                { "vid": 1, "art": "https://cdn.example.com/v/Hulk_01.webp", "art_filename": "Hulk_01.webp", "ReleaseDate": 1690000000 },
                { "vid": 2, "art": "https://cdn.example.com/v/Hulk_02.webp" },
                { "vid": 3, "art_filename": "Hulk_03.webp" }
            ]
        }])));

        let card = &catalog.cards[0];
        assert_eq!(card.variants.len(), 1);
        assert_eq!(card.variants[0].vid.as_deref(), Some("1"));
        assert_eq!(card.variants[0].release_date.as_deref(), Some("1690000000"));
        assert_eq!(catalog.variants_dropped, 2);
        assert_eq!(catalog.warnings.len(), 2);
        assert_eq!(catalog.warnings[0].vid.as_deref(), Some("2"));
        assert_eq!(
            catalog.warnings[0].url.as_deref(),
            Some("https://cdn.example.com/v/Hulk_02.webp")
        );
    }

    #[test]
    fn repeated_vid_keeps_first_variant() {
        let catalog = normalize_catalog(&body(json!([{
            "cid": "a",
            "variants": [
                { "vid": 1, "art": "https://cdn.example.com/v/v1.webp", "art_filename": "v1.webp" },
                { "vid": "1", "art": "https://cdn.example.com/v/v2.webp", "art_filename": "v2.webp" },
                { "art": "https://cdn.example.com/v/v3.webp", "art_filename": "v3.webp" },
                { "art": "https://cdn.example.com/v/v4.webp", "art_filename": "v4.webp" }
            ]
        }])));

        let variants = &catalog.cards[0].variants;
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].art_filename, "v1.webp");
        assert_eq!(catalog.variants_dropped, 1);
        assert_eq!(catalog.warnings.len(), 1);
        assert_eq!(catalog.warnings[0].vid.as_deref(), Some("1"));
        assert_eq!(
            catalog.warnings[0].url.as_deref(),
            Some("https://cdn.example.com/v/v2.webp")
        );
    }

    #[test]
    fn missing_envelope_is_empty_catalog() {
        assert!(normalize_catalog(&json!({})).cards.is_empty());
        assert!(normalize_catalog(&json!({ "success": {} })).cards.is_empty());
        assert!(normalize_catalog(&json!([1, 2])).cards.is_empty());
    }

    #[test]
    fn loose_numbers() {
        assert_eq!(loose_i64(Some(&json!(3.0))), Some(3));
        assert_eq!(loose_i64(Some(&json!(" 4 "))), Some(4));
        assert_eq!(loose_i64(Some(&json!(2.5))), None);
        assert_eq!(loose_i64(Some(&json!(null))), None);
        assert_eq!(loose_i64(None), None);
    }
}
