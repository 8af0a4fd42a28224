//! SQLite catalog store: cards keyed by `cid`, variants owned by a card.
//!
//! One connection behind a mutex; every write batch runs in its own
//! transaction so a failed sync leaves the previous snapshot intact.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::normalization::filters::{Bucket, CardFilters};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cards (
    cid           TEXT PRIMARY KEY,
    name          TEXT,
    type          TEXT,
    cost          INTEGER,
    power         INTEGER,
    ability       TEXT,
    flavor        TEXT,
    art           TEXT,
    alternate_art TEXT,
    url           TEXT,
    status        TEXT,
    carddefid     TEXT
);

CREATE TABLE IF NOT EXISTS variants (
    variant_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    cid              TEXT NOT NULL REFERENCES cards (cid) ON DELETE CASCADE,
    vid              TEXT,
    variant_url      TEXT,
    variant_image    TEXT,
    rarity           TEXT,
    rarity_slug      TEXT,
    variant_order    TEXT,
    status           TEXT,
    full_description TEXT,
    inker            TEXT,
    sketcher         TEXT,
    colorist         TEXT,
    release_date     TEXT,
    UNIQUE (cid, vid)
);

CREATE INDEX IF NOT EXISTS idx_variants_cid ON variants (cid);
CREATE INDEX IF NOT EXISTS idx_cards_name ON cards (name);
"#;

const CARD_COLUMNS: &str =
    "cid, name, type, cost, power, ability, flavor, art, alternate_art, url, status, carddefid";

const VARIANT_COLUMNS: &str = "variant_id, cid, vid, variant_url, variant_image, rarity, \
     rarity_slug, variant_order, status, full_description, inker, sketcher, colorist, release_date";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub cid: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub card_type: Option<String>,
    pub cost: Option<i64>,
    pub power: Option<i64>,
    pub ability: Option<String>,
    pub flavor: Option<String>,
    /// Local canonical image path, never a remote URL.
    pub art: Option<String>,
    pub alternate_art: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub carddefid: Option<String>,
}

impl Card {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            cid: row.get(0)?,
            name: row.get(1)?,
            card_type: row.get(2)?,
            cost: row.get(3)?,
            power: row.get(4)?,
            ability: row.get(5)?,
            flavor: row.get(6)?,
            art: row.get(7)?,
            alternate_art: row.get(8)?,
            url: row.get(9)?,
            status: row.get(10)?,
            carddefid: row.get(11)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Surrogate key; `None` until stored.
    pub variant_id: Option<i64>,
    pub cid: String,
    pub vid: Option<String>,
    /// Remote art URL the image was fetched from.
    pub variant_url: Option<String>,
    /// Local canonical image path, `None` if materialization failed.
    pub variant_image: Option<String>,
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

impl Variant {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            variant_id: row.get(0)?,
            cid: row.get(1)?,
            vid: row.get(2)?,
            variant_url: row.get(3)?,
            variant_image: row.get(4)?,
            rarity: row.get(5)?,
            rarity_slug: row.get(6)?,
            variant_order: row.get(7)?,
            status: row.get(8)?,
            full_description: row.get(9)?,
            inker: row.get(10)?,
            sketcher: row.get(11)?,
            colorist: row.get(12)?,
            release_date: row.get(13)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardPage {
    pub cards: Vec<Card>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total_cards: u64,
}

impl CardPage {
    /// What the web layer shows when the store is empty or unreadable.
    pub fn empty(page: u32) -> Self {
        Self {
            cards: Vec::new(),
            total_pages: 1,
            current_page: page.max(1),
            total_cards: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardDetail {
    pub card: Card,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub cards: usize,
    pub variants: usize,
}

/// `ceil(total / page_size)`, never less than one page.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    let pages = total.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub struct CatalogStore {
    conn: Mutex<Connection>,
    page_size: u32,
}

impl CatalogStore {
    /// Open (creating parent directories) and ensure the schema exists.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path, page_size: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
PRAGMA foreign_keys = ON;
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 3000;
"#,
        )?;
        let store = Self::from_connection(conn, page_size);
        store.ensure_schema()?;
        info!("catalog store ready");
        Ok(store)
    }

    pub fn open_in_memory(page_size: u32) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self::from_connection(conn, page_size);
        store.ensure_schema()?;
        Ok(store)
    }

    fn from_connection(conn: Connection, page_size: u32) -> Self {
        Self {
            conn: Mutex::new(conn),
            page_size: page_size.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Idempotent DDL; safe on every startup.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.lock()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert-or-update keyed by `cid`, all rows in one transaction.
    #[instrument(skip_all, fields(cards = cards.len()))]
    pub fn upsert_cards(&self, cards: &[Card]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for card in cards {
            upsert_card_tx(&tx, card)?;
        }
        tx.commit()?;
        Ok(cards.len())
    }

    /// Replace the variant set owned by `cid`. The card must already exist.
    #[instrument(skip(self, variants), fields(variants = variants.len()))]
    pub fn upsert_variants(&self, cid: &str, variants: &[Variant]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let n = replace_variants_tx(&tx, cid, variants)?;
        tx.commit()?;
        Ok(n)
    }

    /// Write a whole sync snapshot: every card and every card's variant set
    /// in a single transaction.
    #[instrument(skip_all, fields(cards = entries.len()))]
    pub fn persist_catalog(&self, entries: &[(Card, Vec<Variant>)]) -> Result<PersistStats, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut stats = PersistStats::default();
        for (card, variants) in entries {
            upsert_card_tx(&tx, card)?;
            stats.cards += 1;
            stats.variants += replace_variants_tx(&tx, &card.cid, variants)?;
        }
        tx.commit()?;
        info!(cards = stats.cards, variants = stats.variants, "catalog snapshot committed");
        Ok(stats)
    }

    /// One page of cards matching `filters`. Pages are 1-based (0 is read as
    /// 1); pages past the end come back with no cards.
    #[instrument(skip(self))]
    pub fn query_cards(&self, page: u32, filters: &CardFilters) -> Result<CardPage, StoreError> {
        let page = page.max(1);
        let (where_sql, mut values) = filter_clause(filters);
        let conn = self.lock()?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM cards{where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let total = u64::try_from(total).unwrap_or(0);

        let offset = i64::from(page - 1).saturating_mul(i64::from(self.page_size));
        values.push(SqlValue::Integer(i64::from(self.page_size)));
        values.push(SqlValue::Integer(offset));
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards{where_sql} \
             ORDER BY name COLLATE NOCASE, cid LIMIT ? OFFSET ?"
        );
        debug!(sql = %sql, "query cards");

        let mut stmt = conn.prepare(&sql)?;
        let cards = stmt
            .query_map(params_from_iter(values.iter()), Card::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CardPage {
            cards,
            total_pages: total_pages(total, self.page_size),
            current_page: page,
            total_cards: total,
        })
    }

    /// Convenience over `query_cards` taking raw query-string values.
    pub fn list_cards(
        &self,
        page: u32,
        query: Option<&str>,
        cost: Option<&str>,
        power: Option<&str>,
    ) -> Result<CardPage, StoreError> {
        self.query_cards(page, &CardFilters::from_query(query, cost, power))
    }

    /// A card and its variants ordered by `variant_order`, then `vid`.
    #[instrument(skip(self))]
    pub fn get_card(&self, cid: &str) -> Result<CardDetail, StoreError> {
        let conn = self.lock()?;
        let card = conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE cid = ?1"),
                [cid],
                Card::from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(cid.to_string()))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE cid = ?1 \
             ORDER BY CAST(variant_order AS INTEGER), variant_order, vid, variant_id"
        ))?;
        let variants = stmt
            .query_map([cid], Variant::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CardDetail { card, variants })
    }

    pub fn count_cards(&self) -> Result<u64, StoreError> {
        self.count("cards")
    }

    pub fn count_variants(&self) -> Result<u64, StoreError> {
        self.count("variants")
    }

    fn count(&self, table: &'static str) -> Result<u64, StoreError> {
        let n: i64 = self
            .lock()?
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

fn upsert_card_tx(tx: &Transaction<'_>, card: &Card) -> rusqlite::Result<()> {
    tx.execute(
        r#"
INSERT INTO cards (cid, name, type, cost, power, ability, flavor, art, alternate_art, url, status, carddefid)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
ON CONFLICT (cid) DO UPDATE SET
    name = excluded.name,
    type = excluded.type,
    cost = excluded.cost,
    power = excluded.power,
    ability = excluded.ability,
    flavor = excluded.flavor,
    art = excluded.art,
    alternate_art = excluded.alternate_art,
    url = excluded.url,
    status = excluded.status,
    carddefid = excluded.carddefid
"#,
        params![
            card.cid,
            card.name,
            card.card_type,
            card.cost,
            card.power,
            card.ability,
            card.flavor,
            card.art,
            card.alternate_art,
            card.url,
            card.status,
            card.carddefid,
        ],
    )?;
    Ok(())
}

/// Variants with a `vid` are upserted on `(cid, vid)` so their ids stay
/// stable across runs; everything else owned by `cid` is replaced. Returns
/// the number of rows `cid` owns afterwards.
fn replace_variants_tx(tx: &Transaction<'_>, cid: &str, variants: &[Variant]) -> rusqlite::Result<usize> {
    let keep: Vec<&str> = variants.iter().filter_map(|v| v.vid.as_deref()).collect();
    let keep_json = serde_json::to_string(&keep).unwrap_or_else(|_| "[]".to_string());
    tx.execute(
        "DELETE FROM variants WHERE cid = ?1 \
         AND (vid IS NULL OR vid NOT IN (SELECT value FROM json_each(?2)))",
        params![cid, keep_json],
    )?;

    let mut stmt = tx.prepare_cached(
        r#"
INSERT INTO variants (cid, vid, variant_url, variant_image, rarity, rarity_slug, variant_order,
                      status, full_description, inker, sketcher, colorist, release_date)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
ON CONFLICT (cid, vid) DO UPDATE SET
    variant_url = excluded.variant_url,
    variant_image = excluded.variant_image,
    rarity = excluded.rarity,
    rarity_slug = excluded.rarity_slug,
    variant_order = excluded.variant_order,
    status = excluded.status,
    full_description = excluded.full_description,
    inker = excluded.inker,
    sketcher = excluded.sketcher,
    colorist = excluded.colorist,
    release_date = excluded.release_date
"#,
    )?;
    for v in variants {
        stmt.execute(params![
            cid,
            v.vid,
            v.variant_url,
            v.variant_image,
            v.rarity,
            v.rarity_slug,
            v.variant_order,
            v.status,
            v.full_description,
            v.inker,
            v.sketcher,
            v.colorist,
            v.release_date,
        ])?;
    }
    let stored: i64 = tx.query_row("SELECT COUNT(*) FROM variants WHERE cid = ?1", [cid], |row| {
        row.get(0)
    })?;
    Ok(usize::try_from(stored).unwrap_or(0))
}

/// ` WHERE ...` (or empty) plus positional values, in order.
fn filter_clause(filters: &CardFilters) -> (String, Vec<SqlValue>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();

    if let Some(q) = &filters.name_contains {
        clauses.push("name LIKE ? ESCAPE '\\'".to_string());
        values.push(SqlValue::Text(format!("%{}%", escape_like(q))));
    }
    for (column, buckets) in [("cost", &filters.cost_in), ("power", &filters.power_in)] {
        if buckets.is_empty() {
            continue;
        }
        let parts: Vec<String> = buckets
            .iter()
            .map(|b: &Bucket| {
                let (sql, v) = b.predicate(column);
                values.push(SqlValue::Integer(v));
                sql
            })
            .collect();
        clauses.push(format!("({})", parts.join(" OR ")));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(cid: &str, name: &str, cost: i64, power: i64) -> Card {
        Card {
            cid: cid.to_string(),
            name: Some(name.to_string()),
            card_type: Some("Character".into()),
            cost: Some(cost),
            power: Some(power),
            ability: None,
            flavor: None,
            art: Some(format!("static/images/cards/{cid}.png")),
            alternate_art: None,
            url: None,
            status: Some("released".into()),
            carddefid: Some(name.replace(' ', "")),
        }
    }

    fn variant(cid: &str, vid: Option<&str>, order: &str) -> Variant {
        Variant {
            variant_id: None,
            cid: cid.to_string(),
            vid: vid.map(str::to_string),
            variant_url: Some(format!("https://cdn.example.com/v/{cid}_{order}.webp")),
            variant_image: Some(format!("static/images/variants/{cid}_{order}.png")),
            rarity: Some("Rare".into()),
            rarity_slug: Some("rare".into()),
            variant_order: Some(order.to_string()),
            status: None,
            full_description: None,
            inker: Some("Ink".into()),
            sketcher: None,
            colorist: None,
            release_date: None,
        }
    }

    fn seeded(n: usize, page_size: u32) -> CatalogStore {
        let store = CatalogStore::open_in_memory(page_size).unwrap();
        let cards: Vec<Card> = (0..n)
            .map(|i| card(&format!("c{i:03}"), &format!("Card {i:03}"), (i % 8) as i64, 2))
            .collect();
        store.upsert_cards(&cards).unwrap();
        store
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.count_cards().unwrap(), 0);
    }

    #[test]
    fn total_pages_rounds_up_with_floor_of_one() {
        assert_eq!(total_pages(0, 30), 1);
        assert_eq!(total_pages(30, 30), 1);
        assert_eq!(total_pages(31, 30), 2);
        assert_eq!(total_pages(61, 30), 3);
    }

    #[test]
    fn pagination_covers_every_row() {
        let store = seeded(47, 10);
        let first = store.query_cards(1, &CardFilters::default()).unwrap();
        assert_eq!(first.total_pages, 5);
        assert_eq!(first.cards.len(), 10);
        assert_eq!(first.total_cards, 47);

        let last = store.query_cards(5, &CardFilters::default()).unwrap();
        assert_eq!(last.cards.len(), 47 - 4 * 10);
        assert_eq!(last.cards.last().unwrap().cid, "c046");
    }

    #[test]
    fn out_of_range_page_is_empty_not_error() {
        let store = seeded(15, 10);
        let page = store.query_cards(99_999, &CardFilters::default()).unwrap();
        assert!(page.cards.is_empty());
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn empty_store_reports_one_page() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        let page = store.query_cards(1, &CardFilters::default()).unwrap();
        assert!(page.cards.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn cost_buckets_are_open_ended() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        store
            .upsert_cards(&[
                card("a", "Zero", 0, 1),
                card("b", "One", 1, 1),
                card("c", "Two", 2, 1),
                card("d", "Six", 6, 1),
                card("e", "Eight", 8, 1),
            ])
            .unwrap();

        let low = store.list_cards(1, None, Some("1"), None).unwrap();
        let cids: Vec<_> = low.cards.iter().map(|c| c.cid.as_str()).collect();
        assert_eq!(cids, vec!["b", "a"]);

        let high = store.list_cards(1, None, Some("6"), None).unwrap();
        let mut cids: Vec<_> = high.cards.iter().map(|c| c.cid.as_str()).collect();
        cids.sort();
        assert_eq!(cids, vec!["d", "e"]);

        let both = store.list_cards(1, None, Some("1,2"), None).unwrap();
        assert_eq!(both.total_cards, 3);
    }

    #[test]
    fn filters_are_conjunctive_and_counted() {
        let store = CatalogStore::open_in_memory(1).unwrap();
        store
            .upsert_cards(&[
                card("a", "Iron Man", 5, 0),
                card("b", "Iron Fist", 1, 2),
                card("c", "Ironheart", 3, 3),
                card("d", "Hulk", 6, 12),
            ])
            .unwrap();

        let page = store.list_cards(1, Some("iron"), Some("1,5"), Some("2")).unwrap();
        assert_eq!(page.total_cards, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.cards[0].cid, "b");

        let named = store.list_cards(1, Some("iron"), None, None).unwrap();
        assert_eq!(named.total_cards, 3);
        assert_eq!(named.total_pages, 3);
    }

    #[test]
    fn like_wildcards_are_literal() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        store
            .upsert_cards(&[card("a", "100% Mystery", 1, 1), card("b", "Mystique", 2, 2)])
            .unwrap();
        let page = store.list_cards(1, Some("%"), None, None).unwrap();
        assert_eq!(page.total_cards, 1);
        assert_eq!(page.cards[0].cid, "a");
    }

    #[test]
    fn upsert_overwrites_by_cid() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        store.upsert_cards(&[card("a", "Old", 1, 1)]).unwrap();
        let mut updated = card("a", "New", 2, 3);
        updated.art = None;
        store.upsert_cards(&[updated.clone()]).unwrap();

        assert_eq!(store.count_cards().unwrap(), 1);
        assert_eq!(store.get_card("a").unwrap().card, updated);
    }

    #[test]
    fn variant_sets_are_replaced_and_ids_kept() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        store.upsert_cards(&[card("hulk", "Hulk", 6, 12)]).unwrap();
        store
            .upsert_variants(
                "hulk",
                &[
                    variant("hulk", Some("1"), "2"),
                    variant("hulk", Some("2"), "1"),
                    variant("hulk", None, "3"),
                ],
            )
            .unwrap();
        let before = store.get_card("hulk").unwrap().variants;
        assert_eq!(before.len(), 3);
        assert_eq!(before[0].vid.as_deref(), Some("2"));
        let kept_id = before.iter().find(|v| v.vid.as_deref() == Some("1")).unwrap().variant_id;

        store
            .upsert_variants("hulk", &[variant("hulk", Some("1"), "2")])
            .unwrap();
        let after = store.get_card("hulk").unwrap().variants;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].variant_id, kept_id);
        assert_eq!(store.count_variants().unwrap(), 1);
    }

    #[test]
    fn repeated_vid_counts_stored_rows() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        store.upsert_cards(&[card("a", "A", 1, 1)]).unwrap();
        let mut second = variant("a", Some("1"), "2");
        second.variant_image = Some("static/images/variants/second.png".into());
        let written = store
            .upsert_variants("a", &[variant("a", Some("1"), "1"), second.clone()])
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(store.count_variants().unwrap(), 1);
        assert_eq!(
            store.get_card("a").unwrap().variants[0].variant_image,
            second.variant_image
        );
    }

    #[test]
    fn variants_require_existing_card() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        let err = store
            .upsert_variants("ghost", &[variant("ghost", Some("1"), "1")])
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert_eq!(store.count_variants().unwrap(), 0);
    }

    #[test]
    fn unknown_cid_is_not_found() {
        let store = seeded(2, 30);
        assert!(store.get_card("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn persist_catalog_writes_cards_and_variants() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        let stats = store
            .persist_catalog(&[
                (card("a", "A", 1, 1), vec![variant("a", Some("1"), "1")]),
                (card("b", "B", 2, 2), Vec::new()),
            ])
            .unwrap();
        assert_eq!(stats, PersistStats { cards: 2, variants: 1 });
        assert_eq!(store.count_cards().unwrap(), 2);
        assert_eq!(store.count_variants().unwrap(), 1);
    }

    #[test]
    fn failed_persist_leaves_previous_snapshot() {
        let store = CatalogStore::open_in_memory(30).unwrap();
        store.upsert_cards(&[card("a", "A", 1, 1)]).unwrap();
        store.lock().unwrap().execute_batch("DROP TABLE variants").unwrap();

        let err = store
            .persist_catalog(&[
                (card("a", "Renamed", 1, 1), Vec::new()),
                (card("b", "B", 2, 2), Vec::new()),
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert_eq!(store.count_cards().unwrap(), 1);
        let name: String = store
            .lock()
            .unwrap()
            .query_row("SELECT name FROM cards WHERE cid = 'a'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "A");
    }

    #[test]
    fn opens_file_database_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database").join("cards.db");
        {
            let store = CatalogStore::open(&path, 30).unwrap();
            store.upsert_cards(&[card("a", "A", 1, 1)]).unwrap();
        }
        let reopened = CatalogStore::open(&path, 30).unwrap();
        assert_eq!(reopened.count_cards().unwrap(), 1);
    }
}
