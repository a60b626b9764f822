// Data Cache - day-indexed orbital element table with range management
// Prefetches element records ahead of playback, prunes stale days and
// persists through a simple key -> JSON store.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bodies::{BodyCatalog, BodyConfig};
use crate::error::{EphemerisError, OrbitalError, Result};
use crate::orbital_mechanics::OrbitalElements;

pub const TABLE_KEY: &str = "orbital_elements_table";
pub const META_KEY: &str = "orbital_elements_meta";

// =============================================================================
// DATE HELPERS
// =============================================================================

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| OrbitalError::InvalidDate(value.to_string()))
}

/// Inclusive day span; rejects `end < start` before anything else happens
pub fn date_span(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if end < start {
        return Err(OrbitalError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

// =============================================================================
// DAILY ELEMENTS TABLE
// =============================================================================

/// One slot per tracked body, in catalog order; `None` until fetched
pub type DayRecord = Vec<Option<OrbitalElements>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyElementsTable {
    days: BTreeMap<NaiveDate, DayRecord>,
}

impl DailyElementsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day(&self, date: &NaiveDate) -> Option<&DayRecord> {
        self.days.get(date)
    }

    pub fn slot(&self, date: &NaiveDate, body_index: usize) -> Option<&OrbitalElements> {
        self.days.get(date)?.get(body_index)?.as_ref()
    }

    /// Replaces the whole day record
    pub fn insert_day(&mut self, date: NaiveDate, record: DayRecord) {
        self.days.insert(date, record);
    }

    pub fn is_complete(&self, date: &NaiveDate, body_count: usize) -> bool {
        self.days
            .get(date)
            .map(|record| record.len() == body_count && record.iter().all(Option::is_some))
            .unwrap_or(false)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.days.keys()
    }

    /// Drops every day strictly before `cutoff`, returns how many were removed
    pub fn remove_before(&mut self, cutoff: NaiveDate) -> usize {
        let kept = self.days.split_off(&cutoff);
        let removed = self.days.len();
        self.days = kept;
        removed
    }

    /// Drops records whose length does not match the catalog
    fn retain_body_count(&mut self, body_count: usize) -> usize {
        let before = self.days.len();
        self.days.retain(|_, record| record.len() == body_count);
        before - self.days.len()
    }
}

// =============================================================================
// COVERAGE METADATA
// =============================================================================

/// Believed-contiguous coverage of the table. An index, not a source of truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetadata {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub last_cleanup: Option<DateTime<Utc>>,
}

impl CoverageMetadata {
    /// Union of the current bounds with `[start, end]`
    pub fn widen(&mut self, start: NaiveDate, end: NaiveDate) {
        self.start = Some(self.start.map_or(start, |s| s.min(start)));
        self.end = Some(self.end.map_or(end, |e| e.max(end)));
    }

    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        match (self.start, self.end) {
            (Some(s), Some(e)) => s <= start && end <= e,
            _ => false,
        }
    }

    /// Every stored day must fall inside the advertised bounds
    pub fn is_consistent_with(&self, table: &DailyElementsTable) -> bool {
        match (table.first_date(), table.last_date()) {
            (Some(first), Some(last)) => self.covers(first, last),
            _ => true,
        }
    }

    pub fn rebuild_from(&mut self, table: &DailyElementsTable) {
        self.start = table.first_date();
        self.end = table.last_date();
    }
}

// =============================================================================
// PERSISTENT STORE
// =============================================================================

/// Key -> JSON blob persistence
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(OrbitalError::Store(format!("invalid key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// EPHEMERIS PROVIDER
// =============================================================================

/// Source of raw orbital elements for one body on one day
pub trait EphemerisProvider: Send + Sync {
    fn fetch_elements(
        &self,
        body: &BodyConfig,
        date: NaiveDate,
    ) -> impl Future<Output = std::result::Result<OrbitalElements, EphemerisError>> + Send;
}

// =============================================================================
// DATA CACHE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendReport {
    pub days: usize,
    /// Slots filled from the provider or synthesized
    pub fetched: usize,
    /// Slots left empty after a provider failure
    pub failed: usize,
    /// Slots already present before the call
    pub skipped: usize,
}

pub struct DataCache<P: EphemerisProvider> {
    catalog: BodyCatalog,
    provider: P,
    store: Box<dyn CacheStore>,
    table: RwLock<Arc<DailyElementsTable>>,
    meta: RwLock<CoverageMetadata>,
    // extend/prune/clear are single-writer and may span awaits
    writer: tokio::sync::Mutex<()>,
}

impl<P: EphemerisProvider> DataCache<P> {
    pub fn new(catalog: BodyCatalog, provider: P) -> Self {
        Self::with_store(catalog, provider, Box::new(MemoryStore::new()))
    }

    pub fn with_store(catalog: BodyCatalog, provider: P, store: Box<dyn CacheStore>) -> Self {
        Self {
            catalog,
            provider,
            store,
            table: RwLock::new(Arc::new(DailyElementsTable::new())),
            meta: RwLock::new(CoverageMetadata::default()),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &BodyCatalog {
        &self.catalog
    }

    /// Read-only snapshot; cheap to clone and safe to share with readers
    pub fn snapshot(&self) -> Arc<DailyElementsTable> {
        self.table.read().clone()
    }

    pub fn coverage(&self) -> CoverageMetadata {
        self.meta.read().clone()
    }

    /// Restore table and metadata from the store. Unreadable blobs are
    /// discarded; metadata is rebuilt when it disagrees with the table.
    pub async fn load(&self) -> Result<()> {
        let _guard = self.writer.lock().await;

        let mut table = match self.store.get(TABLE_KEY)? {
            Some(json) => match serde_json::from_str::<DailyElementsTable>(&json) {
                Ok(table) => table,
                Err(e) => {
                    log::warn!("Discarding unreadable element table: {}", e);
                    DailyElementsTable::new()
                }
            },
            None => DailyElementsTable::new(),
        };

        let dropped = table.retain_body_count(self.catalog.len());
        if dropped > 0 {
            log::warn!(
                "Dropped {} cached day(s) with a body count other than {}",
                dropped,
                self.catalog.len()
            );
        }

        let mut meta = match self.store.get(META_KEY)? {
            Some(json) => serde_json::from_str::<CoverageMetadata>(&json).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable coverage metadata: {}", e);
                CoverageMetadata::default()
            }),
            None => CoverageMetadata::default(),
        };

        if !meta.is_consistent_with(&table) || (meta.start.is_none() && !table.is_empty()) {
            log::info!("Rebuilding coverage metadata from {} cached day(s)", table.len());
            meta.rebuild_from(&table);
        }

        log::info!(
            "Loaded element cache: {} day(s), coverage {:?}..{:?}",
            table.len(),
            meta.start,
            meta.end
        );

        *self.table.write() = Arc::new(table);
        *self.meta.write() = meta;
        Ok(())
    }

    /// Pure read of `[start, end]`; days without a record come back as `None`
    pub fn get_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Option<DayRecord>)>> {
        let dates = date_span(start, end)?;
        let table = self.snapshot();
        Ok(dates
            .into_iter()
            .map(|date| (date, table.day(&date).cloned()))
            .collect())
    }

    pub async fn extend_range_str(&self, start: &str, end: &str) -> Result<ExtendReport> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        self.extend_range(start, end).await
    }

    /// Fill every missing slot in `[start, end]`.
    ///
    /// The star is synthesized as zeroed elements. A provider failure for one
    /// body/day is logged and leaves that slot empty; the rest of the range
    /// still completes.
    pub async fn extend_range(&self, start: NaiveDate, end: NaiveDate) -> Result<ExtendReport> {
        let dates = date_span(start, end)?;
        let _guard = self.writer.lock().await;

        let body_count = self.catalog.len();
        let existing = self.snapshot();
        let mut report = ExtendReport {
            days: dates.len(),
            ..ExtendReport::default()
        };
        let mut updates: Vec<(NaiveDate, DayRecord)> = Vec::with_capacity(dates.len());

        for date in dates {
            let mut record = match existing.day(&date) {
                Some(record) if record.len() == body_count => record.clone(),
                _ => vec![None; body_count],
            };

            for (idx, body) in self.catalog.bodies().iter().enumerate() {
                if body.is_star() {
                    match record[idx] {
                        Some(elements) if elements.is_zeroed() => report.skipped += 1,
                        _ => {
                            record[idx] = Some(OrbitalElements::zeroed());
                            report.fetched += 1;
                        }
                    }
                    continue;
                }

                if record[idx].is_some() {
                    report.skipped += 1;
                    continue;
                }

                match self.provider.fetch_elements(body, date).await {
                    Ok(elements) => {
                        record[idx] = Some(elements);
                        report.fetched += 1;
                    }
                    Err(e) => {
                        log::warn!("Failed to fetch {} for {}: {}", body.name, date, e);
                        report.failed += 1;
                    }
                }
            }

            updates.push((date, record));
        }
        drop(existing);

        {
            let mut table = self.table.write();
            let next = Arc::make_mut(&mut *table);
            for (date, record) in updates {
                next.insert_day(date, record);
            }
        }
        self.meta.write().widen(start, end);

        log::info!(
            "Extended element cache {}..{}: {} fetched, {} failed, {} already cached",
            start,
            end,
            report.fetched,
            report.failed,
            report.skipped
        );

        self.persist();
        Ok(report)
    }

    /// Drop all days strictly before `cutoff`
    pub async fn prune_before(&self, cutoff: NaiveDate) -> usize {
        let _guard = self.writer.lock().await;
        self.prune_locked(cutoff, Utc::now())
    }

    /// Prune everything before `now`'s date, at most once per calendar day
    pub async fn cleanup_if_due(&self, now: DateTime<Utc>) -> Option<usize> {
        let _guard = self.writer.lock().await;
        let today = now.date_naive();
        let due = self
            .meta
            .read()
            .last_cleanup
            .map_or(true, |last| last.date_naive() < today);
        if !due {
            return None;
        }
        Some(self.prune_locked(today, now))
    }

    fn prune_locked(&self, cutoff: NaiveDate, now: DateTime<Utc>) -> usize {
        let (removed, earliest) = {
            let mut table = self.table.write();
            let next = Arc::make_mut(&mut *table);
            let removed = next.remove_before(cutoff);
            (removed, next.first_date())
        };

        {
            let mut meta = self.meta.write();
            meta.start = Some(earliest.unwrap_or(cutoff));
            meta.last_cleanup = Some(now);
        }

        log::info!("Pruned {} day(s) before {}", removed, cutoff);
        self.persist();
        removed
    }

    /// True iff every day in `[start, end]` has a complete record
    pub fn check_availability(&self, start: NaiveDate, end: NaiveDate) -> bool {
        let Ok(dates) = date_span(start, end) else {
            return false;
        };
        if !self.meta.read().covers(start, end) {
            return false;
        }
        let table = self.snapshot();
        let body_count = self.catalog.len();
        dates.iter().all(|date| table.is_complete(date, body_count))
    }

    /// Days in `[start, end]` that still need at least one slot filled
    pub fn missing_days(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let dates = date_span(start, end)?;
        let table = self.snapshot();
        let body_count = self.catalog.len();
        Ok(dates
            .into_iter()
            .filter(|date| !table.is_complete(date, body_count))
            .collect())
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.writer.lock().await;
        *self.table.write() = Arc::new(DailyElementsTable::new());
        *self.meta.write() = CoverageMetadata::default();
        self.store.delete(TABLE_KEY)?;
        self.store.delete(META_KEY)?;
        log::info!("Cleared element cache");
        Ok(())
    }

    // The in-memory table stays authoritative if the store write fails
    fn persist(&self) {
        if let Err(e) = self.try_persist() {
            log::warn!("Failed to persist element cache: {}", e);
        }
    }

    fn try_persist(&self) -> Result<()> {
        let table_json = serde_json::to_string(self.snapshot().as_ref())?;
        let meta_json = serde_json::to_string(&*self.meta.read())?;
        self.store.set(TABLE_KEY, &table_json)?;
        self.store.set(META_KEY, &meta_json)?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Datelike;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct MockProvider {
        failing: HashSet<String>,
        pub(crate) calls: AtomicUsize,
    }

    impl MockProvider {
        pub(crate) fn new() -> Self {
            Self {
                failing: HashSet::new(),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing_for(body_id: &str) -> Self {
            Self {
                failing: [body_id.to_string()].into_iter().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EphemerisProvider for MockProvider {
        fn fetch_elements(
            &self,
            body: &BodyConfig,
            date: NaiveDate,
        ) -> impl Future<Output = std::result::Result<OrbitalElements, EphemerisError>> + Send
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.failing.contains(&body.id) {
                Err(EphemerisError::MissingData {
                    body: body.id.clone(),
                    date: date.to_string(),
                })
            } else {
                Ok(OrbitalElements {
                    a: 1.0,
                    e: 0.01,
                    i: 1.0,
                    om: 10.0,
                    w: 20.0,
                    m0: date.ordinal() as f64,
                    t: 365.25,
                })
            };
            async move { result }
        }
    }

    /// Yields to the scheduler before every answer so writers can overlap
    struct YieldingProvider;

    impl EphemerisProvider for YieldingProvider {
        fn fetch_elements(
            &self,
            _body: &BodyConfig,
            date: NaiveDate,
        ) -> impl Future<Output = std::result::Result<OrbitalElements, EphemerisError>> + Send
        {
            async move {
                tokio::task::yield_now().await;
                Ok(OrbitalElements {
                    a: 1.0,
                    m0: date.ordinal() as f64,
                    t: 365.25,
                    ..OrbitalElements::default()
                })
            }
        }
    }

    fn d(value: &str) -> NaiveDate {
        parse_date(value).unwrap()
    }

    fn cache(provider: MockProvider) -> DataCache<MockProvider> {
        DataCache::new(BodyCatalog::solar_system(), provider)
    }

    #[test]
    fn test_date_span_rejects_reversed_range() {
        assert!(matches!(
            date_span(d("2025-01-03"), d("2025-01-01")),
            Err(OrbitalError::InvalidRange { .. })
        ));
        assert_eq!(date_span(d("2025-01-01"), d("2025-01-03")).unwrap().len(), 3);
        assert!(matches!(parse_date("2025-13-01"), Err(OrbitalError::InvalidDate(_))));
    }

    #[tokio::test]
    async fn test_extend_fills_table_and_synthesizes_star() {
        let cache = cache(MockProvider::new());
        let report = cache
            .extend_range(d("2025-01-01"), d("2025-01-03"))
            .await
            .unwrap();

        assert_eq!(report.days, 3);
        assert_eq!(report.fetched, 30);
        assert_eq!(report.failed, 0);
        // 9 fetched bodies per day, the star is synthesized
        assert_eq!(cache.provider.calls.load(Ordering::SeqCst), 27);

        let table = cache.snapshot();
        let star = cache.catalog().star_index().unwrap();
        assert_eq!(table.slot(&d("2025-01-02"), star), Some(&OrbitalElements::zeroed()));
        assert!(cache.check_availability(d("2025-01-01"), d("2025-01-03")));

        let meta = cache.coverage();
        assert_eq!(meta.start, Some(d("2025-01-01")));
        assert_eq!(meta.end, Some(d("2025-01-03")));
    }

    #[tokio::test]
    async fn test_extend_and_prune_do_not_interleave() {
        let cache = DataCache::new(BodyCatalog::solar_system(), YieldingProvider);
        cache.extend_range(d("2025-01-01"), d("2025-01-02")).await.unwrap();

        let (extended, removed) = tokio::join!(
            cache.extend_range(d("2025-01-01"), d("2025-01-05")),
            cache.prune_before(d("2025-01-03")),
        );
        let report = extended.unwrap();
        let table = cache.snapshot();
        let dates: Vec<NaiveDate> = table.dates().copied().collect();
        assert_eq!(removed, 2);

        // extend then prune: Jan 1-2 were already cached and are then dropped
        let extend_first = report.skipped == 20
            && dates == date_span(d("2025-01-03"), d("2025-01-05")).unwrap();
        // prune then extend: Jan 1-2 are fetched again
        let prune_first = report.skipped == 0
            && dates == date_span(d("2025-01-01"), d("2025-01-05")).unwrap();
        assert!(extend_first || prune_first, "skipped {} dates {:?}", report.skipped, dates);

        assert!(cache.coverage().is_consistent_with(&table));
        assert!(dates.iter().all(|date| table.is_complete(date, 10)));
    }

    #[tokio::test]
    async fn test_extend_resets_star_slot() {
        let cache = cache(MockProvider::new());
        let star = cache.catalog().star_index().unwrap();
        let mut record = vec![None; cache.catalog().len()];
        record[star] = Some(OrbitalElements {
            a: 0.5,
            ..OrbitalElements::zeroed()
        });
        let mut seeded = DailyElementsTable::new();
        seeded.insert_day(d("2025-01-01"), record);
        *cache.table.write() = Arc::new(seeded);

        let report = cache
            .extend_range(d("2025-01-01"), d("2025-01-01"))
            .await
            .unwrap();
        assert_eq!(report.fetched, 10);
        assert_eq!(report.skipped, 0);
        let slot = cache.snapshot().slot(&d("2025-01-01"), star).copied();
        assert!(slot.is_some_and(|elements| elements.is_zeroed()));
    }

    #[tokio::test]
    async fn test_extend_only_fetches_missing_slots() {
        let cache = cache(MockProvider::new());
        cache.extend_range(d("2025-01-01"), d("2025-01-02")).await.unwrap();
        let report = cache
            .extend_range(d("2025-01-02"), d("2025-01-04"))
            .await
            .unwrap();

        assert_eq!(report.skipped, 10);
        assert_eq!(report.fetched, 20);
        assert_eq!(cache.provider.calls.load(Ordering::SeqCst), 18 + 18);

        let meta = cache.coverage();
        assert_eq!(meta.start, Some(d("2025-01-01")));
        assert_eq!(meta.end, Some(d("2025-01-04")));
    }

    #[tokio::test]
    async fn test_one_failing_body_leaves_others_intact() {
        let cache = cache(MockProvider::failing_for("mars"));
        let report = cache
            .extend_range(d("2025-03-01"), d("2025-03-01"))
            .await
            .unwrap();
        assert_eq!(report.failed, 1);

        let table = cache.snapshot();
        let record = table.day(&d("2025-03-01")).unwrap();
        let mars = cache.catalog().index_of("mars").unwrap();
        let star = cache.catalog().star_index().unwrap();
        assert!(record[mars].is_none());

        let valid_planets = record
            .iter()
            .enumerate()
            .filter(|(idx, slot)| *idx != star && slot.is_some())
            .count();
        assert_eq!(valid_planets, 8);
        assert!(!cache.check_availability(d("2025-03-01"), d("2025-03-01")));
        assert_eq!(
            cache.missing_days(d("2025-03-01"), d("2025-03-01")).unwrap(),
            vec![d("2025-03-01")]
        );
    }

    #[tokio::test]
    async fn test_invalid_range_rejected_before_fetch() {
        let cache = cache(MockProvider::new());
        let result = cache.extend_range(d("2025-01-05"), d("2025-01-01")).await;
        assert!(matches!(result, Err(OrbitalError::InvalidRange { .. })));
        assert_eq!(cache.provider.calls.load(Ordering::SeqCst), 0);

        let result = cache.extend_range_str("2025-01-01", "not-a-date").await;
        assert!(matches!(result, Err(OrbitalError::InvalidDate(_))));
        assert_eq!(cache.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extend_then_prune_availability() {
        let cache = cache(MockProvider::new());
        let (d1, d2, d3) = (d("2025-01-01"), d("2025-01-03"), d("2025-01-05"));
        cache.extend_range(d1, d3).await.unwrap();

        let removed = cache.prune_before(d2).await;
        assert_eq!(removed, 2);
        assert!(cache.check_availability(d2, d3));
        assert!(!cache.check_availability(d1, d2));

        let meta = cache.coverage();
        assert_eq!(meta.start, Some(d2));
        assert!(meta.last_cleanup.is_some());
    }

    #[tokio::test]
    async fn test_prune_everything_moves_start_to_cutoff() {
        let cache = cache(MockProvider::new());
        cache.extend_range(d("2025-01-01"), d("2025-01-02")).await.unwrap();
        cache.prune_before(d("2025-02-01")).await;
        assert!(cache.snapshot().is_empty());
        assert_eq!(cache.coverage().start, Some(d("2025-02-01")));
    }

    #[tokio::test]
    async fn test_get_range_reports_missing_days() {
        let cache = cache(MockProvider::new());
        cache.extend_range(d("2025-01-02"), d("2025-01-02")).await.unwrap();
        let range = cache.get_range(d("2025-01-01"), d("2025-01-03")).unwrap();
        assert_eq!(range.len(), 3);
        assert!(range[0].1.is_none());
        assert_eq!(range[1].1.as_ref().map(|r| r.len()), Some(10));
        assert!(range[2].1.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_runs_once_per_day() {
        let cache = cache(MockProvider::new());
        cache.extend_range(d("2025-01-01"), d("2025-01-04")).await.unwrap();
        let now = d("2025-01-03").and_hms_opt(8, 0, 0).unwrap().and_utc();
        assert_eq!(cache.cleanup_if_due(now).await, Some(2));
        assert_eq!(cache.cleanup_if_due(now).await, None);
    }

    #[tokio::test]
    async fn test_clear_wipes_table_and_store() {
        let cache = cache(MockProvider::new());
        cache.extend_range(d("2025-01-01"), d("2025-01-01")).await.unwrap();
        assert!(cache.store.get(TABLE_KEY).unwrap().is_some());

        cache.clear().await.unwrap();
        assert!(cache.snapshot().is_empty());
        assert_eq!(cache.coverage(), CoverageMetadata::default());
        assert!(cache.store.get(TABLE_KEY).unwrap().is_none());
        assert!(cache.store.get(META_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip_through_load() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path()).unwrap();
            let cache = DataCache::with_store(
                BodyCatalog::solar_system(),
                MockProvider::new(),
                Box::new(store),
            );
            cache.extend_range(d("2025-06-01"), d("2025-06-03")).await.unwrap();
        }

        let store = FileStore::new(dir.path()).unwrap();
        let restored = DataCache::with_store(
            BodyCatalog::solar_system(),
            MockProvider::new(),
            Box::new(store),
        );
        restored.load().await.unwrap();
        assert!(restored.check_availability(d("2025-06-01"), d("2025-06-03")));
        assert_eq!(restored.coverage().end, Some(d("2025-06-03")));
    }

    #[tokio::test]
    async fn test_load_rebuilds_inconsistent_metadata() {
        let store = MemoryStore::new();
        let mut table = DailyElementsTable::new();
        table.insert_day(d("2025-01-10"), vec![Some(OrbitalElements::zeroed()); 10]);
        table.insert_day(d("2025-01-11"), vec![Some(OrbitalElements::zeroed()); 3]);
        store
            .set(TABLE_KEY, &serde_json::to_string(&table).unwrap())
            .unwrap();
        let stale = CoverageMetadata {
            start: Some(d("2025-02-01")),
            end: Some(d("2025-02-05")),
            last_cleanup: None,
        };
        store
            .set(META_KEY, &serde_json::to_string(&stale).unwrap())
            .unwrap();

        let cache = DataCache::with_store(
            BodyCatalog::solar_system(),
            MockProvider::new(),
            Box::new(store),
        );
        cache.load().await.unwrap();

        // the short record is dropped, metadata follows the table
        assert_eq!(cache.snapshot().len(), 1);
        let meta = cache.coverage();
        assert_eq!(meta.start, Some(d("2025-01-10")));
        assert_eq!(meta.end, Some(d("2025-01-10")));
    }

    #[tokio::test]
    async fn test_load_ignores_corrupt_blob() {
        let store = MemoryStore::new();
        store.set(TABLE_KEY, "{not json").unwrap();
        let cache = DataCache::with_store(
            BodyCatalog::solar_system(),
            MockProvider::new(),
            Box::new(store),
        );
        cache.load().await.unwrap();
        assert!(cache.snapshot().is_empty());
    }

    #[test]
    fn test_table_json_uses_iso_dates() {
        let mut table = DailyElementsTable::new();
        table.insert_day(d("2025-01-01"), vec![None, Some(OrbitalElements::zeroed())]);
        let json = serde_json::to_value(&table).unwrap();
        assert!(json["2025-01-01"][0].is_null());
        assert_eq!(json["2025-01-01"][1]["T"], 0.0);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.set("../escape", "{}").is_err());
        assert!(store.get("missing").unwrap().is_none());
        store.delete("missing").unwrap();
    }
}
