//! Modification log facade
//!
//! [`ModificationLog`] is what a hosting application talks to: it turns an
//! action on a content entity into a record in the right category, hands
//! out read-only views, and prunes old records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use modlog_core::{
    Action, ActorResolver, Category, ChangeRecord, Clock, Content, Extra, ModlogError, NoActor,
    RecordKey, SiteId, StorageError, SystemClock,
};
use tracing::{debug, info, instrument, warn};

use crate::LogBackend;
use crate::store::CategoryStore;
use crate::view::ChangesetView;

const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// Something pruning could not do
#[derive(Debug)]
pub struct PruneFailure {
    pub category: Category,
    /// The record that could not be read or deleted; `None` when the
    /// category's keys could not be listed at all
    pub key: Option<RecordKey>,
    pub error: StorageError,
}

/// Outcome of a prune call
///
/// Deletions are independent: a failure is reported here and does not
/// undo the deletions that succeeded.
#[derive(Debug)]
pub struct PruneReport {
    /// Records strictly older than this were selected
    pub cutoff: DateTime<Utc>,
    /// Records deleted, per category
    pub removed: BTreeMap<Category, usize>,
    /// Records examined and kept, per category
    pub retained: BTreeMap<Category, usize>,
    /// Records or categories that could not be pruned
    pub failures: Vec<PruneFailure>,
}

impl PruneReport {
    fn new(cutoff: DateTime<Utc>) -> Self {
        Self {
            cutoff,
            removed: BTreeMap::new(),
            retained: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Total records deleted across categories
    pub fn total_removed(&self) -> usize {
        self.removed.values().sum()
    }

    /// Total records kept across categories
    pub fn total_retained(&self) -> usize {
        self.retained.values().sum()
    }

    /// Whether every targeted category was fully pruned
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Per-site modification logger
///
/// Views are cached per category name for reuse; a fresh view over the same
/// category behaves identically.
pub struct ModificationLog {
    backend: Arc<dyn LogBackend>,
    site: SiteId,
    actors: Arc<dyn ActorResolver>,
    clock: Arc<dyn Clock>,
    custom_categories: BTreeSet<String>,
    views: DashMap<Category, Arc<ChangesetView>>,
}

impl std::fmt::Debug for ModificationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModificationLog")
            .field("site", &self.site)
            .field("custom_categories", &self.custom_categories)
            .field("cached_views", &self.views.len())
            .finish()
    }
}

impl ModificationLog {
    /// Start building a log for `site` on `backend`
    pub fn builder(backend: Arc<dyn LogBackend>, site: SiteId) -> ModificationLogBuilder {
        ModificationLogBuilder::new(backend, site)
    }

    /// The site this log writes to
    pub fn site(&self) -> &SiteId {
        &self.site
    }

    /// The storage backend
    pub fn backend(&self) -> &Arc<dyn LogBackend> {
        &self.backend
    }

    /// Custom categories this log accepts besides the fixed four
    pub fn custom_categories(&self) -> impl Iterator<Item = &str> {
        self.custom_categories.iter().map(String::as_str)
    }

    /// Log an action against a content entity
    ///
    /// If `user` is `None` (or empty) the actor resolver supplies it.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a custom action that is not allow-listed
    /// - `EntityUnidentifiable` if the content has no UID or path
    /// - `NoActor` if no user is given and none can be resolved
    /// - `Storage` if the insert fails
    #[instrument(level = "debug", skip_all, fields(site = %self.site))]
    pub fn log<C: Content + ?Sized>(
        &self,
        action: impl Into<Action>,
        content: &C,
        user: Option<&str>,
        extra: Option<Extra>,
    ) -> Result<RecordKey, ModlogError> {
        let category = self.resolve(action.into().category())?;

        let uid = content
            .uid()
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| ModlogError::unidentifiable("content has no UID"))?;
        let path = content
            .path()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| ModlogError::unidentifiable(format!("content {uid} has no path")))?;
        let user = self.resolve_user(user)?;

        let mut record = ChangeRecord::new(uid, path, user, self.clock.now_utc());
        if let Some(extra) = extra {
            record = record.with_extra(extra);
        }

        let key = self.store(&category).insert(&record)?;
        debug!(
            category = %category,
            key = %key,
            uid = %record.uid,
            user = %record.user,
            "Logged change"
        );
        Ok(key)
    }

    /// Shortcut for `log(Action::Add, ..)`
    pub fn added<C: Content + ?Sized>(
        &self,
        content: &C,
        user: Option<&str>,
        extra: Option<Extra>,
    ) -> Result<RecordKey, ModlogError> {
        self.log(Action::Add, content, user, extra)
    }

    /// Shortcut for `log(Action::Delete, ..)`
    pub fn deleted<C: Content + ?Sized>(
        &self,
        content: &C,
        user: Option<&str>,
        extra: Option<Extra>,
    ) -> Result<RecordKey, ModlogError> {
        self.log(Action::Delete, content, user, extra)
    }

    /// Shortcut for `log(Action::Modify, ..)`
    pub fn modified<C: Content + ?Sized>(
        &self,
        content: &C,
        user: Option<&str>,
        extra: Option<Extra>,
    ) -> Result<RecordKey, ModlogError> {
        self.log(Action::Modify, content, user, extra)
    }

    /// Shortcut for `log(Action::Move, ..)`, also used for renames
    pub fn moved<C: Content + ?Sized>(
        &self,
        content: &C,
        user: Option<&str>,
        extra: Option<Extra>,
    ) -> Result<RecordKey, ModlogError> {
        self.log(Action::Move, content, user, extra)
    }

    /// Addition records
    pub fn additions(&self) -> Arc<ChangesetView> {
        self.cached_view(Category::Additions)
    }

    /// Deletion records
    pub fn deletions(&self) -> Arc<ChangesetView> {
        self.cached_view(Category::Deletions)
    }

    /// Modification records
    pub fn modifications(&self) -> Arc<ChangesetView> {
        self.cached_view(Category::Modifications)
    }

    /// Move and rename records
    pub fn moves(&self) -> Arc<ChangesetView> {
        self.cached_view(Category::Moves)
    }

    /// View of any accepted category, by noun or verb name
    pub fn view(&self, name: &str) -> Result<Arc<ChangesetView>, ModlogError> {
        let category = self.resolve(Category::from_name(name)?)?;
        Ok(self.cached_view(category))
    }

    /// Delete records older than a cutoff
    ///
    /// The cutoff is `now - days` when `days` is given, otherwise
    /// `timespec`. Records strictly older than the cutoff are deleted;
    /// records exactly at the cutoff are kept. Without a `category` every
    /// accepted category is pruned.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if neither `days` nor `timespec` is given, if
    /// `days` is negative or not finite, or if the category is not
    /// accepted by this log. Individual deletion failures are collected in
    /// the report instead.
    pub fn prune(
        &self,
        category: Option<&str>,
        days: Option<f64>,
        timespec: Option<DateTime<Utc>>,
    ) -> Result<PruneReport, ModlogError> {
        let cutoff = match (days, timespec) {
            (Some(days), _) => self.cutoff_for_age(days_to_duration(days)?)?,
            (None, Some(timespec)) => timespec,
            (None, None) => {
                return Err(ModlogError::invalid_argument(
                    "prune requires either days or timespec",
                ));
            }
        };
        let targets = self.prune_targets(category)?;
        self.prune_categories(&targets, cutoff)
    }

    /// Delete records older than `age`, in one category or all of them
    pub fn prune_older_than(
        &self,
        category: Option<&str>,
        age: Duration,
    ) -> Result<PruneReport, ModlogError> {
        if age < Duration::zero() {
            return Err(ModlogError::invalid_argument("prune age is negative"));
        }
        let cutoff = self.cutoff_for_age(age)?;
        let targets = self.prune_targets(category)?;
        self.prune_categories(&targets, cutoff)
    }

    /// Delete records logged before `cutoff`, in one category or all of them
    pub fn prune_before(
        &self,
        category: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<PruneReport, ModlogError> {
        let targets = self.prune_targets(category)?;
        self.prune_categories(&targets, cutoff)
    }

    /// Every category this log accepts: the fixed four plus allow-listed ones
    pub fn accepted_categories(&self) -> Vec<Category> {
        Category::FIXED
            .into_iter()
            .chain(
                self.custom_categories
                    .iter()
                    .map(|name| Category::Custom(name.clone())),
            )
            .collect()
    }

    #[instrument(skip(self, targets), fields(site = %self.site))]
    fn prune_categories(
        &self,
        targets: &[Category],
        cutoff: DateTime<Utc>,
    ) -> Result<PruneReport, ModlogError> {
        let mut report = PruneReport::new(cutoff);

        if !self.backend.site_exists(&self.site)? {
            debug!("Nothing logged for site yet, nothing to prune");
            return Ok(report);
        }

        for category in targets {
            let store = self.store(category);
            let mut removed = 0;
            let mut retained = 0;

            // Keys inserted after this snapshot are never examined
            let keys = match store.keys() {
                Ok(keys) => keys,
                Err(error) => {
                    warn!(category = %category, error = %error, "Failed to list keys for pruning");
                    report.failures.push(PruneFailure {
                        category: category.clone(),
                        key: None,
                        error,
                    });
                    continue;
                }
            };

            for key in keys {
                let record = match store.get(key) {
                    Ok(Some(record)) => record,
                    Ok(None) => continue,
                    Err(error) => {
                        report.failures.push(PruneFailure {
                            category: category.clone(),
                            key: Some(key),
                            error,
                        });
                        continue;
                    }
                };

                if record.timestamp >= cutoff {
                    retained += 1;
                    continue;
                }

                match store.delete(key) {
                    Ok(_) => removed += 1,
                    Err(error) => {
                        warn!(category = %category, key = %key, error = %error, "Failed to prune record");
                        report.failures.push(PruneFailure {
                            category: category.clone(),
                            key: Some(key),
                            error,
                        });
                    }
                }
            }

            report.removed.insert(category.clone(), removed);
            report.retained.insert(category.clone(), retained);
        }

        info!(
            cutoff = %cutoff,
            removed = report.total_removed(),
            retained = report.total_retained(),
            failed = report.failures.len(),
            "Pruned modification log"
        );
        Ok(report)
    }

    fn prune_targets(&self, category: Option<&str>) -> Result<Vec<Category>, ModlogError> {
        match category {
            Some(name) => Ok(vec![self.resolve(Category::from_name(name)?)?]),
            None => Ok(self.accepted_categories()),
        }
    }

    fn cutoff_for_age(&self, age: Duration) -> Result<DateTime<Utc>, ModlogError> {
        self.clock
            .now_utc()
            .checked_sub_signed(age)
            .ok_or_else(|| ModlogError::invalid_argument("prune age reaches before the earliest representable time"))
    }

    /// Reject custom categories that are not allow-listed
    fn resolve(&self, category: Category) -> Result<Category, ModlogError> {
        match &category {
            Category::Custom(name) if !self.custom_categories.contains(name) => {
                Err(ModlogError::invalid_argument(format!(
                    "category '{name}' is not enabled for this log"
                )))
            }
            _ => Ok(category),
        }
    }

    fn resolve_user(&self, user: Option<&str>) -> Result<String, ModlogError> {
        match user.filter(|user| !user.is_empty()) {
            Some(user) => Ok(user.to_string()),
            None => self
                .actors
                .current_actor()
                .filter(|user| !user.is_empty())
                .ok_or(ModlogError::NoActor),
        }
    }

    fn store(&self, category: &Category) -> CategoryStore {
        CategoryStore::new(Arc::clone(&self.backend), self.site.clone(), category.clone())
    }

    fn cached_view(&self, category: Category) -> Arc<ChangesetView> {
        if let Some(view) = self.views.get(&category) {
            return Arc::clone(view.value());
        }
        let view = Arc::new(ChangesetView::new(self.store(&category)));
        let entry = self.views.entry(category).or_insert(view);
        Arc::clone(entry.value())
    }
}

/// Convert a fractional day count to a duration
fn days_to_duration(days: f64) -> Result<Duration, ModlogError> {
    if !days.is_finite() || days < 0.0 {
        return Err(ModlogError::invalid_argument(format!(
            "days must be a non-negative number, got {days}"
        )));
    }
    let micros = days * MICROS_PER_DAY;
    if micros >= i64::MAX as f64 {
        return Err(ModlogError::invalid_argument(format!("days {days} is too large")));
    }
    Ok(Duration::microseconds(micros as i64))
}

/// Builder for ModificationLog
pub struct ModificationLogBuilder {
    backend: Arc<dyn LogBackend>,
    site: SiteId,
    actors: Option<Arc<dyn ActorResolver>>,
    clock: Option<Arc<dyn Clock>>,
    custom_categories: Vec<String>,
}

impl ModificationLogBuilder {
    /// Create a new builder
    pub fn new(backend: Arc<dyn LogBackend>, site: SiteId) -> Self {
        Self {
            backend,
            site,
            actors: None,
            clock: None,
            custom_categories: Vec::new(),
        }
    }

    /// Resolver consulted when `log` is called without a user
    pub fn actor_resolver(mut self, actors: Arc<dyn ActorResolver>) -> Self {
        self.actors = Some(actors);
        self
    }

    /// Clock used for record timestamps and age-based pruning
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Accept a custom category in addition to the fixed four
    pub fn allow_category(mut self, name: impl Into<String>) -> Self {
        self.custom_categories.push(name.into());
        self
    }

    /// Accept several custom categories
    pub fn allow_categories<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_categories.extend(names.into_iter().map(Into::into));
        self
    }

    /// Build the log
    ///
    /// Defaults to [`NoActor`] and [`SystemClock`]. Fails with
    /// `InvalidArgument` if a custom category name is malformed.
    pub fn build(self) -> Result<ModificationLog, ModlogError> {
        let mut custom_categories = BTreeSet::new();
        for name in self.custom_categories {
            if let Category::Custom(name) = Category::from_name(&name)? {
                custom_categories.insert(name);
            }
        }

        Ok(ModificationLog {
            backend: self.backend,
            site: self.site,
            actors: self.actors.unwrap_or_else(|| Arc::new(NoActor)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            custom_categories,
            views: DashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;
    use chrono::TimeZone;
    use modlog_core::{ContentRef, FixedActor, ManualClock};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn create_test_log() -> (ModificationLog, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let log = ModificationLog::builder(
            Arc::new(MemoryBackend::new()),
            SiteId::new("plone").unwrap(),
        )
        .actor_resolver(Arc::new(FixedActor::new("admin")))
        .clock(clock.clone())
        .allow_category("reviews")
        .build()
        .unwrap();
        (log, clock)
    }

    fn doc(n: u32) -> ContentRef {
        ContentRef::new(format!("uid-{n}"), format!("/plone/doc{n}"))
    }

    #[test]
    fn test_log_routes_actions() {
        let (log, _clock) = create_test_log();
        log.added(&doc(1), None, None).unwrap();
        log.modified(&doc(1), None, None).unwrap();
        log.modified(&doc(2), None, None).unwrap();
        log.moved(&doc(1), None, None).unwrap();
        log.deleted(&doc(2), None, None).unwrap();

        assert_eq!(log.additions().len().unwrap(), 1);
        assert_eq!(log.modifications().len().unwrap(), 2);
        assert_eq!(log.moves().len().unwrap(), 1);
        assert_eq!(log.deletions().len().unwrap(), 1);
    }

    #[test]
    fn test_log_by_name() {
        let (log, _clock) = create_test_log();
        log.log("modify", &doc(1), None, None).unwrap();
        log.log("reviews", &doc(1), None, None).unwrap();

        assert_eq!(log.modifications().len().unwrap(), 1);
        assert_eq!(log.view("reviews").unwrap().len().unwrap(), 1);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let (log, _clock) = create_test_log();
        let err = log.log("modfy", &doc(1), None, None).unwrap_err();
        assert!(matches!(err, ModlogError::InvalidArgument(_)));
        assert!(!log.backend().site_exists(log.site()).unwrap());
        assert!(log.view("modfy").is_err());
    }

    #[test]
    fn test_record_fields() {
        let (log, _clock) = create_test_log();
        let mut extra = Extra::new();
        extra.insert("note".to_string(), "first draft".to_string());
        let key = log.added(&doc(7), Some("alice"), Some(extra)).unwrap();

        let record = log.additions().get(key).unwrap().unwrap();
        assert_eq!(record.uid, "uid-7");
        assert_eq!(record.path, "/plone/doc7");
        assert_eq!(record.user, "alice");
        assert_eq!(record.timestamp, start());
        assert_eq!(record.field("note").as_deref(), Some("first draft"));
    }

    #[test]
    fn test_user_falls_back_to_resolver() {
        let (log, _clock) = create_test_log();
        let key = log.added(&doc(1), None, None).unwrap();
        assert_eq!(log.additions().get(key).unwrap().unwrap().user, "admin");

        let key = log.added(&doc(1), Some(""), None).unwrap();
        assert_eq!(log.additions().get(key).unwrap().unwrap().user, "admin");
    }

    #[test]
    fn test_no_actor() {
        let log = ModificationLog::builder(
            Arc::new(MemoryBackend::new()),
            SiteId::new("plone").unwrap(),
        )
        .build()
        .unwrap();
        let err = log.added(&doc(1), None, None).unwrap_err();
        assert!(matches!(err, ModlogError::NoActor));
        assert!(log.added(&doc(1), Some("bob"), None).is_ok());
    }

    #[test]
    fn test_unidentifiable_content() {
        let (log, _clock) = create_test_log();
        let no_uid = ContentRef::new("", "/plone/x");
        let no_path = ContentRef::new("u1", "");
        assert!(matches!(
            log.added(&no_uid, None, None),
            Err(ModlogError::EntityUnidentifiable(_))
        ));
        assert!(matches!(
            log.added(&no_path, None, None),
            Err(ModlogError::EntityUnidentifiable(_))
        ));
        assert_eq!(log.additions().len().unwrap(), 0);
    }

    #[test]
    fn test_views_are_cached() {
        let (log, _clock) = create_test_log();
        assert!(Arc::ptr_eq(&log.additions(), &log.additions()));
        assert!(Arc::ptr_eq(&log.moves(), &log.view("move").unwrap()));
        assert_eq!(log.modifications().name(), &Category::Modifications);
    }

    #[test]
    fn test_prune_requires_bounds() {
        let (log, _clock) = create_test_log();
        assert!(matches!(
            log.prune(None, None, None),
            Err(ModlogError::InvalidArgument(_))
        ));
        assert!(matches!(
            log.prune(None, Some(-1.0), None),
            Err(ModlogError::InvalidArgument(_))
        ));
        assert!(matches!(
            log.prune(None, Some(f64::NAN), None),
            Err(ModlogError::InvalidArgument(_))
        ));
        assert!(matches!(
            log.prune(Some("bogus"), Some(1.0), None),
            Err(ModlogError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_prune_uninitialized_site() {
        let (log, _clock) = create_test_log();
        let report = log.prune(None, Some(0.0), None).unwrap();
        assert_eq!(report.total_removed(), 0);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_prune_boundary() {
        let (log, clock) = create_test_log();
        let old = log.modified(&doc(1), None, None).unwrap();
        clock.advance(Duration::microseconds(1));
        let at_cutoff = log.modified(&doc(2), None, None).unwrap();

        let report = log
            .prune_before(Some("modifications"), start() + Duration::microseconds(1))
            .unwrap();
        assert_eq!(report.total_removed(), 1);
        assert_eq!(report.total_retained(), 1);
        assert!(report.is_complete());

        let view = log.modifications();
        assert!(!view.contains(old).unwrap());
        assert!(view.contains(at_cutoff).unwrap());
    }

    #[test]
    fn test_prune_days() {
        let (log, clock) = create_test_log();
        log.added(&doc(1), None, None).unwrap();
        clock.advance(Duration::days(10));
        log.added(&doc(2), None, None).unwrap();
        clock.advance(Duration::days(1));

        let report = log.prune(Some("add"), Some(5.0), None).unwrap();
        assert_eq!(report.total_removed(), 1);
        assert_eq!(report.cutoff, start() + Duration::days(6));

        let remaining: Vec<_> = log.additions().values().unwrap().map(|r| r.unwrap().uid).collect();
        assert_eq!(remaining, vec!["uid-2"]);
    }

    #[test]
    fn test_days_take_precedence_over_timespec() {
        let (log, clock) = create_test_log();
        log.added(&doc(1), None, None).unwrap();
        clock.advance(Duration::days(2));

        // timespec alone would keep the record; days=1 removes it
        let report = log.prune(None, Some(1.0), Some(start())).unwrap();
        assert_eq!(report.total_removed(), 1);
    }

    #[test]
    fn test_prune_all_categories() {
        let (log, clock) = create_test_log();
        log.added(&doc(1), None, None).unwrap();
        log.modified(&doc(1), None, None).unwrap();
        log.moved(&doc(1), None, None).unwrap();
        log.deleted(&doc(1), None, None).unwrap();
        log.log("reviews", &doc(1), None, None).unwrap();
        clock.advance(Duration::seconds(1));

        let report = log.prune(None, Some(0.0), None).unwrap();
        assert_eq!(report.total_removed(), 5);
        for category in log.accepted_categories() {
            assert_eq!(log.store(&category).len().unwrap(), 0);
        }
    }

    #[test]
    fn test_prune_older_than() {
        let (log, clock) = create_test_log();
        log.added(&doc(1), None, None).unwrap();
        clock.advance(Duration::hours(3));

        assert_eq!(log.prune_older_than(None, Duration::hours(4)).unwrap().total_removed(), 0);
        assert_eq!(log.prune_older_than(None, Duration::hours(2)).unwrap().total_removed(), 1);
        assert!(log.prune_older_than(None, Duration::hours(-1)).is_err());
    }

    #[test]
    fn test_days_to_duration() {
        assert_eq!(days_to_duration(0.0).unwrap(), Duration::zero());
        assert_eq!(days_to_duration(1.5).unwrap(), Duration::hours(36));
        assert!(days_to_duration(f64::INFINITY).is_err());
        assert!(days_to_duration(1e300).is_err());
    }

    #[test]
    fn test_builder_rejects_bad_category() {
        let result = ModificationLog::builder(
            Arc::new(MemoryBackend::new()),
            SiteId::new("plone").unwrap(),
        )
        .allow_category("not valid")
        .build();
        assert!(result.is_err());
    }

    /// Memory backend whose key listing fails for one category
    struct UnlistableBackend {
        inner: MemoryBackend,
        broken: Category,
    }

    impl LogBackend for UnlistableBackend {
        fn insert(
            &self,
            site: &SiteId,
            category: &Category,
            record: &ChangeRecord,
        ) -> Result<RecordKey, StorageError> {
            self.inner.insert(site, category, record)
        }

        fn get(
            &self,
            site: &SiteId,
            category: &Category,
            key: RecordKey,
        ) -> Result<Option<ChangeRecord>, StorageError> {
            self.inner.get(site, category, key)
        }

        fn delete(
            &self,
            site: &SiteId,
            category: &Category,
            key: RecordKey,
        ) -> Result<ChangeRecord, StorageError> {
            self.inner.delete(site, category, key)
        }

        fn keys(&self, site: &SiteId, category: &Category) -> Result<Vec<RecordKey>, StorageError> {
            if *category == self.broken {
                return Err(StorageError::database("table unreadable"));
            }
            self.inner.keys(site, category)
        }

        fn contains(
            &self,
            site: &SiteId,
            category: &Category,
            key: RecordKey,
        ) -> Result<bool, StorageError> {
            self.inner.contains(site, category, key)
        }

        fn len(&self, site: &SiteId, category: &Category) -> Result<usize, StorageError> {
            self.inner.len(site, category)
        }

        fn counts(
            &self,
            site: &SiteId,
            category: &Category,
        ) -> Result<crate::FacilityCounts, StorageError> {
            self.inner.counts(site, category)
        }

        fn site_exists(&self, site: &SiteId) -> Result<bool, StorageError> {
            self.inner.site_exists(site)
        }

        fn categories(&self, site: &SiteId) -> Result<Vec<Category>, StorageError> {
            self.inner.categories(site)
        }
    }

    #[test]
    fn test_prune_reports_unlistable_category_and_continues() {
        let clock = Arc::new(ManualClock::new(start()));
        let backend = Arc::new(UnlistableBackend {
            inner: MemoryBackend::new(),
            broken: Category::Deletions,
        });
        let log = ModificationLog::builder(backend, SiteId::new("plone").unwrap())
            .actor_resolver(Arc::new(FixedActor::new("admin")))
            .clock(clock.clone())
            .build()
            .unwrap();

        log.added(&doc(1), None, None).unwrap();
        log.deleted(&doc(2), None, None).unwrap();
        log.moved(&doc(3), None, None).unwrap();
        clock.advance(Duration::days(2));

        let report = log.prune(None, Some(1.0), None).unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].category, Category::Deletions);
        assert!(report.failures[0].key.is_none());

        // Categories before and after the unreadable one were still pruned
        assert_eq!(report.removed.get(&Category::Additions), Some(&1));
        assert_eq!(report.removed.get(&Category::Moves), Some(&1));
        assert!(!report.removed.contains_key(&Category::Deletions));
        assert_eq!(report.total_removed(), 2);
    }
}
