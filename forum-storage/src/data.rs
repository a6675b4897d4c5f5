//! Entity-level data access.
//!
//! `ForumData` is what request handlers talk to. Each getter loads a cached
//! snapshot through a [`ReadThroughLoader`] and then hydrates it: related
//! profile summaries are loaded the same way, and viewer-specific flags are
//! computed live on every call, hit or miss.
//!
//! Writes happen elsewhere. After a commit the writer calls
//! [`ForumData::record_write`], which queues the purge on the background
//! dispatcher.

use std::sync::Arc;

use forum_core::{
    Attendee, AttendeeView, Attribute, CacheError, Conversation, ConversationView, DataConfig,
    EntityId, EntityType, Event, EventView, ForumError, ForumResult, Huddle, HuddleView,
    Identifier, Microcosm, MicrocosmView, Page, PaginatedCollection, ProfileId, ProfileSummary,
    Role, Scope, SiteId, Update, UpdateView, Watcher, WatcherView,
};
use futures_util::future::join;

use crate::cache::{
    connect_store, CacheFacade, CacheKey, CacheStats, CacheStore, Cacheable, ScopeKeyRegistry,
};
use crate::collection::CollectionAssembler;
use crate::dispatcher::{DispatchStats, InvalidationDispatcher};
use crate::invalidate::Invalidator;
use crate::loader::ReadThroughLoader;
use crate::scatter::ScatterGather;
use crate::store::{
    ForumStore, ListQuery, MicrocosmTree, PermissionOracle, RoleMembershipCache, StorageFetcher,
};

/// Read API over the forum's entities.
pub struct ForumData<S> {
    store: Arc<S>,
    permissions: Arc<dyn PermissionOracle>,
    cache: CacheFacade,
    collections: CollectionAssembler,
    invalidator: Invalidator,
    dispatcher: InvalidationDispatcher,
}

impl<S: ForumStore + 'static> ForumData<S> {
    /// Wire the layer together and start the invalidation worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &DataConfig,
        store: Arc<S>,
        cache_store: Arc<dyn CacheStore>,
        permissions: Arc<dyn PermissionOracle>,
        roles: Arc<dyn RoleMembershipCache>,
    ) -> ForumResult<Self> {
        config.validate()?;
        let registry = Arc::new(ScopeKeyRegistry::standard(config.default_ttl)?);
        let cache = CacheFacade::new(cache_store, registry);

        let tree: Arc<dyn MicrocosmTree> = store.clone();
        let invalidator = Invalidator::new(cache.clone(), tree, roles);
        let dispatcher = InvalidationDispatcher::spawn(invalidator.clone(), config);

        tracing::info!(
            cache_store = cache.store_name(),
            max_in_flight = config.effective_max_in_flight(),
            error_selection = ?config.error_selection,
            "forum data layer ready"
        );

        Ok(Self {
            store,
            permissions,
            cache,
            collections: CollectionAssembler::new(ScatterGather::from_config(config)),
            invalidator,
            dispatcher,
        })
    }

    /// Like [`ForumData::new`], picking the cache store from `config`.
    pub async fn connect(
        config: &DataConfig,
        store: Arc<S>,
        permissions: Arc<dyn PermissionOracle>,
        roles: Arc<dyn RoleMembershipCache>,
    ) -> ForumResult<Self> {
        let cache_store = connect_store(config).await?;
        Self::new(config, store, cache_store, permissions, roles)
    }

    pub fn cache(&self) -> &CacheFacade {
        &self.cache
    }

    pub fn invalidator(&self) -> &Invalidator {
        &self.invalidator
    }

    pub fn executor(&self) -> &ScatterGather {
        self.collections.executor()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Cached record for `id` without hydration.
    pub async fn cached_snapshot<T>(&self, id: EntityId) -> ForumResult<T>
    where
        T: Cacheable,
        S: StorageFetcher<T>,
    {
        ReadThroughLoader::<T>::new(self.cache.clone())
            .cached_snapshot(self.store.as_ref(), id)
            .await
    }

    // ========================================================================
    // SINGLE ITEMS
    // ========================================================================

    pub async fn profile_summary(&self, id: ProfileId) -> ForumResult<ProfileSummary> {
        self.cached_snapshot::<ProfileSummary>(id).await
    }

    pub async fn conversation(
        &self,
        id: EntityId,
        viewer: Option<ProfileId>,
    ) -> ForumResult<ConversationView> {
        let conversation = self.cached_snapshot::<Conversation>(id).await?;
        let (author, editor) = self
            .author_and_editor(conversation.created_by, conversation.edited_by)
            .await?;
        let unread = match viewer {
            Some(profile_id) => self.store.has_unread(id, profile_id).await?,
            None => false,
        };
        Ok(ConversationView {
            conversation,
            author,
            editor,
            unread,
        })
    }

    pub async fn microcosm(
        &self,
        id: EntityId,
        viewer: Option<ProfileId>,
    ) -> ForumResult<MicrocosmView> {
        let microcosm = self.cached_snapshot::<Microcosm>(id).await?;
        let (author, editor) = self
            .author_and_editor(microcosm.created_by, microcosm.edited_by)
            .await?;
        let can_read = self
            .permissions
            .can_read(
                microcosm.site_id,
                Some(microcosm.id),
                EntityType::Microcosm,
                microcosm.id,
                viewer,
            )
            .await?;
        Ok(MicrocosmView {
            microcosm,
            author,
            editor,
            can_read,
        })
    }

    pub async fn event(&self, id: EntityId) -> ForumResult<EventView> {
        let event = self.cached_snapshot::<Event>(id).await?;
        let (author, editor) = self
            .author_and_editor(event.created_by, event.edited_by)
            .await?;
        Ok(EventView {
            event,
            author,
            editor,
        })
    }

    pub async fn attendee(&self, id: EntityId) -> ForumResult<AttendeeView> {
        let attendee = self.cached_snapshot::<Attendee>(id).await?;
        let profile = self.profile_summary(attendee.profile_id).await?;
        Ok(AttendeeView { attendee, profile })
    }

    pub async fn attribute(&self, id: EntityId) -> ForumResult<Attribute> {
        self.cached_snapshot::<Attribute>(id).await
    }

    pub async fn role(&self, id: EntityId) -> ForumResult<Role> {
        self.cached_snapshot::<Role>(id).await
    }

    pub async fn watcher(&self, id: EntityId) -> ForumResult<WatcherView> {
        let watcher = self.cached_snapshot::<Watcher>(id).await?;
        let profile = self.profile_summary(watcher.profile_id).await?;
        Ok(WatcherView { watcher, profile })
    }

    pub async fn update(&self, id: EntityId) -> ForumResult<UpdateView> {
        let update = self.cached_snapshot::<Update>(id).await?;
        let author = self.profile_summary(update.created_by).await?;
        Ok(UpdateView { update, author })
    }

    /// Huddle with every participant's summary, loaded concurrently.
    pub async fn huddle(&self, id: EntityId) -> ForumResult<HuddleView> {
        let huddle = self.cached_snapshot::<Huddle>(id).await?;
        // Both sides run to completion before either error is surfaced.
        let (author, participants) = join(
            self.profile_summary(huddle.created_by),
            self.executor()
                .gather(&huddle.participant_ids, |profile_id| self.profile_summary(profile_id)),
        )
        .await;
        Ok(HuddleView {
            huddle,
            author: author?,
            participants: participants?,
        })
    }

    async fn author_and_editor(
        &self,
        created_by: ProfileId,
        edited_by: Option<ProfileId>,
    ) -> ForumResult<(ProfileSummary, Option<ProfileSummary>)> {
        let editor = async {
            match edited_by {
                Some(profile_id) => self.profile_summary(profile_id).await.map(Some),
                None => Ok(None),
            }
        };
        let (author, editor) = join(self.profile_summary(created_by), editor).await;
        Ok((author?, editor?))
    }

    // ========================================================================
    // COLLECTIONS
    // ========================================================================

    pub async fn attendees(
        &self,
        event_id: EntityId,
        page: Page,
    ) -> ForumResult<PaginatedCollection<AttendeeView>> {
        let query = ListQuery::AttendeesOfEvent { event_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.attendee(id))
            .await
    }

    pub async fn attributes(
        &self,
        item_type: EntityType,
        item_id: EntityId,
        page: Page,
    ) -> ForumResult<PaginatedCollection<Attribute>> {
        let query = ListQuery::AttributesOfItem { item_type, item_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.attribute(id))
            .await
    }

    pub async fn profiles(
        &self,
        site_id: SiteId,
        page: Page,
    ) -> ForumResult<PaginatedCollection<ProfileSummary>> {
        let query = ListQuery::ProfilesOnSite { site_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.profile_summary(id))
            .await
    }

    pub async fn conversations(
        &self,
        microcosm_id: EntityId,
        viewer: Option<ProfileId>,
        page: Page,
    ) -> ForumResult<PaginatedCollection<ConversationView>> {
        let query = ListQuery::ConversationsInMicrocosm { microcosm_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| {
                self.conversation(id, viewer)
            })
            .await
    }

    pub async fn microcosm_children(
        &self,
        microcosm_id: EntityId,
        viewer: Option<ProfileId>,
        page: Page,
    ) -> ForumResult<PaginatedCollection<MicrocosmView>> {
        let query = ListQuery::MicrocosmChildren { microcosm_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.microcosm(id, viewer))
            .await
    }

    /// Roles of a microcosm, or site-wide roles when `microcosm_id` is `None`.
    pub async fn roles(
        &self,
        site_id: SiteId,
        microcosm_id: Option<EntityId>,
        page: Page,
    ) -> ForumResult<PaginatedCollection<Role>> {
        let query = ListQuery::RolesInMicrocosm {
            site_id,
            microcosm_id,
        };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.role(id))
            .await
    }

    pub async fn role_members(
        &self,
        role_id: EntityId,
        page: Page,
    ) -> ForumResult<PaginatedCollection<ProfileSummary>> {
        let query = ListQuery::RoleMembers { role_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.profile_summary(id))
            .await
    }

    pub async fn huddle_participants(
        &self,
        huddle_id: EntityId,
        page: Page,
    ) -> ForumResult<PaginatedCollection<ProfileSummary>> {
        let query = ListQuery::HuddleParticipants { huddle_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.profile_summary(id))
            .await
    }

    pub async fn updates(
        &self,
        profile_id: ProfileId,
        page: Page,
    ) -> ForumResult<PaginatedCollection<UpdateView>> {
        let query = ListQuery::UpdatesForProfile { profile_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.update(id))
            .await
    }

    pub async fn watchers(
        &self,
        profile_id: ProfileId,
        page: Page,
    ) -> ForumResult<PaginatedCollection<WatcherView>> {
        let query = ListQuery::WatchersOfProfile { profile_id };
        self.collections
            .list(self.store.as_ref(), &query, page, |id| self.watcher(id))
            .await
    }

    // ========================================================================
    // SECONDARY INDEXES
    // ========================================================================

    /// Resolve a username on a site through the `Lookup` index.
    pub async fn profile_id_by_name(&self, site_id: SiteId, name: &str) -> ForumResult<ProfileId> {
        let token = profile_lookup_token(site_id, name);
        let key = self.lookup_key(EntityType::Profile, token.clone());

        if let Some(key) = &key {
            if let Some(id) = self.cache.get_int(key).await {
                return Ok(id);
            }
        }

        let id = self
            .store
            .profile_id_by_name(site_id, name)
            .await?
            .ok_or_else(|| ForumError::not_found(EntityType::Profile, token))?;

        if let Some(key) = &key {
            self.cache.set_int(key, id).await;
        }
        Ok(id)
    }

    /// Resolve a site's domain through the `Lookup` index.
    pub async fn site_id_by_domain(&self, domain: &str) -> ForumResult<SiteId> {
        let domain = normalize_domain(domain);
        let key = self.lookup_key(EntityType::Site, domain.clone());

        if let Some(key) = &key {
            if let Some(id) = self.cache.get_int(key).await {
                return Ok(id);
            }
        }

        let id = self
            .store
            .site_id_by_domain(&domain)
            .await?
            .ok_or_else(|| ForumError::not_found(EntityType::Site, domain.clone()))?;

        if let Some(key) = &key {
            self.cache.set_int(key, id).await;
        }
        Ok(id)
    }

    fn lookup_key(&self, entity_type: EntityType, token: String) -> Option<CacheKey> {
        match self.cache.key(entity_type, Scope::Lookup, token) {
            Ok(key) => Some(key),
            Err(e) => {
                log_unregistered(entity_type, &e);
                None
            }
        }
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Called after a write commits. Queues a purge of every scope of the
    /// entity; returns `false` if the request had to be dropped.
    pub fn record_write(&self, entity_type: EntityType, id: impl Into<Identifier>) -> bool {
        self.dispatcher.purge(entity_type, id)
    }

    /// Like [`ForumData::record_write`] for a single scope, e.g. `Counts`
    /// after a new comment.
    pub fn record_scope_write(
        &self,
        scope: Scope,
        entity_type: EntityType,
        id: impl Into<Identifier>,
    ) -> bool {
        self.dispatcher.purge_scope(scope, entity_type, id)
    }

    /// Called after a username changes or a profile is deleted. The
    /// `Lookup` index is keyed by name, so the old name's entry is purged
    /// here; [`ForumData::record_write`] covers the id-keyed scopes.
    pub fn record_profile_rename(&self, site_id: SiteId, old_name: &str) -> bool {
        self.dispatcher.purge_scope(
            Scope::Lookup,
            EntityType::Profile,
            profile_lookup_token(site_id, old_name),
        )
    }

    /// Called after a site's domain changes or is removed.
    pub fn record_domain_change(&self, old_domain: &str) -> bool {
        self.dispatcher
            .purge_scope(Scope::Lookup, EntityType::Site, normalize_domain(old_domain))
    }

    /// Wait for queued purges to finish.
    pub async fn flush_invalidations(&self) {
        self.dispatcher.flush().await
    }

    /// Drain the invalidation queue and stop its worker.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await
    }
}

/// Lookup token for a username. Usernames are unique per site, and the
/// numeric site id never contains the separator.
fn profile_lookup_token(site_id: SiteId, name: &str) -> String {
    format!("{}:{}", site_id, name)
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn log_unregistered(entity_type: EntityType, error: &CacheError) {
    tracing::warn!(entity = %entity_type, error = %error, "lookup index is not registered");
}
