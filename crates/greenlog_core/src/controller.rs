//! crates/greenlog_core/src/controller.rs
//!
//! The view state controller: bridges user intents to plant store mutations and
//! holds the transient, session-only UI state (screen, selected plant, drafts and
//! the comparison selection).
//!
//! A controller is driven from a single task. Intents and store notifications are
//! interleaved by the caller, which awaits `next_event` alongside its own input.

use std::sync::Arc;

use futures::future::{self, Either};
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::comparison::ComparisonSelector;
use crate::domain::{
    non_blank, Identity, ImageDestination, ImageFile, Log, LogDraft, NewPlant, Plant, PlantDraft,
    PlantPatch,
};
use crate::error::CareError;
use crate::ports::{
    Clock, IdentityStream, ImageDecoder, PlantStore, PortError, PortResult, SessionProvider,
    SnapshotStream,
};
use crate::timeline;
use crate::view::{Action, Notice, PlantDetail, PlantSummary, Screen, ViewModel};

//=========================================================================================
// Outcomes and Events
//=========================================================================================

/// The result of a guarded intent that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(SkipReason),
}

/// Why a guarded intent was ignored. Skips are silent: no notice, no store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAuthenticated,
    EmptyName,
    UnknownPlant,
}

/// What `next_event` observed and applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    IdentityChanged(Option<Identity>),
    SnapshotApplied { plants: usize },
    SnapshotFailed(PortError),
    SubscriptionClosed,
    IdentityStreamClosed,
}

/// How `add_log` writes the new entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogAppendStrategy {
    /// Store-side atomic prepend. Concurrent additions are never lost.
    #[default]
    Atomic,
    /// Rewrites the whole `logs` array from the last received snapshot.
    /// Two additions made before a snapshot refresh can overwrite each other.
    ReadModifyWrite,
}

//=========================================================================================
// The Controller
//=========================================================================================

pub struct PlantController {
    session: Arc<dyn SessionProvider>,
    store: Arc<dyn PlantStore>,
    decoder: Arc<dyn ImageDecoder>,
    clock: Arc<dyn Clock>,
    append_strategy: LogAppendStrategy,

    identity: Option<Identity>,
    loading: bool,
    plants: Vec<Plant>,
    screen: Screen,
    selected_plant_id: Option<String>,
    plant_draft: PlantDraft,
    log_draft: LogDraft,
    comparison: ComparisonSelector,
    notice: Option<Notice>,

    subscription: Option<SnapshotStream>,
    identity_events: Option<IdentityStream>,
}

impl PlantController {
    pub fn new(
        session: Arc<dyn SessionProvider>,
        store: Arc<dyn PlantStore>,
        decoder: Arc<dyn ImageDecoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session,
            store,
            decoder,
            clock,
            append_strategy: LogAppendStrategy::default(),
            identity: None,
            loading: true,
            plants: Vec::new(),
            screen: Screen::List,
            selected_plant_id: None,
            plant_draft: PlantDraft::default(),
            log_draft: LogDraft::default(),
            comparison: ComparisonSelector::new(),
            notice: None,
            subscription: None,
            identity_events: None,
        }
    }

    pub fn with_append_strategy(mut self, strategy: LogAppendStrategy) -> Self {
        self.append_strategy = strategy;
        self
    }

    // --- Lifecycle ---

    /// Signs in and subscribes to the user's plants.
    ///
    /// An authentication failure is logged and leaves the controller in the
    /// unauthenticated, empty state. Loading ends either way.
    pub async fn start(&mut self) -> Result<Identity, CareError> {
        self.identity_events = Some(self.session.identity_changes());
        let result = self.session.authenticate().await;
        self.loading = false;

        match result {
            Ok(identity) => {
                info!(user_id = %identity.user_id, anonymous = identity.anonymous, "Signed in.");
                self.on_identity_changed(Some(identity.clone())).await?;
                Ok(identity)
            }
            Err(e) => {
                warn!("Auth error: {}. Continuing unauthenticated.", e);
                self.on_identity_changed(None).await?;
                Err(CareError::Auth(e))
            }
        }
    }

    /// Re-scopes the controller to a new identity, or to none after sign-out.
    /// The previous subscription is dropped and cached plants are discarded.
    pub async fn on_identity_changed(&mut self, identity: Option<Identity>) -> Result<(), CareError> {
        let already_current = identity == self.identity
            && (identity.is_none() || self.subscription.is_some());
        if already_current {
            return Ok(());
        }

        self.subscription = None;
        self.plants.clear();
        self.selected_plant_id = None;
        self.comparison.clear();
        self.screen = Screen::List;
        self.identity = identity;

        let Some(user_id) = self.identity.as_ref().map(|identity| identity.user_id) else {
            info!("Signed out; plant subscription closed.");
            return Ok(());
        };

        match self.store.subscribe(user_id).await {
            Ok(stream) => {
                debug!(%user_id, "Subscribed to plant collection.");
                self.subscription = Some(stream);
                Ok(())
            }
            Err(e) => Err(self.store_failure(Action::Subscribe, e)),
        }
    }

    /// Waits for the next identity change or collection snapshot and applies it.
    /// Stays pending while neither source is open.
    pub async fn next_event(&mut self) -> ControllerEvent {
        enum Next {
            Identity(Option<Option<Identity>>),
            Snapshot(Option<PortResult<Vec<Plant>>>),
        }

        let next = {
            let identity_next = next_or_pending(self.identity_events.as_mut());
            let snapshot_next = next_or_pending(self.subscription.as_mut());
            futures::pin_mut!(identity_next, snapshot_next);
            match future::select(identity_next, snapshot_next).await {
                Either::Left((item, _)) => Next::Identity(item),
                Either::Right((item, _)) => Next::Snapshot(item),
            }
        };

        match next {
            Next::Identity(Some(identity)) => {
                if let Err(e) = self.on_identity_changed(identity.clone()).await {
                    error!("Failed to follow identity change: {}", e);
                }
                ControllerEvent::IdentityChanged(identity)
            }
            Next::Identity(None) => {
                self.identity_events = None;
                ControllerEvent::IdentityStreamClosed
            }
            Next::Snapshot(Some(Ok(plants))) => {
                let count = plants.len();
                self.apply_snapshot(plants);
                ControllerEvent::SnapshotApplied { plants: count }
            }
            Next::Snapshot(Some(Err(e))) => {
                error!("Plant snapshot error: {}", e);
                ControllerEvent::SnapshotFailed(e)
            }
            Next::Snapshot(None) => {
                warn!("Plant subscription ended.");
                self.subscription = None;
                ControllerEvent::SubscriptionClosed
            }
        }
    }

    /// Replaces the cached collection. Every snapshot is complete and authoritative.
    pub fn apply_snapshot(&mut self, plants: Vec<Plant>) {
        self.plants = plants;
    }

    pub async fn sign_out(&mut self) -> Result<(), CareError> {
        if let Err(e) = self.session.sign_out().await {
            error!("Sign-out failed: {}", e);
            self.notice = Some(notice(Action::SignOut, &e));
            return Err(CareError::Auth(e));
        }
        self.on_identity_changed(None).await
    }

    // --- Navigation ---

    pub fn open_add_form(&mut self) {
        self.screen = Screen::Add;
    }

    pub fn go_back(&mut self) {
        self.screen = Screen::List;
    }

    /// Opens the detail screen for `plant_id`. Any comparison picks from the
    /// previously viewed plant are dropped.
    pub fn select_plant(&mut self, plant_id: &str) {
        self.selected_plant_id = Some(plant_id.to_string());
        self.comparison.clear();
        self.screen = Screen::Detail;
    }

    // --- Draft editing ---

    pub fn set_plant_name(&mut self, name: impl Into<String>) {
        self.plant_draft.name = name.into();
    }

    pub fn set_plant_species(&mut self, species: impl Into<String>) {
        self.plant_draft.species = species.into();
    }

    pub fn set_log_note(&mut self, note: impl Into<String>) {
        self.log_draft.note = note.into();
    }

    pub fn toggle_watered(&mut self) {
        self.log_draft.watered = !self.log_draft.watered;
    }

    pub fn toggle_fertilized(&mut self) {
        self.log_draft.fertilized = !self.log_draft.fertilized;
    }

    pub fn clear_image(&mut self, destination: ImageDestination) {
        *self.image_slot(destination) = None;
    }

    pub fn toggle_photo(&mut self, photo_id: &str) {
        self.comparison.toggle(photo_id);
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    // --- Store intents ---

    /// Submits the plant draft. Skips silently without an identity or a name.
    pub async fn create_plant(&mut self) -> Result<Outcome, CareError> {
        let Some(user_id) = self.user_id() else {
            debug!("create_plant skipped: not signed in.");
            return Ok(Outcome::Skipped(SkipReason::NotAuthenticated));
        };
        if self.plant_draft.name.is_empty() {
            debug!("create_plant skipped: empty name.");
            return Ok(Outcome::Skipped(SkipReason::EmptyName));
        }

        let new_plant = NewPlant {
            name: self.plant_draft.name.clone(),
            species: non_blank(&self.plant_draft.species),
            date_added: self.clock.today(),
            image: self.plant_draft.image.clone(),
        };

        match self.store.create(user_id, new_plant).await {
            Ok(plant_id) => {
                info!(%plant_id, "Plant created.");
                self.plant_draft = PlantDraft::default();
                self.screen = Screen::List;
                Ok(Outcome::Applied)
            }
            Err(e) => Err(self.store_failure(Action::CreatePlant, e)),
        }
    }

    /// Records the log draft as the newest care event of `plant_id`.
    /// The plant must be present in the last received snapshot.
    pub async fn add_log(&mut self, plant_id: &str) -> Result<Outcome, CareError> {
        let Some(user_id) = self.user_id() else {
            debug!("add_log skipped: not signed in.");
            return Ok(Outcome::Skipped(SkipReason::NotAuthenticated));
        };
        let Some(cached_logs) = self
            .plants
            .iter()
            .find(|plant| plant.id == plant_id)
            .map(|plant| plant.logs.clone())
        else {
            debug!(%plant_id, "add_log skipped: plant not in local cache.");
            return Ok(Outcome::Skipped(SkipReason::UnknownPlant));
        };

        let log = Log {
            id: Uuid::new_v4().to_string(),
            date: self.clock.today(),
            note: non_blank(&self.log_draft.note),
            watered: self.log_draft.watered,
            fertilized: self.log_draft.fertilized,
            image: self.log_draft.image.clone(),
        };
        let log_id = log.id.clone();

        let result = match self.append_strategy {
            LogAppendStrategy::Atomic => self.store.prepend_log(user_id, plant_id, log).await,
            LogAppendStrategy::ReadModifyWrite => {
                let mut logs = Vec::with_capacity(cached_logs.len() + 1);
                logs.push(log);
                logs.extend(cached_logs);
                let patch = PlantPatch {
                    logs: Some(logs),
                    ..Default::default()
                };
                self.store.update(user_id, plant_id, patch).await
            }
        };

        match result {
            Ok(()) => {
                info!(%plant_id, %log_id, "Care log recorded.");
                self.log_draft = LogDraft::default();
                Ok(Outcome::Applied)
            }
            Err(e) => Err(self.store_failure(Action::AddLog, e)),
        }
    }

    /// Deletes `plant_id` with all of its logs and returns to the list.
    pub async fn delete_plant(&mut self, plant_id: &str) -> Result<Outcome, CareError> {
        let Some(user_id) = self.user_id() else {
            debug!("delete_plant skipped: not signed in.");
            return Ok(Outcome::Skipped(SkipReason::NotAuthenticated));
        };

        match self.store.delete(user_id, plant_id).await {
            Ok(()) => {
                info!(%plant_id, "Plant deleted.");
                if self.selected_plant_id.as_deref() == Some(plant_id) {
                    self.selected_plant_id = None;
                    self.comparison.clear();
                }
                self.screen = Screen::List;
                Ok(Outcome::Applied)
            }
            Err(e) => Err(self.store_failure(Action::DeletePlant, e)),
        }
    }

    /// Decodes a picked file and stores the payload in the named draft field.
    /// On failure the field is left as it was.
    pub async fn ingest_image(
        &mut self,
        file: ImageFile,
        destination: ImageDestination,
    ) -> Result<Outcome, CareError> {
        let file_name = file.file_name.clone();
        match self.decoder.decode(file).await {
            Ok(payload) => {
                debug!(%file_name, ?destination, bytes = payload.len(), "Image ingested.");
                *self.image_slot(destination) = Some(payload);
                Ok(Outcome::Applied)
            }
            Err(e) => {
                warn!(%file_name, "Image decode failed: {}", e);
                self.notice = Some(notice(Action::IngestImage, &e));
                Err(CareError::Decode(e))
            }
        }
    }

    // --- Queries ---

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn plant_draft(&self) -> &PlantDraft {
        &self.plant_draft
    }

    pub fn log_draft(&self) -> &LogDraft {
        &self.log_draft
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn comparison(&self) -> &ComparisonSelector {
        &self.comparison
    }

    pub fn selected_plant_id(&self) -> Option<&str> {
        self.selected_plant_id.as_deref()
    }

    pub fn selected_plant(&self) -> Option<&Plant> {
        let selected = self.selected_plant_id.as_deref()?;
        self.plants.iter().find(|plant| plant.id == selected)
    }

    pub fn view(&self) -> ViewModel {
        let detail = match self.screen {
            Screen::Detail => self.selected_plant().map(|plant| {
                let photos = timeline::derive(plant);
                PlantDetail {
                    plant: plant.clone(),
                    comparison: self.comparison.resolve(&photos),
                    comparison_ready: self.comparison.is_ready(&photos),
                    selected_ids: self.comparison.ids().to_vec(),
                    timeline: photos,
                }
            }),
            _ => None,
        };

        ViewModel {
            screen: self.screen,
            loading: self.loading,
            identity: self.identity.clone(),
            plants: self.plants.iter().map(PlantSummary::from).collect(),
            detail,
            plant_draft: self.plant_draft.clone(),
            log_draft: self.log_draft.clone(),
            notice: self.notice.clone(),
        }
    }

    // --- Helpers ---

    fn user_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|identity| identity.user_id)
    }

    fn image_slot(&mut self, destination: ImageDestination) -> &mut Option<String> {
        match destination {
            ImageDestination::NewPlantImage => &mut self.plant_draft.image,
            ImageDestination::NewLogImage => &mut self.log_draft.image,
        }
    }

    fn store_failure(&mut self, action: Action, e: PortError) -> CareError {
        error!(?action, "Plant store call failed: {}", e);
        self.notice = Some(notice(action, &e));
        CareError::Store(e)
    }
}

fn notice(action: Action, e: &PortError) -> Notice {
    Notice {
        action,
        message: e.to_string(),
        retryable: !matches!(e, PortError::Unauthorized),
    }
}

async fn next_or_pending<S>(stream: Option<&mut S>) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    match stream {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use futures::channel::mpsc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    // --- Test doubles ---

    struct FakeSession {
        identity: Option<Identity>,
        changes_tx: mpsc::UnboundedSender<Option<Identity>>,
        changes_rx: Mutex<Option<mpsc::UnboundedReceiver<Option<Identity>>>>,
    }

    impl FakeSession {
        fn signed_in() -> Arc<Self> {
            Self::with_identity(Some(Identity {
                user_id: Uuid::new_v4(),
                anonymous: true,
            }))
        }

        fn with_identity(identity: Option<Identity>) -> Arc<Self> {
            let (changes_tx, changes_rx) = mpsc::unbounded();
            Arc::new(Self {
                identity,
                changes_tx,
                changes_rx: Mutex::new(Some(changes_rx)),
            })
        }
    }

    #[async_trait]
    impl SessionProvider for FakeSession {
        async fn authenticate(&self) -> PortResult<Identity> {
            self.identity.clone().ok_or(PortError::Unauthorized)
        }

        fn identity_changes(&self) -> IdentityStream {
            match self.changes_rx.lock().unwrap().take() {
                Some(rx) => Box::pin(rx),
                None => Box::pin(futures::stream::pending()),
            }
        }

        async fn sign_out(&self) -> PortResult<()> {
            let _ = self.changes_tx.unbounded_send(None);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        plants: Mutex<Vec<(Uuid, Plant)>>,
        subscribers: Mutex<Vec<(Uuid, mpsc::UnboundedSender<PortResult<Vec<Plant>>>)>>,
        mutations: AtomicUsize,
        next_id: AtomicUsize,
        fail_writes: AtomicBool,
    }

    impl FakeStore {
        fn collection(&self, user_id: Uuid) -> Vec<Plant> {
            self.plants
                .lock()
                .unwrap()
                .iter()
                .filter(|(owner, _)| *owner == user_id)
                .map(|(_, plant)| plant.clone())
                .collect()
        }

        fn publish(&self, user_id: Uuid) {
            let snapshot = self.collection(user_id);
            self.subscribers
                .lock()
                .unwrap()
                .retain(|(owner, tx)| *owner != user_id || tx.unbounded_send(Ok(snapshot.clone())).is_ok());
        }

        fn write(&self) -> PortResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("store offline".to_string()));
            }
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn with_plant<F>(&self, user_id: Uuid, plant_id: &str, f: F) -> PortResult<()>
        where
            F: FnOnce(&mut Plant),
        {
            let mut plants = self.plants.lock().unwrap();
            let (_, plant) = plants
                .iter_mut()
                .find(|(owner, plant)| *owner == user_id && plant.id == plant_id)
                .ok_or_else(|| PortError::NotFound(plant_id.to_string()))?;
            f(plant);
            Ok(())
        }
    }

    #[async_trait]
    impl PlantStore for FakeStore {
        async fn subscribe(&self, user_id: Uuid) -> PortResult<SnapshotStream> {
            let (tx, rx) = mpsc::unbounded();
            let _ = tx.unbounded_send(Ok(self.collection(user_id)));
            self.subscribers.lock().unwrap().push((user_id, tx));
            Ok(Box::pin(rx))
        }

        async fn list(&self, user_id: Uuid) -> PortResult<Vec<Plant>> {
            Ok(self.collection(user_id))
        }

        async fn create(&self, user_id: Uuid, plant: NewPlant) -> PortResult<String> {
            self.write()?;
            let id = format!("plant-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.plants
                .lock()
                .unwrap()
                .push((user_id, plant.into_plant(id.clone())));
            self.publish(user_id);
            Ok(id)
        }

        async fn update(&self, user_id: Uuid, plant_id: &str, patch: PlantPatch) -> PortResult<()> {
            self.write()?;
            self.with_plant(user_id, plant_id, |plant| patch.apply_to(plant))?;
            self.publish(user_id);
            Ok(())
        }

        async fn prepend_log(&self, user_id: Uuid, plant_id: &str, log: Log) -> PortResult<()> {
            self.write()?;
            self.with_plant(user_id, plant_id, |plant| plant.logs.insert(0, log))?;
            self.publish(user_id);
            Ok(())
        }

        async fn delete(&self, user_id: Uuid, plant_id: &str) -> PortResult<()> {
            self.write()?;
            self.plants
                .lock()
                .unwrap()
                .retain(|(owner, plant)| !(*owner == user_id && plant.id == plant_id));
            self.publish(user_id);
            Ok(())
        }
    }

    struct FakeDecoder;

    #[async_trait]
    impl ImageDecoder for FakeDecoder {
        async fn decode(&self, file: ImageFile) -> PortResult<String> {
            if file.bytes.is_empty() {
                return Err(PortError::Unexpected("empty file".to_string()));
            }
            Ok(format!("data:image/png;base64,{}", file.file_name))
        }
    }

    struct FixedClock(NaiveDate);

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            self.0
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn controller(session: Arc<FakeSession>, store: Arc<FakeStore>) -> PlantController {
        PlantController::new(session, store, Arc::new(FakeDecoder), Arc::new(FixedClock(today())))
    }

    async fn started(store: Arc<FakeStore>) -> PlantController {
        let mut controller = controller(FakeSession::signed_in(), store);
        controller.start().await.unwrap();
        assert_eq!(
            controller.next_event().await,
            ControllerEvent::SnapshotApplied { plants: 0 }
        );
        controller
    }

    fn plant(id: &str, image: Option<&str>) -> Plant {
        Plant {
            id: id.to_string(),
            name: id.to_string(),
            species: None,
            date_added: today(),
            image: image.map(str::to_string),
            logs: Vec::new(),
        }
    }

    fn png(name: &str) -> ImageFile {
        ImageFile {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }
    }

    // --- Tests ---

    #[tokio::test]
    async fn starts_on_list_and_stops_loading_after_sign_in() {
        let mut controller = controller(FakeSession::signed_in(), Arc::new(FakeStore::default()));
        assert!(controller.is_loading());

        controller.start().await.unwrap();

        assert!(!controller.is_loading());
        assert_eq!(controller.screen(), Screen::List);
        assert!(controller.identity().is_some());
    }

    #[tokio::test]
    async fn auth_failure_continues_unauthenticated() {
        let store = Arc::new(FakeStore::default());
        let mut controller = controller(FakeSession::with_identity(None), store.clone());

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, CareError::Auth(PortError::Unauthorized)));
        assert!(!controller.is_loading());
        assert!(controller.identity().is_none());
        controller.set_plant_name("Fern");
        assert_eq!(
            controller.create_plant().await.unwrap(),
            Outcome::Skipped(SkipReason::NotAuthenticated)
        );
        assert_eq!(store.mutations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_plant_with_empty_name_does_not_touch_store() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store.clone()).await;
        controller.open_add_form();

        controller.set_plant_name("");
        assert_eq!(
            controller.create_plant().await.unwrap(),
            Outcome::Skipped(SkipReason::EmptyName)
        );

        assert_eq!(store.mutations.load(Ordering::SeqCst), 0);
        assert_eq!(controller.screen(), Screen::Add);
        assert!(controller.notice().is_none());
    }

    #[tokio::test]
    async fn create_plant_stores_the_name_as_typed() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store.clone()).await;
        let user_id = controller.identity().unwrap().user_id;

        controller.set_plant_name(" Fern ");
        assert_eq!(controller.create_plant().await.unwrap(), Outcome::Applied);
        controller.set_plant_name("   ");
        assert_eq!(controller.create_plant().await.unwrap(), Outcome::Applied);

        let names: Vec<String> = store
            .collection(user_id)
            .into_iter()
            .map(|plant| plant.name)
            .collect();
        assert_eq!(names, vec![" Fern ".to_string(), "   ".to_string()]);
    }

    #[tokio::test]
    async fn create_plant_clears_draft_and_returns_to_list() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store.clone()).await;
        controller.open_add_form();
        controller.set_plant_name("Monstera");
        controller.set_plant_species("Monstera deliciosa");
        controller
            .ingest_image(png("cover"), ImageDestination::NewPlantImage)
            .await
            .unwrap();

        assert_eq!(controller.create_plant().await.unwrap(), Outcome::Applied);

        assert_eq!(controller.screen(), Screen::List);
        assert_eq!(controller.plant_draft(), &PlantDraft::default());
        controller.next_event().await;
        let created = &controller.plants()[0];
        assert_eq!(created.name, "Monstera");
        assert_eq!(created.species.as_deref(), Some("Monstera deliciosa"));
        assert_eq!(created.date_added, today());
        assert_eq!(created.image.as_deref(), Some("data:image/png;base64,cover"));
        assert!(created.logs.is_empty());
    }

    #[tokio::test]
    async fn fern_lifecycle_prepends_logs() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store).await;

        controller.set_plant_name("Fern");
        controller.create_plant().await.unwrap();
        assert_eq!(
            controller.next_event().await,
            ControllerEvent::SnapshotApplied { plants: 1 }
        );
        let plant_id = controller.plants()[0].id.clone();
        assert!(controller.plants()[0].logs.is_empty());

        controller.select_plant(&plant_id);
        controller.toggle_watered();
        assert_eq!(controller.add_log(&plant_id).await.unwrap(), Outcome::Applied);
        assert_eq!(controller.log_draft(), &LogDraft::default());
        controller.next_event().await;
        let logs = &controller.selected_plant().unwrap().logs;
        assert_eq!(logs.len(), 1);
        assert!(logs[0].watered);
        let first_log_id = logs[0].id.clone();

        controller.set_log_note("misted leaves");
        controller.add_log(&plant_id).await.unwrap();
        controller.next_event().await;
        let logs = &controller.selected_plant().unwrap().logs;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].id, first_log_id);
        assert_eq!(logs[0].note.as_deref(), Some("misted leaves"));
        assert!(!logs[0].watered);
    }

    #[tokio::test]
    async fn read_modify_write_loses_an_unrefreshed_addition() {
        let store = Arc::new(FakeStore::default());
        let mut controller =
            started(store.clone()).await.with_append_strategy(LogAppendStrategy::ReadModifyWrite);
        controller.set_plant_name("Fern");
        controller.create_plant().await.unwrap();
        controller.next_event().await;
        let plant_id = controller.plants()[0].id.clone();

        // Both additions are built from the same cached snapshot.
        controller.add_log(&plant_id).await.unwrap();
        controller.add_log(&plant_id).await.unwrap();

        let user_id = controller.identity().unwrap().user_id;
        assert_eq!(store.collection(user_id)[0].logs.len(), 1);
    }

    #[tokio::test]
    async fn atomic_append_keeps_unrefreshed_additions() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store.clone()).await;
        controller.set_plant_name("Fern");
        controller.create_plant().await.unwrap();
        controller.next_event().await;
        let plant_id = controller.plants()[0].id.clone();

        controller.add_log(&plant_id).await.unwrap();
        controller.add_log(&plant_id).await.unwrap();

        let user_id = controller.identity().unwrap().user_id;
        assert_eq!(store.collection(user_id)[0].logs.len(), 2);
    }

    #[tokio::test]
    async fn add_log_for_unknown_plant_is_skipped() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store.clone()).await;

        let outcome = controller.add_log("missing").await.unwrap();

        assert_eq!(outcome, Outcome::Skipped(SkipReason::UnknownPlant));
        assert_eq!(store.mutations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn selecting_another_plant_clears_comparison() {
        let mut controller = started(Arc::new(FakeStore::default())).await;
        controller.apply_snapshot(vec![plant("a", Some("x")), plant("b", Some("y"))]);

        controller.select_plant("a");
        controller.toggle_photo("initial");
        assert_eq!(controller.comparison().len(), 1);

        controller.select_plant("b");

        assert!(controller.comparison().is_empty());
        assert_eq!(controller.screen(), Screen::Detail);
        assert_eq!(controller.selected_plant().unwrap().id, "b");
    }

    #[tokio::test]
    async fn view_resolves_comparison_for_detail_screen() {
        let mut controller = started(Arc::new(FakeStore::default())).await;
        let mut fern = plant("fern", Some("cover"));
        fern.logs = vec![Log {
            id: "l1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            note: None,
            watered: true,
            fertilized: false,
            image: Some("later".to_string()),
        }];
        controller.apply_snapshot(vec![fern]);

        controller.select_plant("fern");
        controller.toggle_photo("l1");
        controller.toggle_photo("initial");
        let view = controller.view();

        let detail = view.detail.unwrap();
        assert!(detail.comparison_ready);
        assert_eq!(detail.comparison[0].id, "initial");
        assert_eq!(detail.comparison[1].id, "l1");
        assert_eq!(detail.selected_ids, vec!["l1".to_string(), "initial".to_string()]);
        assert_eq!(view.plants.len(), 1);
    }

    #[tokio::test]
    async fn view_has_no_detail_off_the_detail_screen() {
        let mut controller = started(Arc::new(FakeStore::default())).await;
        controller.apply_snapshot(vec![plant("a", None)]);
        controller.select_plant("a");

        controller.go_back();

        assert_eq!(controller.screen(), Screen::List);
        assert!(controller.view().detail.is_none());
    }

    #[tokio::test]
    async fn delete_plant_navigates_to_list() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store).await;
        controller.set_plant_name("Cactus");
        controller.create_plant().await.unwrap();
        controller.next_event().await;
        let plant_id = controller.plants()[0].id.clone();
        controller.select_plant(&plant_id);

        assert_eq!(controller.delete_plant(&plant_id).await.unwrap(), Outcome::Applied);

        assert_eq!(controller.screen(), Screen::List);
        assert!(controller.selected_plant_id().is_none());
        assert_eq!(
            controller.next_event().await,
            ControllerEvent::SnapshotApplied { plants: 0 }
        );
    }

    #[tokio::test]
    async fn store_failure_keeps_draft_and_raises_notice() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store.clone()).await;
        store.fail_writes.store(true, Ordering::SeqCst);
        controller.open_add_form();
        controller.set_plant_name("Fern");

        let err = controller.create_plant().await.unwrap_err();

        assert!(matches!(err, CareError::Store(PortError::Unexpected(_))));
        assert_eq!(controller.plant_draft().name, "Fern");
        assert_eq!(controller.screen(), Screen::Add);
        let notice = controller.notice().unwrap();
        assert_eq!(notice.action, Action::CreatePlant);
        assert!(notice.retryable);

        controller.dismiss_notice();
        assert!(controller.notice().is_none());
    }

    #[tokio::test]
    async fn decode_failure_leaves_destination_unset() {
        let mut controller = started(Arc::new(FakeStore::default())).await;
        let empty = ImageFile {
            file_name: "broken.png".to_string(),
            content_type: None,
            bytes: Vec::new(),
        };

        let err = controller
            .ingest_image(empty, ImageDestination::NewLogImage)
            .await
            .unwrap_err();

        assert!(matches!(err, CareError::Decode(_)));
        assert!(controller.log_draft().image.is_none());
        assert_eq!(controller.notice().unwrap().action, Action::IngestImage);
    }

    #[tokio::test]
    async fn clear_image_resets_draft_field() {
        let mut controller = started(Arc::new(FakeStore::default())).await;
        controller
            .ingest_image(png("leaf"), ImageDestination::NewLogImage)
            .await
            .unwrap();
        assert!(controller.log_draft().image.is_some());

        controller.clear_image(ImageDestination::NewLogImage);

        assert!(controller.log_draft().image.is_none());
    }

    #[tokio::test]
    async fn sign_out_drops_plants_and_subscription() {
        let store = Arc::new(FakeStore::default());
        let mut controller = started(store).await;
        controller.set_plant_name("Fern");
        controller.create_plant().await.unwrap();
        controller.next_event().await;
        assert_eq!(controller.plants().len(), 1);

        controller.sign_out().await.unwrap();

        assert!(controller.identity().is_none());
        assert!(controller.plants().is_empty());
        // The provider's own sign-out notification is a no-op once applied.
        assert_eq!(controller.next_event().await, ControllerEvent::IdentityChanged(None));
        assert!(controller.plants().is_empty());
    }
}
