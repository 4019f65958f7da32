use std::{
    collections::HashSet,
    path::Path,
    sync::Mutex,
};

use crate::{
    anki::{
        self,
        resolve_note_id,
        templates,
        CardStore,
    },
    config::SyncConfig,
    content,
    core::{
        models::{
            MessageLevel,
            NoteFields,
        },
        GraphInfo,
        PageInfo,
        SourceItem,
        SyncError,
        SyncReport,
    },
    logseq::NoteGraph,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another sync was in flight; nothing was done.
    AlreadyRunning,
    Completed(SyncReport),
}

struct ProcessedItem {
    note_id: u64,
    created: bool,
}

struct ItemFailure {
    error: SyncError,
    /// Remote id resolved before the failure, if any. A claimed identity
    /// must stay out of the orphan sweep even when its update failed.
    existing: Option<u64>,
}

/// Top-level driver reconciling source items with remote cards. At most one
/// sync runs per engine; remote calls are sequential by design.
pub struct SyncEngine<S, G> {
    store: S,
    graph: G,
    config: SyncConfig,
    state: Mutex<RunState>,
}

impl<S: CardStore + Sync, G: NoteGraph + Sync> SyncEngine<S, G> {
    pub fn new(store: S, graph: G, config: SyncConfig) -> Self {
        Self { store, graph, config, state: Mutex::new(RunState::Idle) }
    }

    fn try_begin(&self) -> Result<bool, SyncError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SyncError::Custom("Failed to lock run state".to_string()))?;
        if *state == RunState::Running {
            return Ok(false);
        }
        *state = RunState::Running;
        Ok(true)
    }

    fn finish(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = RunState::Idle;
        }
    }

    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        if !self.try_begin()? {
            println!("Syncing already in process...");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let result = self.sync_run().await;
        self.finish();
        match result {
            Ok(report) => Ok(SyncOutcome::Completed(report)),
            Err(error) => {
                // Fatal errors reach the user, not just the console.
                let _ = self.graph.show_message(&error.to_string(), MessageLevel::Warning).await;
                Err(error)
            }
        }
    }

    async fn sync_run(&self) -> Result<SyncReport, SyncError> {
        let graph = self.graph.graph_info().await?;
        let model_name = graph.model_name();
        println!("Starting Logseq to Anki sync for graph {}", graph.name);
        let _ = self
            .graph
            .show_message(
                &format!("Starting Logseq to Anki sync for graph {}", graph.name),
                MessageLevel::Success,
            )
            .await;

        self.store.request_permission().await?;

        if self.config.backup {
            if let Err(e) = self.store.create_backup().await {
                eprintln!("Backup failed: {}", e);
            }
        }

        self.store
            .ensure_model(
                &model_name,
                templates::MODEL_FIELDS,
                templates::FRONT_TEMPLATE,
                templates::BACK_TEMPLATE,
            )
            .await?;

        let items = self.graph.cloze_items().await?;
        println!("Found {} cloze blocks", items.len());

        let mut report = SyncReport::default();
        let mut live_ids: Vec<u64> = Vec::new();
        let mut unresolved: Vec<String> = Vec::new();

        for item in &items {
            match self.process_item(item, &graph, &model_name).await {
                Ok(processed) => {
                    live_ids.push(processed.note_id);
                    if processed.created {
                        println!("Added note with uuid {}", item.uuid);
                        report.created += 1;
                    } else {
                        println!("Updated note with uuid {}", item.uuid);
                        report.updated += 1;
                    }
                }
                Err(failure) => {
                    eprintln!("Failed to sync block {}: {}", item.uuid, failure.error);
                    match failure.existing {
                        Some(note_id) => {
                            live_ids.push(note_id);
                            report.failed_updated += 1;
                        }
                        None => {
                            // Identity unknown: the item may still own a
                            // remote card, so it must be re-checked before
                            // any deletion happens.
                            unresolved.push(item.uuid.clone());
                            report.failed_created += 1;
                        }
                    }
                    report.failed_items.push(item.uuid.clone());
                }
            }
        }

        // Delete remote cards no longer claimed by any source item.
        self.store.reload_collection().await?;
        let mut live: HashSet<u64> = live_ids.into_iter().collect();

        // Items that failed before their identity resolved get one more
        // lookup here; a card they already claim must never be swept.
        let mut identities_known = true;
        for uuid in &unresolved {
            match resolve_note_id(&self.store, uuid, &model_name).await {
                Ok(Some(note_id)) => {
                    live.insert(note_id);
                }
                Ok(None) => {}
                Err(e) => {
                    eprintln!(
                        "Identity of block {} is unknown ({}), skipping deletions this run",
                        uuid, e
                    );
                    identities_known = false;
                    break;
                }
            }
        }

        if identities_known {
            let remote_ids = self.store.find_note_ids(&anki::model_query(&model_name)).await?;
            for note_id in remote_ids {
                if live.contains(&note_id) {
                    continue;
                }
                match self.store.delete_note(note_id).await {
                    Ok(()) => {
                        println!("Deleted note with id {}", note_id);
                        report.deleted += 1;
                    }
                    Err(e) => {
                        eprintln!("Failed to delete note {}: {}", note_id, e);
                        report.failed_deleted += 1;
                    }
                }
            }
        }

        self.store.remove_empty_notes().await?;
        self.store.reload_collection().await?;

        let summary = report.summary();
        println!("{}", summary);
        if !report.failed_items.is_empty() {
            println!("Failed blocks: {:?}", report.failed_items);
        }
        if let Err(e) = self.graph.show_message(&summary, report.severity()).await {
            eprintln!("Failed to show summary message: {}", e);
        }

        Ok(report)
    }

    async fn process_item(
        &self,
        item: &SourceItem,
        graph: &GraphInfo,
        model_name: &str,
    ) -> Result<ProcessedItem, ItemFailure> {
        let mut existing = None;
        self.process_item_steps(item, graph, model_name, &mut existing)
            .await
            .map_err(|error| ItemFailure { error, existing })
    }

    async fn process_item_steps(
        &self,
        item: &SourceItem,
        graph: &GraphInfo,
        model_name: &str,
        existing: &mut Option<u64>,
    ) -> Result<ProcessedItem, SyncError> {
        if !item.has_persisted_id {
            self.graph.persist_item_id(&item.uuid).await?;
        }
        *existing = resolve_note_id(&self.store, &item.uuid, model_name).await?;

        let page = match item.page_id {
            Some(page_id) => self.graph.page(page_id).await?,
            None => PageInfo::default(),
        };

        let rendered =
            content::to_card_html(&item.content, &item.cloze_spec, Path::new(&graph.path))?;
        for asset in &rendered.media {
            // Media must be queued before the note references the flattened
            // name; a failed upload degrades the card, not the run.
            if let Err(e) = self.store.store_media_file(&asset.filename, &asset.path).await {
                eprintln!("Failed to store media file {}: {}", asset.filename, e);
            }
        }

        let fields = NoteFields {
            uuid: item.uuid.clone(),
            text: rendered.html,
            extra: String::new(),
            breadcrumb: format!("<a href=\"#\">{}</a>", page.original_name),
        };

        match *existing {
            Some(note_id) => {
                self.store
                    .update_note(note_id, page.deck(), model_name, fields.to_map(), page.tags())
                    .await?;
                Ok(ProcessedItem { note_id, created: false })
            }
            None => {
                let note_id = self
                    .store
                    .add_note(page.deck(), model_name, fields.to_map(), page.tags())
                    .await?;
                Ok(ProcessedItem { note_id, created: true })
            }
        }
    }
}
