use crate::data::error::DataError;
use crate::data::export::to_xlsx_bytes;
use crate::data::filter::{apply_filters, cascade, CascadeView, Dimension, FilterSelection};
use crate::data::loader::DatasetSource;
use crate::data::model::Dataset;
use crate::data::upload::append_upload;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// One-line message shown in the top bar.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    Info(String),
    Error(String),
}

/// The state of one dashboard session, independent of rendering.
pub struct AppState {
    source: Box<dyn DatasetSource>,

    /// Loaded dataset (None until a load succeeds).
    pub dataset: Option<Dataset>,

    /// Why the last load failed; rendering stops while this is set.
    pub load_error: Option<String>,

    /// Current filter choices, always reconciled against `view`.
    pub selection: FilterSelection,

    /// Option lists from the last cascade pass.
    pub view: Option<CascadeView>,

    /// Indices of records passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    pub status_message: Option<StatusMessage>,
}

impl AppState {
    pub fn new(source: Box<dyn DatasetSource>) -> Self {
        Self {
            source,
            dataset: None,
            load_error: None,
            selection: FilterSelection::default(),
            view: None,
            visible_indices: Vec::new(),
            status_message: None,
        }
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub fn can_upload(&self) -> bool {
        self.dataset.is_some() && self.source.supports_append()
    }

    /// Fetch the dataset; `force` bypasses any cache.
    pub fn reload(&mut self, force: bool) {
        if force {
            self.source.invalidate();
        }
        match self.source.load() {
            Ok(dataset) => {
                log::info!(
                    "Loaded {} records with columns {:?}",
                    dataset.len(),
                    dataset.columns
                );
                self.set_dataset(dataset);
            }
            Err(e) => {
                log::error!("Failed to load dataset: {e:#}");
                self.dataset = None;
                self.view = None;
                self.visible_indices.clear();
                self.load_error = Some(e.to_string());
            }
        }
    }

    /// Ingest a newly loaded dataset, keeping whatever choices still apply.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.dataset = Some(dataset);
        self.load_error = None;
        self.refilter();
    }

    /// Re-run the cascade and recompute `visible_indices`.
    pub fn refilter(&mut self) {
        let Some(ds) = &self.dataset else {
            return;
        };
        let view = cascade(ds, &self.selection);
        self.selection = view.selection.clone();
        self.visible_indices = apply_filters(ds, &self.selection);
        self.view = Some(view);
    }

    /// Choose a value on a single-value dimension.
    pub fn set_choice(&mut self, dim: Dimension, value: &str) {
        if let Some(chosen) = self.selection.single_mut(dim) {
            *chosen = value.to_string();
        }
        self.refilter();
    }

    pub fn toggle_department(&mut self, value: &str) {
        self.selection.toggle_department(value);
        self.refilter();
    }

    pub fn set_departments(&mut self, values: Vec<String>) {
        self.selection.departments = values;
        self.refilter();
    }

    /// A dataset is loaded but nothing matches the current filters.
    pub fn is_empty_result(&self) -> bool {
        self.dataset.is_some() && self.visible_indices.is_empty()
    }

    /// The filtered rows as xlsx bytes.
    pub fn export_bytes(&self) -> Result<Vec<u8>, DataError> {
        let ds = self
            .dataset
            .as_ref()
            .ok_or_else(|| DataError::DataUnavailable("no dataset loaded".into()))?;
        to_xlsx_bytes(ds, &self.visible_indices)
    }

    /// Append an uploaded workbook to the source, then reload.
    ///
    /// The outcome is also recorded in `status_message`.
    pub fn upload(&mut self, bytes: &[u8]) -> Result<usize, DataError> {
        let columns = self
            .dataset
            .as_ref()
            .map(|ds| ds.columns.clone())
            .unwrap_or_default();

        match append_upload(&mut *self.source, &columns, bytes) {
            Ok(n) => {
                self.status_message = Some(StatusMessage::Info(format!("Appended {n} rows")));
                self.reload(true);
                Ok(n)
            }
            Err(e) => {
                log::error!("Upload failed: {e:#}");
                self.status_message = Some(StatusMessage::Error(e.to_string()));
                Err(e)
            }
        }
    }
}
