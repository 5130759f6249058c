use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::geometry::{
    AxisRanges, ClickResult, PlotDimensions, PlotPoint, VolcanoGeometry, VolcanoTraces,
    build_traces, plot_points,
};
use crate::model::VolcanoSettings;
use crate::runtime::{
    Debouncer, LatestSlot, ResultHandle, RuntimeError, SUGGEST_DEBOUNCE, StateCell, WorkerPool,
};
use crate::search::{self, BatchResultGroup, SearchQuery, flatten_unique_ids};
use crate::selection::annotation::AnnotationEdit;
use crate::selection::palette::selection_color;
use crate::selection::{PlotState, SelectionState, disambiguate_selection_name};
use crate::store::TabularStore;
use crate::variants::{self, SettingsVariant, StateError, VariantStore};

const SUGGEST_LIMIT: usize = 20;

struct ViewCache {
    settings: Arc<VolcanoSettings>,
    state: Arc<PlotState>,
    points: Arc<Vec<PlotPoint>>,
    ranges: AxisRanges,
}

/// Settings and plot state published together, so a reader never sees the
/// cutoffs of one transition paired with the selection of another.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub settings: Arc<VolcanoSettings>,
    pub plot: Arc<PlotState>,
}

/// All state for one loaded dataset. Constructed once and passed by reference
/// to every caller; edits go through whole-value replacement.
pub struct DatasetSession {
    dataset_id: String,
    store: Arc<TabularStore>,
    state: StateCell<SessionState>,
    variants: Mutex<VariantStore>,
    view: Mutex<Option<ViewCache>>,
    geometry: Mutex<Option<VolcanoGeometry>>,
    pool: WorkerPool,
    traces: LatestSlot<VolcanoTraces>,
    suggestions: Debouncer,
}

impl DatasetSession {
    pub fn new(
        dataset_id: &str,
        store: Arc<TabularStore>,
        settings: VolcanoSettings,
        variants: VariantStore,
        pool: WorkerPool,
    ) -> Result<Self, RuntimeError> {
        Ok(Self {
            dataset_id: dataset_id.to_string(),
            store,
            state: StateCell::new(SessionState {
                settings: Arc::new(settings),
                plot: Arc::new(PlotState::default()),
            }),
            variants: Mutex::new(variants),
            view: Mutex::new(None),
            geometry: Mutex::new(None),
            suggestions: Debouncer::new(pool.clone(), SUGGEST_DEBOUNCE)?,
            pool,
            traces: LatestSlot::new(),
        })
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn store(&self) -> &Arc<TabularStore> {
        &self.store
    }

    pub fn settings(&self) -> Arc<VolcanoSettings> {
        Arc::clone(&self.state.snapshot().settings)
    }

    pub fn plot_state(&self) -> Arc<PlotState> {
        Arc::clone(&self.state.snapshot().plot)
    }

    /// Settings and plot state from the same transition.
    pub fn view_state(&self) -> Arc<SessionState> {
        self.state.snapshot()
    }

    pub fn update_settings<F>(&self, f: F) -> Arc<VolcanoSettings>
    where
        F: FnOnce(&VolcanoSettings) -> VolcanoSettings,
    {
        let next = self.state.update(|s| SessionState {
            settings: Arc::new(f(&s.settings)),
            plot: Arc::clone(&s.plot),
        });
        Arc::clone(&next.settings)
    }

    fn update_plot<F>(&self, f: F) -> Arc<PlotState>
    where
        F: FnOnce(&PlotState) -> PlotState,
    {
        let next = self.state.update(|s| SessionState {
            settings: Arc::clone(&s.settings),
            plot: Arc::new(f(&s.plot)),
        });
        Arc::clone(&next.plot)
    }

    pub fn search(&self, query: &SearchQuery) -> Vec<BatchResultGroup> {
        let cutoffs = self.settings().cutoffs;
        search::search(&self.store, query, &cutoffs)
    }

    pub fn search_async(&self, query: SearchQuery) -> ResultHandle<Vec<BatchResultGroup>> {
        let store = Arc::clone(&self.store);
        let cutoffs = self.settings().cutoffs;
        self.pool
            .submit(move || search::search(&store, &query, &cutoffs))
    }

    pub fn create_selection<S: AsRef<str>>(&self, name: &str, ids: &[S]) -> Arc<PlotState> {
        self.update_plot(|s| PlotState {
            selection: s.selection.create_selection(name, ids),
            annotations: s.annotations.clone(),
        })
    }

    /// Turns search hits into a selection group named after `proposed_name`,
    /// disambiguated by the first hit's comparison label.
    pub fn select_from_search(&self, proposed_name: &str, groups: &[BatchResultGroup]) -> Arc<PlotState> {
        let ids = flatten_unique_ids(groups);
        let name = disambiguate_selection_name(proposed_name, &ids, &self.store);
        info!(name = %name, proteins = ids.len(), "selection created from search");
        self.create_selection(&name, &ids)
    }

    pub fn remove_selection(&self, name: &str) -> Arc<PlotState> {
        self.update_plot(|s| PlotState {
            selection: s.selection.remove_selection(name),
            annotations: s.annotations.clone(),
        })
    }

    pub fn add_annotation(&self, text: &str, x: f64, y: f64) -> bool {
        let mut added = false;
        self.update_plot(|s| {
            let mut next = s.clone();
            added = next.annotations.add(text, x, y);
            next
        });
        added
    }

    pub fn update_annotation(&self, key: &str, edit: AnnotationEdit) -> bool {
        let mut updated = false;
        self.update_plot(|s| {
            let mut next = s.clone();
            updated = next.annotations.update(key, edit);
            next
        });
        updated
    }

    pub fn remove_annotation(&self, key: &str) -> bool {
        let mut removed = false;
        self.update_plot(|s| {
            let mut next = s.clone();
            removed = next.annotations.remove(key);
            next
        });
        removed
    }

    /// Annotates every plotted record of the given proteins; returns how many
    /// labels were new.
    pub fn annotate_proteins<S: AsRef<str>>(&self, ids: &[S]) -> usize {
        let wanted: std::collections::HashSet<&str> = ids.iter().map(|s| s.as_ref()).collect();
        let points: Vec<PlotPoint> = self
            .points()
            .iter()
            .filter(|p| wanted.contains(p.protein_id.as_str()))
            .cloned()
            .collect();
        let mut inserted = 0;
        self.update_plot(|s| {
            let mut next = s.clone();
            inserted = next.annotations.bulk_annotate(&points);
            next
        });
        debug!(requested = ids.len(), inserted, "bulk annotation");
        inserted
    }

    /// Current points with colors and significance for the live cutoffs and
    /// selection; rebuilt only when either snapshot changed.
    pub fn points(&self) -> Arc<Vec<PlotPoint>> {
        self.view().0
    }

    fn view(&self) -> (Arc<Vec<PlotPoint>>, AxisRanges) {
        let SessionState { settings, plot: state } = SessionState::clone(&self.state.snapshot());
        let mut view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cache) = view.as_ref() {
            if Arc::ptr_eq(&cache.settings, &settings) && Arc::ptr_eq(&cache.state, &state) {
                return (Arc::clone(&cache.points), cache.ranges);
            }
        }
        let points = Arc::new(plot_points(&self.store, &settings.cutoffs, &state.selection));
        let ranges = AxisRanges::from_points(&points, settings.axis_padding, settings.y_axis);
        *view = Some(ViewCache {
            settings,
            state,
            points: Arc::clone(&points),
            ranges,
        });
        (points, ranges)
    }

    /// Neighbors of a plotted protein. `None` when the protein is not in the
    /// dataset; `comparison` defaults to the protein's first comparison.
    pub fn click(&self, protein_id: &str, comparison: Option<&str>) -> Option<ClickResult> {
        let (points, ranges) = self.view();
        let clicked = points
            .iter()
            .find(|p| {
                p.protein_id == protein_id && comparison.is_none_or(|c| p.comparison == c)
            })?
            .clone();
        let settings = self.settings();
        let dims = PlotDimensions::new(settings.width_px, settings.height_px);

        let mut geometry = self.geometry.lock().unwrap_or_else(PoisonError::into_inner);
        let geometry = geometry.get_or_insert_with(|| VolcanoGeometry::new(ranges, dims));
        geometry.set_ranges(ranges);
        geometry.set_dimensions(dims);
        Some(geometry.find_nearby(&clicked, &points, settings.pixel_radius))
    }

    pub fn traces(&self) -> VolcanoTraces {
        let SessionState { settings, plot: state } = SessionState::clone(&self.state.snapshot());
        build_traces(&self.points(), &state, &settings)
    }

    /// Rebuilds the plot traces in the background and publishes them to the
    /// latest-traces slot. Earlier requests are not cancelled; whichever finishes
    /// last is what readers see.
    pub fn submit_regeneration(&self) -> ResultHandle<u64> {
        let store = Arc::clone(&self.store);
        let SessionState { settings, plot: state } = SessionState::clone(&self.state.snapshot());
        let slot = self.traces.clone();
        self.pool.submit(move || {
            let points = plot_points(&store, &settings.cutoffs, &state.selection);
            slot.publish(build_traces(&points, &state, &settings))
        })
    }

    pub fn latest_traces(&self) -> Option<(u64, Arc<VolcanoTraces>)> {
        self.traces.latest()
    }

    /// Typeahead over gene names; superseded requests resolve to `None`.
    pub fn suggest_debounced(&self, input: &str) -> ResultHandle<Option<Vec<String>>> {
        let store = Arc::clone(&self.store);
        let input = input.to_string();
        self.suggestions.schedule(move |token| {
            if token.is_cancelled() {
                return Vec::new();
            }
            search::suggest(store.all_gene_names(), &input, SUGGEST_LIMIT)
        })
    }

    pub fn save_variant(&self, name: &str, description: &str) -> Result<SettingsVariant, StateError> {
        let current = self.state.snapshot();
        let variant = SettingsVariant::capture(name, description, &current.settings, &current.plot.selection);
        self.variants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .save(variant)
    }

    /// Applies the variant's cutoffs and replaces the selection wholesale in a
    /// single transition. Unknown names are a no-op returning `false`.
    pub fn load_variant(&self, name: &str) -> bool {
        let variant = {
            let store = self.variants.lock().unwrap_or_else(PoisonError::into_inner);
            match store.get(name) {
                Some(v) => v.clone(),
                None => return false,
            }
        };
        let (selected_map, selections_name) = variants::load(&variant);
        self.state.update(|s| {
            let color_map = selections_name
                .iter()
                .enumerate()
                .map(|(idx, group)| {
                    let color = s
                        .plot
                        .selection
                        .color_map
                        .get(group)
                        .cloned()
                        .unwrap_or_else(|| selection_color(idx).to_string());
                    (group.clone(), color)
                })
                .collect();
            SessionState {
                settings: Arc::new(variants::apply(&variant, &s.settings)),
                plot: Arc::new(PlotState {
                    selection: SelectionState {
                        selected_map,
                        selections_name,
                        color_map,
                    },
                    annotations: s.plot.annotations.clone(),
                }),
            }
        });
        info!(name, "settings variant loaded");
        true
    }

    pub fn delete_variant(&self, name: &str) -> Result<bool, StateError> {
        self.variants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .delete(name)
    }

    pub fn list_variants(&self) -> Vec<SettingsVariant> {
        self.variants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .list()
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/session/tests.rs"]
mod tests;
