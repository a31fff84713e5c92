//! Shared application state for the REST API.
//!
//! One [`AppState`] is cloned into every handler. It owns the repository
//! bundle and one instance of each service, all sharing the same stores and
//! the same process-wide build coordinator.

use std::path::Path;
use std::sync::Arc;

use leaklens_epanet::{EngineFactory, SteadyStateFactory};

use crate::analysis::AnalysisOrchestrator;
use crate::detection::MassBalanceDetector;
use crate::import::ImportService;
use crate::localization::LocalizationService;
use crate::placement::PlacementService;
use crate::repository::Stores;
use crate::sensitivity::{BuildCoordinator, MatrixBuilder};

/// Shared state behind every API handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    stores: Stores,
    import: ImportService,
    placement: PlacementService,
    detector: MassBalanceDetector,
    localizer: LocalizationService,
    orchestrator: AnalysisOrchestrator,
    matrix: MatrixBuilder,
}

impl AppState {
    /// State over in-memory stores and the bundled steady-state engine.
    #[must_use]
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self::with_parts(
            Stores::in_memory(),
            Arc::new(SteadyStateFactory),
            storage_dir,
        )
    }

    /// State over explicit repository and engine backends.
    #[must_use]
    pub fn with_parts(
        stores: Stores,
        factory: Arc<dyn EngineFactory>,
        storage_dir: impl AsRef<Path>,
    ) -> Self {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let coordinator = Arc::new(BuildCoordinator::new());
        Self {
            inner: Arc::new(AppStateInner {
                import: ImportService::new(stores.clone(), &storage_dir),
                placement: PlacementService::new(stores.clone()),
                detector: MassBalanceDetector::new(stores.clone()),
                localizer: LocalizationService::new(stores.clone()),
                orchestrator: AnalysisOrchestrator::new(stores.clone()),
                matrix: MatrixBuilder::new(stores.clone(), factory, coordinator, storage_dir),
                stores,
            }),
        }
    }

    /// The repository bundle.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    /// The EPANET import service.
    #[must_use]
    pub fn import(&self) -> &ImportService {
        &self.inner.import
    }

    /// The sensor auto-placement service.
    #[must_use]
    pub fn placement(&self) -> &PlacementService {
        &self.inner.placement
    }

    /// The mass-balance detector.
    #[must_use]
    pub fn detector(&self) -> &MassBalanceDetector {
        &self.inner.detector
    }

    /// The localization service.
    #[must_use]
    pub fn localizer(&self) -> &LocalizationService {
        &self.inner.localizer
    }

    /// The one-shot analysis orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.inner.orchestrator
    }

    /// The sensitivity matrix builder.
    #[must_use]
    pub fn matrix(&self) -> &MatrixBuilder {
        &self.inner.matrix
    }
}
