//! Orchestration and command unit name constants
//!
//! Orchestration names are what callers submit through the registry, the CLI
//! and the HTTP API. Command unit names label the progress phases each
//! orchestration opens.

/// Orchestration names
pub mod orchestrations {
    /// Basic setup: create the next generation next to the running one.
    ///
    /// **Input:** [`crate::types::SetupRequest`]
    /// **Output:** [`crate::types::SetupOutput`]
    /// **Platform calls:** list, rename, create, map-route, resize, delete
    pub const BASIC_SETUP: &str = "cutover::orchestration::basic-setup";

    /// Blue-green setup: create the new generation in the inactive slot with
    /// temporary routes.
    ///
    /// **Input:** [`crate::types::SetupRequest`]
    /// **Output:** [`crate::types::SetupOutput`]
    pub const BLUE_GREEN_SETUP: &str = "cutover::orchestration::blue-green-setup";

    /// Resize the new and old applications in the configured order.
    ///
    /// **Input:** [`crate::types::ResizeRequest`]
    /// **Output:** [`crate::types::ResizeOutput`]
    /// **Platform calls:** list, resize, get, autoscaler, map/unmap-route
    pub const RESIZE: &str = "cutover::orchestration::resize";

    /// Undo a resize by restoring previous instance counts.
    ///
    /// **Input:** [`crate::types::ResizeRollbackRequest`]
    /// **Output:** [`crate::types::RollbackOutput`]
    pub const ROLLBACK: &str = "cutover::orchestration::rollback";

    /// Exchange active/inactive identity between two applications.
    ///
    /// **Input:** [`crate::types::SwapRoutesRequest`]
    /// **Output:** [`crate::types::SwapRoutesOutput`]
    /// **Platform calls:** list, map/unmap-route, rename, resize, autoscaler
    pub const SWAP_ROUTES: &str = "cutover::orchestration::swap-routes";

    /// Undo a blue-green deployment before or after its route swap.
    ///
    /// **Input:** [`crate::types::SwapRollbackRequest`]
    /// **Output:** [`crate::types::RollbackOutput`]
    pub const SWAP_ROLLBACK: &str = "cutover::orchestration::swap-rollback";

    /// In-place rolling update of a single application.
    ///
    /// **Input:** [`crate::types::RollingDeployRequest`]
    /// **Output:** [`crate::types::RollingDeployOutput`]
    pub const ROLLING_DEPLOY: &str = "cutover::orchestration::rolling-deploy";

    /// Restore a single application to its state before a rolling update.
    ///
    /// **Input:** [`crate::types::RollingRollbackRequest`]
    /// **Output:** [`crate::types::RollingRollbackOutput`]
    pub const ROLLING_ROLLBACK: &str = "cutover::orchestration::rolling-rollback";

    pub const ALL: [&str; 8] = [
        BASIC_SETUP,
        BLUE_GREEN_SETUP,
        RESIZE,
        ROLLBACK,
        SWAP_ROUTES,
        SWAP_ROLLBACK,
        ROLLING_DEPLOY,
        ROLLING_ROLLBACK,
    ];
}

/// Progress phase names
pub mod command_units {
    pub const FETCH_FILES: &str = "Fetch Files";
    pub const DEPLOY: &str = "Deploy";
    pub const UPSIZE: &str = "Upsize";
    pub const DOWNSIZE: &str = "Downsize";
    pub const SWAP_ROUTES: &str = "SwapRoutes";
    pub const SWAP_ROLLBACK: &str = "SwapRollback";
    pub const ROLLBACK: &str = "Rollback";
    pub const WRAPUP: &str = "Wrapup";
}
