use std::sync::Arc;

use excursions_core::workflow::WorkflowDefinition;
use excursions_events::EventBus;
use excursions_workflow::{ActivityWorkflow, CalendarService, PermissionService};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: excursions_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Workflow definition loaded at startup.
    pub definition: Arc<WorkflowDefinition>,
    /// Centralized event bus for publishing platform events.
    pub event_bus: Arc<EventBus>,
    pub activities: Arc<ActivityWorkflow>,
    pub calendar: Arc<CalendarService>,
    pub permissions: Arc<PermissionService>,
}

impl AppState {
    /// Wire the workflow services onto a shared pool, definition, and bus.
    pub fn new(
        pool: excursions_db::DbPool,
        config: Arc<ServerConfig>,
        definition: Arc<WorkflowDefinition>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let activities = ActivityWorkflow::new(
            pool.clone(),
            Arc::clone(&definition),
            Arc::clone(&event_bus),
        );
        let calendar = CalendarService::new(pool.clone(), Arc::clone(&event_bus));
        let permissions = PermissionService::new(pool.clone(), Arc::clone(&definition));

        Self {
            pool,
            config,
            definition,
            event_bus,
            activities: Arc::new(activities),
            calendar: Arc::new(calendar),
            permissions: Arc::new(permissions),
        }
    }
}
