//! Inbound notification handling: admission checks and background dispatch.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, warn};

use crate::model::{NotificationEvent, SupportedApp, UserSettings};
use crate::parser::is_ride_notification;
use crate::pipeline::{ProcessedRide, RideProcessor};
use crate::services::{OverlayPresenter, RideRepository};
use crate::snapshot::ServiceSnapshot;

/// Why a notification was not turned into a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotInitialized,
    SignedOut,
    UnsupportedApp,
    SmartAssistDisabled,
    EmptyText,
    NotRideNotification,
    ShuttingDown,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NotInitialized => "settings not loaded yet",
            SkipReason::SignedOut => "no signed-in user",
            SkipReason::UnsupportedApp => "package is not a supported app",
            SkipReason::SmartAssistDisabled => "smart assist is disabled",
            SkipReason::EmptyText => "notification has no text",
            SkipReason::NotRideNotification => "not a ride notification",
            SkipReason::ShuttingDown => "service is shutting down",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for SkipReason {}

/// A notification that passed every check, with the context to process it.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub user_id: String,
    pub app: SupportedApp,
    pub settings: UserSettings,
    pub text: String,
}

/// Filters incoming notifications against the current snapshot and runs the
/// survivors through the [`RideProcessor`] on background tasks.
///
/// Every task stops at its next await point once the service is shut down;
/// whatever already reached the local cache stays there.
pub struct NotificationService<R, P> {
    processor: Arc<RideProcessor<R, P>>,
    snapshot: watch::Receiver<Arc<ServiceSnapshot>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl<R, P> NotificationService<R, P>
where
    R: RideRepository + 'static,
    P: OverlayPresenter + 'static,
{
    pub fn new(
        processor: Arc<RideProcessor<R, P>>,
        snapshot: watch::Receiver<Arc<ServiceSnapshot>>,
    ) -> Self {
        Self {
            processor,
            snapshot,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn processor(&self) -> &RideProcessor<R, P> {
        &self.processor
    }

    /// Checks a notification against the current snapshot. Checks run in a
    /// fixed order and the first failing one is reported.
    pub fn admit(&self, event: &NotificationEvent) -> Result<Admitted, SkipReason> {
        let snapshot = self.snapshot.borrow().clone();

        if !snapshot.initialized {
            return Err(SkipReason::NotInitialized);
        }
        let Some(user_id) = snapshot.user_id.clone() else {
            return Err(SkipReason::SignedOut);
        };
        let Some(app) = snapshot.app_for_package(&event.package_name) else {
            return Err(SkipReason::UnsupportedApp);
        };

        let settings = snapshot
            .settings
            .clone()
            .unwrap_or_else(|| UserSettings::for_user(&user_id));
        if !settings.smart_assist_enabled {
            return Err(SkipReason::SmartAssistDisabled);
        }

        let text = event.combined_text();
        if text.is_empty() {
            return Err(SkipReason::EmptyText);
        }
        if !is_ride_notification(&text, app) {
            return Err(SkipReason::NotRideNotification);
        }

        Ok(Admitted {
            user_id,
            app: app.clone(),
            settings,
            text,
        })
    }

    /// Admits the event and processes it on a background task.
    ///
    /// The task yields `None` when processing failed or was cancelled.
    pub fn dispatch(
        &self,
        event: NotificationEvent,
    ) -> Result<JoinHandle<Option<ProcessedRide>>, SkipReason> {
        if self.cancel.is_cancelled() {
            return Err(SkipReason::ShuttingDown);
        }

        let admitted = match self.admit(&event) {
            Ok(admitted) => admitted,
            Err(reason) => {
                debug!(package = %event.package_name, %reason, "Notification skipped");
                return Err(reason);
            }
        };

        let span = tracing::info_span!(
            "process_notification",
            package = %event.package_name,
            app = %admitted.app.app_name,
        );
        let processor = self.processor.clone();
        let cancel = self.cancel.clone();

        let handle = self.tracker.spawn(
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        warn!("Processing cancelled");
                        None
                    }
                    result = processor.process(
                        &admitted.user_id,
                        &admitted.text,
                        &admitted.app,
                        &admitted.settings,
                    ) => match result {
                        Ok(processed) => Some(processed),
                        Err(e) => {
                            error!(error = %e, "Notification processing failed");
                            None
                        }
                    },
                }
            }
            .instrument(span),
        );

        Ok(handle)
    }

    /// Waits for in-flight tasks to finish without cancelling them.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancels in-flight tasks and waits for them to stop.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Notification service stopped");
    }
}
