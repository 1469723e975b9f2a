use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use tokio::{sync::oneshot, task::AbortHandle};
use uuid::Uuid;

use crate::db::{AlertStore, DroneStore, Store, StoreError};
use crate::models::{
    alert::{Alert, CreateAlertData},
    drone::{CreateDroneData, Drone, DronePatrol, DroneStatus},
    resource::Coordinate,
    role::Actor,
};
use crate::services::image_analysis::{AnalysisError, ImageAnalysis, ImageAnalyzer};

/// Max distance, in degrees, of a detected issue from the reference point.
const JITTER_DEGREES: f64 = 0.05;
const PATROL_CONTEXT: &str = "Automated drone patrol over city EV infrastructure";

#[derive(thiserror::Error, Debug)]
pub enum PatrolError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Only admins can manage drones")]
    AdminOnly,

    #[error("Drone not found")]
    DroneNotFound,

    #[error("Drone is {0}, it must be idle to start a patrol")]
    NotIdle(DroneStatus),

    #[error("No sample images configured for patrols")]
    NoSampleImages,

    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone)]
pub struct PatrolSettings {
    /// Time between the start of a patrol and its detection step.
    pub detection_delay: Duration,
    pub reference_point: Coordinate,
    pub image_urls: Vec<String>,
}

/// What a detection step found and recorded.
#[derive(Debug, Clone, Serialize)]
pub struct PatrolOutcome {
    pub image_url: String,
    pub analysis: ImageAnalysis,
    pub alert: Option<Alert>,
    pub patrol: Option<DronePatrol>,
}

/// Runs drone patrols: starts them, schedules the delayed detection step
/// and lets a stop request cancel it.
#[derive(Clone)]
pub struct PatrolSimulator {
    store: Arc<dyn Store>,
    analyzer: Arc<dyn ImageAnalyzer>,
    settings: Arc<PatrolSettings>,
    // drone id -> (patrol id, pending detection task)
    pending: Arc<DashMap<Uuid, (Uuid, AbortHandle)>>,
}

impl PatrolSimulator {
    pub fn new(
        store: Arc<dyn Store>,
        analyzer: Arc<dyn ImageAnalyzer>,
        settings: PatrolSettings,
    ) -> Self {
        Self {
            store,
            analyzer,
            settings: Arc::new(settings),
            pending: Arc::new(DashMap::new()),
        }
    }

    pub fn has_pending_detection(&self, drone_id: Uuid) -> bool {
        self.pending.contains_key(&drone_id)
    }

    fn require_admin(actor: Actor) -> Result<(), PatrolError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(PatrolError::AdminOnly)
        }
    }

    pub async fn list_drones(&self, actor: Actor) -> Result<Vec<Drone>, PatrolError> {
        Self::require_admin(actor)?;
        Ok(self.store.list_drones().await?)
    }

    #[tracing::instrument(skip(self), fields(actor = %actor.user_id))]
    pub async fn add_drone(
        &self,
        actor: Actor,
        name: &str,
        model: Option<String>,
    ) -> Result<Drone, PatrolError> {
        Self::require_admin(actor)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(PatrolError::Validation("Drone name is required".to_string()));
        }

        let drone = self
            .store
            .insert_drone(CreateDroneData {
                name: name.to_string(),
                model: model.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
            })
            .await?;

        tracing::info!(drone_id = %drone.id, "Drone added");

        Ok(drone)
    }

    #[tracing::instrument(skip(self), fields(actor = %actor.user_id))]
    pub async fn delete_drone(&self, actor: Actor, drone_id: Uuid) -> Result<(), PatrolError> {
        Self::require_admin(actor)?;

        if let Some((_, (_, handle))) = self.pending.remove(&drone_id) {
            handle.abort();
        }

        if !self.store.delete_drone(drone_id).await? {
            return Err(PatrolError::DroneNotFound);
        }

        tracing::info!(drone_id = %drone_id, "Drone deleted");

        Ok(())
    }

    pub async fn list_patrols(
        &self,
        actor: Actor,
        drone_id: Uuid,
    ) -> Result<Vec<DronePatrol>, PatrolError> {
        Self::require_admin(actor)?;
        Ok(self.store.list_patrols(drone_id).await?)
    }

    /// Moves an idle drone to patrolling, opens a patrol record and
    /// schedules the detection step. Returns as soon as both writes succeed.
    #[tracing::instrument(skip(self), fields(actor = %actor.user_id))]
    pub async fn start_patrol(&self, actor: Actor, drone_id: Uuid) -> Result<DronePatrol, PatrolError> {
        Self::require_admin(actor)?;

        let now = Utc::now();
        if self.store.begin_patrol(drone_id, now).await?.is_none() {
            return match self.store.find_drone(drone_id).await? {
                Some(drone) => Err(PatrolError::NotIdle(drone.status)),
                None => Err(PatrolError::DroneNotFound),
            };
        }

        let patrol = match self.store.insert_patrol(drone_id, now).await {
            Ok(patrol) => patrol,
            Err(e) => {
                if let Err(reset) = self.store.set_drone_status(drone_id, DroneStatus::Idle).await {
                    tracing::error!(error = %reset, "Failed to reset drone after patrol error");
                }
                return Err(e.into());
            }
        };

        let simulator = self.clone();
        let patrol_id = patrol.id;
        let delay = self.settings.detection_delay;
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            // Cleanup below must not run before the entry is inserted
            let _ = registered_rx.await;
            tokio::time::sleep(delay).await;

            match simulator.detect_issues(actor, drone_id, patrol_id).await {
                Ok(outcome) => tracing::info!(
                    drone_id = %drone_id,
                    patrol_id = %patrol_id,
                    alert_created = outcome.alert.is_some(),
                    "Patrol detection finished"
                ),
                Err(e) => tracing::error!(
                    drone_id = %drone_id,
                    patrol_id = %patrol_id,
                    error = %e,
                    "Patrol detection failed"
                ),
            }

            simulator
                .pending
                .remove_if(&drone_id, |_, (pending_patrol, _)| *pending_patrol == patrol_id);
        });
        self.pending
            .insert(drone_id, (patrol_id, task.abort_handle()));
        let _ = registered_tx.send(());

        tracing::info!(drone_id = %drone_id, patrol_id = %patrol_id, "Patrol started");

        Ok(patrol)
    }

    /// Detection step of a patrol: analyses one sample image and, for a real
    /// issue, raises a maintenance alert near the reference point. The drone
    /// goes back to idle whatever happens.
    pub async fn detect_issues(
        &self,
        actor: Actor,
        drone_id: Uuid,
        patrol_id: Uuid,
    ) -> Result<PatrolOutcome, PatrolError> {
        let outcome = self.analyze_and_record(actor, patrol_id).await;

        self.store
            .set_drone_status(drone_id, DroneStatus::Idle)
            .await?;

        outcome
    }

    async fn analyze_and_record(
        &self,
        actor: Actor,
        patrol_id: Uuid,
    ) -> Result<PatrolOutcome, PatrolError> {
        let image_url = self.pick_image().ok_or(PatrolError::NoSampleImages)?;

        let report = self
            .analyzer
            .analyze(&image_url, Some(PATROL_CONTEXT))
            .await?;
        let analysis = report.analysis;
        let is_real = analysis.is_real_issue();

        // Claim the patrol before writing the alert: a patrol already closed
        // by a stop gets no alert.
        let patrol = self
            .store
            .close_patrol(patrol_id, i32::from(is_real), Utc::now())
            .await?;

        let alert = if is_real && patrol.is_some() {
            let location = self.jittered_location();
            let alert = self
                .store
                .insert_alert(CreateAlertData {
                    title: format!("{} - detected by drone patrol", analysis.issue_type),
                    description: Some(format!(
                        "{}\n\nSeverity: {:?}. Recommended action: {} (confidence {:.0}%)",
                        analysis.description,
                        analysis.severity,
                        analysis.recommended_action,
                        analysis.confidence
                    )),
                    alert_type: "maintenance".to_string(),
                    location,
                    created_by: Some(actor.user_id),
                })
                .await?;
            tracing::warn!(alert_id = %alert.id, issue = %analysis.issue_type, "Drone detected an issue");
            Some(alert)
        } else {
            None
        };

        Ok(PatrolOutcome {
            image_url,
            analysis,
            alert,
            patrol,
        })
    }

    /// Cancels any pending detection, closes the open patrol with no issues
    /// and sets the drone idle. Stopping an idle drone changes nothing, not
    /// even a patrol left open by a failed detection.
    #[tracing::instrument(skip(self), fields(actor = %actor.user_id))]
    pub async fn stop_patrol(&self, actor: Actor, drone_id: Uuid) -> Result<Drone, PatrolError> {
        Self::require_admin(actor)?;

        let drone = self
            .store
            .find_drone(drone_id)
            .await?
            .ok_or(PatrolError::DroneNotFound)?;

        if drone.status == DroneStatus::Idle {
            return Ok(drone);
        }

        if let Some((_, (patrol_id, handle))) = self.pending.remove(&drone_id) {
            handle.abort();
            tracing::info!(patrol_id = %patrol_id, "Pending detection cancelled");
        }

        if let Some(open) = self.store.find_open_patrol(drone_id).await? {
            self.store.close_patrol(open.id, 0, Utc::now()).await?;
        }

        let drone = self
            .store
            .set_drone_status(drone_id, DroneStatus::Idle)
            .await?
            .ok_or(PatrolError::DroneNotFound)?;

        tracing::info!(drone_id = %drone_id, "Patrol stopped");

        Ok(drone)
    }

    fn pick_image(&self) -> Option<String> {
        self.settings
            .image_urls
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    fn jittered_location(&self) -> Coordinate {
        let mut rng = rand::thread_rng();
        let reference = self.settings.reference_point;
        Coordinate::new(
            reference.latitude + rng.gen_range(-JITTER_DEGREES..=JITTER_DEGREES),
            reference.longitude + rng.gen_range(-JITTER_DEGREES..=JITTER_DEGREES),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::alert::AlertVisibility;
    use crate::models::role::AppRole;
    use crate::services::image_analysis::{AnalysisReport, Severity};
    use async_trait::async_trait;

    struct StubAnalyzer {
        reply: Option<(f64, Severity)>,
    }

    #[async_trait]
    impl ImageAnalyzer for StubAnalyzer {
        async fn analyze(
            &self,
            _image_url: &str,
            _context: Option<&str>,
        ) -> Result<AnalysisReport, AnalysisError> {
            let (confidence, severity) = self.reply.ok_or(AnalysisError::RateLimited)?;
            Ok(AnalysisReport::new(
                ImageAnalysis {
                    issue_type: "Faulty charging station".to_string(),
                    severity,
                    description: "Broken screen".to_string(),
                    recommended_action: "Replace screen".to_string(),
                    confidence,
                },
                String::new(),
            ))
        }
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), AppRole::Admin)
    }

    fn simulator(
        store: Arc<MemoryStore>,
        reply: Option<(f64, Severity)>,
        delay: Duration,
    ) -> PatrolSimulator {
        PatrolSimulator::new(
            store,
            Arc::new(StubAnalyzer { reply }),
            PatrolSettings {
                detection_delay: delay,
                reference_point: Coordinate::new(48.8566, 2.3522),
                image_urls: vec!["https://img.example/patrol.jpg".to_string()],
            },
        )
    }

    async fn run_detection(reply: (f64, Severity)) -> (Arc<MemoryStore>, PatrolOutcome, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let sim = simulator(store.clone(), Some(reply), Duration::from_secs(3600));
        let actor = admin();
        let drone = sim.add_drone(actor, "Falcon", None).await.unwrap();
        let patrol = sim.start_patrol(actor, drone.id).await.unwrap();

        let outcome = sim.detect_issues(actor, drone.id, patrol.id).await.unwrap();
        (store, outcome, drone.id)
    }

    #[tokio::test]
    async fn test_real_issue_creates_one_alert() {
        let (store, outcome, drone_id) = run_detection((75.0, Severity::Medium)).await;

        let alerts = store.list_alerts(AlertVisibility::All).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "maintenance");
        assert!((alerts[0].latitude - 48.8566).abs() <= JITTER_DEGREES);
        assert!((alerts[0].longitude - 2.3522).abs() <= JITTER_DEGREES);
        assert!(outcome.alert.is_some());

        let patrol = outcome.patrol.unwrap();
        assert_eq!(patrol.issues_detected, Some(1));
        assert!(patrol.end_time.is_some());

        let drone = store.find_drone(drone_id).await.unwrap().unwrap();
        assert_eq!(drone.status, DroneStatus::Idle);
    }

    #[tokio::test]
    async fn test_low_severity_is_not_an_issue() {
        let (store, outcome, _) = run_detection((80.0, Severity::Low)).await;

        assert!(store.list_alerts(AlertVisibility::All).await.unwrap().is_empty());
        assert_eq!(outcome.patrol.unwrap().issues_detected, Some(0));
    }

    #[tokio::test]
    async fn test_low_confidence_is_not_an_issue() {
        let (store, outcome, _) = run_detection((50.0, Severity::Critical)).await;

        assert!(store.list_alerts(AlertVisibility::All).await.unwrap().is_empty());
        assert!(outcome.alert.is_none());
        assert_eq!(outcome.patrol.unwrap().issues_detected, Some(0));
    }

    #[tokio::test]
    async fn test_analysis_failure_leaves_patrol_open_and_drone_idle() {
        let store = Arc::new(MemoryStore::new());
        let sim = simulator(store.clone(), None, Duration::from_secs(3600));
        let actor = admin();
        let drone = sim.add_drone(actor, "Falcon", None).await.unwrap();
        let patrol = sim.start_patrol(actor, drone.id).await.unwrap();

        let err = sim.detect_issues(actor, drone.id, patrol.id).await.unwrap_err();
        assert!(matches!(err, PatrolError::Analysis(AnalysisError::RateLimited)));

        let drone = store.find_drone(drone.id).await.unwrap().unwrap();
        assert_eq!(drone.status, DroneStatus::Idle);
        assert!(store.find_open_patrol(drone.id).await.unwrap().is_some());

        // Stopping the idle drone leaves that abandoned patrol untouched
        sim.stop_patrol(actor, drone.id).await.unwrap();
        let left_open = store.find_open_patrol(drone.id).await.unwrap().unwrap();
        assert_eq!(left_open.id, patrol.id);
        assert_eq!(left_open.end_time, None);
        assert_eq!(left_open.issues_detected, None);
    }

    #[tokio::test]
    async fn test_one_active_patrol_per_drone() {
        let store = Arc::new(MemoryStore::new());
        let sim = simulator(store.clone(), Some((75.0, Severity::High)), Duration::from_secs(3600));
        let actor = admin();
        let drone = sim.add_drone(actor, "Falcon", None).await.unwrap();

        sim.start_patrol(actor, drone.id).await.unwrap();
        let err = sim.start_patrol(actor, drone.id).await.unwrap_err();
        assert!(matches!(err, PatrolError::NotIdle(DroneStatus::Patrolling)));

        sim.stop_patrol(actor, drone.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_detection() {
        let store = Arc::new(MemoryStore::new());
        let sim = simulator(store.clone(), Some((90.0, Severity::Critical)), Duration::from_secs(3600));
        let actor = admin();
        let drone = sim.add_drone(actor, "Falcon", None).await.unwrap();
        let patrol = sim.start_patrol(actor, drone.id).await.unwrap();
        assert!(sim.has_pending_detection(drone.id));

        let stopped = sim.stop_patrol(actor, drone.id).await.unwrap();
        assert_eq!(stopped.status, DroneStatus::Idle);
        assert!(!sim.has_pending_detection(drone.id));

        let patrols = store.list_patrols(drone.id).await.unwrap();
        assert_eq!(patrols[0].id, patrol.id);
        assert_eq!(patrols[0].issues_detected, Some(0));
        assert!(patrols[0].end_time.is_some());

        // A detection arriving after the stop does not raise an alert.
        let outcome = sim.detect_issues(actor, drone.id, patrol.id).await.unwrap();
        assert!(outcome.alert.is_none());
        assert!(store.list_alerts(AlertVisibility::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stop_on_idle_drone_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let sim = simulator(store.clone(), None, Duration::from_secs(3600));
        let actor = admin();
        let drone = sim.add_drone(actor, "Falcon", None).await.unwrap();

        let first = sim.stop_patrol(actor, drone.id).await.unwrap();
        let second = sim.stop_patrol(actor, drone.id).await.unwrap();
        assert_eq!(first.status, DroneStatus::Idle);
        assert_eq!(second.status, DroneStatus::Idle);
        assert!(store.list_patrols(drone.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_detection_runs() {
        let store = Arc::new(MemoryStore::new());
        let sim = simulator(store.clone(), Some((75.0, Severity::Medium)), Duration::from_millis(10));
        let actor = admin();
        let drone = sim.add_drone(actor, "Falcon", None).await.unwrap();
        sim.start_patrol(actor, drone.id).await.unwrap();

        let mut closed = false;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if store.find_open_patrol(drone.id).await.unwrap().is_none() {
                closed = true;
                break;
            }
        }
        assert!(closed);

        // The drone is reset right after the patrol is closed.
        for _ in 0..200 {
            let drone = store.find_drone(drone.id).await.unwrap().unwrap();
            if drone.status == DroneStatus::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let drone = store.find_drone(drone.id).await.unwrap().unwrap();
        assert_eq!(drone.status, DroneStatus::Idle);
        assert_eq!(store.list_alerts(AlertVisibility::All).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_finished_detection_clears_pending_entry() {
        let store = Arc::new(MemoryStore::new());
        let sim = simulator(store.clone(), Some((80.0, Severity::Low)), Duration::ZERO);
        let actor = admin();

        for i in 0..50 {
            let drone = sim.add_drone(actor, &format!("Swift {}", i), None).await.unwrap();
            sim.start_patrol(actor, drone.id).await.unwrap();

            let mut cleared = false;
            for _ in 0..200 {
                if !sim.has_pending_detection(drone.id) {
                    cleared = true;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            assert!(cleared, "drone {} still has a pending detection", i);
            assert!(store.find_open_patrol(drone.id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_drone_management() {
        let store = Arc::new(MemoryStore::new());
        let sim = simulator(store.clone(), None, Duration::from_secs(1));
        let actor = admin();

        assert!(matches!(
            sim.add_drone(actor, "   ", None).await,
            Err(PatrolError::Validation(_))
        ));
        let worker = Actor::new(Uuid::new_v4(), AppRole::Worker);
        assert!(matches!(
            sim.add_drone(worker, "Falcon", None).await,
            Err(PatrolError::AdminOnly)
        ));

        let drone = sim
            .add_drone(actor, " Falcon ", Some("DJI Mavic".to_string()))
            .await
            .unwrap();
        assert_eq!(drone.name, "Falcon");
        assert_eq!(drone.battery_level, 100);
        assert_eq!(drone.status, DroneStatus::Idle);
        assert_eq!(sim.list_drones(actor).await.unwrap().len(), 1);

        sim.delete_drone(actor, drone.id).await.unwrap();
        assert!(matches!(
            sim.delete_drone(actor, drone.id).await,
            Err(PatrolError::DroneNotFound)
        ));
    }
}
