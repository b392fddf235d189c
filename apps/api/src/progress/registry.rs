use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::progress::session::{ProgressSettings, Session};
use crate::progress::steps::StepPlan;

/// All live sessions of the process. Each session owns its own timers, cancellation tokens
/// and audio context; the registry only maps ids to them.
pub struct SessionRegistry<P> {
    plan: StepPlan,
    settings: ProgressSettings,
    sessions: RwLock<HashMap<Uuid, Arc<Session<P>>>>,
}

impl<P> SessionRegistry<P>
where
    P: Clone + Send + 'static,
{
    pub fn new(plan: StepPlan, settings: ProgressSettings) -> Self {
        Self {
            plan,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self) -> Arc<Session<P>> {
        let session = Session::new(self.plan.clone(), self.settings);
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id(), Arc::clone(&session));
        info!("Created session {}", session.id());
        session
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Session<P>>> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Removes the session and cancels anything it still has running.
    pub fn remove(&self, id: Uuid) -> Option<Arc<Session<P>>> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        if let Some(session) = &removed {
            session.teardown();
        }
        removed
    }

    /// Tears down and drops every session idle for at least `max_idle`. Returns how many
    /// were evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let evicted: Vec<Arc<Session<P>>> = {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            let idle: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, session)| session.is_idle(max_idle))
                .map(|(id, _)| *id)
                .collect();
            idle.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        for session in &evicted {
            session.teardown();
        }
        evicted.len()
    }

    /// Sweeps idle sessions every `period`.
    pub fn spawn_idle_sweep(self: &Arc<Self>, period: Duration, max_idle: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let evicted = registry.evict_idle(max_idle);
                if evicted > 0 {
                    info!(
                        "Evicted {evicted} idle sessions ({} remaining)",
                        registry.len()
                    );
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn plan(&self) -> &StepPlan {
        &self.plan
    }
}
