//! Reward side effects: level-up celebrations and achievement toasts.
//!
//! Every timer lives in a [`TimerSet`] owned by the session, so tearing the
//! session down can never leave a timer firing into a view that is gone.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::GuideEvent;
use crate::gamification::{Unlocked, XpAward};
use crate::transition::Effects;

/// Owned set of scheduled one-shot timers. Aborts them all on drop.
#[derive(Debug, Default)]
pub struct TimerSet {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `event` on `tx` after `delay`.
    pub fn schedule(&self, delay: Duration, tx: broadcast::Sender<GuideEvent>, event: GuideEvent) {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of timers that have not fired yet.
    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn cancel_all(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        let live = handles.iter().filter(|h| !h.is_finished()).count();
        for handle in handles.drain(..) {
            handle.abort();
        }
        if live > 0 {
            debug!(cancelled = live, "Cancelled pending guide timers");
        }
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Turns ledger results into events, effects, and auto-dismiss timers.
pub struct Celebrations {
    effects: Arc<dyn Effects>,
    events: broadcast::Sender<GuideEvent>,
    timers: TimerSet,
    level_up: Duration,
    toast: Duration,
}

impl Celebrations {
    pub fn new(
        effects: Arc<dyn Effects>,
        events: broadcast::Sender<GuideEvent>,
        level_up: Duration,
        toast: Duration,
    ) -> Self {
        Self {
            effects,
            events,
            timers: TimerSet::new(),
            level_up,
            toast,
        }
    }

    pub fn xp_awarded(&self, award: &XpAward) {
        if award.amount == 0 {
            return;
        }
        let _ = self.events.send(GuideEvent::XpAwarded {
            amount: award.amount,
            total: award.total,
            level: award.new_level,
        });
        if award.leveled_up() {
            self.effects.start();
            let _ = self.events.send(GuideEvent::LevelUp {
                level: award.new_level,
            });
            self.timers.schedule(
                self.level_up,
                self.events.clone(),
                GuideEvent::CelebrationEnded {
                    level: award.new_level,
                },
            );
        }
    }

    pub fn achievement(&self, unlocked: &Unlocked) {
        let a = &unlocked.achievement;
        let _ = self.events.send(GuideEvent::AchievementUnlocked {
            id: a.id.clone(),
            name: a.name.clone(),
            description: a.description.clone(),
            icon: a.icon.clone(),
        });
        self.timers.schedule(
            self.toast,
            self.events.clone(),
            GuideEvent::ToastDismissed { id: a.id.clone() },
        );
        self.xp_awarded(&unlocked.bonus);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Cancel every pending timer.
    pub fn shutdown(&self) {
        self.timers.cancel_all();
    }
}
