use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Plant, Reminder};
use crate::schedule::next_watering_due;
use crate::store::{KeyValueStore, StoreError};

const REMINDERS_KEY: &str = "reminders";

pub trait ReminderScheduler: Send + Sync {
    /// Schedules a reminder and returns its id. A time in the past fires
    /// right away.
    fn schedule(&self, title: &str, when: DateTime<Utc>, body: Option<&str>) -> Result<String, StoreError>;
    /// Unknown ids are ignored.
    fn cancel(&self, id: &str) -> Result<(), StoreError>;
}

/// Reminders kept in the local store, shown by `reminders --due`.
pub struct LocalReminders {
    store: Arc<dyn KeyValueStore>,
}

impl LocalReminders {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Reminder>, StoreError> {
        let mut reminders: Vec<Reminder> = match self.store.get(REMINDERS_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => vec![],
        };
        reminders.sort_by_key(|r| r.fire_at);
        Ok(reminders)
    }

    /// Removes and returns every reminder whose time has come.
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, StoreError> {
        let (due, pending): (Vec<_>, Vec<_>) = self.list()?.into_iter().partition(|r| r.fire_at <= now);
        if !due.is_empty() {
            self.save(&pending)?;
        }
        Ok(due)
    }

    fn save(&self, reminders: &[Reminder]) -> Result<(), StoreError> {
        if reminders.is_empty() {
            return self.store.remove(REMINDERS_KEY);
        }
        self.store.set(REMINDERS_KEY, &serde_json::to_string(reminders)?)
    }
}

impl ReminderScheduler for LocalReminders {
    fn schedule(&self, title: &str, when: DateTime<Utc>, body: Option<&str>) -> Result<String, StoreError> {
        let reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            title: format!("🌿 {}", title),
            body: match body.map(str::trim) {
                Some(body) if !body.is_empty() => body.to_string(),
                _ => format!("Time to water {}", title),
            },
            fire_at: clamp_to_now(when),
        };
        debug!(id = %reminder.id, fire_at = %reminder.fire_at, "reminder scheduled");

        let mut reminders = self.list()?;
        let id = reminder.id.clone();
        reminders.push(reminder);
        self.save(&reminders)?;
        Ok(id)
    }

    fn cancel(&self, id: &str) -> Result<(), StoreError> {
        let mut reminders = self.list()?;
        let before = reminders.len();
        reminders.retain(|r| r.id != id);
        if reminders.len() != before {
            self.save(&reminders)?;
        }
        Ok(())
    }
}

fn clamp_to_now(when: DateTime<Utc>) -> DateTime<Utc> {
    when.max(Utc::now())
}

/// Replaces the plant's reminder with one for its next watering. Returns
/// the new reminder id, or `None` when there is nothing to schedule.
pub fn reschedule_for(scheduler: &dyn ReminderScheduler, plant: &Plant) -> Result<Option<String>, StoreError> {
    if let Some(old) = &plant.reminder_id {
        scheduler.cancel(old)?;
    }
    match next_watering_due(plant.watering_interval_days, plant.last_watered_at) {
        Some(next) => scheduler.schedule(&plant.name, next, None).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn scheduler() -> LocalReminders {
        LocalReminders::new(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn schedule_formats_title_and_default_body() {
        let reminders = scheduler();
        let when = Utc::now() + Duration::days(3);
        let id = reminders.schedule("Pothos", when, None).unwrap();

        let all = reminders.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].title, "🌿 Pothos");
        assert_eq!(all[0].body, "Time to water Pothos");
        assert_eq!(all[0].fire_at, when);
    }

    #[test]
    fn blank_body_falls_back_to_default() {
        let reminders = scheduler();
        let when = Utc::now() + Duration::days(1);
        reminders.schedule("Fern", when, Some("")).unwrap();
        reminders.schedule("Ivy", when, Some("   ")).unwrap();

        let bodies: Vec<_> = reminders.list().unwrap().into_iter().map(|r| r.body).collect();
        assert_eq!(bodies, vec!["Time to water Fern", "Time to water Ivy"]);
    }

    #[test]
    fn emptied_list_drops_the_stored_key() {
        let store = Arc::new(MemoryStore::default());
        let reminders = LocalReminders::new(store.clone());
        let id = reminders.schedule("Aloe", Utc::now() + Duration::days(1), None).unwrap();
        assert!(store.get(REMINDERS_KEY).unwrap().is_some());

        reminders.cancel(&id).unwrap();
        assert_eq!(store.get(REMINDERS_KEY).unwrap(), None);
    }

    #[test]
    fn past_reminders_fire_immediately() {
        let reminders = scheduler();
        let before = Utc::now();
        reminders.schedule("Fern", before - Duration::days(2), Some("Mist it")).unwrap();

        let all = reminders.list().unwrap();
        assert!(all[0].fire_at >= before);
        assert_eq!(all[0].body, "Mist it");

        let due = reminders.take_due(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert!(reminders.list().unwrap().is_empty());
    }

    #[test]
    fn take_due_leaves_future_reminders() {
        let reminders = scheduler();
        reminders.schedule("Cactus", Utc::now() + Duration::days(10), None).unwrap();
        assert!(reminders.take_due(Utc::now()).unwrap().is_empty());
        assert_eq!(reminders.list().unwrap().len(), 1);
    }

    #[test]
    fn cancel_ignores_unknown_ids() {
        let reminders = scheduler();
        let id = reminders.schedule("Aloe", Utc::now() + Duration::days(1), None).unwrap();
        reminders.cancel("nope").unwrap();
        assert_eq!(reminders.list().unwrap().len(), 1);
        reminders.cancel(&id).unwrap();
        assert!(reminders.list().unwrap().is_empty());
    }

    #[test]
    fn reschedule_replaces_old_reminder() {
        let reminders = scheduler();
        let old = reminders.schedule("Monstera", Utc::now() + Duration::days(1), None).unwrap();

        let mut plant = Plant::manual("Monstera".into(), None, Some(7));
        plant.reminder_id = Some(old.clone());
        plant.last_watered_at = Some(Utc::now());

        let new_id = reschedule_for(&reminders, &plant).unwrap().unwrap();
        let all = reminders.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, new_id);
        assert_ne!(new_id, old);
        assert_eq!(all[0].fire_at, plant.last_watered_at.unwrap() + Duration::days(7));
    }

    #[test]
    fn reschedule_without_interval_only_cancels() {
        let reminders = scheduler();
        let old = reminders.schedule("Ivy", Utc::now() + Duration::days(1), None).unwrap();
        let mut plant = Plant::manual("Ivy".into(), None, None);
        plant.reminder_id = Some(old);

        assert_eq!(reschedule_for(&reminders, &plant).unwrap(), None);
        assert!(reminders.list().unwrap().is_empty());
    }
}
