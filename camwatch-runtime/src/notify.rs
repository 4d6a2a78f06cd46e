use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use camwatch_engine::traits::Notifier;

/// Log-only notifier: stands in wherever a real mail transport is not wired
/// (demos, smoke runs).
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        _body: &str,
        attachment: Option<&Path>,
    ) -> anyhow::Result<()> {
        match attachment {
            Some(path) => log::info!("notify {recipient}: {subject} [attach {}]", path.display()),
            None => log::info!("notify {recipient}: {subject}"),
        }
        Ok(())
    }
}

/// Recording notifier double for tests and wiring checks.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    /// When set, every send fails with this reason.
    pub fail_with: Mutex<Option<String>>,
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        _body: &str,
        _attachment: Option<&Path>,
    ) -> anyhow::Result<()> {
        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(anyhow::anyhow!(reason));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string()));
        Ok(())
    }
}
