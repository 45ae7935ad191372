use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum KeepAwakeError {
    #[error("не удалось запустить {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

pub struct KeepAwake {
    command: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl KeepAwake {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            child: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        reap_exited(&mut self.slot())
    }

    pub fn enable(&self) -> Result<(), KeepAwakeError> {
        self.enable_locked(&mut self.slot())
    }

    pub fn disable(&self) -> Result<(), KeepAwakeError> {
        disable_locked(&mut self.slot());
        Ok(())
    }

    pub fn toggle(&self) -> Result<bool, KeepAwakeError> {
        let mut slot = self.slot();
        if reap_exited(&mut slot) {
            disable_locked(&mut slot);
            Ok(false)
        } else {
            self.enable_locked(&mut slot)?;
            Ok(true)
        }
    }

    pub fn cleanup(&self) {
        let mut slot = self.slot();
        if slot.is_some() {
            disable_locked(&mut slot);
        }
    }

    // Check, spawn and store happen under the caller's guard.
    fn enable_locked(&self, slot: &mut Option<Child>) -> Result<(), KeepAwakeError> {
        if reap_exited(slot) {
            warn!("режим бодрствования уже включён");
            return Ok(());
        }
        let (program, args) = match self.command.split_first() {
            Some((program, args)) => (program.as_str(), args),
            None => ("", &[][..]),
        };
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| KeepAwakeError::Spawn {
                program: program.to_string(),
                source,
            })?;
        info!(pid = child.id(), program, "режим бодрствования включён");
        *slot = Some(child);
        Ok(())
    }
}

// The helper may have died on its own.
fn reap_exited(slot: &mut Option<Child>) -> bool {
    if let Some(child) = slot.as_mut() {
        if let Ok(Some(status)) = child.try_wait() {
            warn!(%status, "процесс удержания бодрствования завершился сам");
            *slot = None;
        }
    }
    slot.is_some()
}

// Succeeds once the helper is gone, even if the kill reported an error.
fn disable_locked(slot: &mut Option<Child>) {
    let Some(mut child) = slot.take() else {
        warn!("режим бодрствования уже выключен");
        return;
    };
    let pid = child.id();
    if let Err(err) = child.kill() {
        warn!(pid, error = %err, "не удалось остановить процесс бодрствования");
    }
    if let Err(err) = child.wait() {
        warn!(pid, error = %err, "не удалось дождаться процесса бодрствования");
    }
    info!(pid, "режим бодрствования выключен");
}

impl Drop for KeepAwake {
    fn drop(&mut self) {
        self.cleanup();
    }
}
