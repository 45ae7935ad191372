use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_STEP: Duration = Duration::from_millis(5);

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("не удалось запустить {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} не завершился за {timeout_ms} мс")]
    Timeout { program: String, timeout_ms: u128 },
    #[error("{program} завершился с кодом {code:?}")]
    Failed { program: String, code: Option<i32> },
    #[error("не удалось прочитать вывод {program}: {source}")]
    Output {
        program: String,
        source: std::io::Error,
    },
}

pub fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<String, CommandError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Drain stdout on a separate thread so a chatty child never blocks on a full pipe.
    let reader = child.stdout.take().map(|mut stdout| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        })
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandError::Timeout {
                        program: program.to_string(),
                        timeout_ms: timeout.as_millis(),
                    });
                }
                std::thread::sleep(POLL_STEP);
            }
            Err(source) => {
                return Err(CommandError::Output {
                    program: program.to_string(),
                    source,
                })
            }
        }
    };

    if !status.success() {
        return Err(CommandError::Failed {
            program: program.to_string(),
            code: status.code(),
        });
    }

    let bytes = match reader {
        Some(handle) => match handle.join() {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(source)) => {
                return Err(CommandError::Output {
                    program: program.to_string(),
                    source,
                })
            }
            Err(_) => Vec::new(),
        },
        None => Vec::new(),
    };

    Ok(String::from_utf8_lossy(&bytes).to_string())
}
