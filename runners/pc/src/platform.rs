use std::fmt;
use std::io::{self, BufRead as _, Write as _};

use log::info;

use puf_keystore::console::{Console, Line};
use puf_keystore::sim::SimPlatform;
use puf_keystore::traits::puf;

pub mod store;

pub use store::FileFlash;

pub type Platform = SimPlatform<FileFlash>;

#[derive(Debug)]
pub enum InitError {
    State(io::Error),
    Provision(puf::Error),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::State(error) => write!(f, "state file: {}", error),
            InitError::Provision(error) => write!(f, "factory provisioning failed: {:?}", error),
        }
    }
}

pub fn init_platform(
    state_path: impl AsRef<std::path::Path>,
    device_seed: u64,
    provision_factory: bool,
) -> Result<Platform, InitError> {
    let flash = FileFlash::new(state_path).map_err(InitError::State)?;
    let mut platform = SimPlatform::with_flash(&device_seed.to_le_bytes(), flash);

    if provision_factory {
        platform.provision_factory().map_err(InitError::Provision)?;
        info!("Factory key store provisioned for device {:#x}", device_seed);
    }
    Ok(platform)
}

/// Menu console on stdin/stdout.
pub struct StdConsole {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl StdConsole {
    pub fn new() -> Self {
        StdConsole { stdin: io::stdin(), stdout: io::stdout() }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for StdConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.stdout.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

impl Console for StdConsole {
    fn read_line(&mut self) -> Option<Line> {
        self.stdout.flush().ok()?;

        let mut buffer = String::new();
        match self.stdin.lock().read_line(&mut buffer) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let mut line = Line::new();
                // overlong input is cut to the console line size
                for c in buffer.trim_end_matches(&['\r', '\n'][..]).chars() {
                    if line.push(c).is_err() {
                        break;
                    }
                }
                Some(line)
            }
        }
    }
}
