use clap::Parser;
use clap_num::maybe_hex;

use puf_keystore::{App, Session};
use puf_pc::platform::{init_platform, StdConsole};

/// PUF and AES application note, running on a simulated LPC55S69.
/// Enroll and start the PUF, generate key codes, reconstruct keys.
#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
    /// Simulated internal flash image
    #[clap(long, default_value = "puf-state.bin")]
    state_file: String,

    /// Simulated silicon fingerprint; other seeds reject this device's activation codes
    #[clap(long, parse(try_from_str=maybe_hex), default_value_t = 0x1ce5_7a11)]
    device_seed: u64,

    /// Enroll once and fill the factory key store before showing the menu
    #[clap(long)]
    provision_factory: bool,
}

fn main() {
    #[cfg(feature = "enable-logs")]
    pretty_env_logger::init();
    let args = Args::parse();

    log::info!("Initializing simulated device");
    let platform = match init_platform(&args.state_file, args.device_seed, args.provision_factory) {
        Ok(platform) => platform,
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    };

    let mut session = Session::new(platform);
    match session.store_mut().format() {
        Ok(true) => log::info!("Formatted PUF record in {}", args.state_file),
        Ok(false) => {}
        Err(error) => {
            eprintln!("cannot format PUF record: {}", error);
            std::process::exit(1);
        }
    }

    let mut app = App::new(session, StdConsole::new());
    log::info!("Ready for work");
    if app.banner().and_then(|_| app.run()).is_err() {
        eprintln!("console closed unexpectedly");
        std::process::exit(1);
    }
}
