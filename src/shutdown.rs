//! Save-on-termination hook. The store itself never persists
//! automatically; this is the collaborator that flushes both files when
//! the process is told to die.

use std::process;
use std::thread;

use once_cell::sync::OnceCell;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{info, warn};

use crate::codec;
use crate::core::{Segment, StoreConfig};
use crate::errors::StoreError;

static HOOK: OnceCell<()> = OnceCell::new();

/// Installs the signal watcher once per process; later calls are no-ops.
pub fn install(cfg: StoreConfig) -> Result<(), StoreError> {
    HOOK.get_or_try_init(|| {
        let mut signals = Signals::new(&[SIGHUP, SIGINT, SIGQUIT, SIGTERM]).map_err(StoreError::Io)?;
        thread::spawn(move || {
            if signals.forever().next().is_some() {
                flush_and_exit(&cfg);
            }
        });
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

fn flush_and_exit(cfg: &StoreConfig) -> ! {
    info!("termination signal received, flushing store to disk");
    // open-only: a region that is already gone must not be replaced by a
    // fresh empty one just to overwrite the files at exit
    match Segment::open(cfg) {
        Ok(segment) => {
            let data = segment.data();
            if let Err(e) = codec::save_accounts(data, cfg) {
                warn!(error = %e, "account flush failed");
            }
            if let Err(e) = codec::save_messages(data, cfg) {
                warn!(error = %e, "message flush failed");
            }
        }
        Err(e) => warn!(error = %e, "segment not reachable at shutdown"),
    }
    process::exit(0);
}
