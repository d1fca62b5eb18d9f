//! Per-cycle cache of `df` and `diskutil list` output.
//!
//! Every device reconciled in a cycle reads the same two tables, so each is
//! fetched at most once per cycle: on first access after [`Snapshot::invalidate`].

use log::{debug, warn};

use crate::df::DF_COMMAND;
use crate::diskutil::DISKUTIL_LIST_COMMAND;
use crate::executor::CommandRunner;

#[derive(Debug)]
struct CachedOutput {
    command: &'static str,
    text: String,
    fresh: bool,
}

impl CachedOutput {
    fn new(command: &'static str) -> Self {
        Self {
            command,
            text: String::new(),
            fresh: false,
        }
    }

    /// Returns the memoized text, running the command first if stale.
    ///
    /// A failed run keeps the previous text and is not retried until the
    /// next invalidation.
    fn get(&mut self, runner: &dyn CommandRunner) -> &str {
        if !self.fresh {
            self.fresh = true;
            match runner.run_checked(self.command) {
                Ok(output) => {
                    debug!("refreshed output of '{}'", self.command);
                    self.text = output.stdout;
                }
                Err(e) => warn!("keeping previous output: {}", e),
            }
        }
        &self.text
    }
}

/// Raw utility output shared by all devices during one cycle.
#[derive(Debug)]
pub struct Snapshot {
    df: CachedOutput,
    diskutil: CachedOutput,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            df: CachedOutput::new(DF_COMMAND),
            diskutil: CachedOutput::new(DISKUTIL_LIST_COMMAND),
        }
    }

    /// Marks both outputs stale so the next read runs the commands again.
    pub fn invalidate(&mut self) {
        self.df.fresh = false;
        self.diskutil.fresh = false;
    }

    /// Output of `df -mn`.
    pub fn df_text(&mut self, runner: &dyn CommandRunner) -> &str {
        self.df.get(runner)
    }

    /// Output of `diskutil list`.
    pub fn diskutil_text(&mut self, runner: &dyn CommandRunner) -> &str {
        self.diskutil.get(runner)
    }
}
