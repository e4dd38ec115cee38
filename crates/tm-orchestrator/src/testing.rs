//! Stand-in `cloudflared` executables for tests

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A shell script that behaves like `cloudflared` and records its invocations
pub struct FakeCloudflared {
    _dir: TempDir,
    script: PathBuf,
    log: PathBuf,
}

impl FakeCloudflared {
    /// Announces `url` on stderr, then keeps running
    pub fn serving(url: &str) -> Self {
        Self::with_body(&format!(
            "echo \"INF Requesting new quick Tunnel on trycloudflare.com...\"\n\
             echo \"INF |  {}  |\" 1>&2\n\
             exec sleep 600\n",
            url
        ))
    }

    /// Announces `https://tunnel-<n>.trycloudflare.com`, `n` counting invocations from 1
    pub fn numbered() -> Self {
        Self::with_body(
            "n=$(wc -l < \"$LOG\" | tr -d ' ')\n\
             echo \"INF |  https://tunnel-$n.trycloudflare.com  |\"\n\
             exec sleep 600\n",
        )
    }

    /// Prints a line that is not valid UTF-8 before announcing `url` on the same stream
    pub fn serving_after_invalid_utf8(url: &str) -> Self {
        Self::with_body(&format!(
            "printf 'INF caf\\351 banner\\n' 1>&2\n\
             echo \"INF |  {}  |\" 1>&2\n\
             exec sleep 600\n",
            url
        ))
    }

    /// Like [`FakeCloudflared::numbered`], but ignores SIGTERM so only SIGKILL stops it
    pub fn ignoring_term() -> Self {
        Self::with_body(
            "trap '' TERM\n\
             n=$(wc -l < \"$LOG\" | tr -d ' ')\n\
             echo \"INF |  https://tunnel-$n.trycloudflare.com  |\"\n\
             exec sleep 600\n",
        )
    }

    /// Prints `message` and exits without announcing a URL
    pub fn exiting(message: &str) -> Self {
        Self::with_body(&format!("echo \"{}\"\nexit 1\n", message))
    }

    /// Never prints anything and never exits
    pub fn silent() -> Self {
        Self::with_body("exec sleep 600\n")
    }

    fn with_body(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("cloudflared");
        let log = dir.path().join("invocations.log");

        let mut file = std::fs::File::create(&script).unwrap();
        write!(
            file,
            "#!/bin/sh\nLOG=\"{}\"\necho \"$*\" >> \"$LOG\"\n{}",
            log.display(),
            body
        )
        .unwrap();
        file.sync_all().unwrap();
        drop(file);
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            _dir: dir,
            script,
            log,
        }
    }

    /// Path to the executable
    pub fn path(&self) -> &Path {
        &self.script
    }

    /// Argument lines of every invocation so far
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
