//! File ownership and permission inspection inside running containers.

use crate::analyzer::stig::cluster::{PodExecutor, RunContext};
use crate::analyzer::stig::error::EvalError;

/// `stat` output format: octal mode, owner uid, owner gid, name.
const STAT_FORMAT: &str = "%a %u %g %n";

/// Mode and ownership of a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub path: String,
    /// Permission bits, e.g. `0o644`.
    pub permissions: u32,
    pub user_owner: String,
    pub group_owner: String,
}

impl FileStats {
    /// Whether any permission bit is set that `max` does not allow.
    pub fn exceeds(&self, max: u32) -> bool {
        self.permissions & !max != 0
    }

    pub fn permissions_str(&self) -> String {
        format!("{:o}", self.permissions)
    }
}

/// Quote `arg` as a single `/bin/sh` word.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Parse the output of `stat -Lc "%a %u %g %n"`, one file per line.
pub fn parse_file_stats(output: &str) -> Result<Vec<FileStats>, EvalError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.trim().splitn(4, ' ');
            let (Some(mode), Some(uid), Some(gid), Some(path)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(EvalError::Parse(format!("unexpected stat output: {}", line)));
            };
            let permissions = u32::from_str_radix(mode, 8)
                .map_err(|_| EvalError::Parse(format!("unexpected file mode: {}", mode)))?;
            Ok(FileStats {
                path: path.to_string(),
                permissions,
                user_owner: uid.to_string(),
                group_owner: gid.to_string(),
            })
        })
        .collect()
}

/// Stat `paths` inside a container.
pub async fn get_file_stats(
    ctx: &RunContext,
    executor: &dyn PodExecutor,
    namespace: &str,
    pod: &str,
    container: &str,
    paths: &[String],
) -> Result<Vec<FileStats>, EvalError> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    let quoted: Vec<String> = paths.iter().map(|path| shell_quote(path)).collect();
    let command = format!("stat -Lc \"{}\" -- {}", STAT_FORMAT, quoted.join(" "));
    let output = ctx
        .call(executor.execute(namespace, pod, container, &command))
        .await?;
    parse_file_stats(&output)
}
