//! In-sandbox CPU time accounting via `/usr/bin/time`
//!
//! The run command is wrapped so that `/usr/bin/time` appends one
//! `TIME:<user> <sys> <maxrss>` line to stderr. The parser splits that line
//! back out of the program's own stderr.

/// Prefix of the accounting line
pub const TIME_MARKER: &str = "TIME:";

/// Status lines `/usr/bin/time` itself prints on abnormal exits
const TIME_NOISE: [&str; 2] = ["Command exited with non-zero status", "Command terminated by signal"];

/// Usage reported by the wrapper
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeUsage {
    pub user_secs: f64,
    pub sys_secs: f64,
    pub max_rss_kb: u64,
}

impl TimeUsage {
    /// CPU plus kernel time in milliseconds
    pub fn cpu_ms(&self) -> u32 {
        ((self.user_secs + self.sys_secs) * 1000.0).round() as u32
    }
}

/// argv running `run_command` under the time wrapper with stdin from `input_file`
pub fn wrap_command(run_command: &str, input_file: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!(
            "/usr/bin/time -f '{}%U %S %M' {} < {}",
            TIME_MARKER, run_command, input_file
        ),
    ]
}

/// Split captured stderr into the wrapper's usage line and the program's stderr.
///
/// Without a usage line the stderr is returned untouched.
pub fn split_stderr(stderr: &str) -> (Option<TimeUsage>, String) {
    let mut usage = None;
    let mut rest = Vec::new();

    for line in stderr.lines() {
        if let Some(values) = line.strip_prefix(TIME_MARKER) {
            usage = parse_usage(values).or(usage);
        } else {
            rest.push(line);
        }
    }

    match usage {
        Some(usage) => {
            let program: Vec<&str> = rest
                .into_iter()
                .filter(|line| !TIME_NOISE.iter().any(|noise| line.starts_with(noise)))
                .collect();
            (Some(usage), program.join("\n"))
        }
        None => (None, stderr.to_string()),
    }
}

fn parse_usage(values: &str) -> Option<TimeUsage> {
    let mut parts = values.split_whitespace();
    let user_secs = parts.next()?.parse().ok()?;
    let sys_secs = parts.next()?.parse().ok()?;
    let max_rss_kb = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
    Some(TimeUsage {
        user_secs,
        sys_secs,
        max_rss_kb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_command() {
        let argv = wrap_command("python3 main.py", "3.in");
        assert_eq!(argv[0], "sh");
        assert_eq!(argv[2], "/usr/bin/time -f 'TIME:%U %S %M' python3 main.py < 3.in");
    }

    #[test]
    fn test_split_usage_from_program_stderr() {
        let stderr = "warning: something\nTIME:0.52 0.03 10240\n";
        let (usage, rest) = split_stderr(stderr);
        let usage = usage.unwrap();
        assert_eq!(usage.cpu_ms(), 550);
        assert_eq!(usage.max_rss_kb, 10240);
        assert_eq!(rest, "warning: something");
    }

    #[test]
    fn test_noise_lines_dropped() {
        let stderr = "Traceback (most recent call last):\nZeroDivisionError\nCommand exited with non-zero status 1\nTIME:0.01 0.00 8000";
        let (usage, rest) = split_stderr(stderr);
        assert!(usage.is_some());
        assert_eq!(rest, "Traceback (most recent call last):\nZeroDivisionError");
    }

    #[test]
    fn test_missing_usage_keeps_stderr() {
        let (usage, rest) = split_stderr("sh: 1: ./main: not found\n");
        assert!(usage.is_none());
        assert_eq!(rest, "sh: 1: ./main: not found\n");
    }

    #[test]
    fn test_usage_without_rss() {
        let (usage, _) = split_stderr("TIME:1.00 0.25");
        assert_eq!(
            usage,
            Some(TimeUsage {
                user_secs: 1.0,
                sys_secs: 0.25,
                max_rss_kb: 0
            })
        );
    }
}
