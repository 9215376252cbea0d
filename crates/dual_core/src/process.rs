//! Best-effort attribution of a listening port to a process.
//!
//! Shells out to `lsof`/`ps` on Unix and `netstat`/`tasklist` on Windows. The
//! output parsers are plain functions over captured text so they can be tested
//! without the tools installed. A failed lookup means "unknown", never "free".

use crate::error::{DualError, Result};
use std::process::Command;
use tracing::debug;

/// Process holding a port, as far as the OS tools can tell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessInfo {
    /// Process ID.
    pub pid: u32,
    /// Short executable name.
    pub name: String,
    /// Full command line, when available.
    pub command: String,
    /// Owning user, when available.
    pub user: String,
}

/// Finds the process listening on a TCP port.
pub trait PortInspector {
    /// Returns the listener of `port`.
    ///
    /// # Errors
    ///
    /// Returns `ProcessLookup` when the tool is missing, fails, or reports no
    /// listener.
    fn process_using_port(&self, port: u16) -> Result<ProcessInfo>;
}

/// Unix strategy: `lsof` for the PID, `ps` for user and command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LsofInspector;

impl PortInspector for LsofInspector {
    fn process_using_port(&self, port: u16) -> Result<ProcessInfo> {
        let output = run_tool(
            "lsof",
            &["-nP", &format!("-iTCP:{}", port), "-sTCP:LISTEN"],
        )?;
        let mut info = parse_lsof_output(&output)?;

        // `ps` only adds detail; lsof already gave us enough to answer.
        match run_tool("ps", &["-p", &info.pid.to_string(), "-o", "user=,command="]) {
            Ok(ps) => {
                if let Some((user, command)) = parse_ps_output(&ps) {
                    info.user = user;
                    info.command = command;
                }
            }
            Err(e) => debug!(pid = info.pid, error = %e, "ps lookup failed"),
        }

        Ok(info)
    }
}

/// Windows strategy: `netstat -ano` for the PID, `tasklist` for the name.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetstatInspector;

impl PortInspector for NetstatInspector {
    fn process_using_port(&self, port: u16) -> Result<ProcessInfo> {
        let output = run_tool("netstat", &["-ano", "-p", "TCP"])?;
        let pid = parse_netstat_output(&output, port)?;

        let mut info = ProcessInfo {
            pid,
            ..ProcessInfo::default()
        };

        let filter = format!("PID eq {}", pid);
        match run_tool("tasklist", &["/FI", &filter, "/FO", "CSV", "/NH"]) {
            Ok(list) => {
                if let Some(name) = parse_tasklist_output(&list) {
                    info.command = name.clone();
                    info.name = name;
                }
            }
            Err(e) => debug!(pid, error = %e, "tasklist lookup failed"),
        }

        Ok(info)
    }
}

/// Inspector for the current platform.
pub fn default_inspector() -> Box<dyn PortInspector> {
    if cfg!(windows) {
        Box::new(NetstatInspector)
    } else {
        Box::new(LsofInspector)
    }
}

/// Looks up the listener of `port` with the platform inspector.
pub fn get_process_using_port(port: u16) -> Result<ProcessInfo> {
    default_inspector().process_using_port(port)
}

fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    debug!(program, ?args, "running port inspection tool");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| DualError::ProcessLookup(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(DualError::ProcessLookup(format!(
            "{} exited with {}",
            program, output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `lsof` listing output.
///
/// Columns: `COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME`. The first
/// data row wins.
pub fn parse_lsof_output(output: &str) -> Result<ProcessInfo> {
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[0] == "COMMAND" {
            continue;
        }
        let Ok(pid) = fields[1].parse::<u32>() else {
            continue;
        };

        return Ok(ProcessInfo {
            pid,
            name: fields[0].to_string(),
            command: fields[0].to_string(),
            user: fields[2].to_string(),
        });
    }

    Err(DualError::ProcessLookup(
        "no listening process in lsof output".to_string(),
    ))
}

/// Parses `ps -o user=,command=` output into `(user, command)`.
pub fn parse_ps_output(output: &str) -> Option<(String, String)> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (user, command) = line.split_once(char::is_whitespace)?;
    Some((user.to_string(), command.trim().to_string()))
}

/// Parses `netstat -ano` output for the PID listening on `port`.
///
/// Columns: `Proto LocalAddress ForeignAddress State PID`.
pub fn parse_netstat_output(output: &str, port: u16) -> Result<u32> {
    let suffix = format!(":{}", port);

    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 || !fields[0].eq_ignore_ascii_case("TCP") {
            continue;
        }
        if !fields[1].ends_with(&suffix) || !fields[3].eq_ignore_ascii_case("LISTENING") {
            continue;
        }
        if let Ok(pid) = fields[4].parse::<u32>() {
            return Ok(pid);
        }
    }

    Err(DualError::ProcessLookup(format!(
        "no listener on port {} in netstat output",
        port
    )))
}

/// Parses the image name from `tasklist /FO CSV /NH` output.
pub fn parse_tasklist_output(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| l.starts_with('"'))?;
    let name = line.trim_start_matches('"').split('"').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
