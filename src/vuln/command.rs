// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OS command injection exercises around a network ping utility.
//!
//! No process is ever spawned. Each tier assembles the shell command it
//! *would* run, and the report shows the assembled string, the
//! metacharacters that survived filtering, and a simulated transcript,
//! so the injection is demonstrable without touching the host.
//!
//! Tier ladder:
//! - basic: the host is interpolated into the command line verbatim.
//! - medium: `;`, `&` and `|` are stripped, leaving `$()`, backticks
//!   and newlines intact.
//! - hard: the command is chained with `&& echo 'Command completed'`,
//!   which an injected payload inherits.
//! - expert: output is redirected through a file under /tmp, adding a
//!   write primitive to the injection.

use serde::Serialize;
use utoipa::ToSchema;

use super::VulnLevel;

/// Shell constructs the filter tiers care about.
const METACHARACTERS: [&str; 8] = [";", "&", "|", "$(", "`", "\n", ">", "<"];

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PingReport {
    pub level: VulnLevel,
    /// The shell command that would have been executed.
    pub command: String,
    /// The host string after the tier's filtering.
    pub filtered_host: String,
    /// Metacharacters still present in the filtered host.
    pub surviving_metacharacters: Vec<String>,
    pub injection_detected: bool,
    /// Simulated transcript; nothing was executed.
    pub simulated_output: String,
}

/// Assemble the ping command the tier would run against `host`.
pub fn ping(level: VulnLevel, host: &str) -> PingReport {
    let filtered_host = filter_host(level, host);
    let command = match level {
        VulnLevel::Basic | VulnLevel::Medium => format!("ping -c 1 {filtered_host}"),
        VulnLevel::Hard => format!("ping -c 1 {filtered_host} && echo 'Command completed'"),
        VulnLevel::Expert => {
            format!("ping -c 1 {filtered_host} > /tmp/ping_output.txt 2>&1; cat /tmp/ping_output.txt")
        }
    };

    let surviving: Vec<String> = METACHARACTERS
        .iter()
        .filter(|m| filtered_host.contains(*m))
        .map(|m| m.to_string())
        .collect();
    let injected = !surviving.is_empty();

    PingReport {
        level,
        simulated_output: simulate(&filtered_host, injected),
        command,
        surviving_metacharacters: surviving,
        injection_detected: injected,
        filtered_host,
    }
}

/// Apply the tier's input filter. Only medium and above filter at all,
/// and they only strip the three classic separators.
fn filter_host(level: VulnLevel, host: &str) -> String {
    if level >= VulnLevel::Medium {
        host.replace([';', '&', '|'], "")
    } else {
        host.to_string()
    }
}

/// Fabricate a transcript resembling what the shell would print.
fn simulate(host: &str, injected: bool) -> String {
    let target = host
        .split(|c: char| c.is_whitespace() || METACHARACTERS.iter().any(|m| m.starts_with(c)))
        .next()
        .unwrap_or(host);
    let mut output = format!(
        "PING {target} (203.0.113.10): 56 data bytes\n\
         64 bytes from 203.0.113.10: icmp_seq=0 ttl=64 time=0.42 ms\n\
         --- {target} ping statistics ---\n\
         1 packets transmitted, 1 packets received, 0.0% packet loss\n"
    );
    if injected {
        output.push_str("[injected command would execute here]\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_interpolates_verbatim() {
        let report = ping(VulnLevel::Basic, "localhost; cat /etc/passwd");
        assert_eq!(report.command, "ping -c 1 localhost; cat /etc/passwd");
        assert!(report.injection_detected);
        assert!(report.surviving_metacharacters.contains(&";".to_string()));
        assert!(report.simulated_output.contains("would execute"));
    }

    #[test]
    fn medium_strips_separators_only() {
        let report = ping(VulnLevel::Medium, "localhost; rm -rf /");
        assert_eq!(report.filtered_host, "localhost rm -rf /");
        assert!(!report.surviving_metacharacters.contains(&";".to_string()));

        // Substitution slips through the separator blacklist.
        let report = ping(VulnLevel::Medium, "localhost $(whoami)");
        assert!(report.injection_detected);
        assert!(report.surviving_metacharacters.contains(&"$(".to_string()));
    }

    #[test]
    fn hard_chains_an_echo_the_payload_inherits() {
        let report = ping(VulnLevel::Hard, "localhost");
        assert!(report.command.ends_with("&& echo 'Command completed'"));
        assert!(!report.injection_detected);
    }

    #[test]
    fn expert_redirects_through_tmp() {
        let report = ping(VulnLevel::Expert, "localhost");
        assert!(report.command.contains("> /tmp/ping_output.txt"));
        assert!(report.command.contains("cat /tmp/ping_output.txt"));
    }

    #[test]
    fn clean_host_reports_no_injection() {
        let report = ping(VulnLevel::Basic, "wallet.example.net");
        assert!(!report.injection_detected);
        assert!(report.surviving_metacharacters.is_empty());
        assert!(report.simulated_output.contains("wallet.example.net"));
    }
}
