//! F5 BIG-IP platform definition.
//!
//! Covers both the advanced shell (`[admin@bigip1:Active:Standalone] ~ #`)
//! and tmsh (`admin@(bigip1)(cfg-sync Standalone)(Active)(/Common)(tmos)#`).
//! There is no elevation dialog. The catalog is tmsh; accounts that land in
//! bash are moved into tmsh with `tmsh`, or get every command prefixed with
//! `tmsh ` if that fails.

use regex::Regex;

use crate::channel::PromptSignature;
use crate::platform::{CommandSpec, PlatformDefinition, ShellSwitch, TimeoutPolicy};

/// tmsh prompts.
pub const TMSH_PROMPT_PATTERN: &str = r"\(tmos\)[#>]";

/// The tmsh pager status line and the carriage-return redraw that clears it.
pub const PAGER_PATTERN: &str = r"---\(less \d+%\)---(?:\r *\r)?";

/// Prompt sentinels, tried in order.
pub const PROMPT_PATTERNS: &[&str] = &[
    TMSH_PROMPT_PATTERN,
    // bash, optionally followed by the working directory
    r"(?m)^\[[^\]\r\n]+\][^\r\n]*[#$]",
    // bare bracketed forms
    r"\][#$]",
];

/// Create the F5 BIG-IP platform definition.
pub fn platform() -> PlatformDefinition {
    let prompt = PromptSignature::new(PROMPT_PATTERNS).expect("static BIG-IP prompt patterns");
    let tmsh = PromptSignature::new(&[TMSH_PROMPT_PATTERN]).expect("static tmsh prompt pattern");
    let shell = ShellSwitch::new(tmsh)
        .with_enter_command("tmsh")
        .with_command_prefix("tmsh ");

    PlatformDefinition::new("f5_bigip", prompt)
        .with_shell(shell)
        .with_pagination_command("modify cli preference pager disabled display-threshold 0")
        .with_pager_pattern(Regex::new(PAGER_PATTERN).expect("static tmsh pager pattern"))
        .with_close_command("exit")
        .with_failure_pattern("Syntax Error:")
        .with_failure_pattern("command not found")
        .with_failure_pattern("was not found")
        .with_command(
            "hardware_inventory",
            CommandSpec::new("show sys hardware")
                .with_timeouts(TimeoutPolicy::from_secs_millis(60, 3_000))
                .with_min_output_len(200),
        )
        .with_command(
            "software_version",
            CommandSpec::new("show sys version")
                .with_timeouts(TimeoutPolicy::from_secs_millis(20, 2_000)),
        )
        .with_command(
            "sshd_config",
            CommandSpec::new("list /sys sshd all-properties")
                .with_timeouts(TimeoutPolicy::from_secs_millis(20, 2_000)),
        )
        .with_command(
            "ntp_status",
            CommandSpec::new("run util ntpq -pn")
                .with_timeouts(TimeoutPolicy::from_secs_millis(15, 1_000)),
        )
}
