//! Cisco IOS platform definition.
//!
//! Sessions land in user EXEC mode (`Router>`); `enable` plus the enable
//! secret moves to privileged EXEC (`Router#`). Configuration modes
//! (`Router(config)#`) also count as prompts.

use regex::Regex;

use crate::channel::PromptSignature;
use crate::platform::{CommandSpec, Elevation, PlatformDefinition, TimeoutPolicy};

/// Any IOS prompt: user EXEC, privileged EXEC or a configuration mode.
pub const PROMPT_PATTERN: &str = r"(?m)^[\w.\-@/:()]{1,63}[>#]";

/// Privileged prompts only.
pub const PRIVILEGED_PATTERN: &str = r"(?m)^[\w.\-@/:()]{1,63}#";

/// The enable secret request.
pub const SECRET_PROMPT_PATTERN: &str = r"(?mi)^\s*password:";

/// The `--More--` pager prompt with the backspace/space redraw that erases it.
pub const PAGER_PATTERN: &str = r" ?--More-- ?(?:\x08+ +\x08+|\x08+)?";

/// Create the Cisco IOS platform definition.
pub fn platform() -> PlatformDefinition {
    let prompt = PromptSignature::new(&[PROMPT_PATTERN]).expect("static IOS prompt pattern");
    let enable = Elevation::new("enable", SECRET_PROMPT_PATTERN, &[PRIVILEGED_PATTERN])
        .expect("static IOS elevation patterns");

    PlatformDefinition::new("cisco_ios", prompt)
        .with_elevation(enable)
        .with_pagination_command("terminal length 0")
        .with_pager_pattern(Regex::new(PAGER_PATTERN).expect("static IOS pager pattern"))
        .with_close_command("exit")
        .with_failure_pattern("% Invalid input detected")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Unknown command")
        .with_command(
            "software_version",
            CommandSpec::new("show version")
                .with_timeouts(TimeoutPolicy::from_secs_millis(20, 2_000))
                .with_min_output_len(200),
        )
        .with_command(
            "hardware_inventory",
            CommandSpec::new("show inventory")
                .with_timeouts(TimeoutPolicy::from_secs_millis(30, 2_000))
                .with_min_output_len(50),
        )
        .with_command(
            "ntp_status",
            CommandSpec::new("show ntp status")
                .with_timeouts(TimeoutPolicy::from_secs_millis(15, 1_000)),
        )
        .with_command(
            "ntp_associations",
            CommandSpec::new("show ntp associations")
                .with_timeouts(TimeoutPolicy::from_secs_millis(15, 1_000)),
        )
        .with_command(
            "running_config",
            CommandSpec::new("show running-config")
                .with_timeouts(TimeoutPolicy::from_secs_millis(90, 3_000))
                .with_min_output_len(200),
        )
}
