//! Brocade / Ruckus ICX FastIron platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! Please Enter Login Name:                   # telnet login
//! Please Enter Password:
//! telnet@ICX6450-48P Switch#                 # privileged EXEC
//! telnet@ICX6450-48P Switch(config)#         # global configuration
//! SSH@ICX6610-24 Router#                     # privileged EXEC over SSH
//! ```

use std::time::Duration;

use super::definition::{
    Commands, Messages, PlatformDefinition, Prompts, Timings, compile,
};
use crate::error::PlatformError;

/// Platform name.
pub const NAME: &str = "fastiron";

/// Create the FastIron platform definition.
///
/// Uses `(?m)` so `^` anchors at line starts; prompts are anchored to keep
/// command echoes (`...(config)#end`) from passing as a fresh prompt.
pub fn platform() -> Result<PlatformDefinition, PlatformError> {
    let prompts = Prompts {
        login: compile(NAME, "login", r"ogin Name:")?,
        password: compile(NAME, "password", r"assword:")?,
        privileged: compile(NAME, "privileged", r"(?m)^\r?[\w.\-@/: ]{1,63}#")?,
        config: compile(
            NAME,
            "config",
            r"(?m)^\r?[\w.\-@/: ]{1,63}\(config[\w.\-@/:+]{0,63}\)#",
        )?,
    };

    let messages = Messages {
        key_created: compile(NAME, "key_created", r"Key pair is successfully create")?,
        key_exists: compile(NAME, "key_exists", r"ey already exist")?,
        tftp_done: compile(NAME, "tftp_done", r"TFTP to Flash Done")?,
        flash_done: compile(NAME, "flash_done", r"Flash to Flash Done")?,
    };

    let commands = Commands {
        enter_config: "config t".to_string(),
        zeroize_key: "crypto key zeroize".to_string(),
        generate_key: "crypto key generate".to_string(),
        exit_config: "end".to_string(),
        copy_flash_secondary: "copy flash flash secondary".to_string(),
        save_config: "write mem".to_string(),
        logout: "logout".to_string(),
    };

    let timings = Timings {
        bootrom_copy: Duration::from_secs(120),
        flash_copy: Duration::from_secs(300),
        settle: Duration::from_secs(5),
    };

    Ok(PlatformDefinition {
        name: NAME.to_string(),
        prompts,
        messages,
        commands,
        timings,
    })
}
