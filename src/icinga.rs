//! Generate an Icinga2 `CheckCommand` object from a check's clap definition.
//!
//! Running any check with the `GENERATE_ICINGA_COMMAND` environment variable
//! set prints the command configuration and exits 0, so the monitoring host
//! can be provisioned from the binaries themselves.

use std::fmt::Write;

use clap::ArgAction;

#[derive(Debug, thiserror::Error)]
pub enum IcingaConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("executable path is not valid UTF-8")]
    InvalidExecutablePath,
    #[error("argument {0:?} has no long form")]
    MissingLongArgument(String),
}

#[derive(Debug)]
struct CommandArgument {
    flag: String,
    variable: String,
    description: Option<String>,
    is_switch: bool,
    default: Option<String>,
}

/// The pieces of one `CheckCommand` definition.
#[derive(Debug)]
pub struct IcingaCommand {
    name: String,
    arguments: Vec<CommandArgument>,
}

impl IcingaCommand {
    pub fn from_clap(name: &str, cmd: &clap::Command) -> Result<IcingaCommand, IcingaConfigError> {
        let mut arguments = Vec::new();

        for arg in cmd.get_arguments() {
            // clap's implicit --help/--version have no place in a command
            // definition.
            let id = arg.get_id().as_str();
            if id == "help" || id == "version" {
                continue;
            }

            let flag = arg
                .get_long()
                .ok_or_else(|| IcingaConfigError::MissingLongArgument(id.to_owned()))?
                .to_owned();

            arguments.push(CommandArgument {
                variable: flag.replace('-', "_"),
                description: arg.get_help().map(|h| h.to_string()),
                is_switch: matches!(*arg.get_action(), ArgAction::SetTrue | ArgAction::Count),
                default: arg
                    .get_default_values()
                    .first()
                    .and_then(|v| v.to_str())
                    .map(str::to_owned),
                flag,
            });
        }

        Ok(IcingaCommand {
            name: name.to_owned(),
            arguments,
        })
    }

    /// Render the Icinga2 DSL object.
    pub fn render(&self, executable: &str) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "object CheckCommand \"{}\" {{", self.name);
        let _ = writeln!(out, "  command = [ \"{}\" ]", executable);
        let _ = writeln!(out, "  arguments = {{");

        for arg in &self.arguments {
            let _ = writeln!(out, "  \"--{}\" = {{", arg.flag);
            if arg.is_switch {
                let _ = writeln!(out, "    set_if = \"${}$\"", arg.variable);
            } else {
                let _ = writeln!(out, "    value = \"${}$\"", arg.variable);
            }
            if let Some(description) = &arg.description {
                let _ = writeln!(out, "    description = \"{}\"", escape(description));
            }
            let _ = writeln!(out, "  }}");
        }
        let _ = writeln!(out, "  }}");
        let _ = writeln!(out);

        for arg in &self.arguments {
            if let Some(default) = &arg.default {
                let _ = writeln!(out, "  vars.{} = \"{}\"", arg.variable, escape(default));
            }
        }

        out.push_str("}\n");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$")
}

/// If `GENERATE_ICINGA_COMMAND` is set, print the command configuration for
/// this check and exit. Call before argument parsing so generation works
/// without a valid check configuration.
pub fn print_command_config_if_env_and_exit(
    name: &str,
    cmd: &clap::Command,
) -> Result<(), IcingaConfigError> {
    if std::env::var_os("GENERATE_ICINGA_COMMAND").is_none() {
        return Ok(());
    }

    let executable = std::env::current_exe()?
        .to_str()
        .ok_or(IcingaConfigError::InvalidExecutablePath)?
        .to_owned();

    let command = IcingaCommand::from_clap(name, cmd)?;
    print!("{}", command.render(&executable));
    std::process::exit(0);
}
