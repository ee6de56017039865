//! Check how long Keystone takes to issue a token.

use clap::{ArgAction, CommandFactory, Parser};

use osnag::session::{Session, SessionArgs};
use osnag::{
    icinga, Check, CheckError, CheckResult, Metric, ProbeError, Range, Resource, Runner,
    ScalarContext, Unit,
};

/// Nagios/Icinga check for Keystone token issuance time.
#[derive(Debug, Parser)]
#[command(name = "check-keystone-token", version, about)]
struct Args {
    /// Return warning if the token time in seconds is outside RANGE
    #[arg(short = 'w', long, value_name = "RANGE", default_value = "0:")]
    warn: String,

    /// Return critical if the token time in seconds is outside RANGE
    #[arg(short = 'c', long, value_name = "RANGE", default_value = "0:")]
    critical: String,

    /// Increase diagnostic output on stderr (up to three times)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    os: SessionArgs,
}

/// The probe already happened when the session authenticated; this just
/// reports the measured wall time.
struct KeystoneToken<'a> {
    session: &'a Session,
}

impl Resource for KeystoneToken<'_> {
    fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
        Ok(vec![Metric::new("gettime", self.session.auth_seconds())
            .unit(Unit::Seconds)
            .min(0.0)])
    }
}

fn run(args: &Args) -> Result<CheckResult, CheckError> {
    let warning: Range = args.warn.parse()?;
    let critical: Range = args.critical.parse()?;

    let session = Session::connect(&args.os)?;
    let result = Check::new()
        .context(ScalarContext::new("gettime", warning, critical))
        .run(&KeystoneToken { session: &session })?;
    Ok(result)
}

fn main() {
    if let Err(e) =
        icinga::print_command_config_if_env_and_exit("check-keystone-token", &Args::command())
    {
        eprintln!("cannot generate command config: {}", e);
        std::process::exit(3);
    }

    let args = Args::parse();
    osnag::init_diagnostics(args.verbose);

    Runner::new().safe_run(|| run(&args)).print_and_exit()
}
