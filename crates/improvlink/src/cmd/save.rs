use improvlink_client::{submit_credentials, OpsConfig, SubmitMode};

use crate::cmd::{open_session, SaveArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_status, OutputFormat};

pub fn run(args: SaveArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = open_session(&args.link)?;
    submit_credentials(
        &mut session,
        &args.ssid,
        &args.password,
        SubmitMode::Save,
        &OpsConfig::default(),
    )
    .map_err(|err| client_error("save failed", err))?;
    print_status("saved", &args.ssid, format);
    Ok(SUCCESS)
}
