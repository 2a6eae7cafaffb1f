use improvlink_client::{identify, OpsConfig};

use crate::cmd::{open_session, parse_duration, IdentifyArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_device, OutputFormat};

pub fn run(args: IdentifyArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let ops = OpsConfig {
        identify_timeout: timeout,
        ..OpsConfig::default()
    };

    let mut session = open_session(&args.link)?;
    let device =
        identify(&mut session, &ops).map_err(|err| client_error("identify failed", err))?;
    print_device(&device, format);
    Ok(SUCCESS)
}
