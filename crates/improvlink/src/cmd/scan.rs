use improvlink_client::{scan_networks, OpsConfig};
use tracing::info;

use crate::cmd::{open_session, ScanArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_networks, OutputFormat};

pub fn run(args: ScanArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = open_session(&args.link)?;
    let networks = scan_networks(&mut session, &OpsConfig::default())
        .map_err(|err| client_error("scan failed", err))?;
    info!(count = networks.len(), "scan complete");
    print_networks(&networks, format);
    Ok(SUCCESS)
}
