use improvlink_client::{LinkFactory, OpsConfig, Provisioner};
use improvlink_transport::{SerialLink, UsbSerialLink};
use tracing::{info, warn};

use crate::cmd::{session_config, ProvisionArgs};
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_status, OutputFormat};

pub fn run(args: ProvisionArgs, format: OutputFormat) -> CliResult<i32> {
    let port = args.link.port.clone();
    let baud = args.link.baud;
    let factory: LinkFactory = Box::new(move || {
        let link = UsbSerialLink::open(&port, baud)?;
        Ok(Box::new(link) as Box<dyn SerialLink>)
    });

    let mut provisioner = Provisioner::new(factory, session_config(&args.link), OpsConfig::default());

    if !provisioner.connect() {
        let reason = provisioner
            .last_error()
            .unwrap_or("connect failed")
            .to_string();
        return Err(CliError::new(TRANSPORT_ERROR, reason));
    }

    let device = provisioner.identify();
    info!(device, "connected");

    let networks = provisioner.scan();
    info!(count = networks.len(), "scan complete");
    if !networks.iter().any(|n| n.ssid == args.ssid) {
        warn!(ssid = %args.ssid, "network not seen in scan, submitting anyway");
    }

    let ok = if args.save_only {
        provisioner.save(&args.ssid, &args.password)
    } else {
        provisioner.test(&args.ssid, &args.password)
    };
    let result = if ok {
        print_status(
            if args.save_only { "saved" } else { "provisioned" },
            &args.ssid,
            format,
        );
        Ok(SUCCESS)
    } else {
        let reason = provisioner
            .last_error()
            .unwrap_or("provisioning failed")
            .to_string();
        Err(CliError::new(FAILURE, reason))
    };

    provisioner.disconnect();
    result
}
