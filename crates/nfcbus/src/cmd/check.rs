use nfcbus_i2c::{BusHandle, OpenConfig};

use crate::cmd::CheckArgs;
use crate::exit::{bus_error, CliResult, SUCCESS};
use crate::output::{print_transfer, OutputFormat};

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let config = OpenConfig {
        force: args.bus.force,
    };
    let handle = BusHandle::open_with(&args.bus.bus, args.bus.address, &config)
        .map_err(|err| bus_error("check failed", err))?;
    tracing::info!(bus = ?handle.path(), address = %handle.address(), "device address bound");
    handle.close();

    print_transfer(&args.bus.bus, args.bus.address, "check", &[], format);
    Ok(SUCCESS)
}
