use nfcbus_i2c::{BusHandle, OpenConfig};

use crate::cmd::{ctrlc_token, parse_hex, parse_timeout, WriteArgs};
use crate::exit::{bus_error, CliResult, SUCCESS};
use crate::output::{print_transfer, OutputFormat};

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    let data = parse_hex(&args.data)?;
    let timeout = parse_timeout(&args.timeout)?;
    let cancel = ctrlc_token()?;

    let config = OpenConfig {
        force: args.bus.force,
    };
    let mut handle = BusHandle::open_with(&args.bus.bus, args.bus.address, &config)
        .map_err(|err| bus_error("open failed", err))?;

    let written = handle
        .write_cancellable(&data, Some(&cancel), timeout)
        .map_err(|err| bus_error("write failed", err))?;
    handle.close();

    print_transfer(
        &args.bus.bus,
        args.bus.address,
        "write",
        &data[..written],
        format,
    );
    Ok(SUCCESS)
}
